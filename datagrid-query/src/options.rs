//! Grid view options consumed by the query pipeline.

use serde::{Deserialize, Serialize};

use crate::filter::SearchOperator;

/// Search behaviour of a grid view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridOptions {
    /// Apply per-column search values.
    pub individual_filtering: bool,
    /// Operator used by the global search.
    pub global_search_type: SearchOperator,
    /// Let the global search and individual filters reach hidden columns.
    pub search_in_non_visible_columns: bool,
    /// OR together columns sharing a search column group.
    pub search_column_group_filtering: bool,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            individual_filtering: false,
            global_search_type: SearchOperator::Like,
            search_in_non_visible_columns: false,
            search_column_group_filtering: false,
        }
    }
}

impl GridOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable individual filtering.
    pub fn individual_filtering(mut self, enabled: bool) -> Self {
        self.individual_filtering = enabled;
        self
    }

    /// Set the global search operator.
    pub fn global_search_type(mut self, operator: SearchOperator) -> Self {
        self.global_search_type = operator;
        self
    }

    /// Search hidden columns too.
    pub fn search_in_non_visible_columns(mut self, enabled: bool) -> Self {
        self.search_in_non_visible_columns = enabled;
        self
    }

    /// Enable search column groups.
    pub fn search_column_group_filtering(mut self, enabled: bool) -> Self {
        self.search_column_group_filtering = enabled;
        self
    }
}

/// Client features that affect the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Features {
    /// Paging. Unset behaves like enabled.
    pub paging: Option<bool>,
}

impl Features {
    /// Enable or disable paging.
    pub fn paging(mut self, paging: bool) -> Self {
        self.paging = Some(paging);
        self
    }

    /// Check if limit and offset are applied.
    pub fn is_paging_enabled(&self) -> bool {
        self.paging.unwrap_or(true)
    }
}

/// HTTP method of the ajax source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AjaxMethod {
    /// Query string parameters.
    #[default]
    Get,
    /// Form body.
    Post,
}

/// Ajax source settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Ajax {
    /// Source url.
    pub url: Option<String>,
    /// HTTP method.
    pub method: AjaxMethod,
    /// Number of pages prefetched by the client pipeline, 0 when off.
    pub pipeline: u32,
}

impl Ajax {
    /// Set the source url.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the method.
    pub fn method(mut self, method: AjaxMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the pipeline page count.
    pub fn pipeline(mut self, pages: u32) -> Self {
        self.pipeline = pages;
        self
    }
}

/// Per-call response flags, reset after every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponseDefaults {
    /// Run the count-all query. When off, `recordsTotal` is 0.
    pub count_all_results: bool,
    /// Count filtered rows through a sub-select.
    pub output_walkers: bool,
    /// Page by distinct root identifiers when to-many associations are joined.
    pub fetch_join_collection: bool,
}

impl Default for ResponseDefaults {
    fn default() -> Self {
        Self {
            count_all_results: true,
            output_walkers: false,
            fetch_join_collection: true,
        }
    }
}
