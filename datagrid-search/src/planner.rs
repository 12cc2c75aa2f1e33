//! Resolution of a column model against a document index.
//!
//! Document paths need no joins. Instead every dotted path lives inside a
//! nested object whose path must scope both queries and sorts, so each
//! resolved target carries its nested path along with the field.

use datagrid_query::{Column, ColumnKind, ColumnModel, FieldType, GridOptions};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Suffix of the keyword sub-field used to sort analyzed strings.
pub const DEFAULT_SORT_SUFFIX: &str = "keyword";

/// Array marker stripped from document paths.
const ARRAY_MARKER: &str = "[,]";

/// How string columns without a select filter are queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringQuery {
    /// Analyzed match, any term.
    #[default]
    Match,
    /// Analyzed match, all terms.
    ExactMatch,
    /// `.*value.*` on the `raw` sub-field.
    Regexp,
    /// Exact term on the `raw` sub-field.
    Term,
}

/// Index-specific settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSettings {
    /// Sub-field appended to string sort targets.
    pub sort_suffix: String,
    /// Query kind for plain string columns.
    pub string_query: StringQuery,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            sort_suffix: DEFAULT_SORT_SUFFIX.to_string(),
            string_query: StringQuery::default(),
        }
    }
}

impl SearchSettings {
    /// Set the sort suffix.
    pub fn sort_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.sort_suffix = suffix.into();
        self
    }

    /// Set the string query kind.
    pub fn string_query(mut self, kind: StringQuery) -> Self {
        self.string_query = kind;
        self
    }
}

/// A resolved document field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchField {
    /// Field path with array markers removed.
    pub field: String,
    /// Enclosing nested object path, if the path is dotted.
    pub nested_path: Option<String>,
}

impl SearchField {
    /// Resolve a document path.
    pub fn resolve(path: &str) -> Self {
        let field = path.replace(ARRAY_MARKER, "");
        let nested_path = field.rsplit_once('.').map(|(parent, _)| parent.to_string());
        Self { field, nested_path }
    }

    /// Resolve a path, then target one of its sub-fields.
    fn with_suffix(path: &str, suffix: &str) -> Self {
        let mut resolved = Self::resolve(path);
        resolved.field = format!("{}.{}", resolved.field, suffix);
        resolved
    }
}

/// Index-aligned search and order targets of one column model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchTables {
    search_targets: Vec<Option<Vec<SearchField>>>,
    order_targets: Vec<Vec<SearchField>>,
    groups: IndexMap<String, Vec<usize>>,
}

impl SearchTables {
    /// Resolve every column of the model.
    pub fn resolve(columns: &ColumnModel, options: &GridOptions, settings: &SearchSettings) -> Self {
        let mut tables = Self::default();

        for column in columns.columns() {
            let searchable = is_searchable(column, options);
            let (search, order) = match &column.kind {
                ColumnKind::CustomExpression { expression } => (
                    searchable.then(|| vec![SearchField::resolve(expression)]),
                    order_target(column, expression, settings).into_iter().collect(),
                ),
                ColumnKind::Direct { .. } | ColumnKind::Association { .. } => (
                    searchable.then(|| vec![SearchField::resolve(&column.data)]),
                    order_target(column, &column.data, settings).into_iter().collect(),
                ),
                ColumnKind::Virtual {
                    order_columns,
                    search_columns,
                    ..
                } => (
                    (searchable && !search_columns.is_empty())
                        .then(|| search_columns.iter().map(|p| SearchField::resolve(p)).collect()),
                    order_columns
                        .iter()
                        .filter_map(|path| order_target(column, path, settings))
                        .collect(),
                ),
                ColumnKind::NonSelecting => (None, Vec::new()),
            };
            tables.search_targets.push(search);
            tables.order_targets.push(order);

            if let Some(group) = column.search_column_group.as_deref().filter(|g| !g.is_empty()) {
                let members = tables.groups.entry(group.to_string()).or_default();
                if !members.contains(&column.index) {
                    members.push(column.index);
                }
            }
        }

        debug!(
            columns = columns.len(),
            groups = tables.groups.len(),
            "Search targets resolved"
        );
        tables
    }

    /// Search targets of a column, empty when it is not searchable.
    pub fn search_targets(&self, index: usize) -> &[SearchField] {
        self.search_targets
            .get(index)
            .and_then(Option::as_deref)
            .unwrap_or(&[])
    }

    /// Order targets of a column, in sort priority; empty when it is not orderable.
    pub fn order_targets(&self, index: usize) -> &[SearchField] {
        self.order_targets.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Member column indexes of a search group.
    pub fn group(&self, name: &str) -> Option<&[usize]> {
        self.groups.get(name).map(Vec::as_slice)
    }
}

/// Check if a column takes part in searching.
pub fn is_searchable(column: &Column, options: &GridOptions) -> bool {
    column.dql().is_some()
        && column.searchable
        && (column.visible || options.search_in_non_visible_columns)
}

fn order_target(column: &Column, path: &str, settings: &SearchSettings) -> Option<SearchField> {
    if !column.orderable {
        return None;
    }
    let type_of_field = match &column.kind {
        ColumnKind::Virtual {
            order_column_type: Some(t),
            ..
        } => Some(t),
        _ => column.type_of_field.as_ref(),
    };
    if matches!(type_of_field, Some(FieldType::String | FieldType::Text)) {
        Some(SearchField::with_suffix(path, &settings.sort_suffix))
    } else {
        Some(SearchField::resolve(path))
    }
}
