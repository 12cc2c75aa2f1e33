//! Per-request search execution.

use datagrid_query::{ColumnModel, Features, GridOptions, GridRequest, GridView, QueryResult};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::client::{NoTermsFilter, SearchClient, TermsFilter};
use crate::dsl::SearchBody;
use crate::entries::Entries;
use crate::planner::{SearchSettings, SearchTables};
use crate::query::SearchQueryBuilder;

/// Hits fetched per round trip when reading a whole result set.
pub const BATCH_SIZE: u64 = 100;

/// The search query of one grid request.
pub struct SearchQuery {
    columns: Arc<ColumnModel>,
    options: GridOptions,
    features: Features,
    request: GridRequest,
    settings: SearchSettings,
    tables: SearchTables,
    terms: Arc<dyn TermsFilter>,
}

impl SearchQuery {
    /// Resolve a grid view for one request.
    pub fn new(grid: &GridView, request: GridRequest) -> Self {
        Self::with_settings(grid, request, SearchSettings::default())
    }

    /// Resolve a grid view for one request with index-specific settings.
    pub fn with_settings(grid: &GridView, request: GridRequest, settings: SearchSettings) -> Self {
        let tables = SearchTables::resolve(grid.columns(), grid.options(), &settings);
        Self {
            columns: Arc::clone(grid.columns()),
            options: grid.options().clone(),
            features: grid.features().clone(),
            request,
            settings,
            tables,
            terms: Arc::new(NoTermsFilter),
        }
    }

    /// Restrict every query with a terms filter.
    pub fn with_terms_filter(mut self, terms: Arc<dyn TermsFilter>) -> Self {
        self.terms = terms;
        self
    }

    /// The request being answered.
    pub fn request(&self) -> &GridRequest {
        &self.request
    }

    /// The resolved targets.
    pub fn tables(&self) -> &SearchTables {
        &self.tables
    }

    fn builder(&self) -> SearchQueryBuilder<'_> {
        SearchQueryBuilder::new(&self.columns, &self.tables, &self.request, &self.options, &self.settings)
    }

    /// The unwindowed body of the page query, or of the count query.
    pub fn body(&self, count_query: bool) -> SearchBody {
        self.builder().build(self.terms.as_ref(), count_query, None)
    }

    /// Fetch the requested page.
    ///
    /// Without a page window (paging off, or a length of `-1`) every hit is
    /// fetched in batches.
    pub async fn execute(&self, client: &dyn SearchClient) -> QueryResult<Entries> {
        let body = self.body(false);
        match self.window() {
            Some((from, size)) => {
                let windowed = body.window(from, size);
                debug!(body = %windowed.to_value(), "Executing search page");
                let hits = client.search(&windowed).await?;
                Ok(Entries::new(hits.total, hits.sources))
            }
            None => self.fetch_all(client, body).await,
        }
    }

    /// Count every document the terms filter lets through, ignoring search values.
    pub async fn count_all_results(&self, client: &dyn SearchClient) -> QueryResult<u64> {
        let body = self.body(true);
        debug!(body = %body.to_value(), "Counting all documents");
        Ok(client.count(&body).await?)
    }

    /// Fetch every matching hit, returning only the given source fields.
    pub async fn get_all_results_for_fields(
        &self,
        client: &dyn SearchClient,
        fields: &[&str],
    ) -> QueryResult<Entries> {
        let source: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let body = self.builder().build(self.terms.as_ref(), false, Some(&source));
        self.fetch_all(client, body).await
    }

    fn window(&self) -> Option<(u64, u64)> {
        if !self.features.is_paging_enabled() {
            return None;
        }
        let start = self.request.start.unwrap_or(0);
        let length = u64::try_from(self.request.length?).ok()?;
        Some((start, length))
    }

    async fn fetch_all(&self, client: &dyn SearchClient, body: SearchBody) -> QueryResult<Entries> {
        let total = client.search(&body.window(0, 1)).await?.total;
        let mut entries = Vec::new();

        let mut offset = 0;
        while offset < total {
            let hits = client.search(&body.window(offset, BATCH_SIZE)).await?;
            if hits.sources.is_empty() {
                break;
            }
            entries.extend(hits.sources);
            offset += BATCH_SIZE;
        }

        debug!(total, fetched = entries.len(), "Fetched all search hits");
        Ok(Entries::new(total, entries))
    }
}

impl fmt::Debug for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchQuery")
            .field("request", &self.request)
            .field("settings", &self.settings)
            .field("tables", &self.tables)
            .finish_non_exhaustive()
    }
}
