//! Grid responses backed by a search engine.

use datagrid_query::formatter::keep_row;
use datagrid_query::response::validate_column_positions;
use datagrid_query::{
    GridRequest, GridView, QueryError, QueryResult, ResponseDefaults, ResponseEnvelope, RowFormatter,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::{NoTermsFilter, SearchClient, TermsFilter};
use crate::executor::SearchQuery;
use crate::planner::SearchSettings;

/// Builds grid responses from a search index.
pub struct SearchResponse {
    settings: SearchSettings,
    terms: Arc<dyn TermsFilter>,
    request: Option<GridRequest>,
    grid: Option<GridView>,
    query: Option<SearchQuery>,
    count_all_results: bool,
}

impl Default for SearchResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchResponse {
    /// Create a response builder with default settings.
    pub fn new() -> Self {
        Self {
            settings: SearchSettings::default(),
            terms: Arc::new(NoTermsFilter),
            request: None,
            grid: None,
            query: None,
            count_all_results: ResponseDefaults::default().count_all_results,
        }
    }

    /// Use index-specific settings.
    pub fn with_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self.query = None;
        self
    }

    /// Restrict every query with a terms filter.
    pub fn with_terms_filter(mut self, terms: Arc<dyn TermsFilter>) -> Self {
        self.terms = terms;
        self.query = None;
        self
    }

    /// Set the request to answer. Drops any query built for a previous request.
    pub fn set_request(&mut self, request: GridRequest) -> &mut Self {
        self.request = Some(request);
        self.query = None;
        self
    }

    /// Attach a grid view after checking its column positions.
    pub fn set_grid(&mut self, grid: GridView) -> QueryResult<&mut Self> {
        validate_column_positions(grid.columns()).map_err(|e| e.with_grid(grid.unique_name()))?;
        debug!(grid = %grid.unique_name(), "Grid view attached to search response");
        self.grid = Some(grid);
        self.query = None;
        Ok(self)
    }

    /// Run the count-all query.
    pub fn set_count_all_results(&mut self, enabled: bool) -> &mut Self {
        self.count_all_results = enabled;
        self
    }

    /// Restore the count-all flag.
    pub fn reset_response_options(&mut self) {
        self.count_all_results = ResponseDefaults::default().count_all_results;
    }

    /// The query for the current request, created on first use.
    pub fn get_query(&mut self) -> QueryResult<&mut SearchQuery> {
        if self.query.is_none() {
            let grid = self.grid.as_ref().ok_or_else(|| {
                QueryError::missing_dependency("A grid view is needed to build a search query")
                    .with_suggestion("Call set_grid() first")
            })?;
            let request = self.request.clone().ok_or_else(|| {
                QueryError::missing_dependency("A grid request is needed to build a search query")
                    .with_suggestion("Call set_request() first")
            })?;
            let query = SearchQuery::with_settings(grid, request, self.settings.clone())
                .with_terms_filter(Arc::clone(&self.terms));
            self.query = Some(query);
        }
        self.query
            .as_mut()
            .ok_or_else(|| QueryError::internal("search query was not created"))
    }

    /// Build the envelope. The stored flag is left alone.
    pub async fn get_data(
        &mut self,
        client: &dyn SearchClient,
        count_all_results: bool,
    ) -> QueryResult<ResponseEnvelope> {
        self.get_query()?;
        let (Some(grid), Some(query)) = (self.grid.as_ref(), self.query.as_ref()) else {
            return Err(QueryError::internal("search query was not created"));
        };

        let (entries, records_total) = futures::try_join!(query.execute(client), async {
            if count_all_results {
                query.count_all_results(client).await
            } else {
                Ok(0)
            }
        })?;

        let records_filtered = entries.count;
        let mut formatter = RowFormatter::for_grid(grid).with_normalizer(keep_row);
        formatter.run(entries);

        let envelope = ResponseEnvelope {
            draw: query.request().draw,
            records_total,
            records_filtered,
            data: formatter.into_output(),
        };
        info!(
            grid = %grid.unique_name(),
            draw = envelope.draw,
            total = envelope.records_total,
            filtered = envelope.records_filtered,
            rows = envelope.data.len(),
            "Search response built"
        );
        Ok(envelope)
    }

    /// Store the flag, then build the JSON response.
    pub async fn get_response(
        &mut self,
        client: &dyn SearchClient,
        count_all_results: bool,
    ) -> QueryResult<String> {
        self.count_all_results = count_all_results;
        self.get_json_response(client).await
    }

    /// Build the JSON response with the stored flag, then reset it.
    pub async fn get_json_response(&mut self, client: &dyn SearchClient) -> QueryResult<String> {
        let envelope = self.get_data(client, self.count_all_results).await?;
        let json = envelope.to_json()?;
        self.reset_response_options();
        Ok(json)
    }
}

impl fmt::Debug for SearchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchResponse")
            .field("grid", &self.grid.as_ref().map(GridView::unique_name))
            .field("settings", &self.settings)
            .field("query", &self.query)
            .field("count_all_results", &self.count_all_results)
            .finish_non_exhaustive()
    }
}
