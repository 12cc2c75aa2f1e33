//! Response assembly.
//!
//! [`GridResponse`] ties a [`GridView`], the current [`GridRequest`] and a
//! [`QueryEngine`] together: it validates the view's column positions, lazily
//! creates the per-request [`DatagridQuery`], runs it, formats the rows and
//! wraps them in a [`ResponseEnvelope`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::builder::ColumnModel;
use crate::column::Position;
use crate::error::{QueryError, QueryResult};
use crate::executor::{DatagridQuery, Paginator};
use crate::formatter::RowFormatter;
use crate::grid::GridView;
use crate::metadata::MetadataProvider;
use crate::options::ResponseDefaults;
use crate::request::GridRequest;
use crate::traits::{QueryEngine, Row};

/// The grid protocol envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// Echo of the request's draw counter.
    pub draw: i64,
    /// Rows before searching, 0 when counting was skipped.
    pub records_total: u64,
    /// Rows after searching.
    pub records_filtered: u64,
    /// Formatted rows.
    pub data: Vec<Row>,
}

impl ResponseEnvelope {
    /// The envelope as a JSON value.
    pub fn to_value(&self) -> QueryResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// The envelope as a JSON string.
    pub fn to_json(&self) -> QueryResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Check that every column sits at a position it is allowed to occupy.
///
/// Returns the index of the first misplaced column as an error.
pub fn validate_column_positions(columns: &ColumnModel) -> QueryResult<()> {
    let last = columns.len().saturating_sub(1);
    for column in columns.columns() {
        let Some(allowed) = column.allowed_positions() else {
            continue;
        };
        let permitted = allowed.iter().any(|position| match position {
            Position::Index(index) => *index == column.index,
            Position::Last => column.index == last,
        });
        if !permitted {
            return Err(QueryError::invalid_column_position(column.index));
        }
    }
    Ok(())
}

/// Builds grid responses for one request.
pub struct GridResponse {
    metadata: Arc<dyn MetadataProvider>,
    request: Option<GridRequest>,
    grid: Option<GridView>,
    query: Option<DatagridQuery>,
    count_all_results: bool,
    output_walkers: bool,
    fetch_join_collection: bool,
}

impl GridResponse {
    /// Create a response builder.
    pub fn new(metadata: Arc<dyn MetadataProvider>) -> Self {
        let defaults = ResponseDefaults::default();
        Self {
            metadata,
            request: None,
            grid: None,
            query: None,
            count_all_results: defaults.count_all_results,
            output_walkers: defaults.output_walkers,
            fetch_join_collection: defaults.fetch_join_collection,
        }
    }

    /// Start from configured response flags instead of the defaults.
    pub fn with_defaults(mut self, defaults: ResponseDefaults) -> Self {
        self.count_all_results = defaults.count_all_results;
        self.output_walkers = defaults.output_walkers;
        self.fetch_join_collection = defaults.fetch_join_collection;
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
        debug!(grid = %grid.unique_name(), "Grid view attached");
        self.grid = Some(grid);
        self.query = None;
        Ok(self)
    }

    /// The attached grid view.
    pub fn grid(&self) -> Option<&GridView> {
        self.grid.as_ref()
    }

    /// Run the count-all query.
    pub fn set_count_all_results(&mut self, enabled: bool) -> &mut Self {
        self.count_all_results = enabled;
        self
    }

    /// Count filtered rows through a sub-select.
    pub fn set_output_walkers(&mut self, enabled: bool) -> &mut Self {
        self.output_walkers = enabled;
        self
    }

    /// Page by distinct root identifiers when to-many associations are joined.
    pub fn set_fetch_join_collection(&mut self, enabled: bool) -> &mut Self {
        self.fetch_join_collection = enabled;
        self
    }

    /// Restore the per-call flags.
    pub fn reset_response_options(&mut self) {
        let defaults = ResponseDefaults::default();
        self.count_all_results = defaults.count_all_results;
        self.output_walkers = defaults.output_walkers;
        self.fetch_join_collection = defaults.fetch_join_collection;
    }

    /// The query for the current request, created on first use.
    pub fn get_query(&mut self) -> QueryResult<&mut DatagridQuery> {
        if self.query.is_none() {
            let grid = self.grid.as_ref().ok_or_else(|| {
                QueryError::missing_dependency("A grid view is needed to build a query")
                    .with_suggestion("Call set_grid() first")
            })?;
            let request = self.request.clone().ok_or_else(|| {
                QueryError::missing_dependency("A grid request is needed to build a query")
                    .with_suggestion("Call set_request() first")
            })?;
            let query = DatagridQuery::new(grid, request, Arc::clone(&self.metadata))?;
            self.query = Some(query);
        }
        self.query
            .as_mut()
            .ok_or_else(|| QueryError::internal("query was not created"))
    }

    fn check_dependencies(&self) -> QueryResult<(&GridView, &DatagridQuery)> {
        let grid = self.grid.as_ref().ok_or_else(|| {
            QueryError::missing_dependency("A grid view is needed for a response")
                .with_suggestion("Call set_grid() first")
        })?;
        let query = self.query.as_ref().ok_or_else(|| {
            QueryError::missing_dependency("A query is needed for a response")
                .with_suggestion("Call get_query() first")
        })?;
        Ok((grid, query))
    }

    async fn build(
        &self,
        engine: &dyn QueryEngine,
        count_all_results: bool,
        paginator: Paginator,
    ) -> QueryResult<ResponseEnvelope> {
        let (grid, query) = self.check_dependencies()?;

        let report = |e: &QueryError| error!(grid = %grid.unique_name(), "{}", e.display_full());

        let page = query.execute(engine, paginator).await.inspect_err(report)?;
        let mut formatter = RowFormatter::for_grid(grid);
        formatter.run(page.rows);

        let records_total = if count_all_results {
            query.count_all_results(engine).await.inspect_err(report)?
        } else {
            0
        };

        let envelope = ResponseEnvelope {
            draw: query.request().draw,
            records_total,
            records_filtered: page.filtered,
            data: formatter.into_output(),
        };
        info!(
            grid = %grid.unique_name(),
            draw = envelope.draw,
            total = envelope.records_total,
            filtered = envelope.records_filtered,
            rows = envelope.data.len(),
            "Grid response built"
        );
        Ok(envelope)
    }

    /// Build the envelope with explicit flags. The stored flags are left alone.
    pub async fn get_data(
        &self,
        engine: &dyn QueryEngine,
        count_all_results: bool,
        output_walkers: bool,
        fetch_join_collection: bool,
    ) -> QueryResult<ResponseEnvelope> {
        let paginator = Paginator {
            output_walkers,
            fetch_join_collection,
        };
        self.build(engine, count_all_results, paginator).await
    }

    /// Store the flags, then build the JSON response.
    pub async fn get_response(
        &mut self,
        engine: &dyn QueryEngine,
        count_all_results: bool,
        output_walkers: bool,
        fetch_join_collection: bool,
    ) -> QueryResult<String> {
        self.count_all_results = count_all_results;
        self.output_walkers = output_walkers;
        self.fetch_join_collection = fetch_join_collection;
        self.get_json_response(engine).await
    }

    /// Build the JSON response with the stored flags, then reset them.
    pub async fn get_json_response(&mut self, engine: &dyn QueryEngine) -> QueryResult<String> {
        let paginator = Paginator {
            output_walkers: self.output_walkers,
            fetch_join_collection: self.fetch_join_collection,
        };
        let envelope = self.build(engine, self.count_all_results, paginator).await?;
        let json = envelope.to_json()?;
        self.reset_response_options();
        Ok(json)
    }
}

impl std::fmt::Debug for GridResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridResponse")
            .field("grid", &self.grid.as_ref().map(GridView::unique_name))
            .field("query", &self.query)
            .field("count_all_results", &self.count_all_results)
            .field("output_walkers", &self.output_walkers)
            .field("fetch_join_collection", &self.fetch_join_collection)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ColumnBuilder;
    use crate::column::ColumnConfig;
    use crate::error::ErrorCode;
    use crate::filter::FilterValue;
    use crate::grid::GridRegistry;
    use crate::metadata::{EntityMetadata, StaticMetadata};
    use crate::traits::{BoxFuture, ExecutionOptions};
    use crate::types::FieldType;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    struct MockEngine {
        rows: Vec<Row>,
        counts: Mutex<Vec<u64>>,
    }

    impl QueryEngine for MockEngine {
        fn query_rows(
            &self,
            _sql: &str,
            _params: Vec<FilterValue>,
            _options: &ExecutionOptions,
        ) -> BoxFuture<'_, QueryResult<Vec<Row>>> {
            let rows = self.rows.clone();
            Box::pin(async move { Ok(rows) })
        }

        fn count(
            &self,
            _sql: &str,
            _params: Vec<FilterValue>,
            _options: &ExecutionOptions,
        ) -> BoxFuture<'_, QueryResult<u64>> {
            let count = self.counts.lock().pop().unwrap_or_default();
            Box::pin(async move { Ok(count) })
        }
    }

    struct ExhaustedEngine;

    impl QueryEngine for ExhaustedEngine {
        fn query_rows(
            &self,
            _sql: &str,
            _params: Vec<FilterValue>,
            _options: &ExecutionOptions,
        ) -> BoxFuture<'_, QueryResult<Vec<Row>>> {
            Box::pin(async { Err(QueryError::pool_exhausted(4)) })
        }

        fn count(
            &self,
            _sql: &str,
            _params: Vec<FilterValue>,
            _options: &ExecutionOptions,
        ) -> BoxFuture<'_, QueryResult<u64>> {
            Box::pin(async { Err(QueryError::pool_exhausted(4)) })
        }
    }

    fn metadata() -> Arc<StaticMetadata> {
        Arc::new(
            StaticMetadata::new().entity(
                EntityMetadata::new("Post", "posts")
                    .field("id", FieldType::Integer)
                    .field("title", FieldType::String),
            ),
        )
    }

    fn columns(metadata: &StaticMetadata, multiselect_first: bool) -> ColumnModel {
        let mut builder = ColumnBuilder::new(metadata, "Post", "posts").unwrap();
        if multiselect_first {
            builder = builder.add(None, ColumnConfig::multiselect(Vec::new())).unwrap();
        }
        builder = builder
            .add(Some("id"), ColumnConfig::column())
            .unwrap()
            .add(Some("title"), ColumnConfig::column())
            .unwrap();
        if !multiselect_first {
            builder = builder.add(None, ColumnConfig::multiselect(Vec::new())).unwrap();
        }
        builder.build()
    }

    fn engine() -> MockEngine {
        let row = |id: i64, title: &str| match json!({"post.id": id, "post.title": title}) {
            Value::Object(map) => map,
            _ => Row::new(),
        };
        MockEngine {
            rows: vec![row(1, "Hello"), row(2, "World")],
            // popped from the back: filtered count first, then total
            counts: Mutex::new(vec![10, 2]),
        }
    }

    #[test]
    fn test_positions() {
        let metadata = metadata();
        assert!(validate_column_positions(&columns(&metadata, true)).is_ok());
        assert!(validate_column_positions(&columns(&metadata, false)).is_ok());

        let misplaced = ColumnBuilder::new(metadata.as_ref(), "Post", "posts")
            .unwrap()
            .add(Some("id"), ColumnConfig::column())
            .unwrap()
            .add(None, ColumnConfig::multiselect(Vec::new()))
            .unwrap()
            .add(Some("title"), ColumnConfig::column())
            .unwrap()
            .build();
        let err = validate_column_positions(&misplaced).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidColumnPosition);
        assert!(err.message.contains("index 1"));
    }

    #[tokio::test]
    async fn test_dependencies_are_checked() {
        let metadata = metadata();
        let mut response = GridResponse::new(metadata.clone());
        let err = response.get_json_response(&engine()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingDependency);

        let err = response.get_query().unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingDependency);

        let grid = GridView::new(&GridRegistry::new(), "posts", "Post", columns(&metadata, false)).unwrap();
        response.set_grid(grid).unwrap();
        let err = response.get_json_response(&engine()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingDependency);
    }

    #[tokio::test]
    async fn test_json_response_and_reset() {
        let metadata = metadata();
        let grid = GridView::new(&GridRegistry::new(), "posts", "Post", columns(&metadata, false)).unwrap();
        let mut response = GridResponse::new(metadata.clone());
        response
            .set_grid(grid)
            .unwrap()
            .set_request(GridRequest::new(4).page(0, 10));
        response.get_query().unwrap();

        let json = response.get_response(&engine(), true, true, false).await.unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["draw"], json!(4));
        assert_eq!(value["recordsFiltered"], json!(2));
        assert_eq!(value["recordsTotal"], json!(10));
        assert_eq!(value["data"][1], json!({"id": 2, "title": "World", "datagrid_checkbox": true}));

        assert_eq!(response.output_walkers, false);
        assert_eq!(response.fetch_join_collection, true);
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let metadata = metadata();
        let grid = GridView::new(&GridRegistry::new(), "posts", "Post", columns(&metadata, false)).unwrap();
        let mut response = GridResponse::new(metadata.clone());
        response.set_grid(grid).unwrap().set_request(GridRequest::new(1));
        response.get_query().unwrap();

        let err = response.get_json_response(&ExhaustedEngine).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PoolExhausted);
        assert!(err.display_full().contains("Increase max_connections"));
    }

    #[tokio::test]
    async fn test_get_data_without_total() {
        let metadata = metadata();
        let grid = GridView::new(&GridRegistry::new(), "posts", "Post", columns(&metadata, true)).unwrap();
        let mut response = GridResponse::new(metadata.clone());
        response.set_grid(grid).unwrap().set_request(GridRequest::new(1));
        response.get_query().unwrap().use_query_cache(true);

        let envelope = response.get_data(&engine(), false, false, true).await.unwrap();
        assert_eq!(envelope.records_total, 0);
        assert_eq!(envelope.records_filtered, 2);
        assert_eq!(envelope.data.len(), 2);
        assert_eq!(
            envelope.to_value().unwrap()["data"][0]["title"],
            json!("Hello")
        );
    }
}
