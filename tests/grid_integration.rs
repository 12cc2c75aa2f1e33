//! Integration tests for the relational grid pipeline.
//!
//! These tests drive a grid view from request to JSON response against an
//! in-memory engine that records every statement it receives.

use datagrid::query::filter::{FilterValue, SearchOperator};
use datagrid::query::request::RequestColumn;
use datagrid::query::strategy::SelectFilter;
use datagrid::query::traits::{BoxFuture, ExecutionOptions};
use datagrid::query::{
    AssociationMetadata, ColumnBuilder, ColumnConfig, EntityMetadata, ErrorCode, FieldType, GridOptions,
    GridRegistry, GridRequest, GridResponse, GridView, QueryEngine, QueryResult, Row, SortOrder, StaticMetadata,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

/// Serves fixed rows; counts depend on whether the statement filters.
struct RecordingEngine {
    rows: Vec<Row>,
    total: u64,
    filtered: u64,
    statements: Mutex<Vec<(String, Vec<FilterValue>)>>,
}

impl RecordingEngine {
    fn new(rows: Vec<Row>, total: u64, filtered: u64) -> Self {
        Self {
            rows,
            total,
            filtered,
            statements: Mutex::new(Vec::new()),
        }
    }

    fn statements(&self) -> Vec<(String, Vec<FilterValue>)> {
        self.statements.lock().unwrap().clone()
    }

    fn page_sql(&self) -> String {
        self.statements()
            .into_iter()
            .map(|(sql, _)| sql)
            .find(|sql| !sql.contains("COUNT("))
            .unwrap_or_default()
    }
}

impl QueryEngine for RecordingEngine {
    fn query_rows(
        &self,
        sql: &str,
        params: Vec<FilterValue>,
        _options: &ExecutionOptions,
    ) -> BoxFuture<'_, QueryResult<Vec<Row>>> {
        self.statements.lock().unwrap().push((sql.to_string(), params));
        let rows = self.rows.clone();
        Box::pin(async move { Ok(rows) })
    }

    fn count(
        &self,
        sql: &str,
        params: Vec<FilterValue>,
        _options: &ExecutionOptions,
    ) -> BoxFuture<'_, QueryResult<u64>> {
        let n = if sql.contains("WHERE") { self.filtered } else { self.total };
        self.statements.lock().unwrap().push((sql.to_string(), params));
        Box::pin(async move { Ok(n) })
    }
}

fn metadata() -> Arc<StaticMetadata> {
    Arc::new(
        StaticMetadata::new()
            .entity(
                EntityMetadata::new("Post", "posts")
                    .field("id", FieldType::Integer)
                    .field("title", FieldType::String)
                    .field("status", FieldType::Integer)
                    .association("createdBy", AssociationMetadata::many_to_one("User", "created_by_id")),
            )
            .entity(
                EntityMetadata::new("User", "users")
                    .field("id", FieldType::Integer)
                    .field("username", FieldType::String),
            ),
    )
}

fn posts(n: usize) -> Vec<Row> {
    (1..=n)
        .map(|i| match json!({"post.id": i, "post.title": format!("Post {}", i)}) {
            Value::Object(map) => map,
            _ => Row::new(),
        })
        .collect()
}

fn simple_grid(metadata: &StaticMetadata, options: GridOptions) -> GridView {
    let columns = ColumnBuilder::new(metadata, "Post", "posts")
        .unwrap()
        .add(Some("id"), ColumnConfig::column())
        .unwrap()
        .add(Some("title"), ColumnConfig::column())
        .unwrap()
        .build();
    GridView::new(&GridRegistry::new(), "posts", "Post", columns)
        .unwrap()
        .with_options(options)
}

async fn respond(metadata: Arc<StaticMetadata>, grid: GridView, request: GridRequest, engine: &RecordingEngine) -> Value {
    let mut response = GridResponse::new(metadata);
    response.set_grid(grid).unwrap().set_request(request);
    response.get_query().unwrap();
    let json = response.get_json_response(engine).await.unwrap();
    serde_json::from_str(&json).unwrap()
}

fn orderable() -> RequestColumn {
    RequestColumn {
        orderable: true,
        ..RequestColumn::default()
    }
}

#[tokio::test]
async fn test_first_page_without_search() {
    let metadata = metadata();
    let grid = simple_grid(&metadata, GridOptions::default());
    let engine = RecordingEngine::new(posts(10), 25, 25);

    let value = respond(metadata.clone(), grid, GridRequest::new(1).page(0, 10).global(""), &engine).await;

    assert_eq!(value["draw"], json!(1));
    assert_eq!(value["recordsTotal"], json!(25));
    assert_eq!(value["recordsFiltered"], json!(25));
    assert_eq!(value["data"].as_array().map(Vec::len), Some(10));
    assert_eq!(value["data"][0], json!({"id": 1, "title": "Post 1"}));

    let sql = engine.page_sql();
    assert!(sql.starts_with("SELECT post.id AS \"post.id\", post.title AS \"post.title\" FROM posts post"));
    assert!(!sql.contains("WHERE"));
    assert!(sql.contains("LIMIT 10"));
}

#[tokio::test]
async fn test_individual_column_search() {
    let metadata = metadata();
    let grid = simple_grid(&metadata, GridOptions::default().individual_filtering(true));
    let engine = RecordingEngine::new(posts(3), 25, 3);

    let request = GridRequest::new(2).page(0, 10).column_search(1, "Hello");
    let value = respond(metadata.clone(), grid, request, &engine).await;

    assert_eq!(value["recordsTotal"], json!(25));
    assert_eq!(value["recordsFiltered"], json!(3));

    let statements = engine.statements();
    let (page_sql, params) = &statements[0];
    assert!(page_sql.contains("WHERE post.title ILIKE $1"));
    assert_eq!(params, &vec![FilterValue::String("%Hello%".into())]);

    let (count_sql, count_params) = &statements[1];
    assert!(count_sql.starts_with("SELECT COUNT(DISTINCT post.id)"));
    assert!(count_sql.contains("WHERE post.title ILIKE $1"));
    assert_eq!(count_params, params);
}

#[tokio::test]
async fn test_column_search_ignored_without_individual_filtering() {
    let metadata = metadata();
    let grid = simple_grid(&metadata, GridOptions::default());
    let engine = RecordingEngine::new(posts(3), 25, 3);

    let request = GridRequest::new(2).page(0, 10).column_search(1, "Hello");
    let value = respond(metadata.clone(), grid, request, &engine).await;

    assert_eq!(value["recordsFiltered"], json!(25));
    assert!(!engine.page_sql().contains("WHERE"));
}

#[test]
fn test_orderable_virtual_column_without_order_column_fails_at_build() {
    let metadata = metadata();
    let err = ColumnBuilder::new(metadata.as_ref(), "Post", "posts")
        .unwrap()
        .add(Some("id"), ColumnConfig::column())
        .unwrap()
        .add(Some("summary"), ColumnConfig::virtual_column().orderable(true))
        .err()
        .unwrap();
    assert!(err.is_configuration_error());
}

#[tokio::test]
async fn test_multiple_select_filter_values_are_alternatives() {
    let metadata = metadata();
    let columns = ColumnBuilder::new(metadata.as_ref(), "Post", "posts")
        .unwrap()
        .add(Some("id"), ColumnConfig::column())
        .unwrap()
        .add(Some("title"), ColumnConfig::column())
        .unwrap()
        .add(
            Some("status"),
            ColumnConfig::column().filter(
                SelectFilter::new()
                    .search_type(SearchOperator::Eq)
                    .option("1", "Draft")
                    .option("2", "Published")
                    .multiple(true),
            ),
        )
        .unwrap()
        .build();
    let grid = GridView::new(&GridRegistry::new(), "posts", "Post", columns)
        .unwrap()
        .with_options(GridOptions::default().individual_filtering(true));
    let engine = RecordingEngine::new(Vec::new(), 25, 0);

    let request = GridRequest::new(1)
        .page(0, 10)
        .column_search(1, "Hello")
        .column_search(2, "1,2");
    let value = respond(metadata.clone(), grid, request, &engine).await;
    assert_eq!(value["data"], json!([]));

    let (sql, params) = &engine.statements()[0];
    assert!(sql.contains("WHERE (post.title ILIKE $1 AND (post.status = $2 OR post.status = $3))"));
    assert_eq!(
        params,
        &vec![
            FilterValue::String("%Hello%".into()),
            FilterValue::Int(1),
            FilterValue::Int(2),
        ]
    );
}

#[tokio::test]
async fn test_sort_follows_request_order() {
    let metadata = metadata();
    let grid = simple_grid(&metadata, GridOptions::default());
    let engine = RecordingEngine::new(posts(2), 2, 2);

    let request = GridRequest::new(1)
        .page(0, 10)
        .column(0, orderable())
        .column(1, orderable())
        .order_by(0, SortOrder::Asc)
        .order_by(1, SortOrder::Desc);
    respond(metadata.clone(), grid, request, &engine).await;

    assert!(engine.page_sql().contains("ORDER BY post.id ASC, post.title DESC"));
}

#[tokio::test]
async fn test_form_encoded_request_with_association() {
    let metadata = metadata();
    let columns = ColumnBuilder::new(metadata.as_ref(), "Post", "posts")
        .unwrap()
        .add(Some("title"), ColumnConfig::column())
        .unwrap()
        .add(Some("createdBy.username"), ColumnConfig::column())
        .unwrap()
        .build();
    let grid = GridView::new(&GridRegistry::new(), "posts", "Post", columns).unwrap();
    let row = match json!({"post.id": 1, "post.title": "Hello", "createdBy.id": 7, "createdBy.username": "bob"}) {
        Value::Object(map) => map,
        _ => Row::new(),
    };
    let engine = RecordingEngine::new(vec![row], 40, 1);

    let request = GridRequest::from_pairs([
        ("draw", "5"),
        ("start", "0"),
        ("length", "25"),
        ("search[value]", "bob"),
        ("columns[1][orderable]", "true"),
        ("order[0][column]", "1"),
        ("order[0][dir]", "desc"),
    ]);
    let value = respond(metadata.clone(), grid, request, &engine).await;

    assert_eq!(value["draw"], json!(5));
    assert_eq!(value["recordsTotal"], json!(40));
    assert_eq!(value["recordsFiltered"], json!(1));
    assert_eq!(value["data"][0]["createdBy"]["username"], json!("bob"));

    let sql = engine.page_sql();
    assert!(sql.contains("LEFT JOIN users createdBy ON createdBy.id = post.created_by_id"));
    assert!(sql.contains("(post.title ILIKE $1 OR createdBy.username ILIKE $2)"));
    assert!(sql.contains("ORDER BY createdBy.username DESC"));
}

#[tokio::test]
async fn test_response_requires_query() {
    let metadata = metadata();
    let engine = RecordingEngine::new(Vec::new(), 0, 0);
    let mut response = GridResponse::new(metadata.clone());
    response
        .set_grid(simple_grid(&metadata, GridOptions::default()))
        .unwrap()
        .set_request(GridRequest::new(1));

    let err = response.get_json_response(&engine).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::MissingDependency);
    assert!(engine.statements().is_empty());
}
