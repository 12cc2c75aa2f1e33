//! Benchmarks for request parsing, query planning and search body assembly.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use datagrid::query::metadata::MetadataProvider;
use datagrid::query::request::RequestColumn;
use datagrid::query::{
    AssociationMetadata, ColumnBuilder, ColumnConfig, DatabaseType, DatagridQuery, EntityMetadata, FieldType,
    GridOptions, GridRegistry, GridRequest, GridView, SortOrder, StaticMetadata,
};
use datagrid::search::SearchQuery;
use std::hint::black_box;
use std::sync::Arc;

fn metadata() -> StaticMetadata {
    StaticMetadata::new()
        .entity(
            EntityMetadata::new("Post", "posts")
                .field("id", FieldType::Integer)
                .field("title", FieldType::String)
                .field("body", FieldType::Text)
                .field("status", FieldType::Integer)
                .association("createdBy", AssociationMetadata::many_to_one("User", "created_by_id"))
                .association("category", AssociationMetadata::many_to_one("Category", "category_id")),
        )
        .entity(
            EntityMetadata::new("User", "users")
                .field("id", FieldType::Integer)
                .field("username", FieldType::String)
                .field("email", FieldType::String),
        )
        .entity(
            EntityMetadata::new("Category", "categories")
                .field("id", FieldType::Integer)
                .field("name", FieldType::String),
        )
}

const PATHS: [&str; 7] = [
    "id",
    "title",
    "body",
    "status",
    "createdBy.username",
    "createdBy.email",
    "category.name",
];

fn grid(metadata: &StaticMetadata) -> GridView {
    let mut builder = ColumnBuilder::new(metadata, "Post", "posts").expect("root entity");
    for path in PATHS {
        builder = builder.add(Some(path), ColumnConfig::column()).expect("column");
    }
    GridView::new(&GridRegistry::new(), "posts", "Post", builder.build())
        .expect("grid view")
        .with_options(GridOptions::default().individual_filtering(true))
}

fn request(searched_columns: usize) -> GridRequest {
    let mut request = GridRequest::new(1).page(40, 20).global("bob");
    for i in 0..searched_columns {
        request = request.column_search(i, "42").column(
            i,
            RequestColumn {
                orderable: true,
                ..RequestColumn::default()
            },
        );
    }
    request.order_by(1, SortOrder::Desc).order_by(0, SortOrder::Asc)
}

/// Benchmark column model construction.
fn bench_column_model(c: &mut Criterion) {
    let metadata = metadata();
    c.bench_function("column_model_7_columns", |b| b.iter(|| black_box(grid(&metadata))));
}

/// Benchmark form-encoded request parsing.
fn bench_request_parsing(c: &mut Criterion) {
    let mut pairs = vec![
        ("draw".to_string(), "3".to_string()),
        ("start".to_string(), "40".to_string()),
        ("length".to_string(), "20".to_string()),
        ("search[value]".to_string(), "bob".to_string()),
    ];
    for i in 0..PATHS.len() {
        pairs.push((format!("columns[{}][orderable]", i), "true".to_string()));
        pairs.push((format!("columns[{}][search][value]", i), "42".to_string()));
    }
    pairs.push(("order[0][column]".to_string(), "1".to_string()));
    pairs.push(("order[0][dir]".to_string(), "desc".to_string()));

    c.bench_function("request_from_pairs", |b| {
        b.iter(|| black_box(GridRequest::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))))
    });
}

/// Benchmark SQL planning for growing numbers of filtered columns.
fn bench_sql_planning(c: &mut Criterion) {
    let metadata = Arc::new(metadata());
    let provider: Arc<dyn MetadataProvider> = metadata.clone();
    let grid = grid(&metadata);
    let mut group = c.benchmark_group("sql_planning");

    for searched in [0, 3, PATHS.len()] {
        let query = DatagridQuery::new(&grid, request(searched), provider.clone()).expect("query");
        group.bench_with_input(BenchmarkId::new("build_and_render", searched), &query, |b, query| {
            b.iter(|| {
                let qb = query.get_built_qb().expect("built query");
                black_box(qb.to_sql(metadata.as_ref(), DatabaseType::PostgreSQL).expect("sql"))
            })
        });
    }
    group.finish();
}

/// Benchmark search body assembly.
fn bench_search_body(c: &mut Criterion) {
    let metadata = metadata();
    let grid = grid(&metadata);
    let mut group = c.benchmark_group("search_body");

    for searched in [0, 3, PATHS.len()] {
        let query = SearchQuery::new(&grid, request(searched));
        group.bench_with_input(BenchmarkId::new("build", searched), &query, |b, query| {
            b.iter(|| black_box(query.body(false).to_value()))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_column_model,
    bench_request_parsing,
    bench_sql_planning,
    bench_search_body
);
criterion_main!(benches);
