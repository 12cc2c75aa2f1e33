//! Relational executor.
//!
//! [`DatagridQuery`] owns the per-request state: the resolved column targets,
//! the base [`QueryBuilder`] and the cache toggles. Every build clones the
//! base query and applies, in order, the select list, the joins, the WHERE
//! predicate, the sorts and the page window, so repeated builds never
//! accumulate state.
//!
//! Two counts are available:
//!
//! - [`DatagridQuery::execute`] returns the page together with the number of
//!   rows matching the current search (the paginator count);
//! - [`DatagridQuery::count_all_results`] counts the unfiltered universe of
//!   the base query, or the number of groups when the base query is grouped.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::builder::ColumnModel;
use crate::error::{QueryError, QueryResult};
use crate::filter::{Expr, FieldRef, FilterValue, Parameters, SearchOperator};
use crate::grid::GridView;
use crate::hydrate::HydrationPlan;
use crate::metadata::MetadataProvider;
use crate::options::{Ajax, Features, GridOptions, ResponseDefaults};
use crate::planner::ResolutionTables;
use crate::predicate::PredicateAssembler;
use crate::query::{JoinClause, QueryBuilder, SelectItem};
use crate::request::{DISABLE_PAGINATION, GridRequest};
use crate::sql::SqlBuilder;
use crate::traits::{ExecutionOptions, QueryEngine, ResultCacheOptions, Row};

/// Parameter key of the root identifier list used by fetch-join paging.
const ID_LIST_PARAMETER: usize = 0;

/// Label of the count columns.
const COUNT_LABEL: &str = "grid_count";

/// How the filtered count and the page window are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    /// Count through a `COUNT(*)` over a distinct sub-select.
    pub output_walkers: bool,
    /// Page by distinct root identifiers when to-many associations are joined.
    pub fetch_join_collection: bool,
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            output_walkers: false,
            fetch_join_collection: true,
        }
    }
}

impl From<ResponseDefaults> for Paginator {
    fn from(defaults: ResponseDefaults) -> Self {
        Self {
            output_walkers: defaults.output_walkers,
            fetch_join_collection: defaults.fetch_join_collection,
        }
    }
}

/// One fetched page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Hydrated rows, one per root entity.
    pub rows: Vec<Row>,
    /// Number of root entities matching the current search.
    pub filtered: u64,
}

/// Query state for one grid request.
pub struct DatagridQuery {
    columns: Arc<ColumnModel>,
    options: GridOptions,
    features: Features,
    ajax: Ajax,
    request: GridRequest,
    metadata: Arc<dyn MetadataProvider>,
    tables: ResolutionTables,
    hydration: HydrationPlan,
    qb: QueryBuilder,
    use_query_cache: bool,
    use_count_query_cache: bool,
    result_cache: ResultCacheOptions,
    count_result_cache: ResultCacheOptions,
}

impl DatagridQuery {
    /// Resolve the view's columns and prepare the base query.
    pub fn new(
        grid: &GridView,
        request: GridRequest,
        metadata: Arc<dyn MetadataProvider>,
    ) -> QueryResult<Self> {
        let root = metadata.metadata_for(grid.entity())?;
        let tables = ResolutionTables::resolve(grid.columns(), root, metadata.as_ref())?;
        let hydration = HydrationPlan::from_tables(&tables);
        let qb = QueryBuilder::new(grid.entity(), tables.root_alias.as_str());

        debug!(
            grid = %grid.unique_name(),
            root = %tables.root_alias,
            draw = request.draw,
            "Query state created"
        );
        Ok(Self {
            columns: Arc::clone(grid.columns()),
            options: grid.options().clone(),
            features: grid.features().clone(),
            ajax: grid.ajax().clone(),
            request,
            metadata,
            tables,
            hydration,
            qb,
            use_query_cache: false,
            use_count_query_cache: false,
            result_cache: ResultCacheOptions::default(),
            count_result_cache: ResultCacheOptions::default(),
        })
    }

    /// The base query.
    pub fn qb(&self) -> &QueryBuilder {
        &self.qb
    }

    /// Mutable access to the base query, for caller-specific constraints.
    pub fn qb_mut(&mut self) -> &mut QueryBuilder {
        &mut self.qb
    }

    /// Replace the base query.
    pub fn set_qb(&mut self, qb: QueryBuilder) -> &mut Self {
        self.qb = qb;
        self
    }

    /// The resolved column targets.
    pub fn tables(&self) -> &ResolutionTables {
        &self.tables
    }

    /// The request being answered.
    pub fn request(&self) -> &GridRequest {
        &self.request
    }

    /// The column model.
    pub fn columns(&self) -> &ColumnModel {
        &self.columns
    }

    /// Reuse prepared statements for the page query.
    pub fn use_query_cache(&mut self, enabled: bool) -> &mut Self {
        self.use_query_cache = enabled;
        self
    }

    /// Reuse prepared statements for the count-all query.
    pub fn use_count_query_cache(&mut self, enabled: bool) -> &mut Self {
        self.use_count_query_cache = enabled;
        self
    }

    /// Cache page results.
    pub fn use_result_cache(&mut self, enabled: bool, lifetime: Option<Duration>, id: Option<String>) -> &mut Self {
        self.result_cache = ResultCacheOptions { enabled, lifetime, id };
        self
    }

    /// Cache count-all results.
    pub fn use_count_result_cache(
        &mut self,
        enabled: bool,
        lifetime: Option<Duration>,
        id: Option<String>,
    ) -> &mut Self {
        self.count_result_cache = ResultCacheOptions { enabled, lifetime, id };
        self
    }

    /// Build the page query on a clone of the base query.
    pub fn get_built_qb(&self) -> QueryResult<QueryBuilder> {
        let mut qb = self.qb.clone();
        self.set_select_from(&mut qb);
        self.set_joins(&mut qb);
        self.set_where(&mut qb)?;
        self.set_order_by(&mut qb);
        self.set_limit(&mut qb)?;
        Ok(qb)
    }

    fn set_select_from(&self, qb: &mut QueryBuilder) {
        for (alias, fields) in &self.tables.select_targets {
            qb.add_select_partial(alias, fields.iter().cloned());
        }
        for expression in &self.tables.select_expressions {
            qb.add_select_expression(expression.expression.as_str(), expression.label.as_str());
        }
    }

    fn set_joins(&self, qb: &mut QueryBuilder) {
        for join in self.tables.joins.values() {
            qb.add_join(JoinClause {
                parent: join.parent_alias.clone(),
                association: join.association.clone(),
                alias: join.alias.clone(),
                join_type: join.join_type,
            });
        }
    }

    fn assembler(&self) -> PredicateAssembler<'_> {
        PredicateAssembler::new(
            &self.columns,
            &self.tables.search_targets,
            &self.tables.order_targets,
            &self.request,
            &self.options,
        )
    }

    fn set_where(&self, qb: &mut QueryBuilder) -> QueryResult<()> {
        let assembler = self.assembler();
        let mut params = Parameters::new();

        qb.and_where(assembler.global_search(&mut params));
        qb.and_where(assembler.individual_filters(&mut params)?);
        qb.parameters_mut().extend(&params);
        Ok(())
    }

    fn set_order_by(&self, qb: &mut QueryBuilder) {
        for (field, order) in self.assembler().sort() {
            qb.add_order_by(field, order);
        }
    }

    fn set_limit(&self, qb: &mut QueryBuilder) -> QueryResult<()> {
        if self.features.is_paging_enabled() {
            if let Some(start) = self.request.start {
                if self.request.length != Some(DISABLE_PAGINATION) {
                    qb.set_first_result(Some(start))
                        .set_max_results(self.request.length.and_then(|l| u64::try_from(l).ok()));
                }
            }
        } else if self.ajax.pipeline > 0 {
            return Err(QueryError::paging_pipeline_conflict());
        }
        Ok(())
    }

    fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            use_query_cache: self.use_query_cache,
            result_cache: self.result_cache.clone(),
        }
    }

    fn count_execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            use_query_cache: self.use_count_query_cache,
            result_cache: self.count_result_cache.clone(),
        }
    }

    fn root_id(&self) -> FieldRef {
        FieldRef::path(self.tables.root_alias.as_str(), self.tables.root_identifier.as_str())
    }

    /// Fetch the current page and count the rows matching the search.
    pub async fn execute(&self, engine: &dyn QueryEngine, paginator: Paginator) -> QueryResult<Page> {
        let qb = self.get_built_qb()?;
        let options = self.execution_options();
        let dialect = engine.dialect();

        let windowed = qb.max_results().is_some() || qb.first_result().is_some_and(|f| f > 0);
        let rows = if paginator.fetch_join_collection && windowed && self.tables.has_to_many_join() {
            self.fetch_by_root_ids(engine, &qb, &options).await?
        } else {
            let (sql, params) = qb.to_sql(self.metadata.as_ref(), dialect)?;
            debug!(sql = %sql, params = params.len(), "Executing page query");
            engine.query_rows(&sql, params, &options).await?
        };

        let filtered = self.count_filtered(engine, &qb, paginator, &options).await?;
        let rows = self.hydration.hydrate(&rows);
        debug!(rows = rows.len(), filtered, "Page fetched");
        Ok(Page { rows, filtered })
    }

    /// Page over distinct root ids first, then load every joined row of those roots.
    async fn fetch_by_root_ids(
        &self,
        engine: &dyn QueryEngine,
        qb: &QueryBuilder,
        options: &ExecutionOptions,
    ) -> QueryResult<Vec<Row>> {
        let dialect = engine.dialect();
        let root_alias = self.tables.root_alias.as_str();

        let mut id_qb = qb.clone();
        id_qb
            .select(SelectItem::Partial {
                alias: root_alias.to_string(),
                fields: vec![self.tables.root_identifier.clone()],
            })
            .distinct(true);
        for (field, _) in qb.order_by() {
            match field {
                FieldRef::Path { alias, field } => {
                    id_qb.add_select_partial(alias, [field.as_str()]);
                }
                FieldRef::Label(label) => {
                    if let Some(expression) = self.tables.select_expressions.iter().find(|e| &e.label == label) {
                        id_qb.add_select_expression(expression.expression.as_str(), label.as_str());
                    }
                }
                FieldRef::Expression(_) => {}
            }
        }

        let (sql, params) = id_qb.to_sql(self.metadata.as_ref(), dialect)?;
        debug!(sql = %sql, "Executing root id query");
        let id_rows = engine.query_rows(&sql, params, options).await?;

        let id_label = self.hydration.root_id_label();
        let mut ids: Vec<Value> = Vec::with_capacity(id_rows.len());
        for row in &id_rows {
            if let Some(id) = row.get(&id_label).filter(|v| !v.is_null()) {
                if !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut page_qb = qb.clone();
        page_qb
            .set_first_result(None)
            .set_max_results(None)
            .and_where(Expr::Condition {
                field: self.root_id(),
                operator: SearchOperator::In,
                param: Some(ID_LIST_PARAMETER),
            })
            .set_parameter(
                ID_LIST_PARAMETER,
                FilterValue::List(ids.iter().map(filter_value_from_json).collect()),
            );

        let (sql, params) = page_qb.to_sql(self.metadata.as_ref(), dialect)?;
        debug!(sql = %sql, ids = ids.len(), "Executing page query by root ids");
        engine.query_rows(&sql, params, options).await
    }

    /// Count the root entities matching the search, ignoring the page window.
    async fn count_filtered(
        &self,
        engine: &dyn QueryEngine,
        qb: &QueryBuilder,
        paginator: Paginator,
        options: &ExecutionOptions,
    ) -> QueryResult<u64> {
        let dialect = engine.dialect();
        let mut count_qb = qb.clone();
        count_qb.reset_order_by().set_first_result(None).set_max_results(None);

        if paginator.output_walkers || count_qb.has_group_by() {
            count_qb
                .select(SelectItem::Partial {
                    alias: self.tables.root_alias.clone(),
                    fields: vec![self.tables.root_identifier.clone()],
                })
                .distinct(true);
            let mut builder = SqlBuilder::new(dialect);
            builder.push(format!("SELECT COUNT(*) AS {} FROM (", dialect.quote(COUNT_LABEL)));
            count_qb.write_sql(&mut builder, self.metadata.as_ref())?;
            builder.push(") grid_result");
            let (sql, params) = builder.build();
            debug!(sql = %sql, "Executing filtered count");
            return engine.count(&sql, params, options).await;
        }

        count_qb.select(SelectItem::Count {
            field: self.root_id(),
            distinct: true,
            label: COUNT_LABEL.to_string(),
        });
        let (sql, params) = count_qb.to_sql(self.metadata.as_ref(), dialect)?;
        debug!(sql = %sql, "Executing filtered count");
        engine.count(&sql, params, options).await
    }

    /// Count every root entity of the base query.
    ///
    /// The search of the current request is not applied. When the base query
    /// is grouped, the result is the number of groups.
    pub async fn count_all_results(&self, engine: &dyn QueryEngine) -> QueryResult<u64> {
        let mut qb = self.qb.clone();
        qb.select(SelectItem::Count {
            field: self.root_id(),
            distinct: true,
            label: COUNT_LABEL.to_string(),
        })
        .reset_order_by();
        self.set_joins(&mut qb);

        let options = self.count_execution_options();
        let (sql, params) = qb.to_sql(self.metadata.as_ref(), engine.dialect())?;
        debug!(sql = %sql, grouped = qb.has_group_by(), "Executing count-all query");

        if qb.has_group_by() {
            let rows = engine.query_rows(&sql, params, &options).await?;
            Ok(rows.len() as u64)
        } else {
            engine.count(&sql, params, &options).await
        }
    }
}

impl std::fmt::Debug for DatagridQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagridQuery")
            .field("root", &self.tables.root_alias)
            .field("columns", &self.columns.len())
            .field("draw", &self.request.draw)
            .finish()
    }
}

fn filter_value_from_json(value: &Value) -> FilterValue {
    match value {
        Value::Null => FilterValue::Null,
        Value::Bool(b) => FilterValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FilterValue::Int(i),
            None => FilterValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => FilterValue::String(s.clone()),
        other => FilterValue::Json(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ColumnBuilder;
    use crate::column::ColumnConfig;
    use crate::error::ErrorCode;
    use crate::grid::GridRegistry;
    use crate::metadata::{AssociationMetadata, EntityMetadata, StaticMetadata};
    use crate::request::RequestColumn;
    use crate::sql::DatabaseType;
    use crate::traits::BoxFuture;
    use crate::types::{FieldType, SortOrder};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Default)]
    struct MockEngine {
        rows: Vec<Vec<Row>>,
        count: u64,
        queries: Mutex<Vec<(String, Vec<FilterValue>, ExecutionOptions)>>,
    }

    impl MockEngine {
        fn with_rows(rows: Vec<Vec<Row>>, count: u64) -> Self {
            Self {
                rows,
                count,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn sql(&self) -> Vec<String> {
            self.queries.lock().iter().map(|(sql, _, _)| sql.clone()).collect()
        }
    }

    impl QueryEngine for MockEngine {
        fn query_rows(
            &self,
            sql: &str,
            params: Vec<FilterValue>,
            options: &ExecutionOptions,
        ) -> BoxFuture<'_, QueryResult<Vec<Row>>> {
            let mut queries = self.queries.lock();
            let index = queries.iter().filter(|(s, _, _)| !s.contains("COUNT(")).count();
            queries.push((sql.to_string(), params, options.clone()));
            let rows = self.rows.get(index).cloned().unwrap_or_default();
            Box::pin(async move { Ok(rows) })
        }

        fn count(
            &self,
            sql: &str,
            params: Vec<FilterValue>,
            options: &ExecutionOptions,
        ) -> BoxFuture<'_, QueryResult<u64>> {
            self.queries.lock().push((sql.to_string(), params, options.clone()));
            let count = self.count;
            Box::pin(async move { Ok(count) })
        }
    }

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    fn metadata() -> Arc<StaticMetadata> {
        Arc::new(
            StaticMetadata::new()
                .with_platform(DatabaseType::PostgreSQL)
                .entity(
                    EntityMetadata::new("Post", "posts")
                        .field("id", FieldType::Integer)
                        .field("title", FieldType::String)
                        .association("createdBy", AssociationMetadata::many_to_one("User", "created_by_id"))
                        .association("comments", AssociationMetadata::one_to_many("Comment", "post_id")),
                )
                .entity(
                    EntityMetadata::new("User", "users")
                        .field("id", FieldType::Integer)
                        .field("username", FieldType::String),
                )
                .entity(
                    EntityMetadata::new("Comment", "comments")
                        .field("id", FieldType::Integer)
                        .field("body", FieldType::String),
                ),
        )
    }

    fn grid(metadata: &StaticMetadata, features: Features, ajax: Ajax) -> GridView {
        let columns = ColumnBuilder::new(metadata, "Post", "posts")
            .unwrap()
            .add(Some("id"), ColumnConfig::column())
            .unwrap()
            .add(Some("title"), ColumnConfig::column())
            .unwrap()
            .add(Some("createdBy.username"), ColumnConfig::column())
            .unwrap()
            .build();
        GridView::new(&GridRegistry::new(), "posts", "Post", columns)
            .unwrap()
            .with_options(GridOptions::default().individual_filtering(true))
            .with_features(features)
            .with_ajax(ajax)
    }

    fn orderable() -> RequestColumn {
        RequestColumn {
            orderable: true,
            ..RequestColumn::default()
        }
    }

    #[test]
    fn test_built_query_is_idempotent() {
        let metadata = metadata();
        let grid = grid(&metadata, Features::default(), Ajax::default());
        let request = GridRequest::new(1)
            .page(20, 10)
            .global("bob")
            .column(0, orderable())
            .column_search(1, "Hello")
            .order_by(1, SortOrder::Desc)
            .order_by(0, SortOrder::Asc);
        let query = DatagridQuery::new(&grid, request, metadata.clone()).unwrap();

        let first = query.get_built_qb().unwrap();
        let second = query.get_built_qb().unwrap();
        assert_eq!(first, second);
        assert!(query.qb().select_items().is_empty());

        let (sql, params) = first.to_sql(metadata.as_ref(), DatabaseType::PostgreSQL).unwrap();
        assert_eq!(
            sql,
            "SELECT post.id AS \"post.id\", post.title AS \"post.title\", \
             createdBy.id AS \"createdBy.id\", createdBy.username AS \"createdBy.username\" \
             FROM posts post LEFT JOIN users createdBy ON createdBy.id = post.created_by_id \
             WHERE ((post.title ILIKE $1 OR createdBy.username ILIKE $2) AND post.title ILIKE $3) \
             ORDER BY post.title DESC, post.id ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(params[2], FilterValue::String("%Hello%".into()));
    }

    #[test]
    fn test_disabled_paging() {
        let metadata = metadata();
        let request = GridRequest::new(1).page(0, DISABLE_PAGINATION);

        let grid = grid(&metadata, Features::default(), Ajax::default());
        let qb = DatagridQuery::new(&grid, request.clone(), metadata.clone())
            .unwrap()
            .get_built_qb()
            .unwrap();
        assert_eq!(qb.max_results(), None);

        let grid_unpaged = self::grid(&metadata, Features::default().paging(false), Ajax::default());
        let qb = DatagridQuery::new(&grid_unpaged, GridRequest::new(1).page(10, 10), metadata.clone())
            .unwrap()
            .get_built_qb()
            .unwrap();
        assert_eq!(qb.first_result(), None);

        let conflicting = self::grid(&metadata, Features::default().paging(false), Ajax::default().pipeline(5));
        let err = DatagridQuery::new(&conflicting, request, metadata.clone())
            .unwrap()
            .get_built_qb()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PagingPipelineConflict);
    }

    #[tokio::test]
    async fn test_execute_hydrates_and_counts() {
        let metadata = metadata();
        let grid = grid(&metadata, Features::default(), Ajax::default());
        let engine = MockEngine::with_rows(
            vec![vec![row(json!({
                "post.id": 1, "post.title": "Hello",
                "createdBy.id": 7, "createdBy.username": "bob"
            }))]],
            42,
        );
        let mut query = DatagridQuery::new(&grid, GridRequest::new(3).page(0, 10), metadata.clone()).unwrap();
        query.use_query_cache(true);

        let page = query.execute(&engine, Paginator::default()).await.unwrap();
        assert_eq!(page.filtered, 42);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0]["createdBy"]["username"], json!("bob"));

        let queries = engine.queries.lock();
        assert!(queries[0].2.use_query_cache);
        assert!(queries[1].0.starts_with("SELECT COUNT(DISTINCT post.id) AS grid_count FROM posts post"));
        assert!(!queries[1].0.contains("LIMIT"));
    }

    #[tokio::test]
    async fn test_output_walkers_wrap_count() {
        let metadata = metadata();
        let grid = grid(&metadata, Features::default(), Ajax::default());
        let engine = MockEngine::with_rows(Vec::new(), 0);
        let query = DatagridQuery::new(&grid, GridRequest::new(1).page(0, 10), metadata.clone()).unwrap();

        let paginator = Paginator {
            output_walkers: true,
            fetch_join_collection: false,
        };
        query.execute(&engine, paginator).await.unwrap();
        let sql = engine.sql();
        assert!(sql[1].starts_with("SELECT COUNT(*) AS grid_count FROM (SELECT DISTINCT post.id AS \"post.id\""));
        assert!(sql[1].ends_with(") grid_result"));
    }

    #[tokio::test]
    async fn test_fetch_join_collection_pages_by_root_ids() {
        let metadata = metadata();
        let columns = ColumnBuilder::new(metadata.as_ref(), "Post", "posts")
            .unwrap()
            .add(Some("title"), ColumnConfig::column())
            .unwrap()
            .add(Some("comments.body"), ColumnConfig::column())
            .unwrap()
            .build();
        let grid = GridView::new(&GridRegistry::new(), "posts", "Post", columns).unwrap();
        let engine = MockEngine::with_rows(
            vec![
                vec![row(json!({"post.id": 1})), row(json!({"post.id": 2})), row(json!({"post.id": 1}))],
                vec![
                    row(json!({"post.id": 1, "post.title": "A", "comments.id": 10, "comments.body": "x"})),
                    row(json!({"post.id": 1, "post.title": "A", "comments.id": 11, "comments.body": "y"})),
                    row(json!({"post.id": 2, "post.title": "B", "comments.id": null, "comments.body": null})),
                ],
            ],
            2,
        );
        let query = DatagridQuery::new(&grid, GridRequest::new(1).page(0, 2), metadata.clone()).unwrap();

        let page = query.execute(&engine, Paginator::default()).await.unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0]["comments"].as_array().map(Vec::len), Some(2));

        let queries = engine.queries.lock();
        assert!(queries[0].0.starts_with("SELECT DISTINCT post.id AS \"post.id\""));
        assert!(queries[0].0.ends_with("LIMIT 2"));
        assert!(queries[1].0.contains("WHERE post.id IN ($1, $2)"));
        assert!(!queries[1].0.contains("LIMIT"));
        assert_eq!(queries[1].1, vec![FilterValue::Int(1), FilterValue::Int(2)]);
    }

    #[tokio::test]
    async fn test_count_all_ignores_search() {
        let metadata = metadata();
        let grid = grid(&metadata, Features::default(), Ajax::default());
        let engine = MockEngine::with_rows(vec![vec![Row::new(), Row::new(), Row::new()]], 9);
        let request = GridRequest::new(1).global("bob").column_search(1, "Hello");
        let mut query = DatagridQuery::new(&grid, request, metadata.clone()).unwrap();
        query.use_count_result_cache(true, Some(Duration::from_secs(60)), Some("posts_total".into()));

        assert_eq!(query.count_all_results(&engine).await.unwrap(), 9);
        {
            let queries = engine.queries.lock();
            assert_eq!(
                queries[0].0,
                "SELECT COUNT(DISTINCT post.id) AS grid_count FROM posts post \
                 LEFT JOIN users createdBy ON createdBy.id = post.created_by_id"
            );
            assert_eq!(queries[0].2.result_cache.id.as_deref(), Some("posts_total"));
        }

        query.qb_mut().add_group_by("post.title");
        assert_eq!(query.count_all_results(&engine).await.unwrap(), 3);
    }
}
