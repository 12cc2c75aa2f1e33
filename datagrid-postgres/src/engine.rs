//! PostgreSQL query engine implementation.

use std::sync::Arc;
use std::time::Duration;

use datagrid_query::traits::{BoxFuture, ExecutionOptions, QueryEngine};
use datagrid_query::{DatabaseType, FilterValue, QueryResult, Row};
use deadpool_postgres::Object;
use postgres_types::ToSql;
use tokio_postgres::Statement;
use tracing::debug;

use crate::cache::{CacheKind, CachedValue, ResultCache};
use crate::error::{PgError, PgResult};
use crate::pool::PgPool;
use crate::types::{filter_values_to_params, row_to_json};

/// PostgreSQL query engine backing grid queries.
#[derive(Clone)]
pub struct PgEngine {
    pool: PgPool,
    results: Arc<ResultCache>,
    query_timeout: Option<Duration>,
}

impl PgEngine {
    /// Create an engine over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        let lifetime = pool.pool_config().result_cache_lifetime;
        Self {
            pool,
            results: Arc::new(ResultCache::new(lifetime)),
            query_timeout: None,
        }
    }

    /// Abandon queries that run longer than `timeout`.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The result cache.
    pub fn results(&self) -> &ResultCache {
        &self.results
    }

    async fn prepare(&self, conn: &Object, sql: &str, options: &ExecutionOptions) -> PgResult<Statement> {
        if options.use_query_cache {
            self.pool.statements().track(sql);
            Ok(conn.prepare_cached(sql).await?)
        } else {
            Ok(conn.prepare(sql).await?)
        }
    }

    async fn fetch(&self, sql: &str, params: &[FilterValue], options: &ExecutionOptions) -> PgResult<Vec<Row>> {
        let conn = self.pool.get().await?;
        let stmt = self.prepare(&conn, sql, options).await?;

        let pg_params = filter_values_to_params(params, stmt.params())?;
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            pg_params.iter().map(|p| p.as_ref() as _).collect();

        let rows = self.bounded(conn.query(&stmt, &param_refs)).await??;
        rows.iter().map(row_to_json).collect()
    }

    async fn fetch_count(&self, sql: &str, params: &[FilterValue], options: &ExecutionOptions) -> PgResult<u64> {
        let conn = self.pool.get().await?;
        let stmt = self.prepare(&conn, sql, options).await?;

        let pg_params = filter_values_to_params(params, stmt.params())?;
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            pg_params.iter().map(|p| p.as_ref() as _).collect();

        let row = self.bounded(conn.query_one(&stmt, &param_refs)).await??;
        let count: i64 = row.try_get(0)?;
        u64::try_from(count).map_err(|_| PgError::type_conversion(format!("negative count {}", count)))
    }

    async fn bounded<F: std::future::Future>(&self, fut: F) -> PgResult<F::Output> {
        match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| PgError::Timeout(limit.as_millis() as u64)),
            None => Ok(fut.await),
        }
    }
}

impl QueryEngine for PgEngine {
    fn dialect(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    fn query_rows(
        &self,
        sql: &str,
        params: Vec<FilterValue>,
        options: &ExecutionOptions,
    ) -> BoxFuture<'_, QueryResult<Vec<Row>>> {
        let sql = sql.to_string();
        let options = options.clone();
        Box::pin(async move {
            debug!(sql = %sql, params = params.len(), "Executing query_rows");

            let cache = &options.result_cache;
            let key = ResultCache::key(CacheKind::Rows, &sql, &params, cache);
            if cache.enabled {
                if let Some(CachedValue::Rows(rows)) = self.results.get(&key) {
                    debug!(key = %key, "Result cache hit");
                    return Ok(rows);
                }
            }

            let rows = self.fetch(&sql, &params, &options).await?;
            if cache.enabled {
                self.results.insert(key, CachedValue::Rows(rows.clone()), cache.lifetime);
            }
            Ok(rows)
        })
    }

    fn count(
        &self,
        sql: &str,
        params: Vec<FilterValue>,
        options: &ExecutionOptions,
    ) -> BoxFuture<'_, QueryResult<u64>> {
        let sql = sql.to_string();
        let options = options.clone();
        Box::pin(async move {
            debug!(sql = %sql, params = params.len(), "Executing count");

            let cache = &options.result_cache;
            let key = ResultCache::key(CacheKind::Count, &sql, &params, cache);
            if cache.enabled {
                if let Some(CachedValue::Count(n)) = self.results.get(&key) {
                    debug!(key = %key, "Result cache hit");
                    return Ok(n);
                }
            }

            let n = self.fetch_count(&sql, &params, &options).await?;
            if cache.enabled {
                self.results.insert(key, CachedValue::Count(n), cache.lifetime);
            }
            Ok(n)
        })
    }
}

impl std::fmt::Debug for PgEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgEngine")
            .field("pool", &self.pool)
            .field("query_timeout", &self.query_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagrid_query::traits::ResultCacheOptions;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn engine() -> PgEngine {
        let pool = PgPool::builder().url("postgres://localhost:1/grids").build().unwrap();
        PgEngine::new(pool)
    }

    fn cached(id: &str) -> ExecutionOptions {
        ExecutionOptions {
            use_query_cache: true,
            result_cache: ResultCacheOptions {
                enabled: true,
                lifetime: Some(Duration::from_secs(60)),
                id: Some(id.into()),
            },
        }
    }

    #[tokio::test]
    async fn test_cached_results_skip_the_database() {
        let engine = engine();
        let mut row = Row::new();
        row.insert("post.id".into(), json!(1));
        engine
            .results()
            .insert("rows:posts".into(), CachedValue::Rows(vec![row.clone()]), None);
        engine
            .results()
            .insert("count:posts".into(), CachedValue::Count(42), None);

        let rows = engine.query_rows("SELECT 1", vec![], &cached("posts")).await.unwrap();
        assert_eq!(rows, vec![row]);
        assert_eq!(engine.count("SELECT 1", vec![], &cached("posts")).await.unwrap(), 42);
        assert_eq!(engine.dialect(), DatabaseType::PostgreSQL);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let engine = engine().with_query_timeout(Duration::from_millis(5));
        let err = engine
            .bounded(tokio::time::sleep(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
