//! Core traits for backing-store access.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::QueryResult;
use crate::filter::FilterValue;
use crate::sql::DatabaseType;

/// A boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A grid row: an ordered JSON object.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Result cache settings forwarded to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultCacheOptions {
    /// Whether results are cached.
    pub enabled: bool,
    /// Lifetime of a cached result, engine default when unset.
    pub lifetime: Option<Duration>,
    /// Explicit cache key.
    pub id: Option<String>,
}

/// Per-query execution hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Reuse a prepared statement for this query text.
    pub use_query_cache: bool,
    /// Result cache settings.
    pub result_cache: ResultCacheOptions,
}

/// A relational backing store.
///
/// Rows are returned as flat objects keyed by the select labels of the
/// rendered query (`post.title`, `createdBy.id`, `commentCount`).
pub trait QueryEngine: Send + Sync {
    /// The SQL dialect queries must be rendered in.
    fn dialect(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    /// Execute a query returning rows.
    fn query_rows(
        &self,
        sql: &str,
        params: Vec<FilterValue>,
        options: &ExecutionOptions,
    ) -> BoxFuture<'_, QueryResult<Vec<Row>>>;

    /// Execute a query returning a single count.
    fn count(
        &self,
        sql: &str,
        params: Vec<FilterValue>,
        options: &ExecutionOptions,
    ) -> BoxFuture<'_, QueryResult<u64>>;
}

impl<T: QueryEngine + ?Sized> QueryEngine for std::sync::Arc<T> {
    fn dialect(&self) -> DatabaseType {
        (**self).dialect()
    }

    fn query_rows(
        &self,
        sql: &str,
        params: Vec<FilterValue>,
        options: &ExecutionOptions,
    ) -> BoxFuture<'_, QueryResult<Vec<Row>>> {
        (**self).query_rows(sql, params, options)
    }

    fn count(
        &self,
        sql: &str,
        params: Vec<FilterValue>,
        options: &ExecutionOptions,
    ) -> BoxFuture<'_, QueryResult<u64>> {
        (**self).count(sql, params, options)
    }
}
