//! Error types for search-engine operations.

use datagrid_query::QueryError;
use thiserror::Error;

/// Result type for search-engine operations.
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur while talking to a search engine.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The client failed to reach the engine.
    #[error("connection error: {0}")]
    Connection(String),

    /// The engine rejected the query.
    #[error("query error: {0}")]
    Query(String),

    /// The response could not be decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid client or index configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The request timed out.
    #[error("operation timed out after {0}ms")]
    Timeout(u64),
}

impl SearchError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<SearchError> for QueryError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Connection(msg) => QueryError::connection(msg),
            SearchError::Query(msg) => QueryError::search_engine(msg),
            SearchError::Json(e) => QueryError::deserialization(e.to_string()).with_source(e),
            SearchError::Config(msg) => QueryError::configuration(msg),
            SearchError::Timeout(ms) => QueryError::timeout(ms),
        }
    }
}
