//! Error types for PostgreSQL operations.

use datagrid_query::QueryError;
use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// Connection pool error.
    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// Every connection stayed busy until the wait timeout.
    #[error("connection pool exhausted (max {0} connections)")]
    PoolExhausted(usize),

    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A parameter or column could not be converted.
    #[error("type conversion error: {0}")]
    TypeConversion(String),

    /// The client-side query timeout elapsed.
    #[error("operation timed out after {0}ms")]
    Timeout(u64),
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a type conversion error.
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion(message.into())
    }

    /// The SQLSTATE code of a server error.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Postgres(e) => e.code().map(|c| c.code()),
            _ => None,
        }
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Pool(_) | Self::PoolExhausted(_)) || self.sql_state().is_some_and(|s| s.starts_with("08"))
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_)) || self.sql_state() == Some("57014")
    }
}

impl From<PgError> for QueryError {
    fn from(err: PgError) -> Self {
        if err.is_timeout() {
            let ms = match &err {
                PgError::Timeout(ms) => *ms,
                _ => 0,
            };
            return QueryError::timeout(ms).with_source(err);
        }
        if let PgError::PoolExhausted(max) = err {
            return QueryError::pool_exhausted(max).with_source(err);
        }
        if err.is_connection_error() {
            return QueryError::connection(err.to_string()).with_source(err);
        }
        match err {
            PgError::Postgres(e) => match e.code().map(|c| c.code()) {
                Some("42601") | Some("42703") | Some("42P01") => {
                    let message = e.as_db_error().map(|d| d.message().to_string()).unwrap_or_else(|| e.to_string());
                    QueryError::sql_syntax(message, "").with_source(e)
                }
                Some("22P02") | Some("22007") | Some("22008") => {
                    QueryError::invalid_data_type(e.to_string()).with_source(e)
                }
                _ => QueryError::database(e.to_string()).with_source(e),
            },
            PgError::Config(msg) => QueryError::configuration(msg),
            PgError::TypeConversion(msg) => QueryError::invalid_data_type(msg),
            other => QueryError::database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagrid_query::ErrorCode;

    #[test]
    fn test_error_classification() {
        assert!(PgError::Timeout(5000).is_timeout());
        assert!(!PgError::config("bad url").is_connection_error());
        assert_eq!(PgError::config("bad url").sql_state(), None);
    }

    #[test]
    fn test_into_query_error() {
        let err: QueryError = PgError::Timeout(1000).into();
        assert!(err.is_timeout());
        assert!(err.message.contains("1000ms"));

        let err: QueryError = PgError::config("missing host").into();
        assert!(err.is_configuration_error());

        let err: QueryError = PgError::type_conversion("not a date").into();
        assert_eq!(err.code, ErrorCode::InvalidDataType);
    }

    #[test]
    fn test_pool_exhaustion_reports_pool_size() {
        let pg = PgError::PoolExhausted(8);
        assert!(pg.is_connection_error());

        let err: QueryError = pg.into();
        assert_eq!(err.code, ErrorCode::PoolExhausted);
        assert!(err.is_connection_error());
        let report = err.display_full();
        assert!(report.contains("max 8 connections"));
        assert!(report.contains("Increase max_connections"));
    }
}
