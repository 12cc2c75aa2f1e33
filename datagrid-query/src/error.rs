//! Error types for grid planning, execution and configuration.
//!
//! Every error carries an [`ErrorCode`] for programmatic handling plus an
//! [`ErrorContext`] with the grid, column and SQL involved and a list of
//! suggestions.
//!
//! # Error Codes
//!
//! Error codes follow a pattern: G{category}{number}
//! - 1xxx: Request errors (malformed payloads)
//! - 3xxx: Connection errors (timeout, pool)
//! - 5xxx: Execution errors (database, search engine)
//! - 6xxx: Data errors (type, serialization)
//! - 7xxx: Configuration errors (columns, filters, paging)
//! - 9xxx: Internal errors
//!
//! ```rust
//! use datagrid_query::{ErrorCode, QueryError};
//!
//! let err = QueryError::configuration("VirtualColumn requires an order column");
//! assert_eq!(err.code, ErrorCode::InvalidConfiguration);
//! assert!(err.is_configuration_error());
//! assert_eq!(err.code.code(), "G7001");
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for grid operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Request errors (1xxx)
    /// The request payload could not be parsed (G1001).
    InvalidRequest = 1001,
    /// Invalid filter value or operator (G1002).
    InvalidFilter = 1002,
    /// A column index or name does not exist (G1003).
    UnknownColumn = 1003,

    // Connection errors (3xxx)
    /// Backing store connection failed (G3001).
    ConnectionFailed = 3001,
    /// Connection pool exhausted (G3002).
    PoolExhausted = 3002,
    /// Connection timeout (G3003).
    ConnectionTimeout = 3003,

    // Execution errors (5xxx)
    /// Query timeout (G5001).
    QueryTimeout = 5001,
    /// SQL syntax error (G5002).
    SqlSyntax = 5002,
    /// General database error (G5005).
    DatabaseError = 5005,
    /// Search engine request failed (G5006).
    SearchEngineError = 5006,

    // Data errors (6xxx)
    /// Invalid data type (G6001).
    InvalidDataType = 6001,
    /// Serialization error (G6002).
    SerializationError = 6002,
    /// Deserialization error (G6003).
    DeserializationError = 6003,

    // Configuration errors (7xxx)
    /// Invalid configuration (G7001).
    InvalidConfiguration = 7001,
    /// Grid name contains forbidden characters (G7002).
    InvalidGridName = 7002,
    /// Column data path is malformed (G7003).
    InvalidColumnPath = 7003,
    /// Entity or association metadata could not be resolved (G7004).
    UnresolvableMetadata = 7004,
    /// Filter options are inconsistent (G7005).
    InvalidFilterOptions = 7005,
    /// Action attribute collides with a generated one (G7006).
    InvalidActionAttribute = 7006,
    /// Disabled paging combined with ajax pipelining (G7007).
    PagingPipelineConflict = 7007,
    /// Column placed at a position it does not allow (G7008).
    InvalidColumnPosition = 7008,
    /// A unique column kind was added twice (G7009).
    DuplicateUniqueColumn = 7009,
    /// A required collaborator was not set before use (G7010).
    MissingDependency = 7010,
    /// Invalid connection string (G7011).
    InvalidConnectionString = 7011,

    // Internal errors (9xxx)
    /// Internal error (G9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "G7001").
    pub fn code(&self) -> String {
        format!("G{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "Invalid grid request",
            Self::InvalidFilter => "Invalid filter condition",
            Self::UnknownColumn => "Unknown column",
            Self::ConnectionFailed => "Connection failed",
            Self::PoolExhausted => "Connection pool exhausted",
            Self::ConnectionTimeout => "Connection timeout",
            Self::QueryTimeout => "Query timeout",
            Self::SqlSyntax => "SQL syntax error",
            Self::DatabaseError => "Database error",
            Self::SearchEngineError => "Search engine error",
            Self::InvalidDataType => "Invalid data type",
            Self::SerializationError => "Serialization error",
            Self::DeserializationError => "Deserialization error",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::InvalidGridName => "Invalid grid name",
            Self::InvalidColumnPath => "Invalid column path",
            Self::UnresolvableMetadata => "Unresolvable entity metadata",
            Self::InvalidFilterOptions => "Invalid filter options",
            Self::InvalidActionAttribute => "Invalid action attribute",
            Self::PagingPipelineConflict => "Paging conflicts with pipelining",
            Self::InvalidColumnPosition => "Invalid column position",
            Self::DuplicateUniqueColumn => "Duplicate unique column",
            Self::MissingDependency => "Missing dependency",
            Self::InvalidConnectionString => "Invalid connection string",
            Self::Internal => "Internal error",
        }
    }

    /// Check if the code belongs to the configuration category.
    pub fn is_configuration(&self) -> bool {
        (7000..8000).contains(&(*self as u16))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Suggestion for fixing an error.
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggestion text.
    pub text: String,
    /// Optional code example.
    pub code: Option<String>,
}

impl Suggestion {
    /// Create a new suggestion.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    /// Add a code example.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The grid view involved.
    pub grid: Option<String>,
    /// The column involved.
    pub column: Option<String>,
    /// The rendered query (if available).
    pub sql: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<Suggestion>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur while building, executing or formatting a grid query.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(suggestion));
        self
    }

    /// Add a code suggestion.
    pub fn with_code_suggestion(mut self, text: impl Into<String>, code: impl Into<String>) -> Self {
        self.context
            .suggestions
            .push(Suggestion::new(text).with_code(code));
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the grid view name.
    pub fn with_grid(mut self, grid: impl Into<String>) -> Self {
        self.context.grid = Some(grid.into());
        self
    }

    /// Set the column.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.context.column = Some(column.into());
        self
    }

    /// Set the SQL query.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create a generic configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message)
    }

    /// Create an invalid grid name error.
    pub fn invalid_grid_name(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            ErrorCode::InvalidGridName,
            format!(
                "\"{}\" is an invalid grid name; names may only contain letters, numbers, underscores and dashes",
                name
            ),
        )
        .with_grid(&name)
    }

    /// Create an invalid column path error.
    pub fn invalid_column_path(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::InvalidColumnPath,
            format!("{} is not a valid data path for this column", path),
        )
        .with_column(&path)
        .with_suggestion("Data paths may only contain letters, numbers, '_', '-' and '.'")
        .with_code_suggestion(
            "Use a custom expression column for computed values",
            "builder.add(Some(\"commentCount\"), ColumnConfig::column().dql(\"(SELECT COUNT({c}.id) FROM comments {c})\"))",
        )
    }

    /// Create an unresolvable metadata error.
    pub fn unresolvable_metadata(entity: impl Into<String>, message: impl Into<String>) -> Self {
        let entity = entity.into();
        Self::new(
            ErrorCode::UnresolvableMetadata,
            format!("Metadata for {} could not be resolved: {}", entity, message.into()),
        )
        .with_suggestion(format!("Register {} with the metadata provider", entity))
    }

    /// Create an invalid filter options error.
    pub fn invalid_filter_options(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFilterOptions, message)
    }

    /// Create a paging / pipeline conflict error.
    pub fn paging_pipeline_conflict() -> Self {
        Self::new(
            ErrorCode::PagingPipelineConflict,
            "For disabled paging, the ajax pipeline option must be turned off",
        )
        .with_suggestion("Set ajax.pipeline to 0 or enable paging")
    }

    /// Create an invalid column position error.
    pub fn invalid_column_position(index: usize) -> Self {
        Self::new(
            ErrorCode::InvalidColumnPosition,
            format!("The column with the index {} is on a not allowed position", index),
        )
    }

    /// Create a duplicate unique column error.
    pub fn duplicate_unique_column(kind: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DuplicateUniqueColumn,
            format!("Unique columns are only allowed once (duplicate {})", kind.into()),
        )
    }

    /// Create a missing dependency error.
    pub fn missing_dependency(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MissingDependency, message)
    }

    /// Create an unknown column error.
    pub fn unknown_column(column: impl Into<String>) -> Self {
        let column = column.into();
        Self::new(ErrorCode::UnknownColumn, format!("Unknown column {}", column)).with_column(&column)
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::ConnectionFailed, format!("Connection error: {}", message))
            .with_suggestion("Check that the backing store is running")
            .with_suggestion("Verify the connection URL is correct")
    }

    /// Create a pool exhausted error.
    pub fn pool_exhausted(max_connections: usize) -> Self {
        Self::new(
            ErrorCode::PoolExhausted,
            format!("Connection pool exhausted (max {} connections)", max_connections),
        )
        .with_suggestion("Increase max_connections in pool configuration")
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::new(
            ErrorCode::QueryTimeout,
            format!("Query timed out after {}ms", duration_ms),
        )
        .with_suggestion("Add indexes on searchable and orderable columns")
        .with_help("Disable count_all_results for very large tables")
    }

    /// Create an SQL syntax error.
    pub fn sql_syntax(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::new(ErrorCode::SqlSyntax, format!("SQL syntax error: {}", message.into()))
            .with_sql(sql)
            .with_suggestion("Check custom expression columns for typos")
    }

    /// Create a general database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
            .with_suggestion("Check the database logs for more details")
    }

    /// Create a search engine error.
    pub fn search_engine(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SearchEngineError, message)
    }

    /// Create an invalid data type error.
    pub fn invalid_data_type(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidDataType, message)
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message)
    }

    /// Create a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ErrorCode::DeserializationError,
            format!("Failed to deserialize result: {}", message),
        )
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message.into()))
    }

    // ============== Error Checks ==============

    /// Check if this is a configuration error.
    pub fn is_configuration_error(&self) -> bool {
        self.code.is_configuration()
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ConnectionFailed | ErrorCode::PoolExhausted | ErrorCode::ConnectionTimeout
        )
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self.code, ErrorCode::QueryTimeout | ErrorCode::ConnectionTimeout)
    }

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref grid) = self.context.grid {
            output.push_str(&format!("  → Grid: {}\n", grid));
        }
        if let Some(ref column) = self.context.column {
            output.push_str(&format!("  → Column: {}\n", column));
        }

        // SQL (truncated if too long)
        if let Some(ref sql) = self.context.sql {
            let sql_display = if sql.chars().count() > 200 {
                format!("{}...", sql.chars().take(200).collect::<String>())
            } else {
                sql.clone()
            };
            output.push_str(&format!("  → SQL: {}\n", sql_display));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion.text));
                if let Some(ref code) = suggestion.code {
                    output.push_str(&format!(
                        "     ```\n     {}\n     ```\n",
                        code.replace('\n', "\n     ")
                    ));
                }
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::serialization(err.to_string()).with_source(err)
    }
}

/// Helper for creating errors with context.
#[macro_export]
macro_rules! query_error {
    ($code:expr, $msg:expr) => {
        $crate::error::QueryError::new($code, $msg)
    };
    ($code:expr, $msg:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        let mut err = $crate::error::QueryError::new($code, $msg);
        $(
            err = err.$key($value);
        )+
        err
    }};
}
