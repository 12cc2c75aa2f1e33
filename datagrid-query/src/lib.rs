//! # datagrid-query
//!
//! Server-side query building and response formatting for paginated data grids.
//!
//! This crate provides the relational side of the pipeline:
//! - Column models built from entity metadata (`ColumnBuilder`)
//! - Pluggable filter strategies (text, number, select, select2, date range)
//! - Grid request parsing from JSON bodies and form pairs
//! - Path resolution into joins, select, search and sort targets
//! - Predicate assembly for global search, individual filters and sorting
//! - A cloneable query builder rendered to PostgreSQL, MySQL or SQLite
//! - Execution against any `QueryEngine`, with paginator counts and hydration
//! - Row formatting and the response envelope
//!
//! ## Column Models
//!
//! ```rust
//! use datagrid_query::builder::ColumnBuilder;
//! use datagrid_query::column::ColumnConfig;
//! use datagrid_query::metadata::{AssociationMetadata, EntityMetadata, StaticMetadata};
//! use datagrid_query::types::FieldType;
//!
//! let metadata = StaticMetadata::new()
//!     .entity(
//!         EntityMetadata::new("Post", "posts")
//!             .field("id", FieldType::Integer)
//!             .field("title", FieldType::String)
//!             .association("createdBy", AssociationMetadata::many_to_one("User", "created_by_id")),
//!     )
//!     .entity(
//!         EntityMetadata::new("User", "users")
//!             .field("id", FieldType::Integer)
//!             .field("username", FieldType::String),
//!     );
//!
//! let columns = ColumnBuilder::new(&metadata, "Post", "posts")?
//!     .add(Some("id"), ColumnConfig::column())?
//!     .add(Some("title"), ColumnConfig::column())?
//!     .add(Some("createdBy.username"), ColumnConfig::column().title("Author"))?
//!     .build();
//!
//! assert_eq!(columns.len(), 3);
//! assert_eq!(columns.index_of("createdBy.username"), Some(2));
//! # Ok::<(), datagrid_query::QueryError>(())
//! ```
//!
//! ## Requests
//!
//! ```rust
//! use datagrid_query::request::GridRequest;
//!
//! let request = GridRequest::from_pairs([
//!     ("draw", "2"),
//!     ("start", "20"),
//!     ("length", "10"),
//!     ("search[value]", "bob"),
//!     ("order[0][column]", "1"),
//!     ("order[0][dir]", "desc"),
//!     ("columns[1][orderable]", "true"),
//! ]);
//!
//! assert_eq!(request.draw, 2);
//! assert_eq!(request.global_search(), Some("bob"));
//! assert!(request.is_orderable(1));
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use datagrid_query::{ErrorCode, QueryError};
//!
//! let err = QueryError::paging_pipeline_conflict();
//! assert_eq!(err.code, ErrorCode::PagingPipelineConflict);
//! assert!(err.is_configuration_error());
//! ```

pub mod builder;
pub mod column;
pub mod config;
pub mod error;
pub mod executor;
pub mod filter;
pub mod formatter;
pub mod grid;
pub mod hydrate;
pub mod logging;
pub mod metadata;
pub mod options;
pub mod planner;
pub mod predicate;
pub mod query;
pub mod request;
pub mod response;
pub mod sql;
pub mod strategy;
pub mod traits;
pub mod types;

pub use builder::{ColumnBuilder, ColumnModel};
pub use column::{Action, CellRenderer, Column, ColumnConfig, ColumnKind, ColumnRole, RowPredicate};
pub use config::GridConfig;
pub use error::{ErrorCode, QueryError, QueryResult};
pub use executor::{DatagridQuery, Page, Paginator};
pub use filter::{Expr, FieldRef, FilterValue, Parameters, SearchOperator};
pub use formatter::RowFormatter;
pub use grid::{GridRegistry, GridView, LineFormatter};
pub use metadata::{AssociationMetadata, EntityMetadata, MetadataProvider, StaticMetadata};
pub use options::{Ajax, AjaxMethod, Features, GridOptions, ResponseDefaults};
pub use query::QueryBuilder;
pub use request::GridRequest;
pub use response::{GridResponse, ResponseEnvelope};
pub use sql::DatabaseType;
pub use strategy::{
    DateRangeFilter, FilterStrategy, NumberFilter, Select2Filter, SelectFilter, TextFilter,
};
pub use traits::{BoxFuture, ExecutionOptions, QueryEngine, ResultCacheOptions, Row};
pub use types::{FieldType, JoinType, SortOrder};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::builder::{ColumnBuilder, ColumnModel};
    pub use crate::column::{Action, ColumnConfig, RowPredicate};
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::executor::{DatagridQuery, Paginator};
    pub use crate::filter::SearchOperator;
    pub use crate::grid::{GridRegistry, GridView};
    pub use crate::metadata::{AssociationMetadata, EntityMetadata, MetadataProvider, StaticMetadata};
    pub use crate::options::{Ajax, Features, GridOptions};
    pub use crate::request::GridRequest;
    pub use crate::response::{GridResponse, ResponseEnvelope};
    pub use crate::strategy::{SelectFilter, TextFilter};
    pub use crate::traits::{QueryEngine, Row};
    pub use crate::types::{FieldType, SortOrder};
}
