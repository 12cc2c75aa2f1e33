//! # Datagrid
//!
//! Server-side processing for paginated data grids.
//!
//! A grid view is a list of columns bound to an entity. Each client request
//! (page window, global search, per-column filters, sort order) is turned
//! into a query against the backing store, and the matching rows come back
//! formatted as the response envelope the grid expects.
//!
//! Datagrid provides:
//! - Column models resolved from entity metadata, with filter strategies
//! - A relational pipeline rendering SQL for any `QueryEngine`
//! - A PostgreSQL engine with pooling and result caching (`postgres` feature)
//! - A search-engine pipeline over a pluggable client (`search` feature)
//! - `datagrid.toml` configuration with per-environment overrides
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use datagrid::prelude::*;
//! use datagrid::postgres::{PgEngine, PgPool};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GridConfig::from_file("datagrid.toml")?.with_environment("production");
//!     let engine = PgEngine::new(PgPool::from_database_config(&config.database)?);
//!
//!     let metadata = Arc::new(blog_metadata());
//!     let columns = ColumnBuilder::new(metadata.as_ref(), "Post", "posts")?
//!         .add(Some("id"), ColumnConfig::column())?
//!         .add(Some("title"), ColumnConfig::column())?
//!         .add(Some("createdBy.username"), ColumnConfig::column().title("Author"))?
//!         .build();
//!     let grid = GridView::new(&GridRegistry::new(), "posts", "Post", columns)?.with_config(&config);
//!
//!     let mut response = GridResponse::new(metadata);
//!     response.set_grid(grid)?.set_request(GridRequest::from_pairs(form_pairs));
//!     response.get_query()?;
//!     println!("{}", response.get_json_response(&engine).await?);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Column models, query planning and response formatting.
pub mod query {
    pub use datagrid_query::*;
}

/// PostgreSQL query engine.
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres {
    pub use datagrid_postgres::*;
}

/// Search-engine backend.
#[cfg(feature = "search")]
#[cfg_attr(docsrs, doc(cfg(feature = "search")))]
pub mod search {
    pub use datagrid_search::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use datagrid_query::prelude::*;
    pub use datagrid_query::GridConfig;

    #[cfg(feature = "postgres")]
    pub use datagrid_postgres::prelude::*;

    #[cfg(feature = "search")]
    pub use datagrid_search::prelude::*;
}

// Re-export key types at the crate root
pub use datagrid_query::{
    ColumnBuilder, ColumnConfig, GridConfig, GridRequest, GridResponse, GridView, QueryEngine, QueryError,
    QueryResult,
};
