//! # datagrid-search
//!
//! Search-engine backend for server-side data grids.
//!
//! This crate provides:
//! - A typed query DSL rendered to the engine's JSON body
//! - Column resolution with nested object paths and keyword sort fields
//! - Global search, per-column filters and search groups as bool queries
//! - A pluggable [`SearchClient`] and a [`TermsFilter`] hook for scoping
//! - Paged execution, batched full reads and the grid response
//!
//! ## Example
//!
//! ```rust,ignore
//! use datagrid_search::{SearchResponse, SearchSettings};
//!
//! let mut response = SearchResponse::new().with_settings(SearchSettings::default());
//! response.set_grid(grid)?;
//! response.set_request(request);
//!
//! let json = response.get_json_response(&client).await?;
//! ```

pub mod client;
pub mod dsl;
pub mod entries;
pub mod error;
pub mod executor;
pub mod planner;
pub mod query;
pub mod response;

pub use client::{FnTermsFilter, NoTermsFilter, SearchClient, SearchHits, TermsFilter};
pub use dsl::{BoolQuery, MatchOperator, MinimumShouldMatch, Query, SearchBody, SortField};
pub use entries::Entries;
pub use error::{SearchError, SearchResult};
pub use executor::{BATCH_SIZE, SearchQuery};
pub use planner::{SearchField, SearchSettings, SearchTables, StringQuery};
pub use query::{Condition, SearchQueryBuilder};
pub use response::SearchResponse;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::{SearchClient, SearchHits, TermsFilter};
    pub use crate::dsl::{BoolQuery, Query, SearchBody};
    pub use crate::entries::Entries;
    pub use crate::error::{SearchError, SearchResult};
    pub use crate::executor::SearchQuery;
    pub use crate::planner::SearchSettings;
    pub use crate::response::SearchResponse;
}
