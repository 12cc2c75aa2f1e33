//! The search-engine client seam.

use async_trait::async_trait;
use datagrid_query::Row;
use std::fmt;
use std::sync::Arc;

use crate::dsl::{BoolQuery, SearchBody};
use crate::error::SearchResult;

/// One page of hits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    /// Total number of matching documents, independent of the window.
    pub total: u64,
    /// The `_source` of each hit in the window.
    pub sources: Vec<Row>,
}

/// A search-engine client.
///
/// Implementations send the rendered [`SearchBody`] to one index and return
/// the hit sources.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Run a windowed search.
    async fn search(&self, body: &SearchBody) -> SearchResult<SearchHits>;

    /// Count matching documents.
    async fn count(&self, body: &SearchBody) -> SearchResult<u64> {
        let hits = self.search(&body.window(0, 0)).await?;
        Ok(hits.total)
    }
}

/// Restricts every query of a grid, e.g. to one tenant.
///
/// Applied to the root bool query before any search term, and also to the
/// count-all query.
pub trait TermsFilter: Send + Sync {
    /// Add restricting clauses.
    fn apply(&self, query: &mut BoolQuery);
}

/// A terms filter that adds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTermsFilter;

impl TermsFilter for NoTermsFilter {
    fn apply(&self, _query: &mut BoolQuery) {}
}

/// A terms filter backed by a closure.
#[derive(Clone)]
pub struct FnTermsFilter(Arc<dyn Fn(&mut BoolQuery) + Send + Sync>);

impl FnTermsFilter {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&mut BoolQuery) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl TermsFilter for FnTermsFilter {
    fn apply(&self, query: &mut BoolQuery) {
        (self.0)(query)
    }
}

impl fmt::Debug for FnTermsFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnTermsFilter(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Query;
    use pretty_assertions::assert_eq;

    struct FixedClient;

    #[async_trait]
    impl SearchClient for FixedClient {
        async fn search(&self, body: &SearchBody) -> SearchResult<SearchHits> {
            let size = body.size.unwrap_or(10) as usize;
            Ok(SearchHits {
                total: 42,
                sources: vec![Row::new(); size.min(3)],
            })
        }
    }

    #[tokio::test]
    async fn test_default_count_uses_empty_window() {
        let count = FixedClient.count(&SearchBody::default()).await.unwrap();
        assert_eq!(count, 42);
    }

    #[test]
    fn test_terms_filters() {
        let mut query = BoolQuery::new();
        NoTermsFilter.apply(&mut query);
        assert!(query.is_empty());

        let filter = FnTermsFilter::new(|q| q.filter.push(Query::term("tenant", "acme")));
        filter.apply(&mut query);
        assert_eq!(query.filter, vec![Query::term("tenant", "acme")]);
    }
}
