//! Search-engine query DSL.
//!
//! A small typed model of the bool/term/match/regexp/nested queries the grid
//! needs, rendered to the engine's JSON body with [`Query::to_value`].
//!
//! ```rust
//! use datagrid_search::dsl::{BoolQuery, Query};
//! use serde_json::json;
//!
//! let query = BoolQuery::new()
//!     .must(Query::term("published", 1))
//!     .should(Query::regexp("title.raw", ".*rust.*"));
//!
//! assert_eq!(
//!     Query::Bool(query).to_value(),
//!     json!({"bool": {
//!         "must": [{"term": {"published": {"value": 1}}}],
//!         "should": [{"regexp": {"title.raw": {"value": ".*rust.*"}}}]
//!     }})
//! );
//! ```

use datagrid_query::SortOrder;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

/// Operator joining the analyzed terms of a match query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOperator {
    /// Any term matches.
    Or,
    /// All terms must match.
    And,
}

impl MatchOperator {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Or => "or",
            Self::And => "and",
        }
    }
}

/// The `minimum_should_match` setting of a match query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinimumShouldMatch {
    /// An absolute number of terms.
    Count(u32),
    /// A percentage of the terms.
    Percent(u8),
}

impl MinimumShouldMatch {
    fn to_value(self) -> Value {
        match self {
            Self::Count(n) => json!(n),
            Self::Percent(p) => json!(format!("{}%", p)),
        }
    }
}

/// A leaf or compound query.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Exact term.
    Term {
        /// Field path.
        field: String,
        /// Term value.
        value: Value,
    },
    /// Analyzed full-text match.
    Match {
        /// Field path.
        field: String,
        /// Query text.
        query: String,
        /// How many terms must match.
        minimum_should_match: MinimumShouldMatch,
        /// Operator, engine default when unset.
        operator: Option<MatchOperator>,
    },
    /// Regular expression on a keyword field.
    Regexp {
        /// Field path.
        field: String,
        /// Pattern.
        value: String,
    },
    /// A query scoped to a nested object path.
    Nested {
        /// The nested object path.
        path: String,
        /// The scoped query.
        query: Box<Query>,
    },
    /// Boolean compound.
    Bool(BoolQuery),
}

impl Query {
    /// Create a term query.
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a match query requiring one matching term.
    pub fn match_text(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self::Match {
            field: field.into(),
            query: query.into(),
            minimum_should_match: MinimumShouldMatch::Count(1),
            operator: None,
        }
    }

    /// Create a regexp query.
    pub fn regexp(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Regexp {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Wrap a query in a nested scope.
    pub fn nested(path: impl Into<String>, query: Query) -> Self {
        Self::Nested {
            path: path.into(),
            query: Box::new(query),
        }
    }

    /// Render the query as engine JSON.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Term { field, value } => json!({"term": {field.as_str(): {"value": value}}}),
            Self::Match {
                field,
                query,
                minimum_should_match,
                operator,
            } => {
                let mut body = Map::new();
                body.insert("query".into(), json!(query));
                body.insert("minimum_should_match".into(), minimum_should_match.to_value());
                if let Some(op) = operator {
                    body.insert("operator".into(), json!(op.as_str()));
                }
                json!({"match": {field.as_str(): body}})
            }
            Self::Regexp { field, value } => json!({"regexp": {field.as_str(): {"value": value}}}),
            Self::Nested { path, query } => {
                json!({"nested": {"path": path, "query": query.to_value()}})
            }
            Self::Bool(b) => b.to_value(),
        }
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// A boolean compound query. Empty clause lists are omitted from the JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    /// Clauses that must match and score.
    pub must: Vec<Query>,
    /// Clauses of which at least one should match.
    pub should: Vec<Query>,
    /// Clauses that must match without scoring.
    pub filter: Vec<Query>,
    /// Clauses that must not match.
    pub must_not: Vec<Query>,
}

impl BoolQuery {
    /// Create an empty bool query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `must` clause.
    pub fn must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    /// Add a `should` clause.
    pub fn should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    /// Add a `filter` clause.
    pub fn filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }

    /// Add a `must_not` clause.
    pub fn must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    /// Check if there are no clauses at all.
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.filter.is_empty() && self.must_not.is_empty()
    }

    /// Render the query as engine JSON.
    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        for (key, clauses) in [
            ("must", &self.must),
            ("should", &self.should),
            ("filter", &self.filter),
            ("must_not", &self.must_not),
        ] {
            if !clauses.is_empty() {
                body.insert(key.into(), Value::Array(clauses.iter().map(Query::to_value).collect()));
            }
        }
        json!({"bool": body})
    }
}

/// One sort clause.
#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    /// Field path.
    pub field: String,
    /// Direction.
    pub order: SortOrder,
    /// Nested scope of the field, if any.
    pub nested_path: Option<String>,
}

impl SortField {
    /// Render the clause as engine JSON.
    pub fn to_value(&self) -> Value {
        let mut options = Map::new();
        options.insert("order".into(), json!(self.order.as_str()));
        if let Some(path) = &self.nested_path {
            options.insert("nested".into(), json!({"path": path}));
        }
        json!({self.field.as_str(): options})
    }
}

/// A complete search request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchBody {
    /// The root query.
    pub query: BoolQuery,
    /// Sort clauses, in priority order.
    pub sort: Vec<SortField>,
    /// Source fields to return, all when unset.
    pub source: Option<Vec<String>>,
    /// Offset of the first hit.
    pub from: Option<u64>,
    /// Number of hits.
    pub size: Option<u64>,
}

impl SearchBody {
    /// Create a body around a root query.
    pub fn new(query: BoolQuery) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    /// Return a copy windowed to `from..from + size`.
    pub fn window(&self, from: u64, size: u64) -> Self {
        Self {
            from: Some(from),
            size: Some(size),
            ..self.clone()
        }
    }

    /// Render the body as engine JSON.
    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".into(), self.query.to_value());
        if !self.sort.is_empty() {
            body.insert("sort".into(), Value::Array(self.sort.iter().map(SortField::to_value).collect()));
        }
        if let Some(source) = &self.source {
            body.insert("_source".into(), json!(source));
        }
        if let Some(from) = self.from {
            body.insert("from".into(), json!(from));
        }
        if let Some(size) = self.size {
            body.insert("size".into(), json!(size));
        }
        Value::Object(body)
    }
}

impl Serialize for SearchBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
