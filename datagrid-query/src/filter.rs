//! Predicate expressions produced by filter strategies.
//!
//! Expressions reference fields through [`FieldRef`] and bind values through
//! numbered parameter keys held in a [`Parameters`] map, mirroring positional
//! `?N` parameters in an object query language. Keys are turned into the
//! dialect's placeholders only when the query is rendered.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{QueryError, QueryResult};
use crate::sql::{DatabaseType, SqlBuilder};

/// A filter value that can be used in comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// JSON value.
    Json(serde_json::Value),
    /// List of values.
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Json(v) => v.clone(),
            Self::List(values) => serde_json::Value::Array(values.iter().map(Self::to_json).collect()),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(s) => write!(f, "'{}'", s),
            Self::Json(v) => write!(f, "{}", v),
            Self::List(values) => {
                let parts: Vec<_> = values.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// Comparison operator applied by a filter strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchOperator {
    /// `LIKE '%value%'`.
    #[default]
    Like,
    /// `NOT LIKE '%value%'`.
    NotLike,
    /// Equality.
    Eq,
    /// Inequality.
    Neq,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Member of a comma separated list.
    In,
    /// Not a member of a comma separated list.
    NotIn,
    /// Null check, the value is ignored.
    IsNull,
    /// Not-null check, the value is ignored.
    IsNotNull,
}

impl SearchOperator {
    /// Get the operator name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::NotLike => "notLike",
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::IsNull => "isNull",
            Self::IsNotNull => "isNotNull",
        }
    }

    /// Check if the operator binds a parameter.
    pub fn takes_value(&self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }

    fn symbol(&self) -> &'static str {
        match self {
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::Eq => "=",
            Self::Neq => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

impl FromStr for SearchOperator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "notLike" => Ok(Self::NotLike),
            "eq" => Ok(Self::Eq),
            "neq" => Ok(Self::Neq),
            "lt" => Ok(Self::Lt),
            "lte" => Ok(Self::Lte),
            "gt" => Ok(Self::Gt),
            "gte" => Ok(Self::Gte),
            "in" => Ok(Self::In),
            "notIn" => Ok(Self::NotIn),
            "isNull" => Ok(Self::IsNull),
            "isNotNull" => Ok(Self::IsNotNull),
            other => Err(QueryError::invalid_filter_options(format!(
                "Unknown search type \"{}\"",
                other
            ))),
        }
    }
}

impl fmt::Display for SearchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to something a predicate or sort can target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldRef {
    /// A mapped field at a join alias (`alias.field`).
    Path {
        /// Join or root alias.
        alias: String,
        /// Field name on the aliased entity.
        field: String,
    },
    /// A select label, such as the alias of a custom expression.
    Label(String),
    /// A raw expression, used verbatim.
    Expression(String),
}

impl FieldRef {
    /// Create a path reference.
    pub fn path(alias: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Path {
            alias: alias.into(),
            field: field.into(),
        }
    }

    /// Classify a textual target.
    ///
    /// `alias.field` becomes a path, a bare identifier a label, anything
    /// else a raw expression.
    pub fn parse(target: &str) -> Self {
        let is_ident = |s: &str| {
            !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        };
        let parts: Vec<&str> = target.split('.').collect();
        match parts.as_slice() {
            [label] if is_ident(label) => Self::Label(label.to_string()),
            [alias, field] if is_ident(alias) && is_ident(field) => Self::path(*alias, *field),
            _ => Self::Expression(target.to_string()),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path { alias, field } => write!(f, "{}.{}", alias, field),
            Self::Label(label) => f.write_str(label),
            Self::Expression(expr) => f.write_str(expr),
        }
    }
}

/// Parameter values keyed by their numeric parameter key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: IndexMap<usize, FilterValue>,
}

impl Parameters {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value, replacing any previous value under the same key.
    pub fn set(&mut self, key: usize, value: impl Into<FilterValue>) {
        self.values.insert(key, value.into());
    }

    /// Get the value bound to a key.
    pub fn get(&self, key: usize) -> Option<&FilterValue> {
        self.values.get(&key)
    }

    /// Number of bound keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&usize, &FilterValue)> {
        self.values.iter()
    }

    /// Copy every binding of `other` into this set.
    pub fn extend(&mut self, other: &Parameters) {
        for (key, value) in other.iter() {
            self.values.insert(*key, value.clone());
        }
    }
}

/// A composable predicate.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Expr {
    /// No constraint.
    #[default]
    None,
    /// `field <operator> ?param`.
    Condition {
        /// Target field.
        field: FieldRef,
        /// Operator.
        operator: SearchOperator,
        /// Bound parameter key, absent for null checks.
        param: Option<usize>,
    },
    /// `field BETWEEN ?low AND ?high`.
    Between {
        /// Target field.
        field: FieldRef,
        /// Lower bound parameter key.
        low: usize,
        /// Upper bound parameter key.
        high: usize,
    },
    /// All of the nested expressions.
    And(Vec<Expr>),
    /// Any of the nested expressions.
    Or(Vec<Expr>),
}

impl Expr {
    /// Check if this expression is empty.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Create an AND expression, dropping empty members.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Self {
        let exprs: Vec<_> = exprs.into_iter().filter(|e| !e.is_none()).collect();
        match exprs.len() {
            0 => Self::None,
            1 => exprs.into_iter().next().unwrap_or_default(),
            _ => Self::And(exprs),
        }
    }

    /// Create an OR expression, dropping empty members.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Self {
        let exprs: Vec<_> = exprs.into_iter().filter(|e| !e.is_none()).collect();
        match exprs.len() {
            0 => Self::None,
            1 => exprs.into_iter().next().unwrap_or_default(),
            _ => Self::Or(exprs),
        }
    }

    /// Combine with another expression using AND.
    pub fn and_then(self, other: Expr) -> Self {
        if self.is_none() {
            return other;
        }
        if other.is_none() {
            return self;
        }
        match self {
            Self::And(mut exprs) => {
                exprs.push(other);
                Self::And(exprs)
            }
            _ => Self::And(vec![self, other]),
        }
    }

    /// Number of direct members (1 for a leaf, 0 when empty).
    pub fn count(&self) -> usize {
        match self {
            Self::None => 0,
            Self::And(exprs) | Self::Or(exprs) => exprs.len(),
            _ => 1,
        }
    }

    /// Collect every parameter key referenced by this expression.
    pub fn param_keys(&self) -> Vec<usize> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys(&self, keys: &mut Vec<usize>) {
        match self {
            Self::None => {}
            Self::Condition { param, .. } => keys.extend(param.iter().copied()),
            Self::Between { low, high, .. } => {
                keys.push(*low);
                keys.push(*high);
            }
            Self::And(exprs) | Self::Or(exprs) => exprs.iter().for_each(|e| e.collect_keys(keys)),
        }
    }

    /// Render into a SQL builder.
    ///
    /// `resolve` maps field references to SQL text. Each parameter occurrence
    /// is pushed as a fresh positional placeholder.
    pub fn write_sql(
        &self,
        builder: &mut SqlBuilder,
        params: &Parameters,
        resolve: &dyn Fn(&FieldRef) -> QueryResult<String>,
    ) -> QueryResult<()> {
        let bound = |key: usize| {
            params
                .get(key)
                .cloned()
                .ok_or_else(|| QueryError::internal(format!("parameter ?{} is not bound", key)))
        };

        match self {
            Self::None => {
                builder.push("TRUE");
            }
            Self::Condition {
                field,
                operator,
                param,
            } => {
                let symbol = match (operator, builder.db_type()) {
                    (SearchOperator::Like, DatabaseType::PostgreSQL) => "ILIKE",
                    (SearchOperator::NotLike, DatabaseType::PostgreSQL) => "NOT ILIKE",
                    (op, _) => op.symbol(),
                };
                match (operator, param) {
                    (SearchOperator::IsNull | SearchOperator::IsNotNull, _) => {
                        builder.push(resolve(field)?).push(" ").push(symbol);
                    }
                    (SearchOperator::In | SearchOperator::NotIn, Some(key)) => {
                        let values = match bound(*key)? {
                            FilterValue::List(values) => values,
                            single => vec![single],
                        };
                        if values.is_empty() {
                            // An empty IN list matches nothing, an empty NOT IN everything.
                            builder.push(if *operator == SearchOperator::In { "FALSE" } else { "TRUE" });
                        } else {
                            builder.push(resolve(field)?).push(" ").push(symbol).push(" (");
                            for (i, value) in values.into_iter().enumerate() {
                                if i > 0 {
                                    builder.push(", ");
                                }
                                builder.push_param(value);
                            }
                            builder.push(")");
                        }
                    }
                    (_, Some(key)) => {
                        builder.push(resolve(field)?).push(" ").push(symbol).push(" ");
                        builder.push_param(bound(*key)?);
                    }
                    (_, None) => {
                        return Err(QueryError::internal(format!(
                            "operator {} requires a parameter",
                            operator
                        )));
                    }
                }
            }
            Self::Between { field, low, high } => {
                builder.push(resolve(field)?).push(" BETWEEN ");
                builder.push_param(bound(*low)?);
                builder.push(" AND ");
                builder.push_param(bound(*high)?);
            }
            Self::And(exprs) | Self::Or(exprs) => {
                let glue = if matches!(self, Self::And(_)) { " AND " } else { " OR " };
                builder.push("(");
                for (i, expr) in exprs.iter().enumerate() {
                    if i > 0 {
                        builder.push(glue);
                    }
                    expr.write_sql(builder, params, resolve)?;
                }
                builder.push(")");
            }
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("TRUE"),
            Self::Condition {
                field,
                operator,
                param,
            } => match param {
                Some(key) => write!(f, "{} {} ?{}", field, operator.symbol(), key),
                None => write!(f, "{} {}", field, operator.symbol()),
            },
            Self::Between { field, low, high } => {
                write!(f, "{} BETWEEN ?{} AND ?{}", field, low, high)
            }
            Self::And(exprs) | Self::Or(exprs) => {
                let glue = if matches!(self, Self::And(_)) { " AND " } else { " OR " };
                let parts: Vec<_> = exprs.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(glue))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title_like(key: usize) -> Expr {
        Expr::Condition {
            field: FieldRef::path("post", "title"),
            operator: SearchOperator::Like,
            param: Some(key),
        }
    }

    #[test]
    fn test_filter_value_from() {
        assert_eq!(FilterValue::from(42i32), FilterValue::Int(42));
        assert_eq!(FilterValue::from("hello"), FilterValue::String("hello".to_string()));
        assert_eq!(FilterValue::from(vec![1i64, 2]), FilterValue::List(vec![1i64.into(), 2i64.into()]));
    }

    #[test]
    fn test_search_operator_parse() {
        assert_eq!("notIn".parse::<SearchOperator>().unwrap(), SearchOperator::NotIn);
        assert!("between".parse::<SearchOperator>().is_err());
        let op: SearchOperator = serde_json::from_str("\"isNotNull\"").unwrap();
        assert_eq!(op, SearchOperator::IsNotNull);
        assert!(!op.takes_value());
    }

    #[test]
    fn test_field_ref_parse() {
        assert_eq!(FieldRef::parse("post.title"), FieldRef::path("post", "title"));
        assert_eq!(FieldRef::parse("commentcount"), FieldRef::Label("commentcount".into()));
        assert!(matches!(FieldRef::parse("(SELECT COUNT(c.id) FROM comments c)"), FieldRef::Expression(_)));
        assert!(matches!(FieldRef::parse("a.b.c"), FieldRef::Expression(_)));
    }

    #[test]
    fn test_expr_collapsing() {
        assert!(Expr::and(Vec::new()).is_none());
        assert_eq!(Expr::or([Expr::None, title_like(1)]), title_like(1));
        assert_eq!(Expr::and([title_like(1), title_like(2)]).count(), 2);
        assert_eq!(Expr::None.and_then(title_like(3)), title_like(3));
    }

    #[test]
    fn test_expr_display() {
        let expr = Expr::or([
            title_like(1),
            Expr::Between {
                field: FieldRef::path("post", "createdAt"),
                low: 100,
                high: 101,
            },
        ]);
        assert_eq!(
            expr.to_string(),
            "(post.title LIKE ?1 OR post.createdAt BETWEEN ?100 AND ?101)"
        );
        assert_eq!(expr.param_keys(), vec![1, 100, 101]);
    }

    #[test]
    fn test_write_sql_expands_in_lists() {
        let mut params = Parameters::new();
        params.set(5, vec![1i64, 2, 3]);
        let expr = Expr::Condition {
            field: FieldRef::path("post", "id"),
            operator: SearchOperator::In,
            param: Some(5),
        };

        let mut builder = SqlBuilder::postgres();
        expr.write_sql(&mut builder, &params, &|f| Ok(f.to_string())).unwrap();
        let (sql, values) = builder.build();
        assert_eq!(sql, "post.id IN ($1, $2, $3)");
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_write_sql_missing_parameter() {
        let mut builder = SqlBuilder::postgres();
        let result = title_like(7).write_sql(&mut builder, &Parameters::new(), &|f| Ok(f.to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_write_sql_like_per_dialect() {
        let mut params = Parameters::new();
        params.set(1, "%foo%");

        let mut pg = SqlBuilder::postgres();
        title_like(1).write_sql(&mut pg, &params, &|f| Ok(f.to_string())).unwrap();
        assert_eq!(pg.sql(), "post.title ILIKE $1");

        let mut my = SqlBuilder::mysql();
        title_like(1).write_sql(&mut my, &params, &|f| Ok(f.to_string())).unwrap();
        assert_eq!(my.sql(), "post.title LIKE ?");
    }
}
