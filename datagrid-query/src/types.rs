//! Common scalar types shared by the column model, planners and executors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sort direction for an order clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Get the lowercase name used by search engines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// Parse a client-supplied direction. Anything but `desc` sorts ascending.
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

/// How an association hop is joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JoinType {
    /// Plain join.
    Join,
    /// Left outer join.
    #[default]
    LeftJoin,
    /// Inner join.
    InnerJoin,
}

impl JoinType {
    /// Get the SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Join => "JOIN",
            Self::LeftJoin => "LEFT JOIN",
            Self::InnerJoin => "INNER JOIN",
        }
    }
}

/// Cardinality of an association hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// One-to-one.
    OneToOne,
    /// Many-to-one.
    ManyToOne,
    /// One-to-many.
    OneToMany,
    /// Many-to-many.
    ManyToMany,
}

impl Cardinality {
    /// Check if the hop yields a collection.
    pub fn is_to_many(&self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }
}

/// Scalar type tag of a field, driving operator choice and value coercion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    /// Short string.
    String,
    /// Long text.
    Text,
    /// 32-bit integer.
    Integer,
    /// 16-bit integer.
    SmallInt,
    /// 64-bit integer.
    BigInt,
    /// Floating point.
    Float,
    /// Fixed-point decimal.
    Decimal,
    /// Boolean.
    Boolean,
    /// Date without time.
    Date,
    /// Date and time.
    DateTime,
    /// Time of day.
    Time,
    /// JSON document.
    Json,
    /// UUID.
    Guid,
    /// Any other engine-specific type.
    Other(String),
}

impl FieldType {
    /// Get the canonical type name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::SmallInt => "smallint",
            Self::BigInt => "bigint",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Time => "time",
            Self::Json => "json",
            Self::Guid => "guid",
            Self::Other(name) => name,
        }
    }

    /// Check if values of this type are matched with LIKE.
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String | Self::Text | Self::Guid)
    }

    /// Check if values of this type are coerced to integers.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Integer | Self::SmallInt | Self::BigInt | Self::Boolean)
    }

    /// Check if values of this type are coerced to floats.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float | Self::Decimal)
    }
}

impl From<&str> for FieldType {
    fn from(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "string" | "varchar" | "ascii_string" => Self::String,
            "text" => Self::Text,
            "integer" | "int" => Self::Integer,
            "smallint" => Self::SmallInt,
            "bigint" => Self::BigInt,
            "float" | "double" => Self::Float,
            "decimal" | "numeric" => Self::Decimal,
            "boolean" | "bool" => Self::Boolean,
            "date" | "date_immutable" => Self::Date,
            "datetime" | "datetime_immutable" | "datetimetz" | "timestamp" => Self::DateTime,
            "time" | "time_immutable" => Self::Time,
            "json" | "jsonb" => Self::Json,
            "guid" | "uuid" => Self::Guid,
            _ => Self::Other(value.to_string()),
        }
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for FieldType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_lenient() {
        assert_eq!(SortOrder::parse_lenient("DESC"), SortOrder::Desc);
        assert_eq!(SortOrder::parse_lenient("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::parse_lenient("sideways"), SortOrder::Asc);
    }

    #[test]
    fn test_join_type_serde() {
        let join: JoinType = serde_json::from_str("\"innerJoin\"").unwrap();
        assert_eq!(join, JoinType::InnerJoin);
        assert_eq!(JoinType::default(), JoinType::LeftJoin);
        assert_eq!(JoinType::LeftJoin.as_sql(), "LEFT JOIN");
    }

    #[test]
    fn test_field_type_classification() {
        assert!(FieldType::from("string").is_string());
        assert!(FieldType::from("bigint").is_integer());
        assert!(FieldType::from("boolean").is_integer());
        assert!(FieldType::from("decimal").is_float());
        assert_eq!(FieldType::from("point"), FieldType::Other("point".to_string()));
        assert_eq!(FieldType::DateTime.to_string(), "datetime");
    }

    #[test]
    fn test_field_type_serde() {
        let ty: FieldType = serde_json::from_str("\"integer\"").unwrap();
        assert_eq!(ty, FieldType::Integer);
        assert_eq!(serde_json::to_string(&FieldType::Text).unwrap(), "\"text\"");
    }

    #[test]
    fn test_cardinality() {
        assert!(Cardinality::OneToMany.is_to_many());
        assert!(!Cardinality::ManyToOne.is_to_many());
    }
}
