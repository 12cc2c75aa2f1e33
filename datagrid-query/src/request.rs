//! Grid request parsing.
//!
//! Requests come from the client grid widget either as a JSON body or as
//! flat form/query pairs (`columns[0][search][value]=foo`). Parsing never
//! fails on shape problems: malformed entries are dropped and the request
//! degrades to "no constraint" or "no sort".
//!
//! ```rust
//! use datagrid_query::request::GridRequest;
//!
//! let request = GridRequest::from_pairs([
//!     ("draw", "3"),
//!     ("start", "20"),
//!     ("length", "10"),
//!     ("search[value]", "rust"),
//!     ("order[0][column]", "1"),
//!     ("order[0][dir]", "desc"),
//!     ("columns[1][orderable]", "true"),
//! ]);
//!
//! assert_eq!(request.draw, 3);
//! assert_eq!(request.global_search(), Some("rust"));
//! assert_eq!(request.order[0].column, 1);
//! ```

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::QueryResult;
use crate::types::SortOrder;

/// Length sentinel meaning "no limit".
pub const DISABLE_PAGINATION: i64 = -1;

/// One sort entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderEntry {
    /// Column index.
    pub column: usize,
    /// Direction.
    pub dir: SortOrder,
}

/// Per-column state echoed by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestColumn {
    /// Data key of the column.
    pub data: Option<String>,
    /// Column name.
    pub name: Option<String>,
    /// Client-side searchable flag.
    pub searchable: bool,
    /// Client-side orderable flag, gates sorting.
    pub orderable: bool,
    /// Column search value.
    pub search_value: Option<String>,
}

impl RequestColumn {
    /// The search value, unless it means "no constraint".
    pub fn search(&self) -> Option<&str> {
        self.search_value
            .as_deref()
            .filter(|v| !v.is_empty() && *v != "null")
    }
}

/// A paginated grid request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridRequest {
    /// Echo token.
    pub draw: i64,
    /// Offset of the first row.
    pub start: Option<u64>,
    /// Page size, [`DISABLE_PAGINATION`] for all rows.
    pub length: Option<i64>,
    /// Global search value.
    pub search: Option<String>,
    /// Sort entries, primary first.
    pub order: Vec<OrderEntry>,
    /// Column state by index.
    pub columns: IndexMap<usize, RequestColumn>,
}

impl GridRequest {
    /// Create an empty request.
    pub fn new(draw: i64) -> Self {
        Self {
            draw,
            ..Self::default()
        }
    }

    /// Set the page window.
    pub fn page(mut self, start: u64, length: i64) -> Self {
        self.start = Some(start);
        self.length = Some(length);
        self
    }

    /// Set the global search value.
    pub fn global(mut self, value: impl Into<String>) -> Self {
        self.search = Some(value.into());
        self
    }

    /// Add a column entry.
    pub fn column(mut self, index: usize, column: RequestColumn) -> Self {
        self.columns.insert(index, column);
        self
    }

    /// Set a column search value, creating a searchable and orderable entry if needed.
    pub fn column_search(mut self, index: usize, value: impl Into<String>) -> Self {
        let entry = self.columns.entry(index).or_insert_with(|| RequestColumn {
            searchable: true,
            orderable: true,
            ..RequestColumn::default()
        });
        entry.search_value = Some(value.into());
        self
    }

    /// Add a sort entry.
    pub fn order_by(mut self, column: usize, dir: SortOrder) -> Self {
        self.order.push(OrderEntry { column, dir });
        self
    }

    /// Parse a JSON body.
    pub fn from_json(body: &str) -> QueryResult<Self> {
        let value: Value = serde_json::from_str(body)?;
        Ok(Self::from_value(&value))
    }

    /// Parse flat form or query pairs with bracketed keys.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut root = Value::Object(Map::new());
        for (key, value) in pairs {
            insert_bracketed(&mut root, key.as_ref(), value.as_ref());
        }
        Self::from_value(&root)
    }

    /// Build from a decoded JSON value.
    pub fn from_value(value: &Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        RawRequest::deserialize(value)
            .map(Self::from)
            .unwrap_or_default()
    }

    /// The global search value, unless empty.
    pub fn global_search(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }

    /// The search value of a column, unless it means "no constraint".
    pub fn search_value(&self, index: usize) -> Option<&str> {
        self.columns.get(&index).and_then(RequestColumn::search)
    }

    /// Check if the client marks a column orderable.
    pub fn is_orderable(&self, index: usize) -> bool {
        self.columns.get(&index).is_some_and(|c| c.orderable)
    }
}

/// Wire shape of a request. Every field tolerates the wrong type.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRequest {
    #[serde(deserialize_with = "lenient::int")]
    draw: Option<i64>,
    #[serde(deserialize_with = "lenient::int")]
    start: Option<i64>,
    #[serde(deserialize_with = "lenient::int")]
    length: Option<i64>,
    #[serde(deserialize_with = "lenient::or_default")]
    search: RawSearch,
    #[serde(deserialize_with = "lenient::indexed")]
    order: Vec<(usize, RawOrder)>,
    #[serde(deserialize_with = "lenient::indexed")]
    columns: Vec<(usize, RawColumn)>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSearch {
    #[serde(deserialize_with = "lenient::text")]
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOrder {
    #[serde(deserialize_with = "lenient::int")]
    column: Option<i64>,
    #[serde(deserialize_with = "lenient::text")]
    dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawColumn {
    #[serde(deserialize_with = "lenient::text")]
    data: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    searchable: bool,
    #[serde(deserialize_with = "lenient::flag")]
    orderable: bool,
    #[serde(deserialize_with = "lenient::or_default")]
    search: RawSearch,
}

impl From<RawRequest> for GridRequest {
    fn from(raw: RawRequest) -> Self {
        let order = raw
            .order
            .into_iter()
            .filter_map(|(_, entry)| {
                let column = usize::try_from(entry.column?).ok()?;
                let dir = entry
                    .dir
                    .as_deref()
                    .map(SortOrder::parse_lenient)
                    .unwrap_or_default();
                Some(OrderEntry { column, dir })
            })
            .collect();

        let columns = raw
            .columns
            .into_iter()
            .map(|(index, column)| {
                let column = RequestColumn {
                    data: column.data,
                    name: column.name,
                    searchable: column.searchable,
                    orderable: column.orderable,
                    search_value: column.search.value,
                };
                (index, column)
            })
            .collect();

        Self {
            draw: raw.draw.unwrap_or(0),
            start: raw.start.and_then(|s| u64::try_from(s).ok()),
            length: raw.length.filter(|l| *l >= DISABLE_PAGINATION),
            search: raw.search.value,
            order,
            columns,
        }
    }
}

/// Field deserializers that map the wrong type to "absent" instead of failing.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// An integer, or a string holding one.
    pub fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// A boolean, or the string `"true"`.
    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => b,
            Value::String(s) => s == "true",
            _ => false,
        })
    }

    /// Any scalar as text. `null`, arrays and objects are absent.
    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    /// A nested object, defaulted when it has the wrong shape.
    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(if value.is_object() {
            serde_json::from_value(value).unwrap_or_default()
        } else {
            T::default()
        })
    }

    /// An array, or an object keyed by indexes. Entries with a bad key or shape are dropped.
    pub fn indexed<'de, D, T>(deserializer: D) -> Result<Vec<(usize, T)>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let entries: Vec<(Option<usize>, Value)> = match Value::deserialize(deserializer)? {
            Value::Array(items) => items.into_iter().enumerate().map(|(i, v)| (Some(i), v)).collect(),
            Value::Object(map) => map.into_iter().map(|(k, v)| (k.parse().ok(), v)).collect(),
            _ => Vec::new(),
        };
        let mut entries: Vec<(usize, T)> = entries
            .into_iter()
            .filter(|(_, value)| value.is_object())
            .filter_map(|(index, value)| Some((index?, serde_json::from_value(value).ok()?)))
            .collect();
        entries.sort_by_key(|(index, _)| *index);
        Ok(entries)
    }
}

/// Insert `a[b][c]=value` into a nested object.
fn insert_bracketed(root: &mut Value, key: &str, value: &str) {
    let (head, rest) = match key.find('[') {
        Some(pos) => (&key[..pos], &key[pos..]),
        None => (key, ""),
    };
    let mut path = vec![head];
    path.extend(
        rest.split('[')
            .filter(|s| !s.is_empty())
            .map(|s| s.trim_end_matches(']')),
    );

    let mut current = root;
    for (i, segment) in path.iter().enumerate() {
        let Value::Object(map) = current else {
            return;
        };
        if i + 1 == path.len() {
            map.insert(segment.to_string(), Value::String(value.to_string()));
            return;
        }
        let next = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !next.is_object() {
            *next = Value::Object(Map::new());
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_json() {
        let request = GridRequest::from_json(
            r#"{
                "draw": 1, "start": 0, "length": 10,
                "search": {"value": "", "regex": false},
                "order": [{"column": 0, "dir": "asc"}, {"column": 1, "dir": "desc"}],
                "columns": [
                    {"data": "id", "name": "", "searchable": true, "orderable": "true", "search": {"value": ""}},
                    {"data": "title", "searchable": "true", "orderable": "false", "search": {"value": "Hello"}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(request.draw, 1);
        assert_eq!(request.start, Some(0));
        assert_eq!(request.length, Some(10));
        assert_eq!(request.global_search(), None);
        assert_eq!(
            request.order,
            vec![
                OrderEntry { column: 0, dir: SortOrder::Asc },
                OrderEntry { column: 1, dir: SortOrder::Desc },
            ]
        );
        assert!(request.is_orderable(0));
        assert!(!request.is_orderable(1));
        assert_eq!(request.search_value(1), Some("Hello"));
        assert_eq!(request.search_value(0), None);
    }

    #[test]
    fn test_from_pairs() {
        let request = GridRequest::from_pairs([
            ("draw", "7"),
            ("length", "-1"),
            ("columns[2][data]", "createdBy.username"),
            ("columns[2][search][value]", "null"),
            ("columns[3][search][value]", "bob"),
        ]);

        assert_eq!(request.draw, 7);
        assert_eq!(request.start, None);
        assert_eq!(request.length, Some(DISABLE_PAGINATION));
        assert_eq!(request.columns[&2].data.as_deref(), Some("createdBy.username"));
        assert_eq!(request.search_value(2), None);
        assert_eq!(request.search_value(3), Some("bob"));
    }

    #[test]
    fn test_malformed_entries_are_dropped() {
        let request = GridRequest::from_value(&serde_json::json!({
            "draw": "x",
            "start": -5,
            "length": -3,
            "order": [{"column": "abc"}, {"column": 2, "dir": "sideways"}],
            "columns": {"foo": {"data": "a"}, "1": {"data": "b"}},
        }));

        assert_eq!(request.draw, 0);
        assert_eq!(request.start, None);
        assert_eq!(request.length, None);
        assert_eq!(request.order, vec![OrderEntry { column: 2, dir: SortOrder::Asc }]);
        assert_eq!(request.columns.len(), 1);
        assert!(request.columns.contains_key(&1));
    }

    #[test]
    fn test_wire_types_are_tolerated() {
        let request = GridRequest::from_value(&serde_json::json!({
            "draw": " 4 ",
            "search": "not-an-object",
            "order": {
                "10": {"column": "3", "dir": "DESC"},
                "2": {"column": 1},
                "3": "garbage",
            },
            "columns": [
                {"data": 5, "searchable": "false", "orderable": 1, "search": {"value": 42}},
                {"data": null, "search": {"value": ["x"]}},
            ],
        }));

        assert_eq!(request.draw, 4);
        assert_eq!(request.global_search(), None);
        assert_eq!(
            request.order,
            vec![
                OrderEntry { column: 1, dir: SortOrder::Asc },
                OrderEntry { column: 3, dir: SortOrder::Desc },
            ]
        );
        assert_eq!(request.columns[&0].data.as_deref(), Some("5"));
        assert!(!request.columns[&0].searchable);
        assert!(!request.is_orderable(0));
        assert_eq!(request.search_value(0), Some("42"));
        assert_eq!(request.columns[&1].data, None);
        assert_eq!(request.search_value(1), None);
    }

    #[test]
    fn test_non_object_body_is_empty_request() {
        assert_eq!(GridRequest::from_json("[1, 2]").unwrap(), GridRequest::default());
        assert!(GridRequest::from_json("{not json").is_err());
    }

    #[test]
    fn test_builder_helpers() {
        let request = GridRequest::new(2)
            .page(10, 5)
            .global("x")
            .column_search(1, "Hello")
            .order_by(0, SortOrder::Desc);
        assert_eq!(request.global_search(), Some("x"));
        assert!(request.is_orderable(1));
        assert_eq!(request.order.len(), 1);
    }
}
