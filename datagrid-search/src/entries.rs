//! Search results.

use datagrid_query::Row;

/// Hit sources with the total number of matching documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entries {
    /// Total hits, independent of how many entries were fetched.
    pub count: u64,
    /// Fetched sources, in hit order.
    pub entries: Vec<Row>,
}

impl Entries {
    /// Create a result set.
    pub fn new(count: u64, entries: Vec<Row>) -> Self {
        Self { count, entries }
    }

    /// Number of fetched entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was fetched.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the fetched entries.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.entries.iter()
    }
}

impl IntoIterator for Entries {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Entries {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
