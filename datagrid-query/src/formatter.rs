//! Row formatting.
//!
//! [`RowFormatter`] reshapes hydrated rows according to the column model,
//! independently of the store that produced them. Each row goes through the
//! same fixed sequence:
//!
//! 1. store-specific normalization (see [`merge_root_key`]);
//! 2. custom expression values move from their select label to their data path;
//! 3. fields with an alternate output key are moved to that key;
//! 4. the grid's line formatter, if any;
//! 5. per-column output data and cell rendering, in column order;
//! 6. columns not sent in the response are removed.

use serde_json::Value;

use crate::builder::ColumnModel;
use crate::column::ColumnKind;
use crate::grid::{GridView, LineFormatter};
use crate::hydrate::ROOT_KEY;
use crate::traits::Row;

/// A store-specific row normalization step.
pub type Normalizer = fn(&mut Row);

/// Merge the root entity nested under `"0"` into the row itself.
///
/// Relational hydration nests the root entity under that key when raw
/// expressions are selected next to it.
pub fn merge_root_key(row: &mut Row) {
    if let Some(Value::Object(root)) = row.shift_remove(ROOT_KEY) {
        for (key, value) in root {
            row.entry(key).or_insert(value);
        }
    }
}

/// Leave the row untouched.
pub fn keep_row(_row: &mut Row) {}

/// Reshapes rows for one response.
#[derive(Debug)]
pub struct RowFormatter<'a> {
    columns: &'a ColumnModel,
    line_formatter: Option<&'a LineFormatter>,
    normalizer: Normalizer,
    output: Vec<Row>,
}

impl<'a> RowFormatter<'a> {
    /// Create a formatter for relational rows.
    pub fn new(columns: &'a ColumnModel, line_formatter: Option<&'a LineFormatter>) -> Self {
        Self {
            columns,
            line_formatter,
            normalizer: merge_root_key,
            output: Vec::new(),
        }
    }

    /// Create a formatter for a grid view's rows.
    pub fn for_grid(grid: &'a GridView) -> Self {
        Self::new(grid.columns(), grid.line_formatter())
    }

    /// Replace the normalization step.
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Format rows and append them to the output, preserving order.
    pub fn run(&mut self, rows: impl IntoIterator<Item = Row>) {
        for row in rows {
            let row = self.format_row(row);
            self.output.push(row);
        }
        crate::datagrid_trace!(rows = self.output.len(), "Rows formatted");
    }

    /// Format one row.
    pub fn format_row(&self, mut row: Row) -> Row {
        (self.normalizer)(&mut row);

        for column in self.columns.columns() {
            if column.is_custom_expression() {
                let label = column.data.replace('.', "_");
                if label != column.data {
                    let value = row.shift_remove(&label).unwrap_or(Value::Null);
                    set_path(&mut row, &column.data, value);
                }
            }
        }

        for column in self.columns.columns() {
            let dql = match &column.kind {
                ColumnKind::Direct { field } => field.as_str(),
                ColumnKind::Association { path } => path.as_str(),
                _ => continue,
            };
            if dql != column.data && !row.contains_key(&column.data) {
                let value = remove_path(&mut row, dql).unwrap_or(Value::Null);
                row.insert(column.data.clone(), value);
            }
        }

        if let Some(formatter) = self.line_formatter {
            row = formatter.call(row);
        }

        for column in self.columns.columns() {
            column.add_data_to_output(&mut row);
            column.render_cell(&mut row);
        }

        for column in self.columns.columns() {
            if !column.sent_in_response {
                remove_path(&mut row, &column.data);
            }
        }

        row
    }

    /// Formatted rows so far.
    pub fn output(&self) -> &[Row] {
        &self.output
    }

    /// Take the formatted rows.
    pub fn into_output(self) -> Vec<Row> {
        self.output
    }
}

/// Set a value at a dotted path, creating intermediate objects.
pub fn set_path(row: &mut Row, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = row;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let entry = current
            .entry(segment)
            .or_insert_with(|| Value::Object(Row::new()));
        if !entry.is_object() {
            *entry = Value::Object(Row::new());
        }
        match entry {
            Value::Object(map) => current = map,
            _ => return,
        }
    }
}

/// Read a value at a dotted path. A flat key equal to the whole path wins.
pub fn get_path<'r>(row: &'r Row, path: &str) -> Option<&'r Value> {
    if let Some(value) = row.get(path) {
        return Some(value);
    }
    let (head, rest) = path.split_once('.')?;
    match row.get(head)? {
        Value::Object(map) => get_path(map, rest),
        _ => None,
    }
}

/// Remove a value at a dotted path. A flat key equal to the whole path wins.
pub fn remove_path(row: &mut Row, path: &str) -> Option<Value> {
    if let Some(value) = row.shift_remove(path) {
        return Some(value);
    }
    let (head, rest) = path.split_once('.')?;
    match row.get_mut(head)? {
        Value::Object(map) => remove_path(map, rest),
        _ => None,
    }
}
