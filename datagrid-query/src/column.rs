//! Column descriptors.
//!
//! A [`Column`] is produced by the [`ColumnBuilder`](crate::builder::ColumnBuilder)
//! from a [`ColumnConfig`] and is immutable afterwards. Its [`ColumnKind`]
//! decides how the planners resolve it, its [`ColumnRole`] how it shapes the
//! output rows.

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::{ErrorCode, QueryError, QueryResult};
use crate::strategy::FilterStrategy;
use crate::traits::Row;
use crate::types::{Cardinality, FieldType, JoinType};

/// Output key holding per-row action visibility flags.
pub const ACTIONS_KEY: &str = "datagrid_actions";

/// Output key holding the per-row checkbox visibility flag.
pub const CHECKBOX_KEY: &str = "datagrid_checkbox";

/// A predicate over a raw row.
#[derive(Clone)]
pub struct RowPredicate(Arc<dyn Fn(&Row) -> bool + Send + Sync>);

impl RowPredicate {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&Row) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Evaluate the predicate.
    pub fn call(&self, row: &Row) -> bool {
        (self.0)(row)
    }
}

impl fmt::Debug for RowPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RowPredicate(..)")
    }
}

/// A per-column cell renderer that rewrites the row in place.
#[derive(Clone)]
pub struct CellRenderer(Arc<dyn Fn(&Column, &mut Row) + Send + Sync>);

impl CellRenderer {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&Column, &mut Row) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Render the cell.
    pub fn call(&self, column: &Column, row: &mut Row) {
        (self.0)(column, row)
    }
}

impl fmt::Debug for CellRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CellRenderer(..)")
    }
}

/// A structural position a column may occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// A fixed index.
    Index(usize),
    /// The last column, whatever its index.
    Last,
}

/// How a column is backed.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    /// A field of the root entity.
    Direct {
        /// Field name.
        field: String,
    },
    /// A field reached through one or more association hops.
    Association {
        /// Dotted path, e.g. `createdBy.username`.
        path: String,
    },
    /// A raw expression template with `{alias}` placeholders.
    CustomExpression {
        /// The expression template.
        expression: String,
    },
    /// No backing field; sorting and searching go to proxy targets.
    Virtual {
        /// Column name.
        name: String,
        /// Proxy order targets.
        order_columns: Vec<String>,
        /// Proxy search targets.
        search_columns: Vec<String>,
        /// Type override for sorting.
        order_column_type: Option<FieldType>,
    },
    /// No query contribution at all.
    NonSelecting,
}

/// What a column contributes to each output row.
#[derive(Debug, Clone)]
pub enum ColumnRole {
    /// A plain data cell.
    Data,
    /// A cell of row actions.
    Action {
        /// The actions.
        actions: Vec<Action>,
    },
    /// A selection checkbox. Unique per grid, first or last position only.
    Multiselect {
        /// Bulk actions offered for the selection.
        actions: Vec<Action>,
        /// Per-row checkbox visibility.
        render_if: Option<RowPredicate>,
    },
}

/// A row action rendered in an action or multiselect column.
#[derive(Debug, Clone, Default)]
pub struct Action {
    /// Route name.
    pub route: Option<String>,
    /// Button label.
    pub label: Option<String>,
    attributes: IndexMap<String, String>,
    render_if: Option<RowPredicate>,
}

impl Action {
    /// Create an action with a label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Set the route.
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Set HTML attributes. `href` and `value` are generated and may not be set.
    pub fn attributes(
        mut self,
        attributes: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> QueryResult<Self> {
        let attributes: IndexMap<String, String> = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        for forbidden in ["href", "value"] {
            if attributes.contains_key(forbidden) {
                return Err(QueryError::new(
                    ErrorCode::InvalidActionAttribute,
                    format!("The {} attribute is not allowed in this context", forbidden),
                ));
            }
        }
        self.attributes = attributes;
        Ok(self)
    }

    /// Only show the action for rows matching the predicate.
    pub fn render_if(mut self, predicate: RowPredicate) -> Self {
        self.render_if = Some(predicate);
        self
    }

    /// Get the HTML attributes.
    pub fn get_attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    /// Check if the action is shown for a row.
    pub fn is_visible(&self, row: &Row) -> bool {
        self.render_if.as_ref().is_none_or(|p| p.call(row))
    }
}

/// A built column descriptor.
#[derive(Debug, Clone)]
pub struct Column {
    /// Dense position, stable for the lifetime of the model.
    pub index: usize,
    /// Output key of the cell.
    pub data: String,
    /// Backing.
    pub kind: ColumnKind,
    /// Output role.
    pub role: ColumnRole,
    /// Participates in searches.
    pub searchable: bool,
    /// Participates in sorting.
    pub orderable: bool,
    /// Shown by the client.
    pub visible: bool,
    /// Column title.
    pub title: Option<String>,
    /// Predicate generator.
    pub filter: FilterStrategy,
    /// Effective scalar type.
    pub type_of_field: Option<FieldType>,
    /// Mapped scalar type before any override.
    pub original_type_of_field: Option<FieldType>,
    /// Cardinality of each association hop.
    pub association_types: Vec<Cardinality>,
    /// Join used for association hops.
    pub join_type: JoinType,
    /// Search group name.
    pub search_column_group: Option<String>,
    /// Kept in the output rows.
    pub sent_in_response: bool,
    /// Cell renderer.
    pub renderer: Option<CellRenderer>,
}

impl Column {
    /// The query-language path or expression of this column.
    pub fn dql(&self) -> Option<&str> {
        match &self.kind {
            ColumnKind::Direct { field } => Some(field),
            ColumnKind::Association { path } => Some(path),
            ColumnKind::CustomExpression { expression } => Some(expression),
            ColumnKind::Virtual { name, .. } => Some(name),
            ColumnKind::NonSelecting => None,
        }
    }

    /// Check if this column is backed by a custom expression.
    pub fn is_custom_expression(&self) -> bool {
        matches!(self.kind, ColumnKind::CustomExpression { .. })
    }

    /// Check if this column goes through an association.
    pub fn is_association(&self) -> bool {
        matches!(self.kind, ColumnKind::Association { .. })
    }

    /// Check if any association hop yields a collection.
    pub fn is_to_many_association(&self) -> bool {
        self.is_association() && self.association_types.iter().any(Cardinality::is_to_many)
    }

    /// Check if the column adds to the SELECT clause.
    pub fn is_select_column(&self) -> bool {
        matches!(
            self.kind,
            ColumnKind::Direct { .. }
                | ColumnKind::Association { .. }
                | ColumnKind::CustomExpression { .. }
        )
    }

    /// Check if only one column of this type is allowed.
    pub fn is_unique(&self) -> bool {
        matches!(self.role, ColumnRole::Multiselect { .. })
    }

    /// Positions this column may occupy, `None` meaning anywhere.
    pub fn allowed_positions(&self) -> Option<&'static [Position]> {
        match self.role {
            ColumnRole::Multiselect { .. } => Some(&[Position::Index(0), Position::Last]),
            _ => None,
        }
    }

    /// Type name of the column.
    pub fn column_type(&self) -> &'static str {
        match (&self.role, &self.kind) {
            (ColumnRole::Action { .. }, _) => "action_column",
            (ColumnRole::Multiselect { .. }, _) => "multiselect_column",
            (_, ColumnKind::Virtual { .. }) => "virtual_column",
            _ => "column",
        }
    }

    /// Add per-row data the client needs, such as action visibility.
    pub fn add_data_to_output(&self, row: &mut Row) {
        match &self.role {
            ColumnRole::Data => {}
            ColumnRole::Action { actions } => {
                let flags: Vec<Value> = actions
                    .iter()
                    .map(|a| Value::Bool(a.is_visible(row)))
                    .collect();
                let entry = row
                    .entry(ACTIONS_KEY)
                    .or_insert_with(|| Value::Object(Row::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Row::new());
                }
                if let Value::Object(map) = entry {
                    map.insert(self.index.to_string(), Value::Array(flags));
                }
            }
            ColumnRole::Multiselect { render_if, .. } => {
                let visible = render_if.as_ref().is_none_or(|p| p.call(row));
                row.insert(CHECKBOX_KEY.to_string(), Value::Bool(visible));
            }
        }
    }

    /// Run the cell renderer, if any.
    pub fn render_cell(&self, row: &mut Row) {
        if let Some(renderer) = &self.renderer {
            renderer.call(self, row);
        }
    }
}

/// Fluent definition of a column, turned into a [`Column`] by the builder.
#[derive(Debug, Clone)]
pub struct ColumnConfig {
    pub(crate) role: ColumnRole,
    pub(crate) is_virtual: bool,
    pub(crate) dql: Option<String>,
    pub(crate) data: Option<String>,
    pub(crate) searchable: Option<bool>,
    pub(crate) orderable: Option<bool>,
    pub(crate) visible: bool,
    pub(crate) title: Option<String>,
    pub(crate) filter: FilterStrategy,
    pub(crate) type_of_field: Option<FieldType>,
    pub(crate) join_type: JoinType,
    pub(crate) search_column_group: Option<String>,
    pub(crate) sent_in_response: bool,
    pub(crate) order_columns: Vec<String>,
    pub(crate) search_columns: Vec<String>,
    pub(crate) order_column_type: Option<FieldType>,
    pub(crate) add_if: Option<AddIf>,
    pub(crate) renderer: Option<CellRenderer>,
}

/// A build-time predicate deciding whether a column is added.
#[derive(Clone)]
pub struct AddIf(Arc<dyn Fn() -> bool + Send + Sync>);

impl AddIf {
    /// Evaluate the predicate.
    pub fn call(&self) -> bool {
        (self.0)()
    }
}

impl fmt::Debug for AddIf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AddIf(..)")
    }
}

impl ColumnConfig {
    fn with_role(role: ColumnRole) -> Self {
        Self {
            role,
            is_virtual: false,
            dql: None,
            data: None,
            searchable: None,
            orderable: None,
            visible: true,
            title: None,
            filter: FilterStrategy::default(),
            type_of_field: None,
            join_type: JoinType::default(),
            search_column_group: None,
            sent_in_response: true,
            order_columns: Vec::new(),
            search_columns: Vec::new(),
            order_column_type: None,
            add_if: None,
            renderer: None,
        }
    }

    /// A data column.
    pub fn column() -> Self {
        Self::with_role(ColumnRole::Data)
    }

    /// A virtual column, neither orderable nor searchable unless proxies are given.
    pub fn virtual_column() -> Self {
        Self {
            is_virtual: true,
            ..Self::with_role(ColumnRole::Data)
        }
    }

    /// An action column. At least one action is required.
    pub fn action(actions: Vec<Action>) -> Self {
        Self::with_role(ColumnRole::Action { actions })
    }

    /// A multiselect column.
    pub fn multiselect(actions: Vec<Action>) -> Self {
        Self::with_role(ColumnRole::Multiselect {
            actions,
            render_if: None,
        })
    }

    /// Back the column by a custom expression with `{alias}` placeholders.
    pub fn dql(mut self, expression: impl Into<String>) -> Self {
        self.dql = Some(expression.into());
        self
    }

    /// Use a different output key.
    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set searchability.
    pub fn searchable(mut self, searchable: bool) -> Self {
        self.searchable = Some(searchable);
        self
    }

    /// Set orderability.
    pub fn orderable(mut self, orderable: bool) -> Self {
        self.orderable = Some(orderable);
        self
    }

    /// Set visibility.
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the filter strategy.
    pub fn filter(mut self, filter: impl Into<FilterStrategy>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Override the scalar type.
    pub fn type_of_field(mut self, type_of_field: impl Into<FieldType>) -> Self {
        self.type_of_field = Some(type_of_field.into());
        self
    }

    /// Set the join used for association hops.
    pub fn join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }

    /// Put the column into a search group.
    pub fn search_column_group(mut self, group: impl Into<String>) -> Self {
        self.search_column_group = Some(group.into());
        self
    }

    /// Keep or drop the cell from the output rows.
    pub fn sent_in_response(mut self, sent: bool) -> Self {
        self.sent_in_response = sent;
        self
    }

    /// Add a proxy order target (virtual columns).
    pub fn order_column(mut self, target: impl Into<String>) -> Self {
        self.order_columns.push(target.into());
        self
    }

    /// Add a proxy search target (virtual columns).
    pub fn search_column(mut self, target: impl Into<String>) -> Self {
        self.search_columns.push(target.into());
        self
    }

    /// Override the type used to sort a virtual column.
    pub fn order_column_type_of_field(mut self, type_of_field: impl Into<FieldType>) -> Self {
        self.order_column_type = Some(type_of_field.into());
        self
    }

    /// Only add the column when the predicate holds at build time.
    pub fn add_if(mut self, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.add_if = Some(AddIf(Arc::new(predicate)));
        self
    }

    /// Set the per-row checkbox predicate of a multiselect column.
    pub fn render_if(mut self, predicate: RowPredicate) -> Self {
        if let ColumnRole::Multiselect { render_if, .. } = &mut self.role {
            *render_if = Some(predicate);
        }
        self
    }

    /// Set the cell renderer.
    pub fn renderer(mut self, renderer: CellRenderer) -> Self {
        self.renderer = Some(renderer);
        self
    }
}
