//! Column model construction.
//!
//! The [`ColumnBuilder`] validates column definitions against entity
//! metadata and produces an immutable [`ColumnModel`] with dense indexes and
//! a name lookup.
//!
//! ```rust
//! use datagrid_query::builder::ColumnBuilder;
//! use datagrid_query::column::ColumnConfig;
//! use datagrid_query::metadata::{EntityMetadata, StaticMetadata};
//! use datagrid_query::types::FieldType;
//!
//! let metadata = StaticMetadata::new().entity(
//!     EntityMetadata::new("Post", "posts")
//!         .field("id", FieldType::Integer)
//!         .field("title", FieldType::String),
//! );
//!
//! let model = ColumnBuilder::new(&metadata, "Post", "post_grid")
//!     .unwrap()
//!     .add(Some("id"), ColumnConfig::column())
//!     .unwrap()
//!     .add(Some("title"), ColumnConfig::column().searchable(true))
//!     .unwrap()
//!     .build();
//!
//! assert_eq!(model.index_of("title"), Some(1));
//! assert_eq!(model.get(0).unwrap().type_of_field.as_ref().unwrap().as_str(), "integer");
//! ```

use indexmap::IndexMap;
use tracing::debug;

use crate::column::{Column, ColumnConfig, ColumnKind, ColumnRole};
use crate::error::{QueryError, QueryResult};
use crate::metadata::{EntityMetadata, MetadataProvider};
use crate::types::{Cardinality, FieldType};

/// Built columns and their name lookup. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct ColumnModel {
    columns: Vec<Column>,
    names: IndexMap<String, usize>,
}

impl ColumnModel {
    /// All columns in index order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column at an index.
    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Column by name.
    pub fn by_name(&self, name: &str) -> Option<&Column> {
        self.index_of(name).and_then(|i| self.get(i))
    }

    /// Name to index map.
    pub fn names(&self) -> &IndexMap<String, usize> {
        &self.names
    }

    /// The unique column of a type, if present.
    pub fn unique_column(&self, column_type: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.is_unique() && c.column_type() == column_type)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Builds a [`ColumnModel`] for one root entity.
pub struct ColumnBuilder<'a> {
    metadata: &'a dyn MetadataProvider,
    entity: &'a EntityMetadata,
    grid_name: String,
    columns: Vec<Column>,
    names: IndexMap<String, usize>,
}

impl<'a> ColumnBuilder<'a> {
    /// Create a builder for a root entity.
    pub fn new(
        metadata: &'a dyn MetadataProvider,
        entity: &str,
        grid_name: impl Into<String>,
    ) -> QueryResult<Self> {
        Ok(Self {
            metadata,
            entity: metadata.metadata_for(entity)?,
            grid_name: grid_name.into(),
            columns: Vec::new(),
            names: IndexMap::new(),
        })
    }

    /// Add a column.
    ///
    /// `dql` is the data path of the column (`title`, `createdBy.username`)
    /// or, for custom expression columns, the output name. Columns without
    /// any backing field (actions, multiselect) pass `None`.
    pub fn add(mut self, dql: Option<&str>, config: ColumnConfig) -> QueryResult<Self> {
        let column = self.make_column(dql, config)?;
        let Some(mut column) = column else {
            debug!(grid = %self.grid_name, column = ?dql, "Column skipped by add_if");
            return Ok(self);
        };

        if column.is_unique() && self.columns.iter().any(|c| c.column_type() == column.column_type()) {
            return Err(QueryError::duplicate_unique_column(column.column_type())
                .with_grid(&self.grid_name));
        }

        let index = self.columns.len();
        column.index = index;
        if column.data.is_empty() {
            column.data = index.to_string();
        }
        if let Some(name) = dql {
            self.names.insert(name.to_string(), index);
        }

        debug!(grid = %self.grid_name, index, data = %column.data, kind = column.column_type(), "Column added");
        self.columns.push(column);
        Ok(self)
    }

    /// Add a column only when `condition` holds.
    pub fn add_when(self, condition: bool, dql: Option<&str>, config: ColumnConfig) -> QueryResult<Self> {
        if condition { self.add(dql, config) } else { Ok(self) }
    }

    /// Remove a column by name and re-index the rest.
    pub fn remove(mut self, dql: &str) -> Self {
        let position = self
            .names
            .get(dql)
            .copied()
            .or_else(|| self.columns.iter().position(|c| c.dql() == Some(dql)));
        let Some(position) = position else {
            return self;
        };
        self.columns.remove(position);
        self.names.retain(|_, index| *index != position);

        for (index, column) in self.columns.iter_mut().enumerate() {
            if column.data == column.index.to_string() {
                column.data = index.to_string();
            }
            column.index = index;
        }
        for index in self.names.values_mut() {
            if *index > position {
                *index -= 1;
            }
        }
        self
    }

    /// Finish building.
    pub fn build(self) -> ColumnModel {
        ColumnModel {
            columns: self.columns,
            names: self.names,
        }
    }

    fn make_column(&self, dql: Option<&str>, config: ColumnConfig) -> QueryResult<Option<Column>> {
        let ColumnConfig {
            role,
            is_virtual,
            dql: custom,
            data,
            searchable,
            orderable,
            visible,
            title,
            filter,
            type_of_field,
            join_type,
            search_column_group,
            sent_in_response,
            order_columns,
            search_columns,
            order_column_type,
            add_if,
            renderer,
        } = config;

        let column_name = dql.unwrap_or_default().to_string();

        if let ColumnRole::Action { actions } = &role {
            if actions.is_empty() {
                return Err(QueryError::configuration(
                    "An action column needs at least one action",
                )
                .with_grid(&self.grid_name)
                .with_column(&column_name));
            }
        }

        filter
            .validate()
            .map_err(|e| e.with_grid(&self.grid_name).with_column(&column_name))?;

        let kind = if is_virtual {
            if orderable == Some(true) && order_columns.is_empty() {
                return Err(QueryError::configuration(
                    "For the orderable option, order_column should not be null",
                )
                .with_grid(&self.grid_name)
                .with_column(&column_name));
            }
            if searchable == Some(true) && search_columns.is_empty() {
                return Err(QueryError::configuration(
                    "For the searchable option, search_column should not be null",
                )
                .with_grid(&self.grid_name)
                .with_column(&column_name));
            }
            ColumnKind::Virtual {
                name: column_name.clone(),
                order_columns,
                search_columns,
                order_column_type,
            }
        } else if let Some(expression) = custom {
            ColumnKind::CustomExpression { expression }
        } else {
            match (&role, dql) {
                (ColumnRole::Data, Some(path)) => {
                    if !is_valid_path(path) {
                        return Err(QueryError::invalid_column_path(path).with_grid(&self.grid_name));
                    }
                    if path.contains('.') {
                        ColumnKind::Association { path: path.to_string() }
                    } else {
                        ColumnKind::Direct { field: path.to_string() }
                    }
                }
                _ => ColumnKind::NonSelecting,
            }
        };

        let (association_types, original_type_of_field) = match &kind {
            ColumnKind::Direct { field } => (Vec::new(), self.entity.type_of_field(field).cloned()),
            ColumnKind::Association { path } => self.resolve_association(path)?,
            _ => (Vec::new(), None),
        };

        if let Some(predicate) = &add_if {
            if !predicate.call() {
                return Ok(None);
            }
        }

        let data_defaults_to_path = matches!(
            kind,
            ColumnKind::Direct { .. } | ColumnKind::Association { .. } | ColumnKind::CustomExpression { .. }
        ) || is_virtual;
        let data = data
            .or_else(|| data_defaults_to_path.then(|| column_name.clone()))
            .unwrap_or_default();

        let default_flag = !is_virtual && !matches!(kind, ColumnKind::NonSelecting);

        Ok(Some(Column {
            index: 0,
            data,
            searchable: searchable.unwrap_or(default_flag),
            orderable: orderable.unwrap_or(default_flag),
            kind,
            role,
            visible,
            title,
            filter,
            type_of_field: type_of_field.or_else(|| original_type_of_field.clone()),
            original_type_of_field,
            association_types,
            join_type,
            search_column_group,
            sent_in_response,
            renderer,
        }))
    }

    /// Walk an association path, collecting hop cardinalities and the final field type.
    fn resolve_association(&self, path: &str) -> QueryResult<(Vec<Cardinality>, Option<FieldType>)> {
        let mut parts: Vec<&str> = path.split('.').collect();
        let field = parts.pop().unwrap_or_default();

        let mut metadata = self.entity;
        let mut types = Vec::with_capacity(parts.len());
        for part in parts {
            let mapping = metadata
                .association_mapping(part)
                .map_err(|e| e.with_grid(&self.grid_name).with_column(path))?;
            types.push(mapping.cardinality);
            metadata = self
                .metadata
                .metadata_for(&mapping.target)
                .map_err(|e| e.with_grid(&self.grid_name).with_column(path))?;
        }

        Ok((types, metadata.type_of_field(field).cloned()))
    }
}

/// Check a data path against `^[a-zA-Z0-9_\-\.]+$`.
fn is_valid_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
