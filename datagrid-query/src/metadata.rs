//! Entity metadata consumed by the column builder and the relational planner.
//!
//! A [`MetadataProvider`] answers the questions the planner needs to turn a
//! dotted data path into joins: the identifier of an entity, the type of a
//! field, and where an association points to. [`StaticMetadata`] is an
//! in-memory provider assembled with builders.
//!
//! ```rust
//! use datagrid_query::metadata::{AssociationMetadata, EntityMetadata, MetadataProvider, StaticMetadata};
//! use datagrid_query::types::FieldType;
//!
//! let metadata = StaticMetadata::new()
//!     .entity(
//!         EntityMetadata::new("Post", "posts")
//!             .field("id", FieldType::Integer)
//!             .field("title", FieldType::String)
//!             .association("createdBy", AssociationMetadata::many_to_one("User", "created_by_id")),
//!     )
//!     .entity(EntityMetadata::new("User", "users").field("id", FieldType::Integer));
//!
//! assert!(metadata.get("Post").is_some());
//! ```

use indexmap::IndexMap;
use std::sync::Arc;

use crate::error::{QueryError, QueryResult};
use crate::sql::DatabaseType;
use crate::types::{Cardinality, FieldType};

/// A mapped scalar field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMetadata {
    /// Column name in the table.
    pub column: String,
    /// Scalar type.
    pub field_type: FieldType,
}

/// How the rows of an association are linked.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinColumns {
    /// The source table holds a foreign key to the target identifier.
    Owning {
        /// Foreign key column on the source table.
        column: String,
    },
    /// The target table holds a foreign key to the source identifier.
    Inverse {
        /// Foreign key column on the target table.
        column: String,
    },
    /// Rows are linked through a join table.
    JoinTable {
        /// Join table name.
        table: String,
        /// Column referencing the source identifier.
        source_column: String,
        /// Column referencing the target identifier.
        target_column: String,
    },
}

/// A mapped association.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationMetadata {
    /// Target entity name.
    pub target: String,
    /// Cardinality of the hop.
    pub cardinality: Cardinality,
    /// Link between source and target rows.
    pub join: JoinColumns,
}

impl AssociationMetadata {
    /// A many-to-one association with the foreign key on the source table.
    pub fn many_to_one(target: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            cardinality: Cardinality::ManyToOne,
            join: JoinColumns::Owning {
                column: column.into(),
            },
        }
    }

    /// A one-to-one association with the foreign key on the source table.
    pub fn one_to_one(target: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            cardinality: Cardinality::OneToOne,
            ..Self::many_to_one(target, column)
        }
    }

    /// A one-to-many association with the foreign key on the target table.
    pub fn one_to_many(target: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            cardinality: Cardinality::OneToMany,
            join: JoinColumns::Inverse {
                column: column.into(),
            },
        }
    }

    /// A many-to-many association through a join table.
    pub fn many_to_many(
        target: impl Into<String>,
        table: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            cardinality: Cardinality::ManyToMany,
            join: JoinColumns::JoinTable {
                table: table.into(),
                source_column: source_column.into(),
                target_column: target_column.into(),
            },
        }
    }
}

/// Mapping information for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMetadata {
    /// Entity name, possibly namespaced (`App\Entity\Post`, `blog::Post`).
    pub name: String,
    /// Table name.
    pub table: String,
    /// Identifier field names, first one is used for counting and hydration.
    pub identifier: Vec<String>,
    /// Scalar fields.
    pub fields: IndexMap<String, FieldMetadata>,
    /// Associations.
    pub associations: IndexMap<String, AssociationMetadata>,
}

impl EntityMetadata {
    /// Create metadata with an `id` identifier.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            identifier: vec!["id".to_string()],
            fields: IndexMap::new(),
            associations: IndexMap::new(),
        }
    }

    /// Set the identifier fields.
    pub fn identifier(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.identifier = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Add a field stored in a column of the same name.
    pub fn field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        self.field_with_column(name.clone(), name, field_type)
    }

    /// Add a field stored in a differently named column.
    pub fn field_with_column(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        self.fields.insert(
            name.into(),
            FieldMetadata {
                column: column.into(),
                field_type,
            },
        );
        self
    }

    /// Add an association.
    pub fn association(mut self, name: impl Into<String>, association: AssociationMetadata) -> Self {
        self.associations.insert(name.into(), association);
        self
    }

    /// Lowercased short name, without any namespace.
    pub fn short_name(&self) -> String {
        self.name
            .rsplit(['\\', ':'])
            .next()
            .unwrap_or(&self.name)
            .to_lowercase()
    }

    /// The first identifier field.
    pub fn primary_identifier(&self) -> QueryResult<&str> {
        self.identifier.first().map(String::as_str).ok_or_else(|| {
            QueryError::unresolvable_metadata(&self.name, "entity has no identifier")
        })
    }

    /// Column name of a field, falling back to the field name.
    pub fn column_name<'a>(&'a self, field: &'a str) -> &'a str {
        self.fields
            .get(field)
            .map(|f| f.column.as_str())
            .unwrap_or(field)
    }

    /// Type of a field, if mapped.
    pub fn type_of_field(&self, field: &str) -> Option<&FieldType> {
        self.fields.get(field).map(|f| &f.field_type)
    }

    /// Look up an association, failing if it is not mapped.
    pub fn association_mapping(&self, name: &str) -> QueryResult<&AssociationMetadata> {
        self.associations.get(name).ok_or_else(|| {
            QueryError::unresolvable_metadata(
                &self.name,
                format!("\"{}\" is not an association", name),
            )
        })
    }
}

/// Source of entity metadata.
pub trait MetadataProvider: Send + Sync {
    /// Get metadata for an entity by name.
    fn get(&self, entity: &str) -> Option<&EntityMetadata>;

    /// The platform whose reserved keywords constrain aliases.
    ///
    /// `None` means no keyword list is available and nothing is escaped.
    fn platform(&self) -> Option<DatabaseType> {
        None
    }

    /// Get metadata for an entity, failing if it is unknown.
    fn metadata_for(&self, entity: &str) -> QueryResult<&EntityMetadata> {
        self.get(entity)
            .ok_or_else(|| QueryError::unresolvable_metadata(entity, "not a mapped entity"))
    }

    /// Get the target metadata of an association.
    fn association_target(
        &self,
        source: &EntityMetadata,
        association: &str,
    ) -> QueryResult<&EntityMetadata> {
        let mapping = source.association_mapping(association)?;
        self.metadata_for(&mapping.target)
    }
}

impl<T: MetadataProvider + ?Sized> MetadataProvider for Arc<T> {
    fn get(&self, entity: &str) -> Option<&EntityMetadata> {
        (**self).get(entity)
    }

    fn platform(&self) -> Option<DatabaseType> {
        (**self).platform()
    }
}

/// An in-memory metadata registry.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    entities: IndexMap<String, EntityMetadata>,
    platform: Option<DatabaseType>,
}

impl StaticMetadata {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity.
    pub fn entity(mut self, metadata: EntityMetadata) -> Self {
        self.entities.insert(metadata.name.clone(), metadata);
        self
    }

    /// Set the platform used for reserved keyword checks.
    pub fn with_platform(mut self, platform: DatabaseType) -> Self {
        self.platform = Some(platform);
        self
    }
}

impl MetadataProvider for StaticMetadata {
    fn get(&self, entity: &str) -> Option<&EntityMetadata> {
        self.entities.get(entity)
    }

    fn platform(&self) -> Option<DatabaseType> {
        self.platform
    }
}
