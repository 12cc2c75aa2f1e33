//! Relational query builder.
//!
//! [`QueryBuilder`] is a cloneable, object-level description of a query: it
//! selects fields at aliases, joins associations by name and filters with
//! [`Expr`] trees over numbered [`Parameters`]. Entity metadata turns it into
//! dialect SQL only when it is rendered, so the executor can clone a base
//! builder per call and apply clauses without mutating shared state.
//!
//! ```rust
//! use datagrid_query::filter::{Expr, FieldRef, SearchOperator};
//! use datagrid_query::metadata::{EntityMetadata, StaticMetadata};
//! use datagrid_query::query::QueryBuilder;
//! use datagrid_query::sql::DatabaseType;
//! use datagrid_query::types::{FieldType, SortOrder};
//!
//! let metadata = StaticMetadata::new().entity(
//!     EntityMetadata::new("Post", "posts")
//!         .field("id", FieldType::Integer)
//!         .field("title", FieldType::String),
//! );
//!
//! let mut qb = QueryBuilder::new("Post", "post");
//! qb.add_select_partial("post", ["id", "title"])
//!     .and_where(Expr::Condition {
//!         field: FieldRef::path("post", "title"),
//!         operator: SearchOperator::Eq,
//!         param: Some(1),
//!     })
//!     .set_parameter(1, "Hello")
//!     .add_order_by(FieldRef::path("post", "id"), SortOrder::Desc)
//!     .set_max_results(Some(10));
//!
//! let (sql, params) = qb.to_sql(&metadata, DatabaseType::PostgreSQL).unwrap();
//! assert_eq!(
//!     sql,
//!     "SELECT post.id AS \"post.id\", post.title AS \"post.title\" FROM posts post \
//!      WHERE post.title = $1 ORDER BY post.id DESC LIMIT 10"
//! );
//! assert_eq!(params.len(), 1);
//! ```

use indexmap::IndexMap;
use std::fmt;

use crate::error::{QueryError, QueryResult};
use crate::filter::{Expr, FieldRef, FilterValue, Parameters};
use crate::metadata::{EntityMetadata, JoinColumns, MetadataProvider};
use crate::sql::{DatabaseType, SqlBuilder};
use crate::types::{JoinType, SortOrder};

/// One item of the SELECT clause.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// Fields of an alias, labelled `alias.field`.
    Partial {
        /// Join or root alias.
        alias: String,
        /// Selected fields.
        fields: Vec<String>,
    },
    /// A raw expression with a label.
    Expression {
        /// Expression text.
        expression: String,
        /// Output label.
        label: String,
    },
    /// `COUNT([DISTINCT] field)`.
    Count {
        /// Counted field.
        field: FieldRef,
        /// Count distinct values.
        distinct: bool,
        /// Output label.
        label: String,
    },
}

/// An association join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    /// Alias the association is read from.
    pub parent: String,
    /// Association name.
    pub association: String,
    /// Alias of the joined entity.
    pub alias: String,
    /// Join kind.
    pub join_type: JoinType,
}

/// A cloneable relational query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    entity: String,
    root_alias: String,
    distinct: bool,
    select: Vec<SelectItem>,
    joins: Vec<JoinClause>,
    condition: Expr,
    group_by: Vec<String>,
    order_by: Vec<(FieldRef, SortOrder)>,
    first_result: Option<u64>,
    max_results: Option<u64>,
    parameters: Parameters,
}

impl QueryBuilder {
    /// Create a query over an entity.
    pub fn new(entity: impl Into<String>, root_alias: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            root_alias: root_alias.into(),
            distinct: false,
            select: Vec::new(),
            joins: Vec::new(),
            condition: Expr::None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            first_result: None,
            max_results: None,
            parameters: Parameters::new(),
        }
    }

    /// Root entity name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Root alias.
    pub fn root_alias(&self) -> &str {
        &self.root_alias
    }

    /// Select distinct rows.
    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    /// Select fields at an alias, merging with earlier partial selects of the same alias.
    pub fn add_select_partial(
        &mut self,
        alias: &str,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        let fields = fields.into_iter().map(Into::into);
        let existing = self.select.iter_mut().find_map(|item| match item {
            SelectItem::Partial { alias: a, fields } if a == alias => Some(fields),
            _ => None,
        });
        match existing {
            Some(existing) => {
                for field in fields {
                    if !existing.contains(&field) {
                        existing.push(field);
                    }
                }
            }
            None => self.select.push(SelectItem::Partial {
                alias: alias.to_string(),
                fields: fields.collect(),
            }),
        }
        self
    }

    /// Select a labelled raw expression.
    pub fn add_select_expression(&mut self, expression: impl Into<String>, label: impl Into<String>) -> &mut Self {
        self.select.push(SelectItem::Expression {
            expression: expression.into(),
            label: label.into(),
        });
        self
    }

    /// Replace the SELECT clause with a single item.
    pub fn select(&mut self, item: SelectItem) -> &mut Self {
        self.select = vec![item];
        self
    }

    /// Current SELECT items.
    pub fn select_items(&self) -> &[SelectItem] {
        &self.select
    }

    /// Join an association. Joining the same alias twice is a no-op.
    pub fn add_join(&mut self, join: JoinClause) -> &mut Self {
        if !self.joins.iter().any(|j| j.alias == join.alias) {
            self.joins.push(join);
        }
        self
    }

    /// Current joins.
    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    /// AND a condition onto the WHERE clause.
    pub fn and_where(&mut self, expr: Expr) -> &mut Self {
        let condition = std::mem::take(&mut self.condition);
        self.condition = condition.and_then(expr);
        self
    }

    /// Current WHERE condition.
    pub fn condition(&self) -> &Expr {
        &self.condition
    }

    /// Bind a parameter.
    pub fn set_parameter(&mut self, key: usize, value: impl Into<FilterValue>) -> &mut Self {
        self.parameters.set(key, value);
        self
    }

    /// Bound parameters.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Mutable access to the bound parameters.
    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    /// Add a GROUP BY expression.
    pub fn add_group_by(&mut self, expression: impl Into<String>) -> &mut Self {
        self.group_by.push(expression.into());
        self
    }

    /// Check if the query is grouped.
    pub fn has_group_by(&self) -> bool {
        !self.group_by.is_empty()
    }

    /// Append a sort.
    pub fn add_order_by(&mut self, field: FieldRef, order: SortOrder) -> &mut Self {
        self.order_by.push((field, order));
        self
    }

    /// Current sorts.
    pub fn order_by(&self) -> &[(FieldRef, SortOrder)] {
        &self.order_by
    }

    /// Drop every sort.
    pub fn reset_order_by(&mut self) -> &mut Self {
        self.order_by.clear();
        self
    }

    /// Set the offset.
    pub fn set_first_result(&mut self, first: Option<u64>) -> &mut Self {
        self.first_result = first;
        self
    }

    /// Set the limit.
    pub fn set_max_results(&mut self, max: Option<u64>) -> &mut Self {
        self.max_results = max;
        self
    }

    /// The offset.
    pub fn first_result(&self) -> Option<u64> {
        self.first_result
    }

    /// The limit.
    pub fn max_results(&self) -> Option<u64> {
        self.max_results
    }

    /// Render to SQL and positional parameters.
    pub fn to_sql(
        &self,
        metadata: &dyn MetadataProvider,
        dialect: DatabaseType,
    ) -> QueryResult<(String, Vec<FilterValue>)> {
        let mut builder = SqlBuilder::new(dialect);
        self.write_sql(&mut builder, metadata)?;
        Ok(builder.build())
    }

    /// Render into an existing builder, for use as a sub-select.
    pub fn write_sql(&self, builder: &mut SqlBuilder, metadata: &dyn MetadataProvider) -> QueryResult<()> {
        let aliases = self.alias_entities(metadata)?;
        let dialect = builder.db_type();
        let resolve = |field: &FieldRef| -> QueryResult<String> {
            match field {
                FieldRef::Path { alias, field } => {
                    let entity = aliases.get(alias.as_str()).ok_or_else(|| {
                        QueryError::invalid_column_path(format!("{}.{}", alias, field))
                            .with_help(format!("\"{}\" is not a joined alias", alias))
                    })?;
                    Ok(format!("{}.{}", alias, dialect.quote(entity.column_name(field))))
                }
                FieldRef::Label(label) => Ok(dialect.quote(label)),
                FieldRef::Expression(expression) => Ok(expression.clone()),
            }
        };

        builder.push("SELECT ");
        if self.distinct {
            builder.push("DISTINCT ");
        }
        if self.select.is_empty() {
            builder.push(format!("{}.*", self.root_alias));
        }
        let mut first = true;
        for item in &self.select {
            match item {
                SelectItem::Partial { alias, fields } => {
                    for field in fields {
                        if !first {
                            builder.push(", ");
                        }
                        first = false;
                        let target = resolve(&FieldRef::path(alias.as_str(), field.as_str()))?;
                        builder.push(format!("{} AS {}", target, dialect.quote(&format!("{}.{}", alias, field))));
                    }
                }
                SelectItem::Expression { expression, label } => {
                    if !first {
                        builder.push(", ");
                    }
                    first = false;
                    builder.push(format!("{} AS {}", expression, dialect.quote(label)));
                }
                SelectItem::Count { field, distinct, label } => {
                    if !first {
                        builder.push(", ");
                    }
                    first = false;
                    let distinct = if *distinct { "DISTINCT " } else { "" };
                    builder.push(format!("COUNT({}{}) AS {}", distinct, resolve(field)?, dialect.quote(label)));
                }
            }
        }

        let root = metadata.metadata_for(&self.entity)?;
        builder.push(format!(" FROM {} {}", dialect.quote(&root.table), self.root_alias));

        for join in &self.joins {
            self.write_join(builder, join, &aliases, metadata)?;
        }

        if !self.condition.is_none() {
            builder.push(" WHERE ");
            self.condition.write_sql(builder, &self.parameters, &resolve)?;
        }

        if !self.group_by.is_empty() {
            builder.push(" GROUP BY ").push(self.group_by.join(", "));
        }

        if !self.order_by.is_empty() {
            builder.push(" ORDER BY ");
            for (i, (field, order)) in self.order_by.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                builder.push(format!("{} {}", resolve(field)?, order.as_sql()));
            }
        }

        match (self.max_results, self.first_result) {
            (Some(max), first) => {
                builder.push(format!(" LIMIT {}", max));
                if let Some(first) = first.filter(|f| *f > 0) {
                    builder.push(format!(" OFFSET {}", first));
                }
            }
            (None, Some(first)) if first > 0 => match dialect {
                DatabaseType::PostgreSQL => {
                    builder.push(format!(" OFFSET {}", first));
                }
                DatabaseType::MySQL | DatabaseType::SQLite => {
                    builder.push(format!(" LIMIT {} OFFSET {}", i64::MAX, first));
                }
            },
            _ => {}
        }

        Ok(())
    }

    /// Map every alias to its entity metadata.
    fn alias_entities<'m>(
        &self,
        metadata: &'m dyn MetadataProvider,
    ) -> QueryResult<IndexMap<&str, &'m EntityMetadata>> {
        let mut aliases = IndexMap::new();
        aliases.insert(self.root_alias.as_str(), metadata.metadata_for(&self.entity)?);
        for join in &self.joins {
            let parent = aliases.get(join.parent.as_str()).copied().ok_or_else(|| {
                QueryError::invalid_column_path(format!("{}.{}", join.parent, join.association))
                    .with_help("joins must be added after the join of their parent alias")
            })?;
            let target = metadata.association_target(parent, &join.association)?;
            aliases.insert(join.alias.as_str(), target);
        }
        Ok(aliases)
    }

    fn write_join(
        &self,
        builder: &mut SqlBuilder,
        join: &JoinClause,
        aliases: &IndexMap<&str, &EntityMetadata>,
        metadata: &dyn MetadataProvider,
    ) -> QueryResult<()> {
        let dialect = builder.db_type();
        let parent = aliases.get(join.parent.as_str()).copied().ok_or_else(|| {
            QueryError::invalid_column_path(format!("{}.{}", join.parent, join.association))
        })?;
        let mapping = parent.association_mapping(&join.association)?;
        let target = metadata.metadata_for(&mapping.target)?;
        let keyword = join.join_type.as_sql();
        let target_id = dialect.quote(target.column_name(target.primary_identifier()?));

        match &mapping.join {
            JoinColumns::Owning { column } => {
                builder.push(format!(
                    " {} {} {} ON {}.{} = {}.{}",
                    keyword,
                    dialect.quote(&target.table),
                    join.alias,
                    join.alias,
                    target_id,
                    join.parent,
                    dialect.quote(column)
                ));
            }
            JoinColumns::Inverse { column } => {
                let parent_id = dialect.quote(parent.column_name(parent.primary_identifier()?));
                builder.push(format!(
                    " {} {} {} ON {}.{} = {}.{}",
                    keyword,
                    dialect.quote(&target.table),
                    join.alias,
                    join.alias,
                    dialect.quote(column),
                    join.parent,
                    parent_id
                ));
            }
            JoinColumns::JoinTable {
                table,
                source_column,
                target_column,
            } => {
                let parent_id = dialect.quote(parent.column_name(parent.primary_identifier()?));
                let link = format!("{}_link", join.alias);
                builder.push(format!(
                    " {} {} {} ON {}.{} = {}.{}",
                    keyword,
                    dialect.quote(table),
                    link,
                    link,
                    dialect.quote(source_column),
                    join.parent,
                    parent_id
                ));
                builder.push(format!(
                    " {} {} {} ON {}.{} = {}.{}",
                    keyword,
                    dialect.quote(&target.table),
                    join.alias,
                    join.alias,
                    target_id,
                    link,
                    dialect.quote(target_column)
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for QueryBuilder {
    /// Object-level rendering, for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self
            .select
            .iter()
            .map(|item| match item {
                SelectItem::Partial { alias, fields } => format!("partial {}.{{{}}}", alias, fields.join(",")),
                SelectItem::Expression { expression, label } => format!("{} {}", expression, label),
                SelectItem::Count { field, distinct, .. } => {
                    format!("count({}{})", if *distinct { "distinct " } else { "" }, field)
                }
            })
            .collect();
        write!(f, "SELECT {} FROM {} {}", items.join(", "), self.entity, self.root_alias)?;
        for join in &self.joins {
            write!(f, " {} {}.{} {}", join.join_type.as_sql(), join.parent, join.association, join.alias)?;
        }
        if !self.condition.is_none() {
            write!(f, " WHERE {}", self.condition)?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY {}", self.group_by.join(", "))?;
        }
        if !self.order_by.is_empty() {
            let sorts: Vec<String> = self
                .order_by
                .iter()
                .map(|(field, order)| format!("{} {}", field, order.as_sql()))
                .collect();
            write!(f, " ORDER BY {}", sorts.join(", "))?;
        }
        Ok(())
    }
}
