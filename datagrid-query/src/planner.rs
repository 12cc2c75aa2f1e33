//! Column path resolution for the relational variant.
//!
//! [`ResolutionTables::resolve`] walks the column model once and computes,
//! per column index, where the column is selected from, what a predicate on
//! it targets, and what sorting it targets. Association hops become join
//! requests keyed by relation path (`post.createdBy`), so a hop shared by
//! several columns is joined once.

use indexmap::IndexMap;
use tracing::debug;

use crate::builder::ColumnModel;
use crate::column::ColumnKind;
use crate::error::QueryResult;
use crate::filter::FieldRef;
use crate::metadata::{EntityMetadata, MetadataProvider};
use crate::sql::safe_name;
use crate::types::JoinType;

/// A deduplicated join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Alias of the joined entity.
    pub alias: String,
    /// Alias the association is read from.
    pub parent_alias: String,
    /// Association name on the parent.
    pub association: String,
    /// Join kind.
    pub join_type: JoinType,
    /// Whether the hop yields a collection.
    pub to_many: bool,
    /// Identifier field of the joined entity.
    pub identifier: String,
}

/// A raw select expression with its output label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectExpression {
    /// Expression text.
    pub expression: String,
    /// Output label.
    pub label: String,
}

/// Index-aligned query targets for a column model.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionTables {
    /// Root alias.
    pub root_alias: String,
    /// Root identifier field.
    pub root_identifier: String,
    /// Partial selections per alias, root first.
    pub select_targets: IndexMap<String, Vec<String>>,
    /// Raw select expressions.
    pub select_expressions: Vec<SelectExpression>,
    /// Predicate targets per column index.
    pub search_targets: Vec<Option<Vec<FieldRef>>>,
    /// Sort targets per column index.
    pub order_targets: Vec<Option<Vec<FieldRef>>>,
    /// Joins keyed by relation path.
    pub joins: IndexMap<String, JoinRequest>,
}

impl ResolutionTables {
    /// Resolve every column of a model against the root entity.
    pub fn resolve(
        columns: &ColumnModel,
        root: &EntityMetadata,
        metadata: &dyn MetadataProvider,
    ) -> QueryResult<Self> {
        let platform = metadata.platform();
        let root_alias = safe_name(&root.short_name(), platform);
        let root_identifier = root.primary_identifier()?.to_string();

        let mut tables = Self {
            root_alias: root_alias.clone(),
            root_identifier: root_identifier.clone(),
            select_targets: IndexMap::new(),
            select_expressions: Vec::new(),
            search_targets: Vec::with_capacity(columns.len()),
            order_targets: Vec::with_capacity(columns.len()),
            joins: IndexMap::new(),
        };
        tables.add_select(&root_alias, &root_identifier);

        for column in columns.columns() {
            match &column.kind {
                ColumnKind::CustomExpression { expression } => {
                    let label = column.data.replace('.', "_");
                    tables.select_expressions.push(SelectExpression {
                        expression: replace_placeholders(expression, ""),
                        label: label.clone(),
                    });
                    tables
                        .order_targets
                        .push(column.orderable.then(|| vec![FieldRef::Label(label)]));
                    tables.search_targets.push(column.searchable.then(|| {
                        vec![FieldRef::Expression(replace_placeholders(expression, "_search"))]
                    }));
                }
                ColumnKind::Direct { field: path } | ColumnKind::Association { path } => {
                    let mut parts: Vec<&str> = path.split('.').collect();
                    let field = parts.pop().unwrap_or_default();

                    let mut current_part = root_alias.clone();
                    let mut current_alias = root_alias.clone();
                    let mut entity = root;

                    for part in parts {
                        let previous_part = current_part;
                        let previous_alias = current_alias;

                        let alias = if previous_part == root_alias {
                            part.to_string()
                        } else {
                            format!("{}_{}", previous_part, part)
                        };
                        current_alias = safe_name(&alias, platform);
                        current_part = part.to_string();

                        let mapping = entity.association_mapping(part)?;
                        let target = metadata.metadata_for(&mapping.target)?;
                        let identifier = target.primary_identifier()?.to_string();

                        let relation = format!("{}.{}", previous_alias, part);
                        if !tables.joins.contains_key(&relation) {
                            tables.joins.insert(
                                relation,
                                JoinRequest {
                                    alias: current_alias.clone(),
                                    parent_alias: previous_alias,
                                    association: part.to_string(),
                                    join_type: column.join_type,
                                    to_many: mapping.cardinality.is_to_many(),
                                    identifier: identifier.clone(),
                                },
                            );
                        }
                        tables.add_select(&current_alias, &identifier);
                        entity = target;
                    }

                    let identifier = entity.primary_identifier()?.to_string();
                    tables.add_select(&current_alias, &identifier);
                    tables.add_select(&current_alias, field);

                    let target = FieldRef::path(current_alias.as_str(), field);
                    tables
                        .order_targets
                        .push(column.orderable.then(|| vec![target.clone()]));
                    tables
                        .search_targets
                        .push(column.searchable.then(|| vec![target]));
                }
                ColumnKind::Virtual {
                    order_columns,
                    search_columns,
                    ..
                } => {
                    let order = (column.orderable && !order_columns.is_empty()).then(|| {
                        order_columns
                            .iter()
                            .map(|target| {
                                let names_custom = columns
                                    .by_name(target)
                                    .is_some_and(|c| c.is_custom_expression());
                                if !target.contains('.') && !names_custom {
                                    FieldRef::path(root_alias.as_str(), target.as_str())
                                } else {
                                    FieldRef::parse(target)
                                }
                            })
                            .collect()
                    });
                    let search = (column.searchable && !search_columns.is_empty()).then(|| {
                        search_columns
                            .iter()
                            .map(|target| {
                                if target.contains('.') {
                                    FieldRef::parse(target)
                                } else {
                                    FieldRef::path(root_alias.as_str(), target.as_str())
                                }
                            })
                            .collect()
                    });
                    tables.order_targets.push(order);
                    tables.search_targets.push(search);
                }
                ColumnKind::NonSelecting => {
                    tables.order_targets.push(None);
                    tables.search_targets.push(None);
                }
            }
        }

        debug!(
            root = %tables.root_alias,
            joins = tables.joins.len(),
            expressions = tables.select_expressions.len(),
            "Resolved column targets"
        );
        Ok(tables)
    }

    /// Select a field at an alias, once.
    fn add_select(&mut self, alias: &str, field: &str) {
        let fields = self.select_targets.entry(alias.to_string()).or_default();
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }

    /// Join for an alias, if the alias is not the root.
    pub fn join_for_alias(&self, alias: &str) -> Option<&JoinRequest> {
        self.joins.values().find(|j| j.alias == alias)
    }

    /// Check if any joined hop yields a collection.
    pub fn has_to_many_join(&self) -> bool {
        self.joins.values().any(|j| j.to_many)
    }
}

/// Replace `{name}` placeholders with `name` followed by `suffix`.
pub fn replace_placeholders(template: &str, suffix: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close)
                if close > 0
                    && after[..close]
                        .chars()
                        .all(|c| c.is_alphanumeric() || c == '_') =>
            {
                out.push_str(&after[..close]);
                out.push_str(suffix);
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
