//! Array hydration of flat result rows.
//!
//! The engine returns one flat row per joined combination, keyed by select
//! labels (`post.title`, `createdBy.username`). Hydration folds those rows
//! back into one nested object per root entity: to-one associations become
//! nested objects (or `null` when the join found nothing), to-many
//! associations become arrays. When raw expressions are selected, the root
//! object is placed under the `"0"` key next to the expression values.

use indexmap::IndexMap;
use serde_json::Value;

use crate::planner::ResolutionTables;
use crate::traits::Row;

/// Key holding the root entity when expressions are selected alongside it.
pub const ROOT_KEY: &str = "0";

#[derive(Debug, Clone)]
struct AliasNode {
    association: String,
    to_many: bool,
    identifier: String,
    children: Vec<String>,
}

/// How flat rows are folded into nested rows.
#[derive(Debug, Clone)]
pub struct HydrationPlan {
    root_alias: String,
    root_identifier: String,
    root_children: Vec<String>,
    nodes: IndexMap<String, AliasNode>,
    scalars: Vec<String>,
}

impl HydrationPlan {
    /// Derive the plan from resolved column targets.
    pub fn from_tables(tables: &ResolutionTables) -> Self {
        let mut nodes: IndexMap<String, AliasNode> = IndexMap::new();
        let mut root_children = Vec::new();

        for join in tables.joins.values() {
            nodes.insert(
                join.alias.clone(),
                AliasNode {
                    association: join.association.clone(),
                    to_many: join.to_many,
                    identifier: join.identifier.clone(),
                    children: Vec::new(),
                },
            );
            if join.parent_alias == tables.root_alias {
                root_children.push(join.alias.clone());
            } else if let Some(parent) = nodes.get_mut(&join.parent_alias) {
                parent.children.push(join.alias.clone());
            }
        }

        Self {
            root_alias: tables.root_alias.clone(),
            root_identifier: tables.root_identifier.clone(),
            root_children,
            nodes,
            scalars: tables
                .select_expressions
                .iter()
                .map(|e| e.label.clone())
                .collect(),
        }
    }

    /// Label of the root identifier.
    pub fn root_id_label(&self) -> String {
        format!("{}.{}", self.root_alias, self.root_identifier)
    }

    /// Fold flat rows into nested rows, preserving first-seen root order.
    pub fn hydrate(&self, rows: &[Row]) -> Vec<Row> {
        let root_label = self.root_id_label();
        let mut groups: IndexMap<String, Vec<&Row>> = IndexMap::new();
        for (position, row) in rows.iter().enumerate() {
            let key = match row.get(&root_label) {
                Some(Value::Null) | None => format!("#{}", position),
                Some(id) => id.to_string(),
            };
            groups.entry(key).or_default().push(row);
        }

        groups
            .values()
            .map(|group| {
                let entity = self.build(&self.root_alias, &self.root_children, group);
                if self.scalars.is_empty() {
                    return entity;
                }
                let mut row = Row::new();
                row.insert(ROOT_KEY.to_string(), Value::Object(entity));
                for label in &self.scalars {
                    let value = group
                        .first()
                        .and_then(|r| r.get(label))
                        .cloned()
                        .unwrap_or(Value::Null);
                    row.insert(label.clone(), value);
                }
                row
            })
            .collect()
    }

    fn build(&self, alias: &str, children: &[String], rows: &[&Row]) -> Row {
        let prefix = format!("{}.", alias);
        let mut object = Row::new();
        if let Some(first) = rows.first() {
            for (label, value) in first.iter() {
                if let Some(field) = label.strip_prefix(&prefix) {
                    object.insert(field.to_string(), value.clone());
                }
            }
        }

        for child in children {
            let Some(node) = self.nodes.get(child) else {
                continue;
            };
            let id_label = format!("{}.{}", child, node.identifier);

            let mut by_id: IndexMap<String, Vec<&Row>> = IndexMap::new();
            for row in rows {
                match row.get(&id_label) {
                    Some(Value::Null) | None => {}
                    Some(id) => by_id.entry(id.to_string()).or_default().push(*row),
                }
            }

            let value = if node.to_many {
                Value::Array(
                    by_id
                        .values()
                        .map(|group| Value::Object(self.build(child, &node.children, group)))
                        .collect(),
                )
            } else {
                match by_id.values().next() {
                    Some(group) => Value::Object(self.build(child, &node.children, group)),
                    None => Value::Null,
                }
            };
            object.insert(node.association.clone(), value);
        }

        object
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{JoinRequest, SelectExpression};
    use crate::types::JoinType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    fn tables(expressions: Vec<SelectExpression>) -> ResolutionTables {
        let mut joins = IndexMap::new();
        joins.insert(
            "post.createdBy".to_string(),
            JoinRequest {
                alias: "createdBy".into(),
                parent_alias: "post".into(),
                association: "createdBy".into(),
                join_type: JoinType::LeftJoin,
                to_many: false,
                identifier: "id".into(),
            },
        );
        joins.insert(
            "post.comments".to_string(),
            JoinRequest {
                alias: "comments".into(),
                parent_alias: "post".into(),
                association: "comments".into(),
                join_type: JoinType::LeftJoin,
                to_many: true,
                identifier: "id".into(),
            },
        );
        ResolutionTables {
            root_alias: "post".into(),
            root_identifier: "id".into(),
            select_targets: IndexMap::new(),
            select_expressions: expressions,
            search_targets: Vec::new(),
            order_targets: Vec::new(),
            joins,
        }
    }

    #[test]
    fn test_nested_and_collections() {
        let plan = HydrationPlan::from_tables(&tables(Vec::new()));
        let rows = vec![
            row(json!({"post.id": 1, "post.title": "A", "createdBy.id": 7, "createdBy.username": "bob", "comments.id": 10, "comments.body": "x"})),
            row(json!({"post.id": 1, "post.title": "A", "createdBy.id": 7, "createdBy.username": "bob", "comments.id": 11, "comments.body": "y"})),
            row(json!({"post.id": 2, "post.title": "B", "createdBy.id": null, "createdBy.username": null, "comments.id": null, "comments.body": null})),
        ];

        let hydrated = plan.hydrate(&rows);
        assert_eq!(hydrated.len(), 2);
        assert_eq!(
            Value::Object(hydrated[0].clone()),
            json!({
                "id": 1, "title": "A",
                "createdBy": {"id": 7, "username": "bob"},
                "comments": [{"id": 10, "body": "x"}, {"id": 11, "body": "y"}]
            })
        );
        assert_eq!(hydrated[1]["createdBy"], Value::Null);
        assert_eq!(hydrated[1]["comments"], json!([]));
    }

    #[test]
    fn test_scalars_put_root_under_zero() {
        let plan = HydrationPlan::from_tables(&tables(vec![SelectExpression {
            expression: "(SELECT 1)".into(),
            label: "commentCount".into(),
        }]));
        let rows = vec![row(json!({"post.id": 1, "commentCount": 4, "createdBy.id": null, "comments.id": null}))];

        let hydrated = plan.hydrate(&rows);
        assert_eq!(hydrated[0]["commentCount"], json!(4));
        assert_eq!(hydrated[0][ROOT_KEY]["id"], json!(1));
    }
}
