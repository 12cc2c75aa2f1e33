//! Search predicate assembly for document indexes.
//!
//! The global search value becomes a `should` bool over every searchable
//! column; individual column values become `must` clauses, or, for columns in
//! a search group, a `must` of a `should` bool over the whole group. Both are
//! added as filters of the root bool query.

use datagrid_query::{Column, ColumnModel, FieldType, GridOptions, GridRequest};
use tracing::trace;

use crate::client::TermsFilter;
use crate::dsl::{BoolQuery, MatchOperator, MinimumShouldMatch, Query, SearchBody, SortField};
use crate::planner::{SearchField, SearchSettings, SearchTables, StringQuery, is_searchable};

/// How a column term is attached to its parent bool query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// As a `must` clause.
    Must,
    /// As a `should` clause.
    Should,
}

/// Builds search bodies for one request.
#[derive(Debug)]
pub struct SearchQueryBuilder<'a> {
    columns: &'a ColumnModel,
    tables: &'a SearchTables,
    request: &'a GridRequest,
    options: &'a GridOptions,
    settings: &'a SearchSettings,
}

impl<'a> SearchQueryBuilder<'a> {
    /// Create a builder.
    pub fn new(
        columns: &'a ColumnModel,
        tables: &'a SearchTables,
        request: &'a GridRequest,
        options: &'a GridOptions,
        settings: &'a SearchSettings,
    ) -> Self {
        Self {
            columns,
            tables,
            request,
            options,
            settings,
        }
    }

    /// Build the body. Count bodies carry the terms filter only.
    pub fn build(&self, terms: &dyn TermsFilter, count_query: bool, source: Option<&[String]>) -> SearchBody {
        let mut root = BoolQuery::new();
        terms.apply(&mut root);

        if !count_query {
            if let Some(global) = self.global_search() {
                root.filter.push(global);
            }
            if let Some(individual) = self.individual_filters() {
                root.filter.push(individual);
            }
        }

        let mut body = SearchBody::new(root);
        if !count_query {
            body.sort = self.sort();
        }
        body.source = source.map(<[String]>::to_vec);
        body
    }

    /// The global search clause, if the request has a search value.
    pub fn global_search(&self) -> Option<Query> {
        let value = self.request.global_search()?;
        let mut query = BoolQuery::new();

        for column in self.columns.columns() {
            if !is_searchable(column, self.options) || column.filter.as_select().is_some() {
                continue;
            }
            for target in self.tables.search_targets(column.index) {
                self.add_column_term(&mut query, Condition::Should, column, target, value);
            }
        }

        trace!(clauses = query.should.len(), "Global search assembled");
        (!query.is_empty()).then_some(Query::Bool(query))
    }

    /// The per-column search clause, if individual filtering is on and any
    /// column has a value.
    pub fn individual_filters(&self) -> Option<Query> {
        if !self.options.individual_filtering {
            return None;
        }
        let mut query = BoolQuery::new();

        for column in self.columns.columns() {
            if !is_searchable(column, self.options) {
                continue;
            }
            let Some(value) = self.request.search_value(column.index) else {
                continue;
            };
            let targets = self.tables.search_targets(column.index);
            if targets.is_empty() {
                continue;
            }

            match self.group_of(column) {
                Some(members) => self.add_group_term(&mut query, members, value),
                None => {
                    for target in targets {
                        self.add_column_term(&mut query, Condition::Must, column, target, value);
                    }
                }
            }
        }

        (!query.is_empty()).then_some(Query::Bool(query))
    }

    /// Sort clauses for every orderable entry of the request, in order.
    pub fn sort(&self) -> Vec<SortField> {
        self.request
            .order
            .iter()
            .filter(|entry| self.request.is_orderable(entry.column))
            .flat_map(|entry| {
                self.tables
                    .order_targets(entry.column)
                    .iter()
                    .map(move |target| SortField {
                        field: target.field.clone(),
                        order: entry.dir,
                        nested_path: target.nested_path.clone(),
                    })
            })
            .collect()
    }

    fn group_of(&self, column: &Column) -> Option<&'a [usize]> {
        if !self.options.search_column_group_filtering {
            return None;
        }
        let name = column.search_column_group.as_deref().filter(|g| !g.is_empty())?;
        self.tables.group(name)
    }

    fn add_group_term(&self, query: &mut BoolQuery, members: &[usize], value: &str) {
        let mut group = BoolQuery::new();
        for &index in members {
            let Some(column) = self.columns.get(index) else {
                continue;
            };
            for target in self.tables.search_targets(index) {
                self.add_column_term(&mut group, Condition::Should, column, target, value);
            }
        }
        if !group.is_empty() {
            query.must.push(Query::Bool(group));
        }
    }

    /// Add the clause a column contributes for one target and value.
    pub fn add_column_term(
        &self,
        query: &mut BoolQuery,
        condition: Condition,
        column: &Column,
        target: &SearchField,
        value: &str,
    ) {
        let select = column.filter.as_select();
        let values: Option<Vec<&str>> = select
            .filter(|s| s.multiple)
            .map(|_| value.split(',').collect());
        let multi = values.as_ref().filter(|v| v.len() > 1);

        let term = match column.type_of_field.as_ref() {
            Some(FieldType::Boolean) => parse_boolean(value).map(|n| integer_term(target, n)),
            Some(FieldType::Integer | FieldType::SmallInt | FieldType::BigInt) => match multi {
                Some(values) => integer_multi_term(target, values),
                None => parse_integer(value).map(|n| integer_term(target, n)),
            },
            Some(FieldType::String | FieldType::Text) => {
                let kind = if select.is_some() {
                    StringQuery::ExactMatch
                } else {
                    self.settings.string_query
                };
                match multi {
                    Some(values) => string_multi_term(target, kind, values),
                    None => string_term(target, kind, condition, value),
                }
            }
            _ => None,
        };

        if let Some(term) = term {
            match condition {
                Condition::Must => query.must.push(term),
                Condition::Should => query.should.push(term),
            }
        }
    }
}

fn integer_term(target: &SearchField, value: i64) -> Query {
    let term = Query::term(target.field.clone(), value);
    match &target.nested_path {
        Some(path) => Query::nested(path.clone(), Query::Bool(BoolQuery::new().must(term))),
        None => term,
    }
}

fn integer_multi_term(target: &SearchField, values: &[&str]) -> Option<Query> {
    let numbers: Vec<i64> = values.iter().filter_map(|v| parse_integer(v)).collect();
    match numbers.as_slice() {
        [] => None,
        [single] => Some(integer_term(target, *single)),
        _ => {
            let query = numbers
                .into_iter()
                .fold(BoolQuery::new(), |q, n| q.should(integer_term(target, n)));
            Some(Query::Bool(query))
        }
    }
}

fn string_multi_term(target: &SearchField, kind: StringQuery, values: &[&str]) -> Option<Query> {
    let query = values
        .iter()
        .filter_map(|v| string_term(target, kind, Condition::Should, v))
        .fold(BoolQuery::new(), BoolQuery::should);
    (!query.is_empty()).then_some(Query::Bool(query))
}

fn string_term(target: &SearchField, kind: StringQuery, condition: Condition, value: &str) -> Option<Query> {
    let value = value.trim();
    if value.is_empty() || value == "null" {
        return None;
    }

    let field = target.field.clone();
    let query = match kind {
        StringQuery::Match => match_term(field, value, condition, MinimumShouldMatch::Count(1)),
        StringQuery::ExactMatch => match_term(field, value, condition, MinimumShouldMatch::Percent(100)),
        StringQuery::Regexp => Query::regexp(format!("{}.raw", field), format!(".*{}.*", escape_regexp(value))),
        StringQuery::Term => Query::term(format!("{}.raw", field), value),
    };

    Some(match &target.nested_path {
        Some(path) => Query::nested(path.clone(), query),
        None => query,
    })
}

fn match_term(field: String, value: &str, condition: Condition, minimum: MinimumShouldMatch) -> Query {
    Query::Match {
        field,
        query: value.to_string(),
        minimum_should_match: minimum,
        operator: (condition == Condition::Must).then_some(MatchOperator::And),
    }
}

/// Parse a numeric search value, truncating decimals.
fn parse_integer(value: &str) -> Option<i64> {
    let value = value.trim();
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}

fn parse_boolean(value: &str) -> Option<i64> {
    match value.trim() {
        "true" => Some(1),
        "false" => Some(0),
        other => parse_integer(other),
    }
}

/// Escape the operators of the engine's regular expression syntax.
fn escape_regexp(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(
            c,
            '.' | '?' | '+' | '*' | '|' | '{' | '}' | '[' | ']' | '(' | ')' | '"' | '\\' | '#' | '@' | '&' | '<' | '>' | '~'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{FnTermsFilter, NoTermsFilter};
    use datagrid_query::{
        AssociationMetadata, ColumnBuilder, ColumnConfig, EntityMetadata, SelectFilter, SortOrder,
        StaticMetadata,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn metadata() -> StaticMetadata {
        StaticMetadata::new()
            .entity(
                EntityMetadata::new("Post", "posts")
                    .field("id", FieldType::Integer)
                    .field("title", FieldType::String)
                    .field("status", FieldType::Integer)
                    .field("published", FieldType::Boolean)
                    .association("createdBy", AssociationMetadata::many_to_one("User", "created_by_id")),
            )
            .entity(
                EntityMetadata::new("User", "users")
                    .field("id", FieldType::Integer)
                    .field("username", FieldType::String)
                    .field("email", FieldType::String),
            )
    }

    fn columns() -> ColumnModel {
        let metadata = metadata();
        ColumnBuilder::new(&metadata, "Post", "posts")
            .unwrap()
            .add(Some("id"), ColumnConfig::column())
            .unwrap()
            .add(Some("title"), ColumnConfig::column())
            .unwrap()
            .add(
                Some("status"),
                ColumnConfig::column().filter(SelectFilter::new().option("1", "Draft").option("2", "Live").multiple(true)),
            )
            .unwrap()
            .add(Some("published"), ColumnConfig::column())
            .unwrap()
            .add(Some("createdBy.username"), ColumnConfig::column().search_column_group("author"))
            .unwrap()
            .add(Some("createdBy.email"), ColumnConfig::column().search_column_group("author"))
            .unwrap()
            .build()
    }

    #[test]
    fn test_global_search_skips_select_filters() {
        let columns = columns();
        let options = GridOptions::default();
        let settings = SearchSettings::default();
        let tables = SearchTables::resolve(&columns, &options, &settings);
        let request = GridRequest::new(1).global("bob");

        let builder = SearchQueryBuilder::new(&columns, &tables, &request, &options, &settings);
        let query = builder.global_search().unwrap();

        assert_eq!(
            query.to_value(),
            json!({"bool": {"should": [
                {"match": {"title": {"query": "bob", "minimum_should_match": 1}}},
                {"nested": {"path": "createdBy", "query":
                    {"match": {"createdBy.username": {"query": "bob", "minimum_should_match": 1}}}}},
                {"nested": {"path": "createdBy", "query":
                    {"match": {"createdBy.email": {"query": "bob", "minimum_should_match": 1}}}}}
            ]}})
        );
    }

    #[test]
    fn test_empty_global_search() {
        let columns = columns();
        let options = GridOptions::default();
        let settings = SearchSettings::default();
        let tables = SearchTables::resolve(&columns, &options, &settings);
        let request = GridRequest::new(1).global("");

        let builder = SearchQueryBuilder::new(&columns, &tables, &request, &options, &settings);
        assert_eq!(builder.global_search(), None);
    }

    #[test]
    fn test_individual_filters() {
        let columns = columns();
        let options = GridOptions::default()
            .individual_filtering(true)
            .search_column_group_filtering(true);
        let settings = SearchSettings::default();
        let tables = SearchTables::resolve(&columns, &options, &settings);
        let request = GridRequest::new(1)
            .column_search(0, "12.7")
            .column_search(1, "  ")
            .column_search(2, "1,x,2")
            .column_search(3, "true")
            .column_search(4, "ann");

        let builder = SearchQueryBuilder::new(&columns, &tables, &request, &options, &settings);
        let query = builder.individual_filters().unwrap();

        assert_eq!(
            query.to_value(),
            json!({"bool": {"must": [
                {"term": {"id": {"value": 12}}},
                {"bool": {"should": [
                    {"term": {"status": {"value": 1}}},
                    {"term": {"status": {"value": 2}}}
                ]}},
                {"term": {"published": {"value": 1}}},
                {"bool": {"should": [
                    {"nested": {"path": "createdBy", "query":
                        {"match": {"createdBy.username": {"query": "ann", "minimum_should_match": 1}}}}},
                    {"nested": {"path": "createdBy", "query":
                        {"match": {"createdBy.email": {"query": "ann", "minimum_should_match": 1}}}}}
                ]}}
            ]}})
        );
    }

    #[test]
    fn test_must_match_uses_and_operator() {
        let columns = columns();
        let options = GridOptions::default().individual_filtering(true);
        let settings = SearchSettings::default();
        let tables = SearchTables::resolve(&columns, &options, &settings);
        let request = GridRequest::new(1).column_search(4, "ann lee");

        let builder = SearchQueryBuilder::new(&columns, &tables, &request, &options, &settings);
        assert_eq!(
            builder.individual_filters().unwrap().to_value(),
            json!({"bool": {"must": [
                {"nested": {"path": "createdBy", "query": {"match": {"createdBy.username": {
                    "query": "ann lee", "minimum_should_match": 1, "operator": "and"
                }}}}}
            ]}})
        );
    }

    #[test]
    fn test_regexp_string_query() {
        let columns = columns();
        let options = GridOptions::default();
        let settings = SearchSettings::default().string_query(StringQuery::Regexp);
        let tables = SearchTables::resolve(&columns, &options, &settings);
        let request = GridRequest::new(1).global("a.b");

        let builder = SearchQueryBuilder::new(&columns, &tables, &request, &options, &settings);
        let Some(Query::Bool(query)) = builder.global_search() else {
            panic!("expected a bool query");
        };
        assert_eq!(query.should[0], Query::regexp("title.raw", ".*a\\.b.*"));
    }

    #[test]
    fn test_sort_keeps_every_entry() {
        let columns = columns();
        let options = GridOptions::default();
        let settings = SearchSettings::default();
        let tables = SearchTables::resolve(&columns, &options, &settings);
        let request = GridRequest::from_pairs([
            ("order[0][column]", "4"),
            ("order[0][dir]", "desc"),
            ("order[1][column]", "0"),
            ("order[1][dir]", "asc"),
            ("order[2][column]", "1"),
            ("order[2][dir]", "asc"),
            ("columns[0][orderable]", "true"),
            ("columns[1][orderable]", "false"),
            ("columns[4][orderable]", "true"),
        ]);

        let builder = SearchQueryBuilder::new(&columns, &tables, &request, &options, &settings);
        assert_eq!(
            builder.sort(),
            vec![
                SortField {
                    field: "createdBy.username.keyword".into(),
                    order: SortOrder::Desc,
                    nested_path: Some("createdBy".into()),
                },
                SortField {
                    field: "id".into(),
                    order: SortOrder::Asc,
                    nested_path: None,
                },
            ]
        );
    }

    #[test]
    fn test_sort_expands_virtual_order_columns() {
        let metadata = metadata();
        let columns = ColumnBuilder::new(&metadata, "Post", "posts")
            .unwrap()
            .add(Some("id"), ColumnConfig::column())
            .unwrap()
            .add(
                Some("author"),
                ColumnConfig::virtual_column()
                    .orderable(true)
                    .order_column("createdBy.username")
                    .order_column("createdBy.email"),
            )
            .unwrap()
            .build();
        let options = GridOptions::default();
        let settings = SearchSettings::default();
        let tables = SearchTables::resolve(&columns, &options, &settings);
        let request = GridRequest::from_pairs([
            ("order[0][column]", "1"),
            ("order[0][dir]", "desc"),
            ("order[1][column]", "0"),
            ("order[1][dir]", "asc"),
            ("columns[0][orderable]", "true"),
            ("columns[1][orderable]", "true"),
        ]);

        let builder = SearchQueryBuilder::new(&columns, &tables, &request, &options, &settings);
        let sorts: Vec<(String, SortOrder)> = builder.sort().into_iter().map(|s| (s.field, s.order)).collect();
        assert_eq!(
            sorts,
            vec![
                ("createdBy.username".to_string(), SortOrder::Desc),
                ("createdBy.email".to_string(), SortOrder::Desc),
                ("id".to_string(), SortOrder::Asc),
            ]
        );
    }

    #[test]
    fn test_count_body_has_terms_only() {
        let columns = columns();
        let options = GridOptions::default();
        let settings = SearchSettings::default();
        let tables = SearchTables::resolve(&columns, &options, &settings);
        let request = GridRequest::new(1)
            .global("bob")
            .order_by(0, SortOrder::Desc)
            .column(0, datagrid_query::request::RequestColumn {
                orderable: true,
                ..Default::default()
            });
        let terms = FnTermsFilter::new(|q| q.filter.push(Query::term("tenant", "acme")));

        let builder = SearchQueryBuilder::new(&columns, &tables, &request, &options, &settings);
        let count = builder.build(&terms, true, None);
        assert_eq!(
            count.to_value(),
            json!({"query": {"bool": {"filter": [{"term": {"tenant": {"value": "acme"}}}]}}})
        );

        let full = builder.build(&NoTermsFilter, false, Some(&["id".to_string()]));
        assert_eq!(full.query.filter.len(), 1);
        assert_eq!(full.sort.len(), 1);
        assert_eq!(full.source, Some(vec!["id".to_string()]));
    }

    #[test]
    fn test_value_parsing() {
        assert_eq!(parse_integer(" 42 "), Some(42));
        assert_eq!(parse_integer("3.9"), Some(3));
        assert_eq!(parse_integer("abc"), None);
        assert_eq!(parse_boolean("false"), Some(0));
        assert_eq!(escape_regexp("a+b(c)"), "a\\+b\\(c\\)");
    }
}
