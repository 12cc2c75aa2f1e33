//! Predicate and sort assembly.
//!
//! Turns a [`GridRequest`] and the resolved column targets into WHERE
//! fragments and ORDER BY entries:
//!
//! - the global search ORs every searchable column's fragment into one group;
//! - individual filtering ANDs per-column fragments, ORing columns that share
//!   a search column group when grouping is enabled;
//! - sorting follows the request's order entries, skipping anything the
//!   client does not flag orderable or that has no sort target.

use indexmap::IndexMap;

use crate::builder::ColumnModel;
use crate::column::Column;
use crate::error::QueryResult;
use crate::filter::{Expr, FieldRef, Parameters};
use crate::options::GridOptions;
use crate::request::GridRequest;
use crate::strategy::INIT_PARAMETER_COUNTER;
use crate::types::SortOrder;

/// Assembles predicates and sorts for one request.
#[derive(Debug, Clone, Copy)]
pub struct PredicateAssembler<'a> {
    columns: &'a ColumnModel,
    search_targets: &'a [Option<Vec<FieldRef>>],
    order_targets: &'a [Option<Vec<FieldRef>>],
    request: &'a GridRequest,
    options: &'a GridOptions,
}

impl<'a> PredicateAssembler<'a> {
    /// Create an assembler.
    pub fn new(
        columns: &'a ColumnModel,
        search_targets: &'a [Option<Vec<FieldRef>>],
        order_targets: &'a [Option<Vec<FieldRef>>],
        request: &'a GridRequest,
        options: &'a GridOptions,
    ) -> Self {
        Self {
            columns,
            search_targets,
            order_targets,
            request,
            options,
        }
    }

    /// Check if a column takes part in searches.
    pub fn is_searchable_column(&self, column: &Column) -> bool {
        column.dql().is_some()
            && column.searchable
            && (column.visible || self.options.search_in_non_visible_columns)
    }

    fn targets(&self, index: usize) -> &'a [FieldRef] {
        self.search_targets
            .get(index)
            .and_then(Option::as_deref)
            .unwrap_or(&[])
    }

    /// The global search group, [`Expr::None`] when there is nothing to search.
    pub fn global_search(&self, params: &mut Parameters) -> Expr {
        let Some(value) = self.request.global_search() else {
            return Expr::None;
        };
        let operator = self.options.global_search_type;

        let mut members = Vec::new();
        for column in self.columns.columns() {
            if !self.is_searchable_column(column) {
                continue;
            }
            for target in self.targets(column.index) {
                if let Some(expr) = column.filter.or_expression(
                    operator,
                    target,
                    value,
                    column.type_of_field.as_ref(),
                    params,
                    column.index,
                ) {
                    members.push(expr);
                }
            }
        }

        crate::datagrid_debug!(fragments = members.len(), "Global search assembled");
        Expr::or(members)
    }

    /// The individual filtering constraint, [`Expr::None`] when disabled or empty.
    pub fn individual_filters(&self, params: &mut Parameters) -> QueryResult<Expr> {
        if !self.options.individual_filtering {
            return Ok(Expr::None);
        }

        let mut counter = INIT_PARAMETER_COUNTER;
        let mut members = Vec::new();
        let mut groups: IndexMap<&str, Vec<Expr>> = IndexMap::new();

        for column in self.columns.columns() {
            if !self.is_searchable_column(column) {
                continue;
            }
            let Some(value) = self.request.search_value(column.index) else {
                continue;
            };

            let group = column
                .search_column_group
                .as_deref()
                .filter(|_| self.options.search_column_group_filtering);

            for target in self.targets(column.index) {
                let Some(expr) = column.filter.and_expression(
                    target,
                    value,
                    column.type_of_field.as_ref(),
                    params,
                    &mut counter,
                )?
                else {
                    continue;
                };
                crate::datagrid_trace!(column = column.index, counter, "Column filter bound");
                match group {
                    Some(name) => groups.entry(name).or_default().push(expr),
                    None => members.push(expr),
                }
            }
        }

        members.extend(groups.into_values().map(Expr::or));
        crate::datagrid_debug!(fragments = members.len(), counter, "Individual filters assembled");
        Ok(Expr::and(members))
    }

    /// Sort entries in request order.
    pub fn sort(&self) -> Vec<(FieldRef, SortOrder)> {
        let mut sorts = Vec::new();
        for entry in &self.request.order {
            if !self.request.is_orderable(entry.column) {
                continue;
            }
            let Some(Some(targets)) = self.order_targets.get(entry.column) else {
                continue;
            };
            sorts.extend(targets.iter().map(|t| (t.clone(), entry.dir)));
        }
        sorts
    }
}
