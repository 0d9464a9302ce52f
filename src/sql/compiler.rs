//! SQL compiler - renders a validated plan into SQL text
//!
//! Deterministic: the same plan always yields byte-identical SQL. Clause
//! order is fixed (SELECT, FROM, JOIN, WHERE, GROUP BY, HAVING, ORDER BY,
//! LIMIT) with empty clauses omitted. Inconsistencies the validator cannot
//! repair (empty select list, no base table, a selected expression that is
//! neither grouped nor aggregated) are hard failures here - emitting SQL the
//! target engine would reject helps nobody.

use std::collections::HashSet;
use thiserror::Error;
use tracing::warn;

use crate::plan::QueryPlan;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// No usable entries remain in `select_columns`
    #[error("Plan has no selectable columns")]
    EmptySelect,

    /// Neither a join nor a table provides a FROM target
    #[error("Plan has no base table to select from")]
    NoBaseTable,

    /// A select entry is neither grouped, an aggregation alias, nor a
    /// self-aliased calculated expression
    #[error(
        "Select item '{item}' is not in GROUP BY {group_by:?} and is not an aggregation alias {aggregation_aliases:?}"
    )]
    InconsistentPlan {
        item: String,
        group_by: Vec<String>,
        aggregation_aliases: Vec<String>,
    },
}

#[derive(Default)]
pub struct SqlCompiler;

impl SqlCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Render `plan` into SQL text.
    pub fn compile(&self, plan: &QueryPlan) -> Result<String, CompileError> {
        let select_items = self.build_select_items(plan)?;
        self.check_grouping_invariant(plan)?;

        let mut clauses: Vec<String> = Vec::new();
        clauses.push(format!("SELECT {}", select_items.join(", ")));
        clauses.push(format!("FROM {}", self.base_table(plan)?));
        clauses.extend(self.build_join_clauses(plan));

        if let Some(where_clause) = self.build_where_clause(plan) {
            clauses.push(where_clause);
        }
        if !plan.group_by_columns.is_empty() {
            clauses.push(format!("GROUP BY {}", plan.group_by_columns.join(", ")));
        }
        if let Some(having) = self.build_having_clause(plan) {
            clauses.push(having);
        }
        if let Some(order_by) = self.build_order_by_clause(plan) {
            clauses.push(order_by);
        }
        if let Some(limit) = self.build_limit_clause(plan) {
            clauses.push(limit);
        }

        Ok(clauses.join("\n"))
    }

    /// SELECT is built from `select_columns` only - it is the authoritative
    /// list, never re-derived from group-by or aggregations.
    fn build_select_items(&self, plan: &QueryPlan) -> Result<Vec<String>, CompileError> {
        let mut items = Vec::new();
        for entry in &plan.select_columns {
            let expression = entry.expression.trim();
            if expression.is_empty() {
                warn!("Skipping select entry with empty expression");
                continue;
            }
            let alias = if entry.alias.trim().is_empty() {
                expression
            } else {
                entry.alias.trim()
            };
            items.push(format!("{} AS {}", expression, alias));
        }
        if items.is_empty() {
            return Err(CompileError::EmptySelect);
        }
        Ok(items)
    }

    /// Under aggregation, every selected expression must be a group-by
    /// member, an aggregation alias, or a calculated expression carrying an
    /// explicit alias marker. A plain projection (no grouping, no
    /// aggregations) cannot mix aggregate and non-aggregate output, so the
    /// check does not apply there.
    fn check_grouping_invariant(&self, plan: &QueryPlan) -> Result<(), CompileError> {
        if plan.group_by_columns.is_empty() && plan.aggregations.is_empty() {
            return Ok(());
        }

        let group_by: HashSet<&str> =
            plan.group_by_columns.iter().map(String::as_str).collect();
        let agg_aliases: HashSet<&str> = plan.aggregation_aliases().into_iter().collect();
        let agg_expressions: HashSet<&str> = plan
            .aggregations
            .iter()
            .map(|a| a.expression.as_str())
            .collect();

        for entry in &plan.select_columns {
            let expression = entry.expression.trim();
            if expression.is_empty() {
                continue;
            }
            let consistent = group_by.contains(expression)
                || agg_aliases.contains(expression)
                || agg_aliases.contains(entry.alias.trim())
                || agg_expressions.contains(expression)
                || is_aliased_expression(expression);
            if !consistent {
                return Err(CompileError::InconsistentPlan {
                    item: expression.to_string(),
                    group_by: plan.group_by_columns.clone(),
                    aggregation_aliases: plan
                        .aggregation_aliases()
                        .into_iter()
                        .map(String::from)
                        .collect(),
                });
            }
        }
        Ok(())
    }

    /// Base table: left table of the first join when joins exist, else the
    /// first plan table.
    fn base_table<'a>(&self, plan: &'a QueryPlan) -> Result<&'a str, CompileError> {
        if let Some(join) = plan.joins.iter().find(|j| !j.left_table.is_empty()) {
            return Ok(&join.left_table);
        }
        plan.tables
            .first()
            .map(String::as_str)
            .ok_or(CompileError::NoBaseTable)
    }

    /// One line per join, in plan order. Malformed entries are skipped with
    /// a warning, not a hard failure.
    fn build_join_clauses(&self, plan: &QueryPlan) -> Vec<String> {
        plan.joins
            .iter()
            .filter_map(|join| {
                if join.left_table.is_empty()
                    || join.right_table.is_empty()
                    || join.left_column.is_empty()
                    || join.right_column.is_empty()
                {
                    warn!(
                        left = %join.left_table,
                        right = %join.right_table,
                        "Skipping malformed join entry"
                    );
                    return None;
                }
                let join_type = join
                    .join_type
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .unwrap_or("LEFT")
                    .to_uppercase();
                Some(format!(
                    "{} JOIN {} ON {}.{} = {}.{}",
                    join_type,
                    join.right_table,
                    join.left_table,
                    join.left_column,
                    join.right_table,
                    join.right_column
                ))
            })
            .collect()
    }

    fn build_where_clause(&self, plan: &QueryPlan) -> Option<String> {
        let conditions: Vec<&str> = plan
            .filters
            .iter()
            .map(|f| f.condition.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if conditions.is_empty() {
            return None;
        }
        Some(format!("WHERE {}", conditions.join(" AND ")))
    }

    fn build_having_clause(&self, plan: &QueryPlan) -> Option<String> {
        let conditions: Vec<&str> = plan
            .having_conditions
            .iter()
            .map(|h| h.condition.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if conditions.is_empty() {
            return None;
        }
        Some(format!("HAVING {}", conditions.join(" AND ")))
    }

    /// Each term normalized to `{column} {ASC|DESC}`; an unrecognized
    /// direction defaults to ASC.
    fn build_order_by_clause(&self, plan: &QueryPlan) -> Option<String> {
        let terms: Vec<String> = plan
            .order_by_spec
            .iter()
            .filter_map(|spec| {
                let column = spec.column.trim();
                if column.is_empty() {
                    return None;
                }
                let direction = match spec.direction.trim().to_uppercase().as_str() {
                    "DESC" => "DESC",
                    _ => "ASC",
                };
                Some(format!("{} {}", column, direction))
            })
            .collect();
        if terms.is_empty() {
            return None;
        }
        Some(format!("ORDER BY {}", terms.join(", ")))
    }

    /// LIMIT only for a positive count; anything else is ignored with a
    /// warning, never an error.
    fn build_limit_clause(&self, plan: &QueryPlan) -> Option<String> {
        match plan.limit_count {
            Some(n) if n > 0 => Some(format!("LIMIT {}", n)),
            Some(n) => {
                warn!(limit = n, "Ignoring non-positive limit_count");
                None
            }
            None => None,
        }
    }
}

/// A calculated expression is recognized by an explicit ` AS ` alias marker.
fn is_aliased_expression(expression: &str) -> bool {
    expression.to_uppercase().contains(" AS ")
}
