//! Plan validator - deterministic reconciliation of reasoner plans against
//! ground-truth schema metadata
//!
//! This is the boundary that absorbs upstream unreliability: malformed or
//! invented entries are repaired or dropped with a warning, never raised.
//! Metadata is authoritative only when present - an empty schema has no
//! opinion and leaves the reasoner's descriptors untouched.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::metadata::SchemaMetadata;
use crate::plan::{Ambiguity, ColumnDescriptor, QueryPlan};

/// Output of validation: the cleaned plan plus the ambiguities the caller
/// still has to answer (already-answered questions removed).
#[derive(Clone, Debug)]
pub struct ValidatedPlan {
    pub plan: QueryPlan,
    pub unresolved: Vec<Ambiguity>,
}

#[derive(Default)]
pub struct PlanValidator;

impl PlanValidator {
    pub fn new() -> Self {
        Self
    }

    /// Reconcile `plan` against `schema`, resolving ambiguities already
    /// answered in `clarifications`.
    ///
    /// Idempotent: validating an already-validated plan against the same
    /// schema produces no further changes.
    pub fn validate(
        &self,
        mut plan: QueryPlan,
        schema: &SchemaMetadata,
        clarifications: &HashMap<String, String>,
    ) -> ValidatedPlan {
        self.filter_tables(&mut plan, schema);
        self.reconcile_columns(&mut plan, schema);
        self.validate_joins(&mut plan, schema);
        self.reconcile_group_by(&mut plan, schema);
        self.filter_filters(&mut plan, schema);

        let unresolved: Vec<Ambiguity> = plan
            .ambiguities
            .iter()
            .filter(|a| !clarifications.contains_key(&a.question))
            .cloned()
            .collect();
        plan.ambiguities.clear();

        ValidatedPlan { plan, unresolved }
    }

    /// Drop plan tables the schema does not declare. A schema with no tables
    /// declares nothing and keeps the plan as-is.
    fn filter_tables(&self, plan: &mut QueryPlan, schema: &SchemaMetadata) {
        if schema.is_empty() {
            return;
        }
        plan.tables.retain(|table| {
            let known = schema.has_table(table);
            if !known {
                warn!(table = %table, "Dropping plan table unknown to schema");
            }
            known
        });
        plan.columns.retain(|table, _| schema.has_table(table));
    }

    /// Replace schema-confirmed column descriptors with the authoritative
    /// version; leave unconfirmed descriptors alone.
    fn reconcile_columns(&self, plan: &mut QueryPlan, schema: &SchemaMetadata) {
        for (table, descriptors) in plan.columns.iter_mut() {
            for descriptor in descriptors.iter_mut() {
                if let Some(meta) = schema.column(table, &descriptor.name) {
                    let authoritative = ColumnDescriptor {
                        name: meta.name.clone(),
                        data_type: meta.data_type.clone(),
                        nullable: meta.nullable,
                    };
                    if *descriptor != authoritative {
                        debug!(
                            table = %table,
                            column = %descriptor.name,
                            "Replacing column descriptor with schema version"
                        );
                        *descriptor = authoritative;
                    }
                }
            }
        }
    }

    /// Drop a join only when both tables are unknown to the schema and
    /// neither column resolves anywhere. Normalize column refs to their
    /// short form and default a missing join type to LEFT.
    fn validate_joins(&self, plan: &mut QueryPlan, schema: &SchemaMetadata) {
        plan.joins.retain(|join| {
            if schema.is_empty() {
                return true;
            }
            let tables_known =
                schema.has_table(&join.left_table) || schema.has_table(&join.right_table);
            let columns_resolve = schema.column_exists_anywhere(&join.left_column)
                || schema.column_exists_anywhere(&join.right_column);
            let keep = tables_known || columns_resolve;
            if !keep {
                warn!(
                    left = %join.left_table,
                    right = %join.right_table,
                    "Dropping join with no schema-resolvable table or column"
                );
            }
            keep
        });

        for join in plan.joins.iter_mut() {
            join.left_column = short_name(&join.left_column).to_string();
            join.right_column = short_name(&join.right_column).to_string();
            match join.join_type.as_deref() {
                None | Some("") => join.join_type = Some("LEFT".to_string()),
                Some(t) => join.join_type = Some(t.to_uppercase()),
            }
        }
    }

    /// Group-by entries that are derived expressions (concatenation or an
    /// explicit alias marker) pass through unvalidated. Plain references are
    /// checked against the schema; confirmed columns missing from the
    /// per-table column list are appended.
    fn reconcile_group_by(&self, plan: &mut QueryPlan, schema: &SchemaMetadata) {
        if schema.is_empty() {
            return;
        }
        let mut additions: Vec<(String, ColumnDescriptor)> = Vec::new();

        plan.group_by_columns.retain(|entry| {
            if is_derived_expression(entry) {
                return true;
            }
            let (table_hint, column) = match entry.rsplit_once('.') {
                Some((qualifier, column)) => (Some(qualifier), column),
                None => (None, entry.as_str()),
            };
            let confirmed = match table_hint {
                Some(table) => schema.column(table, column).map(|m| (table, m.clone())),
                None => schema
                    .tables
                    .iter()
                    .find_map(|(t, meta)| {
                        meta.columns
                            .iter()
                            .find(|c| c.name == column)
                            .map(|m| (t.as_str(), m.clone()))
                    }),
            };
            match confirmed {
                Some((table, meta)) => {
                    additions.push((
                        table.to_string(),
                        ColumnDescriptor {
                            name: meta.name,
                            data_type: meta.data_type,
                            nullable: meta.nullable,
                        },
                    ));
                    true
                }
                None => {
                    warn!(column = %entry, "Dropping group-by column unknown to schema");
                    false
                }
            }
        });

        for (table, descriptor) in additions {
            let list = plan.columns.entry(table).or_default();
            if !list.iter().any(|c| c.name == descriptor.name) {
                list.push(descriptor);
            }
        }
    }

    /// With a non-empty schema, drop filters whose column is absent from it.
    fn filter_filters(&self, plan: &mut QueryPlan, schema: &SchemaMetadata) {
        if schema.is_empty() {
            return;
        }
        plan.filters.retain(|filter| {
            let keep = filter.column.is_empty() || schema.column_exists_anywhere(&filter.column);
            if !keep {
                warn!(column = %filter.column, "Dropping filter on column unknown to schema");
            }
            keep
        });
    }
}

fn short_name(column: &str) -> &str {
    column.rsplit('.').next().unwrap_or(column)
}

/// Concatenation or aliasing markers flag a derived expression rather than a
/// raw column reference.
fn is_derived_expression(entry: &str) -> bool {
    entry.contains("||") || entry.to_uppercase().contains(" AS ")
}
