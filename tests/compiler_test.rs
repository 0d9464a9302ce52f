//! Compiler scenario tests over realistic reasoner-shaped plans
//!
//! Plans enter as JSON (the shape the reasoner actually emits), optionally
//! pass through the validator, and must compile to byte-stable SQL.

use serde_json::json;

use autoquery::metadata::{ColumnMeta, SchemaMetadata, TableMeta};
use autoquery::plan::{PlanValidator, QueryPlan};
use autoquery::sql::{CompileError, SqlCompiler};
use std::collections::HashMap;

fn plan_from(value: serde_json::Value) -> QueryPlan {
    serde_json::from_value(value).unwrap()
}

fn schema() -> SchemaMetadata {
    let mut schema = SchemaMetadata::default();
    for (table, cols) in [
        ("orders", vec!["id", "customer_id", "region", "total"]),
        ("customers", vec!["id", "name", "segment"]),
    ] {
        schema.tables.insert(
            table.to_string(),
            TableMeta {
                columns: cols
                    .into_iter()
                    .map(|c| ColumnMeta {
                        name: c.to_string(),
                        data_type: "varchar".to_string(),
                        nullable: true,
                    })
                    .collect(),
            },
        );
    }
    schema
}

#[test]
fn full_clause_assembly_is_byte_stable() {
    let plan = plan_from(json!({
        "tables": ["orders", "customers"],
        "select_columns": [
            {"expression": "customers.segment", "alias": "segment"},
            {"expression": "SUM(orders.total)", "alias": "revenue"}
        ],
        "joins": [{
            "type": "inner",
            "left_table": "orders",
            "left_column": "customer_id",
            "right_table": "customers",
            "right_column": "id"
        }],
        "filters": [{"column": "orders.region", "condition": "orders.region = 'EMEA'"}],
        "group_by_columns": ["customers.segment"],
        "aggregations": [{"expression": "SUM(orders.total)", "alias": "revenue"}],
        "having_conditions": ["SUM(orders.total) > 1000"],
        "order_by_spec": [{"column": "revenue", "direction": "desc"}],
        "limit_count": 25
    }));

    let compiler = SqlCompiler::new();
    let sql = compiler.compile(&plan).unwrap();
    assert_eq!(
        sql,
        "SELECT customers.segment AS segment, SUM(orders.total) AS revenue\n\
         FROM orders\n\
         INNER JOIN customers ON orders.customer_id = customers.id\n\
         WHERE orders.region = 'EMEA'\n\
         GROUP BY customers.segment\n\
         HAVING SUM(orders.total) > 1000\n\
         ORDER BY revenue DESC\n\
         LIMIT 25"
    );
    // Determinism: same plan, same bytes, every time
    for _ in 0..5 {
        assert_eq!(compiler.compile(&plan).unwrap(), sql);
    }
}

#[test]
fn zero_and_negative_limits_are_dropped() {
    for limit in [json!(0), json!(-5), json!("garbage")] {
        let plan = plan_from(json!({
            "tables": ["orders"],
            "select_columns": [{"expression": "orders.id", "alias": "id"}],
            "limit_count": limit
        }));
        let sql = SqlCompiler::new().compile(&plan).unwrap();
        assert!(!sql.contains("LIMIT"), "limit {:?} leaked into: {}", limit, sql);
    }
}

#[test]
fn numeric_string_limit_is_coerced() {
    let plan = plan_from(json!({
        "tables": ["orders"],
        "select_columns": [{"expression": "orders.id", "alias": "id"}],
        "limit_count": "10"
    }));
    let sql = SqlCompiler::new().compile(&plan).unwrap();
    assert!(sql.ends_with("LIMIT 10"));
}

#[test]
fn ungrouped_bare_column_next_to_aggregate_is_rejected() {
    let plan = plan_from(json!({
        "tables": ["orders"],
        "select_columns": [
            {"expression": "orders.region", "alias": "region"},
            {"expression": "SUM(orders.total)", "alias": "revenue"}
        ],
        "aggregations": [{"expression": "SUM(orders.total)", "alias": "revenue"}]
    }));
    match SqlCompiler::new().compile(&plan) {
        Err(CompileError::InconsistentPlan { item, .. }) => {
            assert_eq!(item, "orders.region");
        }
        other => panic!("expected InconsistentPlan, got {:?}", other),
    }
}

#[test]
fn plain_projection_without_aggregates_needs_no_grouping() {
    let plan = plan_from(json!({
        "tables": ["orders"],
        "select_columns": [
            {"expression": "orders.id", "alias": "id"},
            {"expression": "orders.region", "alias": "region"}
        ]
    }));
    let sql = SqlCompiler::new().compile(&plan).unwrap();
    assert_eq!(sql, "SELECT orders.id AS id, orders.region AS region\nFROM orders");
}

#[test]
fn validated_plan_with_hallucinated_parts_still_compiles() {
    // The reasoner invented a table, a filter column, and left the join type out
    let plan = plan_from(json!({
        "tables": ["orders", "customers", "imaginary_facts"],
        "select_columns": [
            {"expression": "customers.name", "alias": "name"},
            {"expression": "COUNT(*)", "alias": "order_count"}
        ],
        "joins": [{
            "left_table": "orders",
            "left_column": "customer_id",
            "right_table": "customers",
            "right_column": "id"
        }],
        "filters": [
            {"column": "orders.region", "condition": "orders.region = 'APAC'"},
            {"column": "imaginary_facts.ghost", "condition": "ghost = 1"}
        ],
        "group_by_columns": ["customers.name"],
        "aggregations": [{"expression": "COUNT(*)", "alias": "order_count"}]
    }));

    let validated = PlanValidator::new().validate(plan, &schema(), &HashMap::new());
    assert_eq!(validated.plan.tables, vec!["orders", "customers"]);
    assert_eq!(validated.plan.filters.len(), 1);

    let sql = SqlCompiler::new().compile(&validated.plan).unwrap();
    assert_eq!(
        sql,
        "SELECT customers.name AS name, COUNT(*) AS order_count\n\
         FROM orders\n\
         LEFT JOIN customers ON orders.customer_id = customers.id\n\
         WHERE orders.region = 'APAC'\n\
         GROUP BY customers.name"
    );
}

#[test]
fn no_base_table_is_an_error() {
    let plan = plan_from(json!({
        "select_columns": [{"expression": "1", "alias": "one"}]
    }));
    assert!(matches!(
        SqlCompiler::new().compile(&plan),
        Err(CompileError::NoBaseTable)
    ));
}
