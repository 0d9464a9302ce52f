//! End-to-end coordinator scenarios with mock collaborators

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use autoquery::context::{Context, ContextUpdate};
use autoquery::error::{EngineResult, WorkflowError};
use autoquery::exec::{ExecutionResult, ExecutorConnection, ExecutorPool};
use autoquery::metadata::{ColumnMeta, InMemoryMetadataStore, SchemaMetadata, TableMeta};
use autoquery::plan::QueryPlan;
use autoquery::reasoner::{Reasoner, ReasonerRequest};
use autoquery::render::{RenderArtifact, Renderer};
use autoquery::workflow::{Coordinator, WorkflowOutcome};

fn demo_schema() -> SchemaMetadata {
    let mut schema = SchemaMetadata::default();
    schema.tables.insert(
        "orders".to_string(),
        TableMeta {
            columns: vec![
                ColumnMeta {
                    name: "region".to_string(),
                    data_type: "varchar".to_string(),
                    nullable: true,
                },
                ColumnMeta {
                    name: "total".to_string(),
                    data_type: "double".to_string(),
                    nullable: true,
                },
            ],
        },
    );
    schema
}

fn demo_store() -> Arc<InMemoryMetadataStore> {
    let mut store = InMemoryMetadataStore::new();
    store.insert("demo", demo_schema());
    Arc::new(store)
}

fn aggregating_plan() -> QueryPlan {
    serde_json::from_value(json!({
        "tables": ["orders"],
        "select_columns": [
            {"expression": "orders.region", "alias": "region"},
            {"expression": "SUM(orders.total)", "alias": "total_sales"}
        ],
        "group_by_columns": ["orders.region"],
        "aggregations": [{"expression": "SUM(orders.total)", "alias": "total_sales"}]
    }))
    .unwrap()
}

struct MockReasoner {
    plan: serde_json::Value,
    calls: AtomicUsize,
    last_clarifications: std::sync::Mutex<HashMap<String, String>>,
}

impl MockReasoner {
    fn new(plan: QueryPlan) -> Self {
        Self {
            plan: serde_json::to_value(plan).unwrap(),
            calls: AtomicUsize::new(0),
            last_clarifications: std::sync::Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Reasoner for MockReasoner {
    async fn analyze(&self, request: &ReasonerRequest) -> EngineResult<QueryPlan> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_clarifications.lock().unwrap() = request.clarifications.clone();
        Ok(serde_json::from_value(self.plan.clone()).unwrap())
    }
}

struct MockPool {
    /// How many acquired connections should fail before one succeeds
    failures_remaining: AtomicUsize,
    executions: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MockPool {
    fn new(fail_first: usize) -> Self {
        Self {
            failures_remaining: AtomicUsize::new(fail_first),
            executions: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ExecutorPool for MockPool {
    async fn acquire(&self) -> EngineResult<Box<dyn ExecutorConnection>> {
        let fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(Box::new(MockConnection {
            fail,
            executions: Arc::clone(&self.executions),
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct MockConnection {
    fail: bool,
    executions: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl ExecutorConnection for MockConnection {
    async fn execute(&mut self, _sql: &str) -> EngineResult<ExecutionResult> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(WorkflowError::execution("cluster busy"));
        }
        Ok(ExecutionResult {
            row_count: 42,
            result_location: "results/run-1.parquet".to_string(),
            sample_rows: vec![
                json!({"region": "EMEA", "total_sales": 10.0}),
                json!({"region": "APAC", "total_sales": 7.5}),
                json!({"region": "AMER", "total_sales": 6.0}),
                json!({"region": "LATAM", "total_sales": 2.0}),
            ],
        })
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockRenderer;

#[async_trait]
impl Renderer for MockRenderer {
    async fn render(&self, result_location: &str, _query: &str) -> EngineResult<RenderArtifact> {
        Ok(RenderArtifact {
            summary: "bar chart of totals by region".to_string(),
            artifact_reference: format!("{}.png", result_location),
        })
    }
}

fn coordinator(
    reasoner: Arc<MockReasoner>,
    pool: Arc<MockPool>,
    max_attempts: u32,
) -> Coordinator {
    Coordinator::new(
        reasoner,
        demo_store(),
        pool,
        Arc::new(MockRenderer),
        max_attempts,
        3,
    )
}

#[tokio::test]
async fn happy_path_produces_complete_report() {
    let reasoner = Arc::new(MockReasoner::new(aggregating_plan()));
    let pool = Arc::new(MockPool::new(0));
    let coord = coordinator(Arc::clone(&reasoner), Arc::clone(&pool), 3);

    let outcome = coord.execute(Context::new("total sales by region", "demo")).await;
    match outcome {
        WorkflowOutcome::Complete {
            sql,
            row_count,
            artifact_reference,
            sample_rows,
        } => {
            assert_eq!(
                sql,
                "SELECT orders.region AS region, SUM(orders.total) AS total_sales\nFROM orders\nGROUP BY orders.region"
            );
            assert_eq!(row_count, 42);
            assert_eq!(artifact_reference, "results/run-1.parquet.png");
            // sample bounded by the configured limit, not the executor's output
            assert_eq!(sample_rows.len(), 3);
        }
        other => panic!("expected Complete, got {:?}", other),
    }
    assert_eq!(pool.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unanswered_ambiguity_pauses_then_answer_unblocks() {
    let mut plan = aggregating_plan();
    plan.ambiguities = serde_json::from_value(json!([
        {"question": "Which fiscal year?", "suggestion": "2025"}
    ]))
    .unwrap();
    let reasoner = Arc::new(MockReasoner::new(plan));
    let pool = Arc::new(MockPool::new(0));
    let coord = coordinator(Arc::clone(&reasoner), Arc::clone(&pool), 3);

    let ctx = Context::new("total sales by region", "demo");
    let outcome = coord.execute(ctx.clone()).await;
    match &outcome {
        WorkflowOutcome::ClarificationNeeded { ambiguities } => {
            assert_eq!(ambiguities.len(), 1);
            assert_eq!(ambiguities[0].question, "Which fiscal year?");
        }
        other => panic!("expected ClarificationNeeded, got {:?}", other),
    }
    // Nothing may have run downstream of the pause
    assert_eq!(pool.executions.load(Ordering::SeqCst), 0);

    // Resubmit with the answer merged in: the same question is now resolved
    let answered = ctx.update(ContextUpdate {
        metadata: None,
        clarifications: Some(HashMap::from([(
            "Which fiscal year?".to_string(),
            "2025".to_string(),
        )])),
    });
    let outcome = coord.execute(answered).await;
    assert!(matches!(outcome, WorkflowOutcome::Complete { .. }));
    let seen = reasoner.last_clarifications.lock().unwrap().clone();
    assert_eq!(seen.get("Which fiscal year?").map(String::as_str), Some("2025"));
}

#[tokio::test]
async fn compile_error_is_fatal_and_skips_execution() {
    let plan: QueryPlan = serde_json::from_value(json!({
        "tables": ["orders"],
        "select_columns": []
    }))
    .unwrap();
    let reasoner = Arc::new(MockReasoner::new(plan));
    let pool = Arc::new(MockPool::new(0));
    let coord = coordinator(Arc::clone(&reasoner), Arc::clone(&pool), 3);

    let outcome = coord.execute(Context::new("anything", "demo")).await;
    match outcome {
        WorkflowOutcome::Error { phase, .. } => assert_eq!(phase, "EXTRACT"),
        other => panic!("expected Error, got {:?}", other),
    }
    // Fatal at EXTRACT: the reasoner ran exactly once, the executor never
    assert_eq!(reasoner.calls.load(Ordering::SeqCst), 1);
    assert_eq!(pool.executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn transient_execution_failure_is_retried() {
    let reasoner = Arc::new(MockReasoner::new(aggregating_plan()));
    let pool = Arc::new(MockPool::new(1));
    let coord = coordinator(Arc::clone(&reasoner), Arc::clone(&pool), 3);

    let outcome = coord.execute(Context::new("total sales by region", "demo")).await;
    assert!(matches!(outcome, WorkflowOutcome::Complete { .. }));
    assert_eq!(pool.executions.load(Ordering::SeqCst), 2);
    // The failed connection was still released
    assert_eq!(pool.closes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retry_exhaustion_names_the_failing_phase() {
    let reasoner = Arc::new(MockReasoner::new(aggregating_plan()));
    let pool = Arc::new(MockPool::new(usize::MAX));
    let coord = coordinator(Arc::clone(&reasoner), Arc::clone(&pool), 2);

    let outcome = coord.execute(Context::new("total sales by region", "demo")).await;
    match outcome {
        WorkflowOutcome::Error { phase, message } => {
            assert_eq!(phase, "EXECUTE");
            assert!(message.contains("cluster busy"));
        }
        other => panic!("expected Error, got {:?}", other),
    }
    assert_eq!(pool.executions.load(Ordering::SeqCst), 2);
    assert_eq!(pool.closes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_metadata_fails_without_retry() {
    let reasoner = Arc::new(MockReasoner::new(aggregating_plan()));
    let pool = Arc::new(MockPool::new(0));
    let coord = coordinator(Arc::clone(&reasoner), Arc::clone(&pool), 3);

    let outcome = coord.execute(Context::new("total sales", "nonexistent")).await;
    match outcome {
        WorkflowOutcome::Error { phase, .. } => assert_eq!(phase, "ANALYZE"),
        other => panic!("expected Error, got {:?}", other),
    }
    // Metadata errors are not transient, and the reasoner is never consulted
    assert_eq!(reasoner.calls.load(Ordering::SeqCst), 0);
}
