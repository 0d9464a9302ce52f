//! Phase handlers
//!
//! Each handler gets the current Context, does exactly one phase's work, and
//! returns a tagged outcome. Everything a later phase needs is written into
//! Context metadata under the `keys` constants.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::context::Context;
use crate::error::{EngineResult, WorkflowError};
use crate::exec::ExecutorPool;
use crate::metadata::MetadataStore;
use crate::plan::{PlanValidator, QueryPlan};
use crate::reasoner::{Reasoner, ReasonerRequest};
use crate::render::Renderer;
use crate::sql::SqlCompiler;
use crate::workflow::{keys, PhaseHandler, PhaseOutcome};

/// ANALYZE: reason over the question, reconcile the plan, gate on ambiguities
pub struct AnalyzePhase {
    reasoner: Arc<dyn Reasoner>,
    metadata_store: Arc<dyn MetadataStore>,
    validator: PlanValidator,
}

impl AnalyzePhase {
    pub fn new(reasoner: Arc<dyn Reasoner>, metadata_store: Arc<dyn MetadataStore>) -> Self {
        Self {
            reasoner,
            metadata_store,
            validator: PlanValidator::new(),
        }
    }
}

#[async_trait]
impl PhaseHandler for AnalyzePhase {
    fn name(&self) -> &'static str {
        "ANALYZE"
    }

    async fn run(&self, mut ctx: Context) -> EngineResult<PhaseOutcome> {
        let schema = self.metadata_store.get_schema(&ctx.project_id)?;

        let request = ReasonerRequest {
            query: ctx.query.clone(),
            schema: schema.clone(),
            clarifications: ctx.clarifications.clone(),
        };
        let raw_plan = self.reasoner.analyze(&request).await?;
        let validated = self
            .validator
            .validate(raw_plan, &schema, &ctx.clarifications);

        ctx.log_step(
            "AnalyzePhase",
            "plan_validated",
            json!({
                "tables": validated.plan.tables,
                "unresolved_ambiguities": validated.unresolved.len(),
            }),
        );

        if !validated.unresolved.is_empty() {
            info!(
                count = validated.unresolved.len(),
                "Pausing workflow for clarification"
            );
            return Ok(PhaseOutcome::NeedsClarification {
                ambiguities: validated.unresolved,
            });
        }

        let plan_value = serde_json::to_value(&validated.plan)
            .map_err(|e| WorkflowError::internal(format!("Plan serialization failed: {}", e)))?;
        Ok(PhaseOutcome::Advance(ctx.with_metadata(vec![(
            keys::PLAN.to_string(),
            plan_value,
        )])))
    }
}

/// EXTRACT: compile the validated plan into SQL. Compilation errors are
/// fatal for the request, never retried.
pub struct ExtractPhase {
    compiler: SqlCompiler,
}

impl ExtractPhase {
    pub fn new() -> Self {
        Self {
            compiler: SqlCompiler::new(),
        }
    }
}

impl Default for ExtractPhase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PhaseHandler for ExtractPhase {
    fn name(&self) -> &'static str {
        "EXTRACT"
    }

    async fn run(&self, mut ctx: Context) -> EngineResult<PhaseOutcome> {
        let plan: QueryPlan = serde_json::from_value(ctx.get(keys::PLAN, Value::Null))
            .map_err(|e| WorkflowError::internal(format!("No validated plan in context: {}", e)))?;

        let sql = self.compiler.compile(&plan)?;
        info!(sql = %sql, "Compiled plan to SQL");
        ctx.log_step("ExtractPhase", "sql_generated", json!({ "sql": sql }));

        Ok(PhaseOutcome::Advance(ctx.with_metadata(vec![(
            keys::GENERATED_SQL.to_string(),
            Value::String(sql),
        )])))
    }
}

/// EXECUTE: run the SQL through a connection scoped to this phase.
///
/// The connection is closed on every exit path - the external resource is
/// expensive and leak-prone, and nothing survives the phase boundary.
pub struct ExecutePhase {
    pool: Arc<dyn ExecutorPool>,
    sample_rows: usize,
}

impl ExecutePhase {
    pub fn new(pool: Arc<dyn ExecutorPool>, sample_rows: usize) -> Self {
        Self { pool, sample_rows }
    }
}

#[async_trait]
impl PhaseHandler for ExecutePhase {
    fn name(&self) -> &'static str {
        "EXECUTE"
    }

    async fn run(&self, mut ctx: Context) -> EngineResult<PhaseOutcome> {
        let sql = match ctx.get(keys::GENERATED_SQL, Value::Null) {
            Value::String(s) => s,
            _ => return Err(WorkflowError::internal("No generated SQL in context")),
        };

        let mut conn = self.pool.acquire().await?;
        let result = conn.execute(&sql).await;
        conn.close().await;
        let result = result.map_err(|e| match e {
            WorkflowError::Execution { message, .. } => {
                WorkflowError::execution_with_sql(message, sql.clone())
            }
            other => other,
        })?;

        ctx.log_step(
            "ExecutePhase",
            "query_executed",
            json!({
                "row_count": result.row_count,
                "result_location": result.result_location,
            }),
        );

        let sample: Vec<Value> = result
            .sample_rows
            .into_iter()
            .take(self.sample_rows)
            .collect();
        Ok(PhaseOutcome::Advance(ctx.with_metadata(vec![
            (keys::ROW_COUNT.to_string(), json!(result.row_count)),
            (
                keys::RESULT_LOCATION.to_string(),
                Value::String(result.result_location),
            ),
            (keys::SAMPLE_ROWS.to_string(), Value::Array(sample)),
        ])))
    }
}

/// VISUALIZE: delegate to the external renderer
pub struct VisualizePhase {
    renderer: Arc<dyn Renderer>,
}

impl VisualizePhase {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl PhaseHandler for VisualizePhase {
    fn name(&self) -> &'static str {
        "VISUALIZE"
    }

    async fn run(&self, mut ctx: Context) -> EngineResult<PhaseOutcome> {
        let result_location = match ctx.get(keys::RESULT_LOCATION, Value::Null) {
            Value::String(s) => s,
            _ => {
                // A result location is required; an empty result set still has one.
                warn!("No result location in context, skipping render input");
                return Err(WorkflowError::internal("No result location in context"));
            }
        };

        let artifact = self.renderer.render(&result_location, &ctx.query).await?;
        ctx.log_step(
            "VisualizePhase",
            "visualization_generated",
            json!({ "artifact_reference": artifact.artifact_reference }),
        );

        Ok(PhaseOutcome::Advance(ctx.with_metadata(vec![
            (
                keys::ARTIFACT_REFERENCE.to_string(),
                Value::String(artifact.artifact_reference),
            ),
            (
                keys::VISUALIZATION_SUMMARY.to_string(),
                Value::String(artifact.summary),
            ),
        ])))
    }
}
