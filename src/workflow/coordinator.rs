//! Coordinator - drives phase transitions with validation gates, bounded
//! retries and the clarification pause
//!
//! A single workflow instance runs its phases strictly sequentially. State
//! lives in the Context (`workflow_state` metadata), so a paused workflow is
//! resumed by replaying `execute` with an updated Context.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::context::Context;
use crate::error::EngineResult;
use crate::exec::ExecutorPool;
use crate::metadata::MetadataStore;
use crate::reasoner::Reasoner;
use crate::render::Renderer;
use crate::workflow::phases::{AnalyzePhase, ExecutePhase, ExtractPhase, VisualizePhase};
use crate::workflow::{keys, PhaseHandler, PhaseOutcome, WorkflowOutcome, WorkflowState};

pub struct Coordinator {
    handlers: HashMap<WorkflowState, Box<dyn PhaseHandler>>,
    max_attempts: u32,
}

impl Coordinator {
    /// Wire the standard pipeline from the injected collaborators.
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        metadata_store: Arc<dyn MetadataStore>,
        executor_pool: Arc<dyn ExecutorPool>,
        renderer: Arc<dyn Renderer>,
        max_attempts: u32,
        sample_rows: usize,
    ) -> Self {
        let mut handlers: HashMap<WorkflowState, Box<dyn PhaseHandler>> = HashMap::new();
        handlers.insert(
            WorkflowState::Analyze,
            Box::new(AnalyzePhase::new(reasoner, metadata_store)),
        );
        handlers.insert(WorkflowState::Extract, Box::new(ExtractPhase::new()));
        handlers.insert(
            WorkflowState::Execute,
            Box::new(ExecutePhase::new(executor_pool, sample_rows)),
        );
        handlers.insert(
            WorkflowState::Visualize,
            Box::new(VisualizePhase::new(renderer)),
        );
        Self {
            handlers,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Build a coordinator from pre-constructed handlers (used by tests to
    /// substitute phases).
    pub fn with_handlers(
        handlers: HashMap<WorkflowState, Box<dyn PhaseHandler>>,
        max_attempts: u32,
    ) -> Self {
        Self {
            handlers,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run the workflow to a terminal outcome: complete, clarification
    /// needed, or error. Any phase error short-circuits the remaining
    /// phases.
    pub async fn execute(&self, mut ctx: Context) -> WorkflowOutcome {
        let mut state = ctx
            .get(keys::WORKFLOW_STATE, Value::Null)
            .as_str()
            .and_then(WorkflowState::parse)
            .unwrap_or(WorkflowState::Analyze);
        ctx.log_step(
            "Coordinator",
            "workflow_init",
            json!({ "query": ctx.query, "state": state.as_str() }),
        );

        loop {
            if state == WorkflowState::Complete {
                return self.assemble_report(&ctx);
            }

            let handler = match self.handlers.get(&state) {
                Some(h) => h,
                None => {
                    return WorkflowOutcome::Error {
                        phase: state.as_str().to_string(),
                        message: format!("No handler registered for state {}", state.as_str()),
                    }
                }
            };

            match self.run_with_retry(handler.as_ref(), &ctx).await {
                Ok(PhaseOutcome::Advance(next_ctx)) => {
                    // next() is total for non-terminal states
                    let next_state = state.next().unwrap_or(WorkflowState::Complete);
                    ctx = next_ctx.with_metadata(vec![(
                        keys::WORKFLOW_STATE.to_string(),
                        Value::String(next_state.as_str().to_string()),
                    )]);
                    info!(from = state.as_str(), to = next_state.as_str(), "Phase complete");
                    state = next_state;
                }
                Ok(PhaseOutcome::NeedsClarification { ambiguities }) => {
                    // Workflow stays logically in this state; the caller
                    // resubmits with the answers merged into clarifications.
                    return WorkflowOutcome::ClarificationNeeded {
                        ambiguities: ambiguities.into_iter().map(Into::into).collect(),
                    };
                }
                Err(e) => {
                    error!(phase = handler.name(), error = %e, "Workflow failed");
                    return WorkflowOutcome::Error {
                        phase: handler.name().to_string(),
                        message: e.to_string(),
                    };
                }
            }
        }
    }

    /// Retry transient failures up to the attempt bound; the final attempt's
    /// error propagates. Non-transient errors fail immediately.
    async fn run_with_retry(
        &self,
        handler: &dyn PhaseHandler,
        ctx: &Context,
    ) -> EngineResult<PhaseOutcome> {
        let mut attempt = 1;
        loop {
            match handler.run(ctx.clone()).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        phase = handler.name(),
                        attempt,
                        error = %e,
                        "Transient phase failure, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// COMPLETE: assemble the final report from Context. Terminal.
    fn assemble_report(&self, ctx: &Context) -> WorkflowOutcome {
        let sql = ctx
            .get(keys::GENERATED_SQL, Value::Null)
            .as_str()
            .unwrap_or_default()
            .to_string();
        let row_count = ctx
            .get(keys::ROW_COUNT, Value::Null)
            .as_u64()
            .unwrap_or(0);
        let artifact_reference = ctx
            .get(keys::ARTIFACT_REFERENCE, Value::Null)
            .as_str()
            .unwrap_or_default()
            .to_string();
        let sample_rows = match ctx.get(keys::SAMPLE_ROWS, Value::Null) {
            Value::Array(rows) => rows,
            _ => Vec::new(),
        };
        WorkflowOutcome::Complete {
            sql,
            row_count,
            artifact_reference,
            sample_rows,
        }
    }
}
