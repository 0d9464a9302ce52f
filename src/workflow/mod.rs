//! Workflow state machine - phases, outcomes, and the coordinator
//!
//! Phases implement a capability interface (`PhaseHandler`); the coordinator
//! holds a map from state to handler and switches on explicit tagged
//! outcomes. Clarification is a normal pause state, not an error.

pub mod coordinator;
pub mod phases;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Context;
use crate::error::EngineResult;
use crate::plan::Ambiguity;

pub use coordinator::Coordinator;

/// Context metadata keys the phases communicate through
pub mod keys {
    pub const WORKFLOW_STATE: &str = "workflow_state";
    pub const PLAN: &str = "plan";
    pub const GENERATED_SQL: &str = "generated_sql";
    pub const ROW_COUNT: &str = "row_count";
    pub const RESULT_LOCATION: &str = "result_location";
    pub const SAMPLE_ROWS: &str = "sample_rows";
    pub const ARTIFACT_REFERENCE: &str = "artifact_reference";
    pub const VISUALIZATION_SUMMARY: &str = "visualization_summary";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowState {
    Analyze,
    Extract,
    Execute,
    Visualize,
    Complete,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "ANALYZE",
            Self::Extract => "EXTRACT",
            Self::Execute => "EXECUTE",
            Self::Visualize => "VISUALIZE",
            Self::Complete => "COMPLETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ANALYZE" => Some(Self::Analyze),
            "EXTRACT" => Some(Self::Extract),
            "EXECUTE" => Some(Self::Execute),
            "VISUALIZE" => Some(Self::Visualize),
            "COMPLETE" => Some(Self::Complete),
            _ => None,
        }
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Analyze => Some(Self::Extract),
            Self::Extract => Some(Self::Execute),
            Self::Execute => Some(Self::Visualize),
            Self::Visualize => Some(Self::Complete),
            Self::Complete => None,
        }
    }
}

/// Tagged outcome of a successful phase run. Failures travel as
/// `WorkflowError` so the coordinator can classify them for retry.
#[derive(Debug)]
pub enum PhaseOutcome {
    /// Phase finished; continue with the derived context
    Advance(Context),
    /// Workflow must pause until the caller answers these questions;
    /// resuming means resubmitting with the answers merged into the
    /// Context's clarifications.
    NeedsClarification { ambiguities: Vec<Ambiguity> },
}

/// Capability interface each phase implements
#[async_trait]
pub trait PhaseHandler: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, ctx: Context) -> EngineResult<PhaseOutcome>;
}

/// Workflow result reported to the caller/API layer
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    Complete {
        sql: String,
        row_count: u64,
        artifact_reference: String,
        sample_rows: Vec<Value>,
    },
    ClarificationNeeded {
        ambiguities: Vec<AmbiguityReport>,
    },
    Error {
        phase: String,
        message: String,
    },
}

/// Serializable ambiguity as reported outward
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AmbiguityReport {
    pub question: String,
    pub suggestion: String,
}

impl From<Ambiguity> for AmbiguityReport {
    fn from(a: Ambiguity) -> Self {
        Self {
            question: a.question,
            suggestion: a.suggestion,
        }
    }
}
