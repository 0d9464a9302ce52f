//! Workflow context - versioned state threaded through the pipeline phases
//!
//! `Context` is an immutable-update record: `update` never mutates, it derives
//! a new snapshot with a bumped version, so a holder of an old Context always
//! observes stable state. The only in-place mutation is the append-only
//! reasoning log, which exists for traceability and does not bump the version.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Audit record of which phase performed what operation with what details
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub agent: String,
    pub operation: String,
    pub details: Value,
    /// Epoch milliseconds
    pub timestamp_ms: u64,
}

/// Explicit set of fields an `update` may replace.
///
/// Fields left as `None` are carried forward from the previous snapshot.
#[derive(Clone, Debug, Default)]
pub struct ContextUpdate {
    pub metadata: Option<HashMap<String, Value>>,
    pub clarifications: Option<HashMap<String, String>>,
}

/// Versioned workflow state record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Context {
    /// The natural-language analytics question
    pub query: String,

    /// Project the query runs against (selects the schema metadata)
    pub project_id: String,

    /// Monotonically increasing, one per derived snapshot
    pub version: u64,

    /// Plan and schema info accumulated across phases
    pub metadata: HashMap<String, Value>,

    /// Append-only audit log
    pub reasoning_steps: Vec<ReasoningStep>,

    /// Caller-supplied answers to previously raised ambiguities, keyed by question
    pub clarifications: HashMap<String, String>,
}

impl Context {
    pub fn new(query: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            project_id: project_id.into(),
            version: 0,
            metadata: HashMap::new(),
            reasoning_steps: Vec::new(),
            clarifications: HashMap::new(),
        }
    }

    /// Read a metadata field; unknown keys return `default`, never fail.
    pub fn get(&self, key: &str, default: Value) -> Value {
        self.metadata.get(key).cloned().unwrap_or(default)
    }

    /// Derive a new Context with `version + 1`.
    ///
    /// Fields present in `changes` override; all others are carried forward by
    /// deep copy, so the old and new snapshots share no mutable state.
    pub fn update(&self, changes: ContextUpdate) -> Context {
        Context {
            query: self.query.clone(),
            project_id: self.project_id.clone(),
            version: self.version + 1,
            metadata: changes.metadata.unwrap_or_else(|| self.metadata.clone()),
            reasoning_steps: self.reasoning_steps.clone(),
            clarifications: changes
                .clarifications
                .unwrap_or_else(|| self.clarifications.clone()),
        }
    }

    /// Derive a new Context with extra metadata entries merged in.
    pub fn with_metadata(&self, entries: Vec<(String, Value)>) -> Context {
        let mut metadata = self.metadata.clone();
        for (key, value) in entries {
            metadata.insert(key, value);
        }
        self.update(ContextUpdate {
            metadata: Some(metadata),
            ..Default::default()
        })
    }

    /// Append a timestamped entry to the reasoning log on the current
    /// instance. Does not bump the version.
    pub fn log_step(&mut self, agent: &str, operation: &str, details: Value) {
        self.reasoning_steps.push(ReasoningStep {
            agent: agent.to_string(),
            operation: operation.to_string(),
            details,
            timestamp_ms: now_ms(),
        });
    }

    /// Deep-copied, serializable view of all fields.
    pub fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
