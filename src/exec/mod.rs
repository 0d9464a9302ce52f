//! Query executor boundary
//!
//! A connection is expensive and leak-prone, so it is scoped to a single
//! EXECUTE phase: acquired, used, and closed on every exit path before the
//! phase returns. The Execute phase owns that discipline; implementations
//! only need `close` to be safe to call after a failed `execute`.

pub mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::EngineResult;

pub use http::HttpExecutorPool;

/// Result of running one SQL statement
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    pub row_count: u64,
    /// Where the full result set landed (file path, table, URL - engine-defined)
    pub result_location: String,
    /// A bounded head of the result rows, for the final report
    pub sample_rows: Vec<Value>,
}

/// A live connection scoped to one EXECUTE phase
#[async_trait]
pub trait ExecutorConnection: Send {
    async fn execute(&mut self, sql: &str) -> EngineResult<ExecutionResult>;

    /// Release the underlying resource. Must be idempotent and must not fail
    /// the phase; called on success and failure paths alike.
    async fn close(&mut self);
}

/// Hands out connections to the Execute phase
#[async_trait]
pub trait ExecutorPool: Send + Sync {
    async fn acquire(&self) -> EngineResult<Box<dyn ExecutorConnection>>;
}
