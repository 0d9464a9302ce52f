//! HTTP statement executor
//!
//! Talks to a SQL-over-HTTP gateway (`POST {base_url}/v1/statement` with a
//! JSON body). Each connection is a thin handle over a shared client; `close`
//! just marks the handle dead so a late `execute` cannot reuse it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ExecutionResult, ExecutorConnection, ExecutorPool};
use crate::error::{EngineResult, WorkflowError};

pub struct HttpExecutorPool {
    base_url: String,
    max_result_rows: usize,
    client: reqwest::Client,
}

impl HttpExecutorPool {
    pub fn new(base_url: impl Into<String>, max_result_rows: usize) -> Self {
        Self {
            base_url: base_url.into(),
            max_result_rows,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ExecutorPool for HttpExecutorPool {
    async fn acquire(&self) -> EngineResult<Box<dyn ExecutorConnection>> {
        Ok(Box::new(HttpExecutorConnection {
            base_url: self.base_url.clone(),
            max_result_rows: self.max_result_rows,
            client: self.client.clone(),
            open: true,
        }))
    }
}

#[derive(Serialize)]
struct StatementRequest<'a> {
    sql: &'a str,
}

#[derive(Deserialize)]
struct StatementResponse {
    #[serde(default)]
    row_count: u64,
    #[serde(default)]
    result_location: String,
    #[serde(default)]
    rows: Vec<Value>,
}

struct HttpExecutorConnection {
    base_url: String,
    max_result_rows: usize,
    client: reqwest::Client,
    open: bool,
}

#[async_trait]
impl ExecutorConnection for HttpExecutorConnection {
    async fn execute(&mut self, sql: &str) -> EngineResult<ExecutionResult> {
        if !self.open {
            return Err(WorkflowError::execution("connection already closed"));
        }
        let url = format!("{}/v1/statement", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&StatementRequest { sql })
            .send()
            .await
            .map_err(|e| WorkflowError::execution(format!("executor unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WorkflowError::execution(format!(
                "executor returned {}: {}",
                status, body
            )));
        }

        let mut payload: StatementResponse = response
            .json()
            .await
            .map_err(|e| WorkflowError::execution(format!("malformed executor response: {}", e)))?;

        if payload.rows.len() > self.max_result_rows {
            tracing::warn!(
                returned = payload.rows.len(),
                cap = self.max_result_rows,
                "Truncating executor result rows"
            );
            payload.rows.truncate(self.max_result_rows);
        }

        Ok(ExecutionResult {
            row_count: payload.row_count,
            result_location: payload.result_location,
            sample_rows: payload.rows,
        })
    }

    async fn close(&mut self) {
        self.open = false;
    }
}
