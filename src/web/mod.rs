//! HTTP front door
//!
//! Thin axum layer over the workflow coordinator: one endpoint to submit a
//! question (optionally with clarification answers from a previous round)
//! and a health probe.

use crate::context::Context;
use crate::workflow::{Coordinator, WorkflowOutcome};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

/// Shared application state, injected at construction
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/query", post(submit_query))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!(host, port, "analytics engine listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Deserialize)]
struct QueryRequest {
    project_id: String,
    query: String,
    /// Answers keyed by the ambiguity question, carried over from a
    /// previous clarification_needed response
    #[serde(default)]
    clarifications: HashMap<String, String>,
}

#[derive(Serialize)]
struct QueryResponse {
    request_id: String,
    #[serde(flatten)]
    outcome: WorkflowOutcome,
}

async fn submit_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> (StatusCode, Json<QueryResponse>) {
    let request_id = Uuid::new_v4().to_string();
    tracing::info!(
        %request_id,
        project_id = %request.project_id,
        query = %request.query,
        "query submitted"
    );

    let mut ctx = Context::new(request.query, request.project_id);
    if !request.clarifications.is_empty() {
        ctx = ctx.update(crate::context::ContextUpdate {
            metadata: None,
            clarifications: Some(request.clarifications),
        });
    }

    let outcome = state.coordinator.execute(ctx).await;
    let status = match &outcome {
        WorkflowOutcome::Error { phase, message } => {
            tracing::warn!(%request_id, %phase, %message, "workflow failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::OK,
    };
    (status, Json(QueryResponse { request_id, outcome }))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
