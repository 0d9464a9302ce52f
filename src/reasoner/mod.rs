//! Reasoner boundary - the external service that turns a question plus
//! schema metadata into a structured plan with open ambiguities
//!
//! The reasoner is an opaque collaborator: the engine never interprets the
//! question itself, it only validates and compiles what comes back.

pub mod http;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::EngineResult;
use crate::metadata::SchemaMetadata;
use crate::plan::QueryPlan;

pub use http::HttpReasoner;

/// Everything the reasoner gets to see
#[derive(Clone, Debug)]
pub struct ReasonerRequest {
    pub query: String,
    pub schema: SchemaMetadata,
    pub clarifications: HashMap<String, String>,
}

#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Produce a raw (unvalidated) plan for the request.
    async fn analyze(&self, request: &ReasonerRequest) -> EngineResult<QueryPlan>;
}
