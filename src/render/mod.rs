//! Renderer boundary - the external visualization collaborator
//!
//! Rendering itself (including any generated-code execution) happens outside
//! this crate; only the contract lives here.

use async_trait::async_trait;

use crate::error::EngineResult;

#[derive(Clone, Debug)]
pub struct RenderArtifact {
    /// Human-readable summary of what the visualization shows
    pub summary: String,
    /// Reference to the produced artifact (path, URL, embed id)
    pub artifact_reference: String,
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, result_location: &str, query: &str) -> EngineResult<RenderArtifact>;
}

/// Default renderer: no chart generation, just a textual pointer at the
/// result set. Stands in until a real visualization service is wired.
pub struct SummaryRenderer;

#[async_trait]
impl Renderer for SummaryRenderer {
    async fn render(&self, result_location: &str, query: &str) -> EngineResult<RenderArtifact> {
        if result_location.is_empty() {
            return Err(crate::error::WorkflowError::render(
                "no result location to render from",
            ));
        }
        Ok(RenderArtifact {
            summary: format!("Result set for \"{}\" available at {}", query, result_location),
            artifact_reference: result_location.to_string(),
        })
    }
}
