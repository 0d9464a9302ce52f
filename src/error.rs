//! Unified error type for the workflow engine
//!
//! Structured error handling with categories for different failure modes;
//! the coordinator retries categories marked transient.

use thiserror::Error;

use crate::sql::compiler::CompileError;

#[derive(Error, Debug, Clone)]
pub enum WorkflowError {
    /// Reasoner errors: the external reasoning service failed or returned garbage
    #[error("Reasoner error: {message}")]
    Reasoner {
        message: String,
        context: Option<String>,
    },

    /// Metadata errors: schema lookup failures, missing projects
    #[error("Metadata error: {message}")]
    Metadata {
        message: String,
        project_id: Option<String>,
    },

    /// Compilation errors: the validated plan could not be rendered into SQL
    #[error("Compilation error: {0}")]
    Compilation(#[from] CompileError),

    /// Execution errors: the external query engine rejected or failed the SQL
    #[error("Execution error: {message}")]
    Execution {
        message: String,
        sql: Option<String>,
    },

    /// Rendering errors: the visualization collaborator failed
    #[error("Render error: {message}")]
    Render { message: String },

    /// Internal errors: should never happen, indicates a bug
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        context: Option<String>,
    },
}

impl WorkflowError {
    pub fn reasoner(message: impl Into<String>) -> Self {
        Self::Reasoner {
            message: message.into(),
            context: None,
        }
    }

    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata {
            message: message.into(),
            project_id: None,
        }
    }

    pub fn metadata_for_project(message: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self::Metadata {
            message: message.into(),
            project_id: Some(project_id.into()),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql: None,
        }
    }

    pub fn execution_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql: Some(sql.into()),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Add context to an error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        match &mut self {
            Self::Reasoner { context: ctx, .. } => *ctx = Some(context.into()),
            Self::Internal { context: ctx, .. } => *ctx = Some(context.into()),
            _ => {}
        }
        self
    }

    /// Whether the coordinator may retry the failing phase.
    ///
    /// External-call failures (reasoner, executor, renderer) are transient.
    /// A compilation error indicates an unfixable plan inconsistency and a
    /// metadata error a missing project; neither improves on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Reasoner { .. } | Self::Execution { .. } | Self::Render { .. }
        )
    }
}

/// Result type alias for workflow operations
pub type EngineResult<T> = Result<T, WorkflowError>;
