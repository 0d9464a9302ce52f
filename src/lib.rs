//! # AutoQuery
//!
//! A natural-language analytics workflow engine: questions come in, the
//! reasoner drafts a query plan, the validator reconciles it against schema
//! metadata, the compiler lowers it to SQL deterministically, and the
//! coordinator drives the whole thing through a phased state machine with
//! retries and a clarification loop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use autoquery::plan::QueryPlan;
//! use autoquery::sql::SqlCompiler;
//!
//! let plan: QueryPlan = serde_json::from_str(r#"{
//!     "tables": ["orders"],
//!     "select_columns": [{"expression": "orders.region", "alias": "region"}],
//!     "limit_count": 10
//! }"#).unwrap();
//!
//! let sql = SqlCompiler::new().compile(&plan).unwrap();
//! println!("{}", sql);
//! ```
//!
//! ## Pipeline
//!
//! - **ANALYZE**: reasoner + plan validator, may pause for clarification
//! - **EXTRACT**: deterministic plan-to-SQL compilation
//! - **EXECUTE**: scoped executor connection, bounded result sample
//! - **VISUALIZE**: summary artifact over the result set

// Internal modules
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod metadata;
pub mod plan;
pub mod reasoner;
pub mod render;
pub mod sql;
pub mod web;
pub mod workflow;

// Public API - Main types users need
pub use context::{Context, ContextUpdate, ReasoningStep};
pub use error::{EngineResult, WorkflowError};
pub use plan::{PlanValidator, QueryPlan, ValidatedPlan};
pub use sql::{CompileError, SqlCompiler};
pub use workflow::{Coordinator, WorkflowOutcome, WorkflowState};
