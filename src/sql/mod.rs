//! Deterministic SQL generation from validated plans

pub mod compiler;

pub use compiler::{CompileError, SqlCompiler};
