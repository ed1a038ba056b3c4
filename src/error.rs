//! Error taxonomy.
//!
//! Internally every failure is one of the typed `PtcError` variants below;
//! at the public API boundary they all collapse into the single
//! `ExecutionResult::Failure(String)` shape so that the shape of
//! "something went wrong" never differs from a caller's point of view,
//! only the message does.

use thiserror::Error;

use crate::schema::{format_validation_failures, ValidationFailure};

#[derive(Debug, Error)]
pub enum PtcError {
    #[error("unbalanced braces in agent source: {open} open, {close} close ({})", missing_side(*open, *close))]
    UnbalancedBraces { open: usize, close: usize },

    #[error("assembly failed: {0}")]
    Assembly(String),

    #[error("compilation error at {location}: {message}")]
    Compilation { location: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Tool call error: {0}")]
    ToolCall(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("maximum iteration limit ({limit}) reached")]
    RecursionLimit { limit: u32 },

    #[error("Execution timed out after {ms}ms")]
    HostTimeout { ms: u64 },

    #[error("Tool request timeout")]
    ToolPollTimeout,

    #[error("sandbox error: {0}")]
    Sandbox(String),

    #[error("result contains a circular reference and cannot be serialized to JSON")]
    Shape(String),

    #[error("catalog error: {0}")]
    Catalog(String),
}

fn missing_side(open: usize, close: usize) -> String {
    use std::cmp::Ordering;
    match open.cmp(&close) {
        Ordering::Greater => format!("Missing {} closing brace(s)", open - close),
        Ordering::Less => format!("Missing {} opening brace(s)", close - open),
        Ordering::Equal => "balanced".to_string(),
    }
}

impl PtcError {
    /// The agent-readable message, matching the verbatim prefixes the
    /// emitted `main.<ext>` entry point relies on for error classification.
    pub fn agent_message(&self) -> String {
        self.to_string()
    }

    pub fn from_validation_failures(tool: &str, failures: &[ValidationFailure]) -> Self {
        PtcError::ToolCall(format!(
            "arguments to tool \"{tool}\" failed validation: {}",
            format_validation_failures(failures)
        ))
    }
}

/// Catalog construction failure (duplicate tool names).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("duplicate tool name in catalog: {0}")]
    DuplicateName(String),
}
