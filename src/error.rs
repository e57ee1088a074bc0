//! Error types shared across the analysis pipeline.

use thiserror::Error;

/// Errors raised by an [`AstProvider`](crate::ast::AstProvider) when source
/// text cannot be turned into a syntax tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("syntax error at line {line}, column {column}: {detail}")]
    Syntax {
        line: usize,
        column: usize,
        detail: String,
    },
    #[error("parser rejected the grammar: {0}")]
    Language(String),
    #[error("parser produced no tree")]
    Aborted,
}

/// Errors raised by a single rule while inspecting a single node.
///
/// These never leave the analyzer; the offending rule is skipped for
/// that node and every other rule keeps running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("malformed {kind} node: {reason}")]
    MalformedNode { kind: &'static str, reason: String },
    #[error("rule panicked: {0}")]
    Panicked(String),
}

impl RuleError {
    pub fn malformed(kind: &'static str, reason: impl Into<String>) -> Self {
        RuleError::MalformedNode {
            kind,
            reason: reason.into(),
        }
    }
}

/// Errors raised by an execution host.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("execution host is no longer accepting requests")]
    Disconnected,
    #[error("failed to start worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("worker thread panicked")]
    WorkerPanicked,
}

/// Errors raised while applying fix edits to source text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FixError {
    #[error("edit range {start}..{end} is outside the source ({len} bytes)")]
    OutOfBounds { start: usize, end: usize, len: usize },
    #[error("edit range {start}..{end} is inverted")]
    Inverted { start: usize, end: usize },
    #[error("edit boundary {0} does not fall on a character boundary")]
    CharBoundary(usize),
}

/// Render a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
