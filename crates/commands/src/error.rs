use shared::error::SourceError;
use thiserror::Error;

/// A command chain that cannot be executed as registered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidChainError {
    #[error("command chain is empty")]
    Empty,
    #[error("normalized invocation is `{normalized}`, but command {command} has invocation `{declared}`")]
    Normalization {
        command: String,
        normalized: String,
        declared: String,
    },
    #[error("parameter {parameter} is of kind {expected} in parent {ancestor} but {found} in {command}")]
    ParameterKind {
        ancestor: String,
        command: String,
        parameter: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("parameter {parameter} is required in parent {ancestor} but may be absent in {command}")]
    ParameterOptional {
        ancestor: String,
        command: String,
        parameter: String,
    },
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("context used before initialization")]
    NotInitialized,
}

/// Conversion failure for one argument.
#[derive(Debug, Error)]
pub enum ArgumentError {
    /// Shown to the caller.
    #[error("{0}")]
    Invalid(String),
    #[error("entity lookup failed: {0:#}")]
    Resolver(#[source] anyhow::Error),
}

impl ArgumentError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Errors that stop the orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("event source failed: {0}")]
    Source(#[from] SourceError),
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: SourceError },
    #[error("command {command} has unmatched trailing input `{leftover}`")]
    MatchViolation { command: String, leftover: String },
}

/// A handler chain that ended without a usable result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlingError {
    #[error("command {command} under invocation `{invocation}` was not completely handled")]
    Incomplete { command: String, invocation: String },
    #[error("handler of command {command} panicked: {message}")]
    Panicked { command: String, message: String },
}
