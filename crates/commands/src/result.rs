//! Outcomes produced by command handlers and by the pipeline stages that
//! short-circuit an invocation.

use std::{fmt, sync::Arc};

use crate::access::Group;

/// The outcome of one pipeline stage or handler.
///
/// Every invocation ends with exactly one terminal (non-[`Continue`](CommandResult::Continue))
/// result.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Continue,
    Success(Success),
    Failure(Failure),
    Error(CommandError),
}

impl CommandResult {
    pub fn ok() -> Self {
        Self::Success(Success::Ok)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::Success(Success::Message(message.into()))
    }

    pub fn ack(reaction: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Success(Success::Ack {
            reaction: reaction.into(),
            message: message.into(),
        })
    }

    pub fn fail() -> Self {
        Self::Failure(Failure::Fail)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(Failure::Message(message.into()))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(CommandError::new(message))
    }

    pub fn exception(cause: anyhow::Error) -> Self {
        Self::Error(CommandError::from_cause(cause))
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, CommandResult::Continue)
    }

    /// Low-cardinality tag used by metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            CommandResult::Continue => "continue",
            CommandResult::Success(_) => "success",
            CommandResult::Failure(_) => "failure",
            CommandResult::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Success {
    Ok,
    Message(String),
    Ack { reaction: String, message: String },
}

#[derive(Debug, Clone)]
pub enum Failure {
    Fail,
    Message(String),
    SettingDenied(String),
    ArgumentMissing { parameter: String },
    ArgumentInvalid { parameter: String, message: String },
    ArgumentExtra { extra: Vec<String> },
    UserNotAllowed { group: Group },
}

impl Failure {
    /// Human-readable text for renderers, when the failure carries one.
    pub fn message(&self) -> Option<String> {
        match self {
            Failure::Fail => None,
            Failure::Message(message) | Failure::SettingDenied(message) => Some(message.clone()),
            Failure::ArgumentMissing { parameter } => {
                Some(format!("Missing argument for parameter `{parameter}`."))
            }
            Failure::ArgumentInvalid { parameter, message } => {
                Some(format!("Invalid argument for parameter `{parameter}`: {message}"))
            }
            Failure::ArgumentExtra { extra } => Some(format!(
                "Unexpected extra arguments: {}",
                extra
                    .iter()
                    .map(|arg| format!("`{arg}`"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            Failure::UserNotAllowed { group } => match group.name() {
                Some(name) => Some(format!(
                    "Only users in the {name} group can use this command."
                )),
                None => Some("You cannot use this command.".to_string()),
            },
        }
    }
}

/// An internal error. The message is safe to show; the cause is for logs.
#[derive(Clone)]
pub struct CommandError {
    pub message: String,
    pub cause: Option<Arc<anyhow::Error>>,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn from_cause(cause: anyhow::Error) -> Self {
        Self {
            message: "An internal error occurred while running this command.".to_string(),
            cause: Some(Arc::new(cause)),
        }
    }
}

impl fmt::Debug for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandError")
            .field("message", &self.message)
            .field("cause", &self.cause.as_ref().map(|cause| format!("{cause:#}")))
            .finish()
    }
}
