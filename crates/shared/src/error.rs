use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the pipeline should treat an infrastructure fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultClass {
    Transient,
    Fatal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFault {
    pub class: FaultClass,
    pub message: String,
}

impl SourceFault {
    pub fn new(class: FaultClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
#[error("{class:?}: {message}")]
pub struct SourceError {
    pub class: FaultClass,
    pub message: String,
}

impl SourceError {
    pub fn new(class: FaultClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FaultClass::Transient, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(FaultClass::Fatal, message)
    }

    pub fn is_transient(&self) -> bool {
        self.class == FaultClass::Transient
    }
}

impl From<SourceError> for SourceFault {
    fn from(value: SourceError) -> Self {
        Self {
            class: value.class,
            message: value.message,
        }
    }
}

impl From<SourceFault> for SourceError {
    fn from(value: SourceFault) -> Self {
        Self {
            class: value.class,
            message: value.message,
        }
    }
}
