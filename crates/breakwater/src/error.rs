//! Error types.

use thiserror::Error;

/// A breaker configuration failed validation at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid breaker configuration: {message}")]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
