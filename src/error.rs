//! Error types for a3s-hooks

use thiserror::Error;

/// Errors that can occur in the hook system
#[derive(Debug, Error)]
pub enum HookError {
    /// Operation addressed an unknown or removed webhook
    #[error("Webhook not found: {0}")]
    NotFound(String),

    /// The shared store could not complete an operation
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Observer-side transport failure during relay
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse error classification, stable across message changes
///
/// Lets the transport layer pick a wire status without matching on text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    StoreUnavailable,
    ConnectionLost,
    Config,
}

impl HookError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            HookError::NotFound(_) => ErrorKind::NotFound,
            HookError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            HookError::ConnectionLost(_) => ErrorKind::ConnectionLost,
            HookError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result type alias for hook operations
pub type Result<T> = std::result::Result<T, HookError>;
