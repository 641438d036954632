//! Error types for command formatting and serial exchanges

use thiserror::Error;

/// Errors raised while turning a request into a command line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// A required parameter is missing or malformed
    #[error("Invalid parameter for '{operation}': {reason}")]
    InvalidParameter { operation: String, reason: String },

    /// The operation is not one the controller understands
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl CommandError {
    pub(crate) fn invalid(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the serial layer during an exchange
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Permission denied opening {0}")]
    PermissionDenied(String),

    #[error("Failed to open {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("Failed to enumerate serial ports: {0}")]
    Enumerate(String),

    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial support not enabled. Rebuild with --features serial")]
    Unsupported,
}

/// Any failure of a single request
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    /// Prefix used when the error is shown in a status log
    pub fn label(&self) -> &'static str {
        match self {
            Error::Command(_) => "Error",
            Error::Transport(_) => "Serial port error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
