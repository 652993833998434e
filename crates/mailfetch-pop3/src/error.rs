//! Error types for POP3 operations.

use std::io;

use crate::protocol::Phase;

/// Result type alias for POP3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// POP3 error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport could not be established.
    #[error("Connection failed: {0}")]
    Connection(#[source] io::Error),

    /// Operation invoked in the wrong session phase.
    #[error("Invalid state for {operation}: session is {phase}")]
    InvalidState {
        /// Operation that was rejected.
        operation: &'static str,
        /// Phase the session was in.
        phase: Phase,
    },

    /// Server returned `-ERR`.
    #[error("POP3 error: {0}")]
    Protocol(String),

    /// I/O error on an open channel.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Server sent content that could not be parsed.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl Error {
    /// Creates a state error for an operation.
    #[must_use]
    pub const fn invalid_state(operation: &'static str, phase: Phase) -> Self {
        Self::InvalidState { operation, phase }
    }

    /// Returns true if the operation was rejected by the session state machine.
    #[must_use]
    pub const fn is_state_error(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    /// Returns true if the server answered `-ERR`.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Returns the server's `-ERR` text, if this is a protocol error.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Protocol(message) => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_state_error_display() {
        let err = Error::invalid_state("LIST", Phase::Authorization);
        assert!(err.is_state_error());
        assert_eq!(
            err.to_string(),
            "Invalid state for LIST: session is AUTHORIZATION"
        );
    }

    #[test]
    fn test_server_message() {
        let err = Error::Protocol("bad credentials".into());
        assert!(err.is_server_error());
        assert_eq!(err.server_message(), Some("bad credentials"));
        assert_eq!(Error::Malformed("x".into()).server_message(), None);
    }
}
