//! Session phase types.
//!
//! This module defines the phases a POP3 session moves through,
//! following RFC 1939 section 3. The UPDATE state is not tracked:
//! it is entered and left within a single QUIT exchange.

use std::fmt;

use crate::{Error, Result};

/// Protocol phase of a session.
///
/// ```text
/// Disconnected ── connect() ──→ Authorization ── authorize() ──→ Transaction
///      ↑                              │                               │
///      └──────── disconnect() ────────┴───────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// No channel is open.
    #[default]
    Disconnected,

    /// Greeting received, waiting for credentials.
    ///
    /// Only USER, PASS and QUIT are valid here.
    Authorization,

    /// Credentials accepted, the maildrop is locked.
    ///
    /// LIST, RETR, DELE and QUIT are valid here.
    Transaction,
}

impl Phase {
    /// Returns the protocol name of the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Authorization => "AUTHORIZATION",
            Self::Transaction => "TRANSACTION",
        }
    }

    /// Fails unless the session is in `required`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] naming `operation`.
    pub fn require(self, required: Self, operation: &'static str) -> Result<()> {
        if self == required {
            Ok(())
        } else {
            Err(Error::invalid_state(operation, self))
        }
    }

    /// Fails if the session is in `prohibited`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] naming `operation`.
    pub fn prohibit(self, prohibited: Self, operation: &'static str) -> Result<()> {
        if self == prohibited {
            Err(Error::invalid_state(operation, self))
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_default() {
        assert_eq!(Phase::default(), Phase::Disconnected);
    }

    #[test]
    fn test_require() {
        assert!(Phase::Transaction.require(Phase::Transaction, "LIST").is_ok());

        let err = Phase::Authorization
            .require(Phase::Transaction, "LIST")
            .unwrap_err();
        match err {
            Error::InvalidState { operation, phase } => {
                assert_eq!(operation, "LIST");
                assert_eq!(phase, Phase::Authorization);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_prohibit() {
        assert!(Phase::Transaction.prohibit(Phase::Disconnected, "QUIT").is_ok());
        assert!(
            Phase::Disconnected
                .prohibit(Phase::Disconnected, "QUIT")
                .unwrap_err()
                .is_state_error()
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Phase::Transaction.to_string(), "TRANSACTION");
    }
}
