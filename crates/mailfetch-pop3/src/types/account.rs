//! Maildrop account.

use std::fmt;

/// POP3 account: where the maildrop lives and how to log in.
///
/// Immutable once built. Sessions borrow it for their lifetime.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Account {
    host: String,
    #[cfg_attr(feature = "serde", serde(default = "default_port"))]
    port: u16,
    username: String,
    password: String,
}

impl Account {
    /// Default POP3 port.
    pub const DEFAULT_PORT: u16 = 110;

    /// Creates an account.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Server hostname.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Login name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Login password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

#[cfg(feature = "serde")]
const fn default_port() -> u16 {
    Account::DEFAULT_PORT
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let account = Account::new("pop.example.com", 110, "alice", "secret");
        assert_eq!(account.host(), "pop.example.com");
        assert_eq!(account.port(), Account::DEFAULT_PORT);
        assert_eq!(account.username(), "alice");
        assert_eq!(account.password(), "secret");
    }

    #[test]
    fn test_display_and_debug_hide_password() {
        let account = Account::new("pop.example.com", 1110, "alice", "secret");
        assert_eq!(account.to_string(), "alice@pop.example.com:1110");
        assert!(!format!("{account:?}").contains("secret"));
    }
}
