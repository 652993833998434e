//! Fetcher configuration.
//!
//! Loaded from a JSON file:
//!
//! ```json
//! {
//!   "accounts": [
//!     { "host": "pop.example.com", "port": 110, "username": "alice", "password": "secret" }
//!   ],
//!   "database": "/var/lib/mailfetch/mail.db",
//!   "connect_timeout_secs": 30,
//!   "io_timeout_secs": 60
//! }
//! ```
//!
//! Only `accounts` is required.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mailfetch_pop3::{Account, SessionConfig};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const APP_DIR: &str = "mailfetch";

/// Fetcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Accounts to fetch, in order.
    pub accounts: Vec<Account>,
    /// Database file. Defaults to the platform data directory.
    #[serde(default)]
    pub database: Option<PathBuf>,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Per-line I/O timeout in seconds.
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,
}

const fn default_connect_timeout() -> u64 {
    30
}

const fn default_io_timeout() -> u64 {
    60
}

impl Config {
    /// Creates a configuration for the given accounts with default settings.
    #[must_use]
    pub const fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts,
            database: None,
            connect_timeout_secs: default_connect_timeout(),
            io_timeout_secs: default_io_timeout(),
        }
    }

    /// Reads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON,
    /// or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Parses and validates a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON or fails validation.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration file location (`<config dir>/mailfetch/config.json`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json"))
    }

    /// Database file to use.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured and the platform has no
    /// data directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR).join("mail.db"))
            .ok_or_else(|| Error::Config("no data directory; set \"database\"".into()))
    }

    /// Session timeouts derived from this configuration.
    #[must_use]
    pub const fn session_config(&self) -> SessionConfig {
        SessionConfig::new()
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .io_timeout(Duration::from_secs(self.io_timeout_secs))
    }

    /// Checks that every account is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.accounts.is_empty() {
            return Err(Error::Config("no accounts configured".into()));
        }

        for (i, account) in self.accounts.iter().enumerate() {
            if account.host().trim().is_empty() {
                return Err(Error::Config(format!("account {i}: host is empty")));
            }
            if account.port() == 0 {
                return Err(Error::Config(format!("account {i}: port must be non-zero")));
            }
            if account.username().trim().is_empty() {
                return Err(Error::Config(format!("account {i}: username is empty")));
            }
        }

        if self.connect_timeout_secs == 0 || self.io_timeout_secs == 0 {
            return Err(Error::Config("timeouts must be non-zero".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config = Config::from_json(
            r#"{"accounts": [{"host": "pop.example.com", "username": "alice", "password": "x"}]}"#,
        )
        .unwrap();

        assert_eq!(config.accounts.len(), 1);
        assert_eq!(config.accounts[0].port(), 110);
        assert_eq!(config.database, None);
        assert_eq!(config.session_config(), SessionConfig::default());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_json(
            r#"{
                "accounts": [
                    {"host": "a.example.com", "port": 1110, "username": "a", "password": "1"},
                    {"host": "b.example.com", "port": 110, "username": "b", "password": "2"}
                ],
                "database": "/tmp/mail.db",
                "connect_timeout_secs": 5,
                "io_timeout_secs": 7
            }"#,
        )
        .unwrap();

        assert_eq!(config.accounts[0].port(), 1110);
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/mail.db"));
        let session = config.session_config();
        assert_eq!(session.connect_timeout, Duration::from_secs(5));
        assert_eq!(session.io_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_rejects_empty_accounts() {
        let err = Config::from_json(r#"{"accounts": []}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_blank_host() {
        let err = Config::from_json(
            r#"{"accounts": [{"host": " ", "username": "alice", "password": "x"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("host is empty"));
    }

    #[test]
    fn test_rejects_zero_port() {
        let config = Config::new(vec![Account::new("pop.example.com", 0, "alice", "x")]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_invalid_json() {
        assert!(matches!(
            Config::from_json("{not json"),
            Err(Error::Serde(_))
        ));
    }

    #[test]
    fn test_round_trip_keeps_accounts() {
        let config = Config::new(vec![Account::new("pop.example.com", 995, "alice", "x")]);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(Config::from_json(&json).unwrap(), config);
    }
}
