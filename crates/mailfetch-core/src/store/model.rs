//! Stored mail model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A mail as recorded by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMail {
    /// Store-assigned identifier.
    pub id: i64,
    /// Account the mail belongs to (`user@host:port`).
    pub account: String,
    /// SHA-256 of the raw message, hex encoded.
    pub digest: String,
    /// Value of the `Subject` header, if any.
    pub subject: Option<String>,
    /// Size of the raw message in bytes.
    pub size: usize,
    /// When the mail was first stored.
    pub stored_at: DateTime<Utc>,
    /// Raw message text.
    pub body: String,
}

impl fmt::Display for StoredMail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.digest.get(..12).unwrap_or(&self.digest);
        write!(
            f,
            "[{}] {} ({} bytes, {short}, stored {})",
            self.id,
            self.subject.as_deref().unwrap_or("(no subject)"),
            self.size,
            self.stored_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

/// Hex-encoded SHA-256 of a raw message.
#[must_use]
pub fn digest(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

/// Extracts the `Subject` header from a raw message.
///
/// Only the header section (up to the first blank line) is searched.
/// Folded continuation lines are not joined.
#[must_use]
pub fn subject(raw: &str) -> Option<String> {
    raw.lines()
        .take_while(|line| !line.is_empty())
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("subject")
                .then(|| value.trim().to_string())
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable_hex() {
        let d = digest("hello");
        assert_eq!(d.len(), 64);
        assert_eq!(
            d,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_subject_found() {
        let raw = "From: a\r\nSUBJECT:  hi there \r\n\r\nbody\r\n";
        assert_eq!(subject(raw).as_deref(), Some("hi there"));
    }

    #[test]
    fn test_subject_ignores_body() {
        let raw = "From: a\r\n\r\nSubject: not a header\r\n";
        assert_eq!(subject(raw), None);
    }

    #[test]
    fn test_display() {
        let mail = StoredMail {
            id: 3,
            account: "alice@pop.example.com:110".into(),
            digest: digest("x"),
            subject: None,
            size: 1,
            stored_at: DateTime::from_timestamp(0, 0).unwrap(),
            body: "x".into(),
        };
        let text = mail.to_string();
        assert!(text.starts_with("[3] (no subject) (1 bytes, "));
        assert!(text.ends_with("stored 1970-01-01 00:00:00 UTC)"));
    }
}
