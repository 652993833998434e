//! Message identity and content types.

use std::fmt;

use crate::{Error, Result};

/// Scan listing entry for one message: its number in this session and its size.
///
/// Message numbers are only meaningful within the session that listed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MailInfo {
    /// Message number assigned by the server.
    pub index: u32,
    /// Size in octets as reported by the server.
    pub size: u64,
}

impl MailInfo {
    /// Creates a listing entry.
    #[must_use]
    pub const fn new(index: u32, size: u64) -> Self {
        Self { index, size }
    }

    /// Parses a scan listing line (`<index> <size>`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] unless the line holds exactly two numeric tokens.
    pub fn parse(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let (Some(index), Some(size), None) = (tokens.next(), tokens.next(), tokens.next()) else {
            return Err(Error::Malformed(format!("scan listing: {line:?}")));
        };

        let index = index
            .parse()
            .map_err(|_| Error::Malformed(format!("message number: {index:?}")))?;
        let size = size
            .parse()
            .map_err(|_| Error::Malformed(format!("message size: {size:?}")))?;

        Ok(Self { index, size })
    }
}

impl fmt::Display for MailInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({} octets)", self.index, self.size)
    }
}

/// Raw message as retrieved from the server (headers and body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail(String);

impl Mail {
    /// Wraps raw message text.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw message text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the message is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the mail and returns the raw text.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing_line() {
        assert_eq!(MailInfo::parse("1 120").unwrap(), MailInfo::new(1, 120));
        assert_eq!(MailInfo::parse("  2\t340 ").unwrap(), MailInfo::new(2, 340));
    }

    #[test]
    fn test_parse_rejects_wrong_token_count() {
        assert!(MailInfo::parse("1").is_err());
        assert!(MailInfo::parse("1 120 extra").is_err());
        assert!(MailInfo::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert!(matches!(
            MailInfo::parse("one 120"),
            Err(Error::Malformed(_))
        ));
        assert!(MailInfo::parse("1 big").is_err());
    }

    #[test]
    fn test_equality_by_value() {
        assert_eq!(MailInfo::new(1, 120), MailInfo::new(1, 120));
        assert_ne!(MailInfo::new(1, 120), MailInfo::new(2, 120));
    }

    #[test]
    fn test_mail_accessors() {
        let mail = Mail::new("Subject: hi\r\n");
        assert_eq!(mail.len(), 13);
        assert!(!mail.is_empty());
        assert_eq!(mail.into_inner(), "Subject: hi\r\n");
    }
}
