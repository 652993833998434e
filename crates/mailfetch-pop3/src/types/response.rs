//! POP3 response types.

use crate::{Error, Result};

/// Status indicator of a server response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// `+OK`
    Ok,
    /// `-ERR`
    Err,
}

impl Status {
    /// Marker for a positive response.
    pub const OK_MARKER: &'static str = "+OK";
    /// Marker for a negative response.
    pub const ERR_MARKER: &'static str = "-ERR";

    /// Returns the wire marker.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Ok => Self::OK_MARKER,
            Self::Err => Self::ERR_MARKER,
        }
    }
}

/// POP3 response from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status indicator.
    pub status: Status,
    /// Status line text after the marker.
    pub text: String,
    /// Multi-line block, CRLF after every line, without the status and dot lines.
    ///
    /// Empty for single-line responses and for any `-ERR`.
    pub body: String,
}

impl Response {
    /// Creates a single-line response.
    #[must_use]
    pub fn new(status: Status, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
            body: String::new(),
        }
    }

    /// Creates a positive multi-line response.
    #[must_use]
    pub fn multi_line(text: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            text: text.into(),
            body: body.into(),
        }
    }

    /// Returns true if the server answered `+OK`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Converts `-ERR` into [`Error::Protocol`] carrying the server text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the status is [`Status::Err`].
    pub fn require_ok(self) -> Result<Self> {
        match self.status {
            Status::Ok => Ok(self),
            Status::Err => Err(Error::Protocol(self.text)),
        }
    }

    /// Iterates the lines of the multi-line block.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.body.split_terminator("\r\n")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_markers() {
        assert_eq!(Status::Ok.marker(), "+OK");
        assert_eq!(Status::Err.marker(), "-ERR");
    }

    #[test]
    fn test_require_ok_passes_ok() {
        let response = Response::new(Status::Ok, "ready");
        assert!(response.is_ok());
        assert_eq!(response.require_ok().unwrap().text, "ready");
    }

    #[test]
    fn test_require_ok_maps_err() {
        let err = Response::new(Status::Err, "no such message")
            .require_ok()
            .unwrap_err();
        assert_eq!(err.server_message(), Some("no such message"));
    }

    #[test]
    fn test_lines() {
        let response = Response::multi_line("2 messages", "1 120\r\n2 340\r\n");
        let lines: Vec<&str> = response.lines().collect();
        assert_eq!(lines, vec!["1 120", "2 340"]);
    }

    #[test]
    fn test_lines_empty_body() {
        let response = Response::multi_line("0 messages", "");
        assert_eq!(response.lines().count(), 0);
    }
}
