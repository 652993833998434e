//! POP3 response parser.
//!
//! POP3 responses come in two shapes:
//! - Single: `+OK 2 messages` or `-ERR no such message`
//! - Multi: `+OK ...`, content lines, then a line holding only `.`
//!
//! A multi-line reply that fails is still a single `-ERR` line, so the
//! decoder has to look at the first line before it knows which shape
//! it is reading.

use crate::command::CRLF;
use crate::error::{Error, Result};
use crate::types::{Response, Status};

/// Line that ends a multi-line block.
pub const TERMINATOR: &str = ".";

/// Parses a single status line (without its terminator).
///
/// A line starting with `-ERR` is negative; anything else is positive.
/// The marker and one following space are stripped from the text.
#[must_use]
pub fn parse_status_line(line: &str) -> Response {
    if let Some(rest) = line.strip_prefix(Status::Err.marker()) {
        return Response::new(Status::Err, strip_separator(rest));
    }

    let rest = line.strip_prefix(Status::Ok.marker()).unwrap_or(line);
    Response::new(Status::Ok, strip_separator(rest))
}

fn strip_separator(rest: &str) -> &str {
    rest.strip_prefix(' ').unwrap_or(rest)
}

/// Removes dot-stuffing from a content line (RFC 1939 section 3).
#[must_use]
pub fn unstuff(line: &str) -> &str {
    if line.starts_with("..") { &line[1..] } else { line }
}

/// Incremental decoder for multi-line responses.
///
/// Feed it one line at a time until it returns the complete response.
#[derive(Debug, Default)]
pub struct MultiLineDecoder {
    text: Option<String>,
    body: String,
}

impl MultiLineDecoder {
    /// Creates a decoder waiting for the status line.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line (without its terminator).
    ///
    /// Returns the response once it is complete: immediately for `-ERR`,
    /// otherwise when the terminating `.` line arrives.
    pub fn feed(&mut self, line: &str) -> Option<Response> {
        if self.text.is_none() {
            let status = parse_status_line(line);
            if !status.is_ok() {
                return Some(status);
            }
            self.text = Some(status.text);
            return None;
        }

        if line == TERMINATOR {
            let text = self.text.take().unwrap_or_default();
            return Some(Response::multi_line(text, std::mem::take(&mut self.body)));
        }

        self.body.push_str(unstuff(line));
        self.body.push_str(CRLF);
        None
    }
}

/// Decodes a complete multi-line response from already-split lines.
///
/// # Errors
///
/// Returns [`Error::Malformed`] if the lines end before the block is terminated.
pub fn parse_multi_line<S: AsRef<str>>(lines: &[S]) -> Result<Response> {
    let mut decoder = MultiLineDecoder::new();
    for line in lines {
        if let Some(response) = decoder.feed(line.as_ref()) {
            return Ok(response);
        }
    }
    Err(Error::Malformed("multi-line response not terminated".into()))
}
