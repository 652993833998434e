//! Line-oriented channel over the POP3 transport.

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::SessionConfig;
use crate::parser::{MultiLineDecoder, parse_status_line};
use crate::types::Response;
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Buffered line reader and writer over one transport.
///
/// Every written line is flushed before the call returns.
pub struct Channel<S> {
    reader: BufReader<S>,
    io_timeout: Duration,
}

impl<S> std::fmt::Debug for Channel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}

impl Channel<TcpStream> {
    /// Connects to a POP3 server over plain TCP.
    ///
    /// Fails with [`Error::Connection`] if the connection cannot be made
    /// within the configured timeout.
    pub async fn open(host: &str, port: u16, config: &SessionConfig) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                Error::Connection(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connecting to {addr} timed out"),
                ))
            })?
            .map_err(Error::Connection)?;

        tracing::debug!(%addr, "connected");
        Ok(Self::new(stream, config.io_timeout))
    }
}

impl<S> Channel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established stream.
    pub fn new(stream: S, io_timeout: Duration) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            io_timeout,
        }
    }

    /// Writes one CRLF-terminated line and flushes it.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let stream = self.reader.get_mut();
        with_timeout(self.io_timeout, async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await
        })
        .await?;
        Ok(())
    }

    /// Reads one line and returns it without its terminator.
    ///
    /// Accepts both CRLF and bare LF endings. Bytes that are not valid
    /// UTF-8 are replaced with U+FFFD.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = with_timeout(self.io_timeout, read_raw_line(&mut self.reader)).await?;

        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }

        let line = String::from_utf8_lossy(&line).into_owned();
        tracing::trace!(%line, "S:");
        Ok(line)
    }

    /// Reads a single-line response.
    pub async fn read_response(&mut self) -> Result<Response> {
        let line = self.read_line().await?;
        Ok(parse_status_line(&line))
    }

    /// Reads a multi-line response, or a single `-ERR` line.
    pub async fn read_multi_line(&mut self) -> Result<Response> {
        let mut decoder = MultiLineDecoder::new();
        loop {
            let line = self.read_line().await?;
            if let Some(response) = decoder.feed(&line) {
                return Ok(response);
            }
        }
    }

    /// Shuts the transport down.
    pub async fn close(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }
}

async fn with_timeout<T, F>(limit: Duration, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no response within {}s", limit.as_secs()),
        )),
    }
}

/// Reads up to and including the next LF.
async fn read_raw_line<R>(reader: &mut BufReader<R>) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut line = Vec::new();

    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            ));
        }

        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&buf[..=pos]);
            reader.consume(pos + 1);
            if line.len() > MAX_LINE_LENGTH {
                return Err(too_long());
            }
            return Ok(line);
        }

        let len = buf.len();
        line.extend_from_slice(buf);
        reader.consume(len);

        if line.len() > MAX_LINE_LENGTH {
            return Err(too_long());
        }
    }
}

fn too_long() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "line too long")
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::types::Status;
    use tokio_test::io::Builder;

    fn channel(mock: tokio_test::io::Mock) -> Channel<tokio_test::io::Mock> {
        Channel::new(mock, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_read_line_strips_crlf() {
        let mut channel = channel(Builder::new().read(b"+OK ready\r\n").build());
        assert_eq!(channel.read_line().await.unwrap(), "+OK ready");
    }

    #[tokio::test]
    async fn test_read_line_accepts_bare_lf() {
        let mut channel = channel(Builder::new().read(b"+OK ready\n").build());
        assert_eq!(channel.read_line().await.unwrap(), "+OK ready");
    }

    #[tokio::test]
    async fn test_read_line_across_chunks() {
        let mut channel = channel(
            Builder::new()
                .read(b"+OK ")
                .read(b"split\r")
                .read(b"\nnext\r\n")
                .build(),
        );
        assert_eq!(channel.read_line().await.unwrap(), "+OK split");
        assert_eq!(channel.read_line().await.unwrap(), "next");
    }

    #[tokio::test]
    async fn test_read_line_eof() {
        let mut channel = channel(Builder::new().read(b"+OK partial").build());
        let err = channel.read_line().await.unwrap_err();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_read_line_replaces_invalid_utf8() {
        let mut channel = channel(Builder::new().read(b"+OK \xff\r\n").build());
        assert_eq!(channel.read_line().await.unwrap(), "+OK \u{FFFD}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_line_times_out() {
        let mock = Builder::new().wait(Duration::from_secs(10)).build();
        let mut channel = Channel::new(mock, Duration::from_secs(1));
        match channel.read_line().await.unwrap_err() {
            Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_open_refused_is_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = Channel::open("127.0.0.1", port, &SessionConfig::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mut channel = channel(Builder::new().read(long_line.as_bytes()).build());
        let err = channel.read_line().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }

    #[tokio::test]
    async fn test_line_length_limit_when_terminated_in_next_chunk() {
        let head = "A".repeat(MAX_LINE_LENGTH - 10);
        let mut channel = channel(
            Builder::new()
                .read(head.as_bytes())
                .read(b"AAAAAAAAAAAAAAAAAAAA\r\n")
                .build(),
        );
        let err = channel.read_line().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }

    #[tokio::test]
    async fn test_write_line() {
        let mut channel = channel(Builder::new().write(b"LIST\r\n").build());
        channel.write_line("LIST\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_response() {
        let mut channel = channel(Builder::new().read(b"-ERR locked\r\n").build());
        let response = channel.read_response().await.unwrap();
        assert_eq!(response.status, Status::Err);
        assert_eq!(response.text, "locked");
    }

    #[tokio::test]
    async fn test_read_multi_line() {
        let mut channel = channel(
            Builder::new()
                .read(b"+OK x\r\na\r\n")
                .read(b"b\r\n.\r\n")
                .build(),
        );
        let response = channel.read_multi_line().await.unwrap();
        assert_eq!(response.text, "x");
        assert_eq!(response.body, "a\r\nb\r\n");
    }

    #[tokio::test]
    async fn test_read_multi_line_err_reads_one_line() {
        let mut channel = channel(
            Builder::new()
                .read(b"-ERR no such message\r\n")
                .read(b"+OK next\r\n")
                .build(),
        );
        let response = channel.read_multi_line().await.unwrap();
        assert_eq!(response.status, Status::Err);

        // The following line is still unread.
        assert_eq!(channel.read_line().await.unwrap(), "+OK next");
    }
}
