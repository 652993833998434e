//! POP3 session with runtime phase checks.
//!
//! A `Session` owns the channel for one account and tracks the
//! protocol [`Phase`]. Every operation checks the phase before it
//! touches the network, so a misordered call fails without sending
//! anything.
//!
//! ## Example
//!
//! ```ignore
//! use mailfetch_pop3::{Account, Session};
//!
//! let account = Account::new("pop.example.com", 110, "user", "password");
//! let mut session = Session::new(&account);
//!
//! session.connect().await?;
//! session.authorize().await?;
//! for info in session.list().await? {
//!     let mail = session.retrieve(&info).await?;
//!     session.delete(&info).await?;
//! }
//! session.quit().await?;
//! ```

use std::collections::HashSet;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use super::{Channel, SessionConfig};
use crate::command::Command;
use crate::protocol::Phase;
use crate::types::{Account, Mail, MailInfo, Response};
use crate::{Error, Result};

/// Stateful POP3 session for one account.
///
/// The channel is shut down on [`disconnect`](Self::disconnect) and on
/// [`quit`](Self::quit). Dropping the session without either only drops
/// the underlying stream, which closes the socket without a shutdown.
pub struct Session<'a, S = TcpStream> {
    account: &'a Account,
    config: SessionConfig,
    channel: Option<Channel<S>>,
    phase: Phase,
}

impl<S> std::fmt::Debug for Session<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("account", self.account)
            .field("config", &self.config)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl<'a, S> Session<'a, S> {
    /// Creates a disconnected session with default timeouts.
    #[must_use]
    pub const fn new(account: &'a Account) -> Self {
        Self::with_config(account, SessionConfig::new())
    }

    /// Creates a disconnected session with the given timeouts.
    #[must_use]
    pub const fn with_config(account: &'a Account, config: SessionConfig) -> Self {
        Self {
            account,
            config,
            channel: None,
            phase: Phase::Disconnected,
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the account this session serves.
    #[must_use]
    pub const fn account(&self) -> &'a Account {
        self.account
    }
}

impl Session<'_, TcpStream> {
    /// Connects to the account's server and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless disconnected,
    /// [`Error::Connection`] if the server cannot be reached, and
    /// [`Error::Protocol`] if the greeting is `-ERR`.
    pub async fn connect(&mut self) -> Result<()> {
        self.phase.require(Phase::Disconnected, "connect")?;

        let channel =
            Channel::open(self.account.host(), self.account.port(), &self.config).await?;
        self.handshake(channel).await
    }
}

impl<S> Session<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Runs the greeting handshake over an already established stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless disconnected, and
    /// [`Error::Protocol`] if the greeting is `-ERR`.
    pub async fn connect_stream(&mut self, stream: S) -> Result<()> {
        self.phase.require(Phase::Disconnected, "connect")?;

        let channel = Channel::new(stream, self.config.io_timeout);
        self.handshake(channel).await
    }

    async fn handshake(&mut self, mut channel: Channel<S>) -> Result<()> {
        let greeting = match channel.read_response().await.and_then(Response::require_ok) {
            Ok(greeting) => greeting,
            Err(e) => {
                release(channel).await;
                return Err(e);
            }
        };

        tracing::info!(account = %self.account, greeting = %greeting.text, "POP3 session opened");
        self.channel = Some(channel);
        self.phase = Phase::Authorization;
        Ok(())
    }

    /// Logs in with USER and PASS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless in AUTHORIZATION, and
    /// [`Error::Protocol`] if either step is rejected.
    pub async fn authorize(&mut self) -> Result<()> {
        self.phase.require(Phase::Authorization, "authorize")?;

        self.command(Command::User {
            name: self.account.username().to_string(),
        })
        .await?
        .require_ok()?;

        self.command(Command::Pass {
            password: self.account.password().to_string(),
        })
        .await?
        .require_ok()?;

        self.phase = Phase::Transaction;
        tracing::debug!(account = %self.account, "authorized");
        Ok(())
    }

    /// Lists the messages in the maildrop.
    ///
    /// Entries keep the server's order. An entry repeated with the same
    /// number and size is only returned once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless in TRANSACTION,
    /// [`Error::Protocol`] on `-ERR`, and [`Error::Malformed`] for an
    /// unparseable scan line.
    pub async fn list(&mut self) -> Result<Vec<MailInfo>> {
        self.phase.require(Phase::Transaction, "list")?;

        let response = self.command_multi_line(Command::List).await?.require_ok()?;

        let mut seen = HashSet::new();
        let mut infos = Vec::new();
        for line in response.lines() {
            let info = MailInfo::parse(line)?;
            if seen.insert(info) {
                infos.push(info);
            }
        }

        tracing::debug!(count = infos.len(), "listed messages");
        Ok(infos)
    }

    /// Retrieves one message.
    ///
    /// The status line is dropped and the rest of the block is returned
    /// verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless in TRANSACTION, and
    /// [`Error::Protocol`] on `-ERR`.
    pub async fn retrieve(&mut self, info: &MailInfo) -> Result<Mail> {
        self.phase.require(Phase::Transaction, "retrieve")?;

        let response = self
            .command_multi_line(Command::Retr { index: info.index })
            .await?
            .require_ok()?;

        tracing::debug!(index = info.index, bytes = response.body.len(), "retrieved message");
        Ok(Mail::new(response.body))
    }

    /// Marks one message as deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless in TRANSACTION, and
    /// [`Error::Protocol`] on `-ERR`.
    pub async fn delete(&mut self, info: &MailInfo) -> Result<()> {
        self.phase.require(Phase::Transaction, "delete")?;

        self.command(Command::Dele { index: info.index })
            .await?
            .require_ok()?;
        Ok(())
    }

    /// Sends QUIT, which commits deletions, then disconnects.
    ///
    /// The channel is released even if QUIT fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if already disconnected, and
    /// [`Error::Protocol`] if the server rejects QUIT.
    pub async fn quit(&mut self) -> Result<()> {
        self.phase.prohibit(Phase::Disconnected, "quit")?;

        let result = self
            .command(Command::Quit)
            .await
            .and_then(Response::require_ok);
        self.disconnect().await;
        result.map(|_| ())
    }

    /// Releases the channel and returns to DISCONNECTED.
    ///
    /// Does not send QUIT, so the server discards pending deletions.
    /// Calling it while already disconnected does nothing.
    pub async fn disconnect(&mut self) {
        if let Some(channel) = self.channel.take() {
            release(channel).await;
            tracing::debug!(account = %self.account, "POP3 session closed");
        }
        self.phase = Phase::Disconnected;
    }

    fn channel_mut(&mut self, operation: &'static str) -> Result<&mut Channel<S>> {
        let phase = self.phase;
        self.channel
            .as_mut()
            .ok_or(Error::invalid_state(operation, phase))
    }

    async fn command(&mut self, command: Command) -> Result<Response> {
        let channel = self.channel_mut(command.name())?;
        tracing::debug!(%command, "C:");
        channel.write_line(&command.serialize()).await?;

        let response = channel.read_response().await?;
        tracing::debug!(status = ?response.status, text = %response.text, "S:");
        Ok(response)
    }

    async fn command_multi_line(&mut self, command: Command) -> Result<Response> {
        let channel = self.channel_mut(command.name())?;
        tracing::debug!(%command, "C:");
        channel.write_line(&command.serialize()).await?;

        let response = channel.read_multi_line().await?;
        tracing::debug!(
            status = ?response.status,
            text = %response.text,
            bytes = response.body.len(),
            "S:"
        );
        Ok(response)
    }
}

async fn release<S>(mut channel: Channel<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = channel.close().await {
        tracing::debug!(?e, "error while closing channel");
    }
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
    use tokio_test::io::{Builder, Mock};

    fn account() -> Account {
        Account::new("pop.example.com", 110, "alice", "secret")
    }

    fn login(builder: &mut Builder) -> &mut Builder {
        builder
            .read(b"+OK POP3 ready\r\n")
            .write(b"USER alice\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"+OK maildrop locked\r\n")
    }

    async fn authorized<'a>(account: &'a Account, mock: Mock) -> Session<'a, Mock> {
        let mut session = Session::new(account);
        session.connect_stream(mock).await.unwrap();
        session.authorize().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_connect_and_authorize() {
        let account = account();
        let mock = login(&mut Builder::new()).build();
        let mut session: Session<'_, Mock> = Session::new(&account);
        assert_eq!(session.phase(), Phase::Disconnected);

        session.connect_stream(mock).await.unwrap();
        assert_eq!(session.phase(), Phase::Authorization);

        session.authorize().await.unwrap();
        assert_eq!(session.phase(), Phase::Transaction);
    }

    #[tokio::test]
    async fn test_rejected_greeting() {
        let account = account();
        let mock = Builder::new().read(b"-ERR too busy\r\n").build();
        let mut session = Session::new(&account);

        let err = session.connect_stream(mock).await.unwrap_err();
        assert_eq!(err.server_message(), Some("too busy"));
        assert_eq!(session.phase(), Phase::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_twice_is_state_error() {
        let account = account();
        let mut session = Session::new(&account);
        session
            .connect_stream(Builder::new().read(b"+OK\r\n").build())
            .await
            .unwrap();

        let err = session
            .connect_stream(Builder::new().build())
            .await
            .unwrap_err();
        assert!(err.is_state_error());
    }

    #[tokio::test]
    async fn test_list_before_authorize_sends_nothing() {
        let account = account();
        let mock = Builder::new().read(b"+OK POP3 ready\r\n").build();
        let mut session = Session::new(&account);
        session.connect_stream(mock).await.unwrap();

        let err = session.list().await.unwrap_err();
        assert!(err.is_state_error());
        assert_eq!(session.phase(), Phase::Authorization);
    }

    #[tokio::test]
    async fn test_operations_while_disconnected() {
        let account = account();
        let mut session: Session<'_, Mock> = Session::new(&account);
        let info = MailInfo::new(1, 10);

        assert!(session.authorize().await.unwrap_err().is_state_error());
        assert!(session.list().await.unwrap_err().is_state_error());
        assert!(session.retrieve(&info).await.unwrap_err().is_state_error());
        assert!(session.delete(&info).await.unwrap_err().is_state_error());
        assert!(session.quit().await.unwrap_err().is_state_error());
    }

    #[tokio::test]
    async fn test_user_rejected() {
        let account = account();
        let mock = Builder::new()
            .read(b"+OK POP3 ready\r\n")
            .write(b"USER alice\r\n")
            .read(b"-ERR bad credentials\r\n")
            .build();
        let mut session = Session::new(&account);
        session.connect_stream(mock).await.unwrap();

        let err = session.authorize().await.unwrap_err();
        assert!(matches!(&err, Error::Protocol(msg) if msg == "bad credentials"));
        assert_eq!(session.phase(), Phase::Authorization);

        session.disconnect().await;
        assert_eq!(session.phase(), Phase::Disconnected);
    }

    #[tokio::test]
    async fn test_pass_rejected() {
        let account = account();
        let mock = Builder::new()
            .read(b"+OK POP3 ready\r\n")
            .write(b"USER alice\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"-ERR invalid password\r\n")
            .build();
        let mut session = Session::new(&account);
        session.connect_stream(mock).await.unwrap();

        let err = session.authorize().await.unwrap_err();
        assert_eq!(err.server_message(), Some("invalid password"));
        assert_eq!(session.phase(), Phase::Authorization);
    }

    #[tokio::test]
    async fn test_list() {
        let account = account();
        let mock = login(&mut Builder::new())
            .write(b"LIST\r\n")
            .read(b"+OK 2 messages\r\n1 120\r\n2 340\r\n.\r\n")
            .build();
        let mut session = authorized(&account, mock).await;

        let infos = session.list().await.unwrap();
        assert_eq!(infos, vec![MailInfo::new(1, 120), MailInfo::new(2, 340)]);
        assert_eq!(session.phase(), Phase::Transaction);
    }

    #[tokio::test]
    async fn test_list_collapses_identical_entries() {
        let account = account();
        let mock = login(&mut Builder::new())
            .write(b"LIST\r\n")
            .read(b"+OK\r\n1 120\r\n1 120\r\n.\r\n")
            .build();
        let mut session = authorized(&account, mock).await;

        assert_eq!(session.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_keeps_same_size_different_index() {
        let account = account();
        let mock = login(&mut Builder::new())
            .write(b"LIST\r\n")
            .read(b"+OK\r\n1 120\r\n2 120\r\n.\r\n")
            .build();
        let mut session = authorized(&account, mock).await;

        assert_eq!(session.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_err() {
        let account = account();
        let mock = login(&mut Builder::new())
            .write(b"LIST\r\n")
            .read(b"-ERR maildrop unavailable\r\n")
            .build();
        let mut session = authorized(&account, mock).await;

        let err = session.list().await.unwrap_err();
        assert_eq!(err.server_message(), Some("maildrop unavailable"));
    }

    #[tokio::test]
    async fn test_list_malformed_line() {
        let account = account();
        let mock = login(&mut Builder::new())
            .write(b"LIST\r\n")
            .read(b"+OK\r\nnot-a-number 12\r\n.\r\n")
            .build();
        let mut session = authorized(&account, mock).await;

        assert!(matches!(session.list().await, Err(Error::Malformed(_))));
    }

    #[tokio::test]
    async fn test_retrieve() {
        let account = account();
        let mock = login(&mut Builder::new())
            .write(b"RETR 1\r\n")
            .read(b"+OK message\r\nFrom: a\r\nSubject: hi\r\n.\r\n")
            .build();
        let mut session = authorized(&account, mock).await;

        let mail = session.retrieve(&MailInfo::new(1, 120)).await.unwrap();
        assert_eq!(mail.as_str(), "From: a\r\nSubject: hi\r\n");
    }

    #[tokio::test]
    async fn test_retrieve_latin1_header() {
        let account = account();
        let mock = login(&mut Builder::new())
            .write(b"RETR 1\r\n")
            .read(b"+OK\r\nSubject: Gr\xfc\xdfe\r\n\r\nbody\r\n.\r\n")
            .build();
        let mut session = authorized(&account, mock).await;

        let mail = session.retrieve(&MailInfo::new(1, 10)).await.unwrap();
        assert_eq!(
            mail.as_str(),
            "Subject: Gr\u{FFFD}\u{FFFD}e\r\n\r\nbody\r\n"
        );
        assert_eq!(session.phase(), Phase::Transaction);
    }

    #[tokio::test]
    async fn test_retrieve_err() {
        let account = account();
        let mock = login(&mut Builder::new())
            .write(b"RETR 9\r\n")
            .read(b"-ERR no such message\r\n")
            .build();
        let mut session = authorized(&account, mock).await;

        let err = session.retrieve(&MailInfo::new(9, 1)).await.unwrap_err();
        assert_eq!(err.server_message(), Some("no such message"));
    }

    #[tokio::test]
    async fn test_delete() {
        let account = account();
        let mock = login(&mut Builder::new())
            .write(b"DELE 2\r\n")
            .read(b"+OK message 2 deleted\r\n")
            .write(b"DELE 3\r\n")
            .read(b"-ERR message 3 already deleted\r\n")
            .build();
        let mut session = authorized(&account, mock).await;

        session.delete(&MailInfo::new(2, 340)).await.unwrap();
        let err = session.delete(&MailInfo::new(3, 5)).await.unwrap_err();
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn test_quit() {
        let account = account();
        let mock = login(&mut Builder::new())
            .write(b"QUIT\r\n")
            .read(b"+OK bye\r\n")
            .build();
        let mut session = authorized(&account, mock).await;

        session.quit().await.unwrap();
        assert_eq!(session.phase(), Phase::Disconnected);
    }

    #[tokio::test]
    async fn test_quit_rejected_still_disconnects() {
        let account = account();
        let mock = login(&mut Builder::new())
            .write(b"QUIT\r\n")
            .read(b"-ERR some deleted messages not removed\r\n")
            .build();
        let mut session = authorized(&account, mock).await;

        assert!(session.quit().await.unwrap_err().is_server_error());
        assert_eq!(session.phase(), Phase::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let account = account();
        let mock = login(&mut Builder::new()).build();
        let mut session = authorized(&account, mock).await;

        session.disconnect().await;
        assert_eq!(session.phase(), Phase::Disconnected);
        session.disconnect().await;
        assert_eq!(session.phase(), Phase::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_after_disconnect() {
        let account = account();
        let mut session = Session::new(&account);
        session
            .connect_stream(Builder::new().read(b"+OK first\r\n").build())
            .await
            .unwrap();
        session.disconnect().await;

        session
            .connect_stream(Builder::new().read(b"+OK second\r\n").build())
            .await
            .unwrap();
        assert_eq!(session.phase(), Phase::Authorization);
    }

    #[tokio::test]
    async fn test_io_failure_surfaces_as_io_error() {
        let account = account();
        let mock = login(&mut Builder::new())
            .write(b"LIST\r\n")
            .read(b"+OK\r\n1 120\r\n")
            .build();
        let mut session = authorized(&account, mock).await;

        assert!(matches!(session.list().await, Err(Error::Io(_))));
    }
}
