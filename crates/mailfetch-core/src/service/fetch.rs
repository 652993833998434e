//! Mail retrieval cycle.
//!
//! One cycle logs in, lists the maildrop, downloads every message, hands
//! each one to the [`MailStore`], and finally marks everything it listed
//! as deleted. Any failure stops the cycle where it is. Because deletion
//! is the last step, nothing is deleted unless every message was stored.

use std::fmt;

use mailfetch_pop3::{Account, Session, SessionConfig};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::config::Config;
use crate::store::{MailStore, StoredMail};
use crate::{Error, Result};

/// Outcome of one completed fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// Account label (`user@host:port`).
    pub account: String,
    /// Store records of the downloaded mails, in download order.
    pub stored: Vec<StoredMail>,
    /// Number of messages marked for deletion on the server.
    pub deleted: usize,
}

impl FetchReport {
    /// Human-readable summary of the account and the stored mails.
    #[must_use]
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FetchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "POP3 mail download")?;
        writeln!(f, "Account: {}", self.account)?;
        writeln!(f, "Stored: {} mail(s)", self.stored.len())?;
        for (n, mail) in self.stored.iter().enumerate() {
            writeln!(f, "{} {mail}", n + 1)?;
        }
        Ok(())
    }
}

/// Per-account result of [`fetch_all`].
#[derive(Debug)]
pub struct FetchOutcome {
    /// Account label (`user@host:port`).
    pub account: String,
    /// Report, or the error that ended the cycle.
    pub result: Result<FetchReport>,
}

impl FetchOutcome {
    /// Returns true if the account was fetched without error.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the error, if the fetch failed.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        match &self.result {
            Ok(_) => None,
            Err(e) => Some(e),
        }
    }
}

/// Connects the session to its server, then runs [`run_cycle`].
///
/// The session is left connected; releasing it is up to the caller.
///
/// # Errors
///
/// Returns the first POP3 or store error encountered.
pub async fn fetch_mails<M>(session: &mut Session<'_, TcpStream>, store: &M) -> Result<FetchReport>
where
    M: MailStore,
{
    session.connect().await?;
    run_cycle(session, store).await
}

/// Runs a retrieval cycle on a session that has received its greeting.
///
/// # Errors
///
/// Returns the first POP3 or store error encountered. Messages listed
/// before the failure are not deleted.
pub async fn run_cycle<S, M>(session: &mut Session<'_, S>, store: &M) -> Result<FetchReport>
where
    S: AsyncRead + AsyncWrite + Unpin,
    M: MailStore,
{
    let account = session.account();
    store.register_account(account).await?;

    session.authorize().await?;
    let infos = session.list().await?;
    info!(account = %account, count = infos.len(), "messages waiting");

    let mut mails = Vec::with_capacity(infos.len());
    for info in &infos {
        mails.push(session.retrieve(info).await?);
    }

    let mut stored = Vec::with_capacity(mails.len());
    for mail in mails {
        stored.push(store.persist(account, mail).await?);
    }

    let mut report = FetchReport {
        account: account.to_string(),
        stored,
        deleted: 0,
    };
    info!("{}", report.summary());

    for info in &infos {
        session.delete(info).await?;
    }
    report.deleted = infos.len();

    Ok(report)
}

/// Fetches one account end to end.
///
/// On success the session ends with QUIT so the server removes the
/// deleted messages. On failure the channel is dropped without QUIT and
/// the server keeps every message.
///
/// # Errors
///
/// Returns the error that ended the cycle, or a QUIT failure.
pub async fn fetch_account<M>(
    account: &Account,
    store: &M,
    config: SessionConfig,
) -> Result<FetchReport>
where
    M: MailStore,
{
    let mut session = Session::with_config(account, config);

    match fetch_mails(&mut session, store).await {
        Ok(report) => {
            session.quit().await?;
            Ok(report)
        }
        Err(e) => {
            session.disconnect().await;
            Err(e)
        }
    }
}

/// Fetches every configured account in turn.
///
/// A failing account is logged and skipped.
pub async fn fetch_all<M>(config: &Config, store: &M) -> Vec<FetchOutcome>
where
    M: MailStore,
{
    let session_config = config.session_config();
    let mut outcomes = Vec::with_capacity(config.accounts.len());

    for account in &config.accounts {
        let result = fetch_account(account, store, session_config).await;
        match &result {
            Ok(report) => {
                info!(account = %account, stored = report.stored.len(), "fetch complete");
            }
            Err(e) => warn!(account = %account, error = %e, "fetch failed"),
        }
        outcomes.push(FetchOutcome {
            account: account.to_string(),
            result,
        });
    }

    outcomes
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
    use crate::store::{SqliteMailStore, StoreError};
    use mailfetch_pop3::{Mail, Phase};
    use std::sync::Mutex;
    use tokio_test::io::{Builder, Mock};

    fn account() -> Account {
        Account::new("pop.example.com", 110, "alice", "secret")
    }

    fn login(builder: &mut Builder) -> &mut Builder {
        builder
            .write(b"USER alice\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"+OK maildrop locked\r\n")
    }

    async fn greeted<'a>(account: &'a Account, mock: Mock) -> Session<'a, Mock> {
        let mut session = Session::new(account);
        session.connect_stream(mock).await.unwrap();
        session
    }

    /// Store that fails on a chosen call and records what it saw.
    struct FlakyStore {
        fail_on: usize,
        seen: Mutex<Vec<String>>,
    }

    impl MailStore for FlakyStore {
        async fn register_account(&self, _account: &Account) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        async fn persist(
            &self,
            account: &Account,
            mail: Mail,
        ) -> std::result::Result<StoredMail, StoreError> {
            let mut seen = self.seen.lock().unwrap();
            if seen.len() + 1 == self.fail_on {
                return Err(StoreError::Corrupt("disk full".into()));
            }
            seen.push(mail.as_str().to_string());
            Ok(StoredMail {
                id: i64::try_from(seen.len()).unwrap(),
                account: account.to_string(),
                digest: crate::store::digest(mail.as_str()),
                subject: None,
                size: mail.len(),
                stored_at: chrono::Utc::now(),
                body: mail.into_inner(),
            })
        }
    }

    #[tokio::test]
    async fn test_full_cycle() {
        let account = account();
        let mock = login(Builder::new().read(b"+OK ready\r\n"))
            .write(b"LIST\r\n")
            .read(b"+OK 2 messages\r\n1 120\r\n2 340\r\n.\r\n")
            .write(b"RETR 1\r\n")
            .read(b"+OK\r\nSubject: one\r\n\r\nfirst\r\n.\r\n")
            .write(b"RETR 2\r\n")
            .read(b"+OK\r\nSubject: two\r\n\r\nsecond\r\n.\r\n")
            .write(b"DELE 1\r\n")
            .read(b"+OK\r\n")
            .write(b"DELE 2\r\n")
            .read(b"+OK\r\n")
            .build();
        let store = SqliteMailStore::in_memory().await.unwrap();
        let mut session = greeted(&account, mock).await;

        let report = run_cycle(&mut session, &store).await.unwrap();

        assert_eq!(report.account, "alice@pop.example.com:110");
        assert_eq!(report.deleted, 2);
        let subjects: Vec<_> = report
            .stored
            .iter()
            .map(|m| m.subject.clone().unwrap())
            .collect();
        assert_eq!(subjects, vec!["one", "two"]);
        assert_eq!(store.mails(&account).await.unwrap().len(), 2);
        assert_eq!(session.phase(), Phase::Transaction);
    }

    #[tokio::test]
    async fn test_empty_maildrop() {
        let account = account();
        let mock = login(Builder::new().read(b"+OK ready\r\n"))
            .write(b"LIST\r\n")
            .read(b"+OK 0 messages\r\n.\r\n")
            .build();
        let store = SqliteMailStore::in_memory().await.unwrap();
        let mut session = greeted(&account, mock).await;

        let report = run_cycle(&mut session, &store).await.unwrap();
        assert!(report.stored.is_empty());
        assert_eq!(report.deleted, 0);
    }

    #[tokio::test]
    async fn test_retrieve_failure_deletes_nothing() {
        let account = account();
        let mock = login(Builder::new().read(b"+OK ready\r\n"))
            .write(b"LIST\r\n")
            .read(b"+OK\r\n1 10\r\n2 20\r\n.\r\n")
            .write(b"RETR 1\r\n")
            .read(b"+OK\r\nfirst\r\n.\r\n")
            .write(b"RETR 2\r\n")
            .read(b"-ERR message 2 vanished\r\n")
            .build();
        let store = SqliteMailStore::in_memory().await.unwrap();
        let mut session = greeted(&account, mock).await;

        let err = run_cycle(&mut session, &store).await.unwrap_err();
        assert!(matches!(err, Error::Pop3(ref e) if e.is_server_error()));
        assert!(store.mails(&account).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_deletes_nothing() {
        let account = account();
        let mock = login(Builder::new().read(b"+OK ready\r\n"))
            .write(b"LIST\r\n")
            .read(b"+OK\r\n1 10\r\n2 20\r\n.\r\n")
            .write(b"RETR 1\r\n")
            .read(b"+OK\r\nfirst\r\n.\r\n")
            .write(b"RETR 2\r\n")
            .read(b"+OK\r\nsecond\r\n.\r\n")
            .build();
        let store = FlakyStore {
            fail_on: 2,
            seen: Mutex::new(Vec::new()),
        };
        let mut session = greeted(&account, mock).await;

        let err = run_cycle(&mut session, &store).await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Corrupt(_))));
        assert_eq!(*store.seen.lock().unwrap(), vec!["first\r\n".to_string()]);
    }

    #[tokio::test]
    async fn test_auth_failure_stops_cycle() {
        let account = account();
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER alice\r\n")
            .read(b"-ERR bad credentials\r\n")
            .build();
        let store = SqliteMailStore::in_memory().await.unwrap();
        let mut session = greeted(&account, mock).await;

        let err = run_cycle(&mut session, &store).await.unwrap_err();
        assert!(err.to_string().contains("bad credentials"));

        session.disconnect().await;
        assert_eq!(session.phase(), Phase::Disconnected);
    }

    #[test]
    fn test_summary_lists_mails() {
        let report = FetchReport {
            account: "alice@pop.example.com:110".into(),
            stored: vec![StoredMail {
                id: 1,
                account: "alice@pop.example.com:110".into(),
                digest: crate::store::digest("x"),
                subject: Some("hello".into()),
                size: 1,
                stored_at: chrono::DateTime::from_timestamp(0, 0).unwrap(),
                body: "x".into(),
            }],
            deleted: 1,
        };

        let summary = report.summary();
        assert!(summary.contains("Account: alice@pop.example.com:110"));
        assert!(summary.contains("Stored: 1 mail(s)"));
        assert!(summary.contains("1 [1] hello (1 bytes"));
    }
}
