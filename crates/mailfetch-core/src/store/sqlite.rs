//! SQLite-backed mail store.

use std::path::Path;

use chrono::{DateTime, Utc};
use mailfetch_pop3::{Account, Mail};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::debug;

use super::model::{self, StoredMail};
use super::{MailStore, StoreError};

/// Mail store keeping accounts and messages in SQLite.
///
/// Messages are keyed by account and content digest, so storing the same
/// message twice yields the same record.
#[derive(Debug, Clone)]
pub struct SqliteMailStore {
    pool: SqlitePool,
}

impl SqliteMailStore {
    /// Opens (or creates) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the database
    /// connection fails or schema creation fails.
    pub async fn new(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                host TEXT NOT NULL,
                port INTEGER NOT NULL,
                username TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (host, port, username)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL REFERENCES accounts (id),
                digest TEXT NOT NULL,
                subject TEXT,
                size INTEGER NOT NULL,
                body TEXT NOT NULL,
                stored_at TEXT NOT NULL,
                UNIQUE (account_id, digest)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get all mails stored for an account, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the account is unknown or the query fails.
    pub async fn mails(&self, account: &Account) -> Result<Vec<StoredMail>, StoreError> {
        let account_id = self.account_id(account).await?;
        let label = account.to_string();

        let rows = sqlx::query(
            r"
            SELECT id, digest, subject, size, body, stored_at
            FROM mails
            WHERE account_id = ?
            ORDER BY id ASC
            ",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row_to_mail(row, &label)).collect()
    }

    async fn account_id(&self, account: &Account) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id FROM accounts
            WHERE host = ? AND port = ? AND username = ?
            ",
        )
        .bind(account.host())
        .bind(i64::from(account.port()))
        .bind(account.username())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get("id")?),
            None => Err(StoreError::UnknownAccount(account.to_string())),
        }
    }
}

impl MailStore for SqliteMailStore {
    async fn register_account(&self, account: &Account) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            INSERT OR IGNORE INTO accounts (host, port, username)
            VALUES (?, ?, ?)
            ",
        )
        .bind(account.host())
        .bind(i64::from(account.port()))
        .bind(account.username())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!(account = %account, "registered account");
        }
        Ok(())
    }

    async fn persist(&self, account: &Account, mail: Mail) -> Result<StoredMail, StoreError> {
        let account_id = self.account_id(account).await?;
        let label = account.to_string();
        let body = mail.into_inner();
        let digest = model::digest(&body);
        let size = i64::try_from(body.len()).unwrap_or(i64::MAX);

        let result = sqlx::query(
            r"
            INSERT OR IGNORE INTO mails (account_id, digest, subject, size, body, stored_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(account_id)
        .bind(&digest)
        .bind(model::subject(&body))
        .bind(size)
        .bind(&body)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(account = %label, %digest, "mail already stored");
        }

        let row = sqlx::query(
            r"
            SELECT id, digest, subject, size, body, stored_at
            FROM mails
            WHERE account_id = ? AND digest = ?
            ",
        )
        .bind(account_id)
        .bind(&digest)
        .fetch_one(&self.pool)
        .await?;

        row_to_mail(&row, &label)
    }
}

fn row_to_mail(row: &SqliteRow, account: &str) -> Result<StoredMail, StoreError> {
    let stored_at: String = row.try_get("stored_at")?;
    let stored_at = DateTime::parse_from_rfc3339(&stored_at)
        .map_err(|e| StoreError::Corrupt(format!("stored_at {stored_at:?}: {e}")))?
        .with_timezone(&Utc);
    let size: i64 = row.try_get("size")?;

    Ok(StoredMail {
        id: row.try_get("id")?,
        account: account.to_string(),
        digest: row.try_get("digest")?,
        subject: row.try_get("subject")?,
        size: usize::try_from(size).unwrap_or_default(),
        stored_at,
        body: row.try_get("body")?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account::new("pop.example.com", 110, "alice", "secret")
    }

    #[tokio::test]
    async fn test_persist_and_list() {
        let store = SqliteMailStore::in_memory().await.unwrap();
        let account = account();
        store.register_account(&account).await.unwrap();

        let stored = store
            .persist(&account, Mail::new("Subject: hi\r\n\r\nbody\r\n"))
            .await
            .unwrap();
        assert_eq!(stored.subject.as_deref(), Some("hi"));
        assert_eq!(stored.size, 21);
        assert_eq!(stored.account, "alice@pop.example.com:110");

        let mails = store.mails(&account).await.unwrap();
        assert_eq!(mails, vec![stored]);
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let store = SqliteMailStore::in_memory().await.unwrap();
        let account = account();
        store.register_account(&account).await.unwrap();
        store.register_account(&account).await.unwrap();

        assert!(store.mails(&account).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persist_same_mail_twice() {
        let store = SqliteMailStore::in_memory().await.unwrap();
        let account = account();
        store.register_account(&account).await.unwrap();

        let first = store.persist(&account, Mail::new("a\r\n")).await.unwrap();
        let second = store.persist(&account, Mail::new("a\r\n")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.mails(&account).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_mail_different_accounts() {
        let store = SqliteMailStore::in_memory().await.unwrap();
        let alice = account();
        let bob = Account::new("pop.example.com", 110, "bob", "secret");
        store.register_account(&alice).await.unwrap();
        store.register_account(&bob).await.unwrap();

        let a = store.persist(&alice, Mail::new("same\r\n")).await.unwrap();
        let b = store.persist(&bob, Mail::new("same\r\n")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.digest, b.digest);
    }

    #[tokio::test]
    async fn test_persist_unregistered_account() {
        let store = SqliteMailStore::in_memory().await.unwrap();
        let err = store
            .persist(&account(), Mail::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownAccount(_)));
    }
}
