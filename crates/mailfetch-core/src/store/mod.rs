//! Mail persistence.
//!
//! The fetch service only talks to the [`MailStore`] trait. Implementations
//! must tolerate concurrent calls from several sessions.

mod model;
mod sqlite;

use std::future::Future;

use mailfetch_pop3::{Account, Mail};

pub use model::{StoredMail, digest, subject};
pub use sqlite::SqliteMailStore;

/// Errors raised by a mail store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O error while preparing the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Mail persisted for an account that was never registered.
    #[error("Account not registered: {0}")]
    UnknownAccount(String),

    /// A stored record could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Persistence collaborator for retrieved mail.
pub trait MailStore: Send + Sync {
    /// Registers an account. Registering the same account again is a no-op.
    fn register_account(
        &self,
        account: &Account,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Stores one mail and returns the store's record of it.
    ///
    /// Storing a mail the account already holds returns the existing record.
    fn persist(
        &self,
        account: &Account,
        mail: Mail,
    ) -> impl Future<Output = Result<StoredMail, StoreError>> + Send;
}
