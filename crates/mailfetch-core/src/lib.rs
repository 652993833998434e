//! # mailfetch-core
//!
//! Core business logic for `mailfetch`.
//!
//! This crate provides:
//! - Configuration loading (accounts, database location, timeouts)
//! - Mail storage (`SQLite`) behind the [`MailStore`] trait
//! - The retrieval cycle: list, download, store, delete

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use mailfetch_pop3::{Account, Mail, MailInfo, SessionConfig};
pub use service::{
    FetchOutcome, FetchReport, fetch_account, fetch_all, fetch_mails, run_cycle,
};
pub use store::{MailStore, SqliteMailStore, StoreError, StoredMail};
