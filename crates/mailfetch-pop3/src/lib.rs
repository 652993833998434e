//! # mailfetch-pop3
//!
//! A POP3 client library covering the RFC 1939 retrieval subset.
//!
//! ## Features
//!
//! - **Phase-checked sessions**: every operation verifies the session phase
//!   before any network I/O
//! - **Retrieval commands**: USER, PASS, LIST, RETR, DELE, QUIT
//! - **Multi-line framing**: dot-terminated blocks with dot-unstuffing
//! - **Timeouts**: bounded connect and per-line I/O
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailfetch_pop3::{Account, Session};
//!
//! #[tokio::main]
//! async fn main() -> mailfetch_pop3::Result<()> {
//!     let account = Account::new("pop.example.com", 110, "user", "password");
//!     let mut session = Session::new(&account);
//!
//!     session.connect().await?;
//!     session.authorize().await?;
//!
//!     for info in session.list().await? {
//!         let mail = session.retrieve(&info).await?;
//!         println!("{info}: {} bytes", mail.len());
//!     }
//!
//!     session.quit().await
//! }
//! ```
//!
//! ## Session Phases
//!
//! ```text
//! ┌──────────────┐
//! │ Disconnected │ ─── connect() ───→ Authorization ─── authorize() ───→ Transaction
//! └──────────────┘
//!        ↑
//!        └─────────── disconnect() / quit() (from any phase) ───────────┘
//! ```
//!
//! ## Modules
//!
//! - [`command`]: POP3 command builders
//! - [`connection`]: Channel and session management
//! - [`parser`]: Response parser
//! - [`protocol`]: Session phases
//! - [`types`]: Core POP3 types (accounts, listings, responses)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod protocol;
pub mod types;

pub use command::Command;
pub use connection::{Channel, Session, SessionConfig};
pub use error::{Error, Result};
pub use protocol::Phase;
pub use types::{Account, Mail, MailInfo, Response, Status};
