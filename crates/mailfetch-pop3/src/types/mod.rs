//! Core POP3 types.

mod account;
mod mail;
mod response;

pub use account::Account;
pub use mail::{Mail, MailInfo};
pub use response::{Response, Status};
