//! POP3 connection management.

mod channel;
mod config;
mod session;

pub use channel::Channel;
pub use config::SessionConfig;
pub use session::Session;
