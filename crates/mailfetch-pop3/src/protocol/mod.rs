//! POP3 protocol state.

mod state;

pub use state::Phase;
