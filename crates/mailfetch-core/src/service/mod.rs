//! Core services for mail retrieval.
//!
//! This module provides the service layer that drives POP3 sessions
//! and hands the results to a mail store.

pub mod fetch;

pub use fetch::{
    FetchOutcome, FetchReport, fetch_account, fetch_all, fetch_mails, run_cycle,
};
