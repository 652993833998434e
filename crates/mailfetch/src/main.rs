//! `mailfetch` - POP3 mail fetcher
//!
//! Downloads every message from the configured POP3 accounts, stores it in
//! a local `SQLite` database and removes it from the server.
//!
//! Usage: `mailfetch [CONFIG]`. Without an argument the configuration is
//! read from the platform config directory.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, bail};
use mailfetch_core::{Config, SqliteMailStore, fetch_all};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailfetch=info,mailfetch_core=info,mailfetch_pop3=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = match std::env::args_os().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => Config::default_path().context("no config directory; pass a config file")?,
    };

    info!(config = %path.display(), "Starting mailfetch");
    let config = Config::load(&path)?;

    let database = config.database_path()?;
    let store = SqliteMailStore::new(&database)
        .await
        .with_context(|| format!("cannot open {}", database.display()))?;

    let outcomes = fetch_all(&config, &store).await;
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();

    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => println!("{report}"),
            Err(e) => error!(account = %outcome.account, "{e}"),
        }
    }

    if failed > 0 {
        bail!("{failed} of {} account(s) failed", outcomes.len());
    }
    Ok(())
}
