//! FeedbackBot console - command-line administration of feedbackbot tenants.
//!
//! Sessions are kept in the OS keychain per console host, so a login made
//! here stays valid across runs until the refresh token is rejected.

mod cli;
mod commands;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedbackbot_core::{ApiClient, ApiError, AuthEvent, Config, Keychain, PersistentStore};

use cli::{Cli, Commands};
use commands::Console;

/// Log file name prefix inside the log directory
const LOG_FILE: &str = "feedbackbot.log";

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g., RUST_LOG=feedbackbot_core=debug).
/// The returned guard flushes the log file when dropped.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = Config::load().context("Failed to load config")?;

    let log_dir = config.cache_dir().ok().map(|dir| dir.join("logs"));
    if let Some(ref dir) = log_dir {
        std::fs::create_dir_all(dir).ok();
    }
    let _guard = init_tracing(log_dir);
    info!("FeedbackBot console starting");

    let mut effective = config.clone().with_env_overrides();
    if let Some(ref host) = cli.host {
        effective.host = Some(host.clone());
        // Logging in against a host makes it the default for later runs
        if matches!(cli.command, Commands::Login { .. }) {
            config.host = Some(host.clone());
        }
    }

    let store = PersistentStore::hydrate(Keychain::new(effective.host()))
        .context("Failed to read stored session")?;
    let client = ApiClient::new(effective.api_base_url(), Arc::new(store))?;
    let mut events = client.subscribe();
    let signing_in = matches!(cli.command, Commands::Login { .. } | Commands::Register { .. });

    let mut console = Console {
        client,
        config,
        json: cli.json,
    };
    let result = console.run(cli.command).await;

    let mut session_ended = false;
    while let Ok(event) = events.try_recv() {
        if event == AuthEvent::ReauthenticationRequired {
            session_ended = true;
        }
    }
    let needs_login = result
        .as_ref()
        .err()
        .and_then(|e| e.downcast_ref::<ApiError>())
        .is_some_and(ApiError::requires_login);
    if session_ended {
        eprintln!("Your session has expired. Run `feedbackbot login` to sign in again.");
    } else if needs_login && !signing_in {
        eprintln!("Not signed in. Run `feedbackbot login` first.");
    }

    info!("FeedbackBot console shutting down");
    result
}
