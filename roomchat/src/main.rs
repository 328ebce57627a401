//! `RoomChat`: terminal client for room and private chat.
//!
//! Reads commands and messages line by line from stdin and prints chat
//! activity to stdout. Configuration via CLI flags, environment variables,
//! or config file (`~/.config/roomchat/config.toml`).
//!
//! ```bash
//! # Log in and connect to a local server
//! cargo run --bin roomchat -- --username ann
//!
//! # Resume the saved session against another server
//! ROOMCHAT_API_URL=http://chat:8070/v1/api ROOMCHAT_WS_URL=ws://chat:8070/v1/api/ws \
//!     cargo run --bin roomchat
//! ```

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

use roomchat::api::HttpChatApi;
use roomchat::client::{self, ClientCommand, ClientHandle, ExitReason};
use roomchat::config::{CliArgs, ClientConfig};
use roomchat::console::{self, Input};
use roomchat::session::SessionStore;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    // Logs go to a file so they don't interleave with chat output.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            tracing::warn!(err = %e, "config file not loaded, using defaults");
            ClientConfig::default()
        }
    };

    tracing::info!("roomchat starting");
    let code = match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(err = %e, "roomchat failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    };
    tracing::info!("roomchat exiting");
    code
}

/// Initialize file-based logging.
///
/// Logs are written to a file (never stdout, which carries the chat).
/// Defaults to `$TMPDIR/roomchat.log`.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("roomchat.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = match &config.data_dir {
        Some(dir) => SessionStore::new(dir),
        None => SessionStore::in_default_dir()?,
    };
    let device_id = store.device_id()?;
    let api = HttpChatApi::new(&config.api_url)?;

    let user = if let Some(name) = config.username.as_deref() {
        let user = client::login(&api, name).await?;
        store.save_user(&user)?;
        user
    } else if let Some(user) = store.load_user()? {
        tracing::info!(user = %user.id, "resuming saved session");
        user
    } else {
        return Err("no saved session; pass --username to log in".into());
    };

    println!("logged in as {} ({})", user.name, user.id);
    let handle = client::start(&config, api, user, device_id).await?;
    let reason = drive(handle, &config.timestamp_format).await?;

    if reason == ExitReason::LoggedOut {
        store.clear_user()?;
    }
    Ok(())
}

/// Pump stdin lines into commands and events onto stdout until the
/// session task ends.
async fn drive(
    handle: ClientHandle,
    timestamp_format: &str,
) -> Result<ExitReason, Box<dyn std::error::Error>> {
    let ClientHandle {
        commands,
        mut events,
        mut task,
        ..
    } = handle;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    println!("type /help for commands");
    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => match console::parse_line(&line) {
                    Input::Command(command) => {
                        if commands.send(command).await.is_err() {
                            break;
                        }
                    }
                    Input::Help => println!("{}", console::HELP),
                    Input::Invalid(reason) => println!("! {reason}"),
                    Input::Nothing => {}
                },
                None => {
                    stdin_open = false;
                    let _ = commands.send(ClientCommand::Shutdown).await;
                }
            },
            Some(event) = events.recv() => {
                if let Some(text) = console::render_event(&event, timestamp_format) {
                    println!("{text}");
                }
            }
            reason = &mut task => {
                while let Ok(event) = events.try_recv() {
                    if let Some(text) = console::render_event(&event, timestamp_format) {
                        println!("{text}");
                    }
                }
                return Ok(reason?);
            }
        }
    }
    Ok(task.await?)
}
