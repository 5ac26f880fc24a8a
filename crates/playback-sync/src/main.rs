//! Playback sync CLI application.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use playback_sync::{InboundMessage, OriginPolicy, PlaybackSynchronizer, Vault, VidsrcAdapter};
use serde::Serialize;
use shared::{Config, ContentKey, LocalStore, MediaType, WatchMediaType};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply player messages read from stdin, one JSON `{origin, data}` per line
    Ingest,
    /// Partially watched titles, most recent first
    ContinueWatching,
    /// Last known position of a title
    Resume { media: WatchMediaType, id: u64 },
    /// Watch history, newest first
    History,
    /// Forget watch history and progress
    ClearHistory,
    /// Saved items
    Vault {
        #[command(subcommand)]
        action: VaultAction,
    },
}

#[derive(Subcommand, Debug)]
enum VaultAction {
    List,
    Toggle {
        media: MediaType,
        id: u64,
        #[arg(long)]
        title: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

/// Forward stdin lines to the adapter; lines that are not envelopes are skipped
async fn read_stdin(messages: mpsc::Sender<InboundMessage>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<InboundMessage>(&line) {
            Ok(message) => {
                if messages.send(message).await.is_err() {
                    break;
                }
            }
            Err(e) => debug!(error = %e, "Skipping line that is not a player message"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    shared::logging::init(shared::LogConfig::from_config(
        &config,
        "playback-sync",
        args.verbose,
    ))?;

    let db_path = config.database_path();
    info!(db_path = %db_path.display(), "Opening local store");
    let store = Arc::new(LocalStore::open(&db_path).context("Failed to open local store")?);
    let synchronizer = PlaybackSynchronizer::new(store.clone(), config.playback.clone());

    match args.command {
        Command::Ingest => {
            let (tx, rx) = mpsc::channel(64);
            let reader = tokio::spawn(read_stdin(tx));

            let mut adapter = VidsrcAdapter::new(rx, OriginPolicy::from_config(&config.player));
            let applied = synchronizer.run(&mut adapter).await?;
            reader.await.context("Stdin reader panicked")??;

            info!(applied = applied, dropped = adapter.dropped(), "Ingest complete");
        }
        Command::ContinueWatching => print_json(&synchronizer.continue_watching()?)?,
        Command::Resume { media, id } => {
            let key = ContentKey::new(id, media);
            let state = synchronizer.state_of(key, Utc::now())?;
            let point = synchronizer.resume_point(key)?;
            print_json(&serde_json::json!({ "state": state, "resume": point }))?;
        }
        Command::History => print_json(&synchronizer.history()?)?,
        Command::ClearHistory => synchronizer.clear_history()?,
        Command::Vault { action } => {
            let vault = Vault::new(store);
            match action {
                VaultAction::List => print_json(&vault.list()?)?,
                VaultAction::Toggle { media, id, title } => {
                    let saved = vault.toggle(id, media, title.as_deref())?;
                    print_json(&serde_json::json!({ "id": id, "media_type": media, "saved": saved }))?;
                }
            }
        }
    }

    Ok(())
}
