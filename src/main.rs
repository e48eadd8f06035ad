//! session-sync - forward Claude Code sessions to a dashboard
//!
//! Runs as a Claude Code hook: each lifecycle event arrives as JSON on stdin,
//! gets folded into a small on-disk ledger, and is forwarded to the
//! dashboard's `/sync/*` endpoints. Also provides login, status and manual
//! backfill commands.

mod config;
mod error;
mod models;
mod services;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Credentials};
use crate::error::SyncError;
use crate::models::{HookEvent, HookEventKind};
use crate::services::session_store::session_id_from_path;
use crate::services::{handle_event, settle_undelivered, sync_transcript, Ledger, SessionStore, SyncClient};

/// session-sync - Claude Code session forwarder
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Config file path (default: ~/.config/session-sync/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Claude directory path (default: ~/.claude)
    #[arg(long, global = true)]
    claude_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Handle a hook event read from stdin (always exits 0)
    Hook {
        /// Event name, overriding hook_event_name in the payload
        #[arg(long)]
        event: Option<String>,
    },
    /// Store the dashboard URL and API key
    Login {
        /// Dashboard base URL
        #[arg(long)]
        url: Option<String>,
        /// API key issued by the dashboard
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Remove stored credentials
    Logout,
    /// Show configuration, credentials and backend health
    Status,
    /// Send transcripts outside the hook lifecycle
    Sync {
        /// Transcript file to send
        transcript: Option<PathBuf>,
        /// Send every transcript under the Claude projects directory
        #[arg(long, conflicts_with = "transcript")]
        all: bool,
        /// With --all, only this project (path or encoded directory name)
        #[arg(long, requires = "all")]
        project: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let filter = if args.debug {
        "session_sync=debug,info"
    } else {
        "session_sync=info,warn"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Hook { event } => {
            run_hook(args.config.as_deref(), args.claude_dir, event.as_deref()).await;
            Ok(())
        }
        Command::Login { url, api_key } => login(url, api_key).await,
        Command::Logout => logout(),
        Command::Status => {
            let config = load_config(args.config.as_deref(), args.claude_dir)?;
            status(&config).await
        }
        Command::Sync {
            transcript,
            all,
            project,
        } => {
            let config = load_config(args.config.as_deref(), args.claude_dir)?;
            sync(&config, transcript, all, project.as_deref()).await
        }
    }
}

fn load_config(path: Option<&str>, claude_dir: Option<String>) -> Result<Config> {
    let mut config = if let Some(path) = path {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Override claude_dir if specified
    if let Some(claude_dir) = claude_dir {
        config.claude.claude_dir = claude_dir;
    }

    Ok(config)
}

/// Hook entry point. Problems are logged, never surfaced as an exit code,
/// so a broken dashboard can't interrupt the Claude session.
async fn run_hook(config_path: Option<&str>, claude_dir: Option<String>, event_override: Option<&str>) {
    let config = match load_config(config_path, claude_dir) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "config unreadable, using defaults");
            Config::default()
        }
    };

    let mut input = String::new();
    if let Err(e) = tokio::io::stdin().read_to_string(&mut input).await {
        tracing::warn!(error = %e, "failed to read hook payload");
        return;
    }

    let event: HookEvent = match serde_json::from_str(&input) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "invalid hook payload");
            return;
        }
    };
    if event.session_id.is_empty() {
        tracing::warn!("hook payload has no session_id");
        return;
    }

    let kind = match event_override {
        Some(name) => match HookEventKind::parse(name) {
            Some(kind) => Some(kind),
            None => {
                tracing::debug!(event = name, "ignoring unsupported hook event");
                return;
            }
        },
        None => None,
    };

    if !config.sync.enabled {
        tracing::debug!("sync disabled");
        retire_undelivered(&event, kind);
        return;
    }

    let client = match Credentials::resolve().and_then(|creds| SyncClient::new(&creds)) {
        Ok(client) => client,
        Err(SyncError::NotLoggedIn) => {
            tracing::warn!("not logged in; run `session-sync login`");
            retire_undelivered(&event, kind);
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, "cannot build sync client");
            retire_undelivered(&event, kind);
            return;
        }
    };

    let mut ledger = Ledger::load(Config::ledger_path());
    let outcome = handle_event(&event, kind, &mut ledger, &client, &config.sync).await;
    save_ledger(&ledger);

    tracing::debug!(
        event = outcome.kind.map(|k| k.as_str()),
        sent = outcome.sent,
        failed = outcome.failed,
        "hook done"
    );
}

/// Keep the ledger consistent for an event we can't send.
fn retire_undelivered(event: &HookEvent, kind: Option<HookEventKind>) {
    let mut ledger = Ledger::load(Config::ledger_path());
    if settle_undelivered(event, kind, &mut ledger) {
        save_ledger(&ledger);
    }
}

fn save_ledger(ledger: &Ledger) {
    if let Err(e) = ledger.save() {
        tracing::warn!(error = %format!("{e:#}"), "failed to save ledger");
    }
}

async fn login(url: Option<String>, api_key: Option<String>) -> Result<()> {
    let creds = Credentials::new(url, api_key)?;

    match SyncClient::new(&creds)?.health().await {
        Ok(_) => println!("Dashboard reachable at {}", creds.site_url),
        Err(e) => eprintln!("Warning: health check failed: {}", e),
    }

    let path = Config::credentials_path();
    creds.save_to(&path)?;
    println!("Saved credentials to {}", path.display());
    Ok(())
}

fn logout() -> Result<()> {
    let path = Config::credentials_path();
    if Credentials::remove_at(&path)? {
        println!("Removed {}", path.display());
    } else {
        println!("Not logged in");
    }
    Ok(())
}

async fn status(config: &Config) -> Result<()> {
    println!("Config:      {}", Config::default_config_path().display());
    println!("Sync:        {}", if config.sync.enabled { "enabled" } else { "disabled" });
    println!("Tool calls:  {}", if config.sync.sync_tool_calls { "forwarded" } else { "skipped" });
    println!("Projects:    {}", config.claude_projects_dir().display());

    let ledger = Ledger::load(Config::ledger_path());
    println!("Ledger:      {} ({} open sessions)", ledger.path().display(), ledger.len());

    let creds = match Credentials::resolve() {
        Ok(creds) => creds,
        Err(SyncError::NotLoggedIn) => {
            println!("Credentials: not logged in");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    println!("Dashboard:   {}", creds.site_url);
    println!("API key:     {}", creds.masked_key());

    match SyncClient::new(&creds)?.health().await {
        Ok(_) => println!("Health:      ok"),
        Err(e) => println!("Health:      {}", e),
    }
    Ok(())
}

async fn sync(config: &Config, transcript: Option<PathBuf>, all: bool, project: Option<&str>) -> Result<()> {
    let targets: Vec<(String, PathBuf)> = if all {
        let store = SessionStore::new(config);
        let found = store.discover(project);
        if found.is_empty() {
            println!("No transcripts under {}", store.projects_dir().display());
            return Ok(());
        }
        found.into_iter().map(|t| (t.session_id, t.path)).collect()
    } else if let Some(path) = transcript {
        if !path.is_file() {
            bail!("No such transcript: {}", path.display());
        }
        let session_id = session_id_from_path(&path)
            .with_context(|| format!("Cannot derive a session id from {}", path.display()))?;
        vec![(session_id, path)]
    } else {
        bail!("Pass a transcript path or --all");
    };

    let client = SyncClient::new(&Credentials::resolve()?)?;
    let mut ledger = Ledger::load(Config::ledger_path());

    let mut failures = 0usize;
    for (session_id, path) in &targets {
        match sync_transcript(path, session_id, &mut ledger, &client, &config.sync).await {
            Ok(Some(report)) => println!(
                "{}  {}  {}  {} messages",
                session_id,
                report.session.display_name(),
                report.session.duration_str(),
                report.messages_sent
            ),
            Ok(None) => println!("{}  (empty)", session_id),
            Err(e) => {
                eprintln!("{}: {}", session_id, e);
                failures += 1;
            }
        }
    }
    ledger.save()?;

    println!("Synced {} of {} transcripts", targets.len() - failures, targets.len());
    if failures > 0 {
        bail!("{} transcripts failed to sync", failures);
    }
    Ok(())
}
