//! # Content Rotator CLI (`rotator`)
//!
//! ## Usage
//!
//! ```bash
//! rotator --config ./config/rotator.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rotator init` | Create content folders, a credentials template, and default settings |
//! | `rotator serve` | Start the HTTP server for the browser client |
//! | `rotator pick` | Run one selection from the saved settings |
//! | `rotator folders` | List local content and punishment folders |
//! | `rotator credentials set\|clear\|status` | Manage Reddit API credentials |
//!
//! ## Examples
//!
//! ```bash
//! rotator credentials set --client-id abc --client-secret xyz
//! rotator pick --mode local
//! RUST_LOG=content_rotator=debug rotator serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use content_rotator::{commands, config, server};

/// Content Rotator: cycles images and videos from subreddits or local
/// folders on a randomized timer.
#[derive(Parser)]
#[command(name = "rotator", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rotator.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create content folders, the credentials template, and default settings.
    ///
    /// Safe to run more than once; existing files are left alone.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Select one piece of content using the saved settings.
    Pick {
        /// Override the saved content source: `remote`, `local`, or `mixed`.
        #[arg(long)]
        mode: Option<String>,
    },

    /// List local content and punishment folders.
    Folders {
        /// Bypass the folder cache.
        #[arg(long)]
        refresh: bool,
    },

    /// Manage Reddit API credentials.
    Credentials {
        #[command(subcommand)]
        action: CredentialsAction,
    },
}

#[derive(Subcommand)]
enum CredentialsAction {
    /// Store a client id and secret.
    Set {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        client_secret: String,
        /// Defaults to `Goon/1.0`.
        #[arg(long)]
        user_agent: Option<String>,
    },
    /// Reset to empty credentials.
    Clear,
    /// Show which credential fields are present.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "content_rotator=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => commands::run_init(&cfg)?,
        Commands::Serve => server::run_server(&cfg).await?,
        Commands::Pick { mode } => commands::run_pick(&cfg, mode.as_deref()).await?,
        Commands::Folders { refresh } => commands::run_folders(&cfg, refresh)?,
        Commands::Credentials { action } => match action {
            CredentialsAction::Set {
                client_id,
                client_secret,
                user_agent,
            } => commands::run_credentials_set(&cfg, &client_id, &client_secret, user_agent)?,
            CredentialsAction::Clear => commands::run_credentials_clear(&cfg)?,
            CredentialsAction::Status => commands::run_credentials_status(&cfg)?,
        },
    }

    Ok(())
}
