//! CLI command implementations.
//!
//! Each `run_*` function backs one `rotator` subcommand and prints its
//! result to stdout.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::catalog::{FolderCatalog, FolderKind};
use crate::config::Config;
use crate::connector_reddit::RedditGateway;
use crate::credentials::{CredentialStatus, CredentialStore, Credentials};
use crate::listing_cache::ListingCache;
use crate::models::{FolderDescriptor, SourceMode};
use crate::selection::SelectionEngine;
use crate::settings::{Settings, SettingsStore};

/// Create content directories, the credentials template, and default settings.
pub fn run_init(cfg: &Config) -> Result<()> {
    let catalog = FolderCatalog::from_config(&cfg.content)?;
    for kind in FolderKind::ALL {
        let dir = catalog.resolve_base_dir(kind)?;
        println!("{} folders: {}", kind.route(), dir.display());
    }

    let credentials = CredentialStore::new(&cfg.reddit.credentials_path);
    if let Some(template) = credentials.write_template()? {
        println!("Wrote credentials template: {}", template.display());
    }

    let settings = SettingsStore::new(&cfg.settings.path);
    if settings.exists() {
        println!("Settings already present: {}", settings.path().display());
    } else {
        settings.save(Settings::default())?;
        println!("Wrote default settings: {}", settings.path().display());
    }

    println!("Initialized.");
    Ok(())
}

/// Run one selection from the saved settings and print the descriptor.
pub async fn run_pick(cfg: &Config, mode: Option<&str>) -> Result<()> {
    let mode = mode.map(str::parse::<SourceMode>).transpose()?;
    let settings = SettingsStore::new(&cfg.settings.path).load()?;
    let request = settings.selection_request(mode)?;

    let engine = SelectionEngine::new(
        Arc::new(RedditGateway::new(&cfg.reddit)?),
        Arc::new(ListingCache::new()),
        Arc::new(FolderCatalog::from_config(&cfg.content)?),
    );
    let descriptor = engine
        .select(&request)
        .await
        .context("Selection failed")?;

    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}

/// Print both folder lists with their file counts.
pub fn run_folders(cfg: &Config, refresh: bool) -> Result<()> {
    let catalog = FolderCatalog::from_config(&cfg.content)?;
    let listing = catalog.list_all(refresh)?;

    print_folders("Content", &listing.content_folders);
    println!();
    print_folders("Punishment", &listing.punishment_folders);
    Ok(())
}

fn print_folders(label: &str, folders: &[FolderDescriptor]) {
    println!("{} folders ({}):", label, folders.len());
    if folders.is_empty() {
        println!("  (none)");
    }
    for folder in folders {
        println!("  {:<30} {} files", folder.name, folder.file_count);
    }
}

pub fn run_credentials_set(
    cfg: &Config,
    client_id: &str,
    client_secret: &str,
    user_agent: Option<String>,
) -> Result<()> {
    let creds = Credentials::new(client_id, client_secret, user_agent);
    if !creds.is_complete() {
        anyhow::bail!("both --client-id and --client-secret must be non-empty");
    }
    let store = CredentialStore::new(&cfg.reddit.credentials_path);
    store.save(&creds)?;
    println!("Credentials saved to {}", store.path().display());
    Ok(())
}

pub fn run_credentials_clear(cfg: &Config) -> Result<()> {
    let store = CredentialStore::new(&cfg.reddit.credentials_path);
    store.save(&Credentials::default())?;
    println!("Credentials cleared.");
    Ok(())
}

pub fn run_credentials_status(cfg: &Config) -> Result<()> {
    let store = CredentialStore::new(&cfg.reddit.credentials_path);
    let status = CredentialStatus::from(&store.load()?);
    println!("configured:            {}", status.configured);
    println!("client_id present:     {}", status.client_id_present);
    println!("client_secret present: {}", status.client_secret_present);
    Ok(())
}
