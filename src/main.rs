mod alarm;
mod cli;
mod config;
mod db;
mod error;
mod models;
mod notification;
mod prayer_times;
mod tui;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use alarm::SqliteAlarmStore;
use cli::args::{Cli, Commands};
use cli::{daemon, handlers};
use config::AppConfig;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("Loading config")?;

    let db_path = match &cli.db {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            path.clone()
        }
        None => {
            AppConfig::ensure_data_dir()?;
            AppConfig::db_path()?
        }
    };
    let store = SqliteAlarmStore::open(&db_path)
        .with_context(|| format!("Opening alarm database at {:?}", db_path))?;

    let use_24h = config.alarm.time_format_24h;
    match cli.command {
        Commands::Times => handlers::handle_times(&store, &config)?,
        Commands::Refresh => handlers::handle_refresh(&store, &config)?,
        Commands::Set { prayer, time } => handlers::handle_set(&store, &prayer, &time, use_24h)?,
        Commands::Enable { prayer } => handlers::handle_toggle(&store, &prayer, true)?,
        Commands::Disable { prayer } => handlers::handle_toggle(&store, &prayer, false)?,
        Commands::Status { json } => handlers::handle_status(&store, json, use_24h)?,
        Commands::Reset => handlers::handle_reset(&store)?,
        Commands::Run { headless } => daemon::run(Arc::new(store), &config, headless)?,
    }

    Ok(())
}
