// SPDX-License-Identifier: MIT OR Apache-2.0
//! `netweave` network editor
//!
//! Headless front end of the editor model:
//! - Opens a RON network file and restores aggregations, bundles and selection
//! - Builds a small demo network when no file is given
//! - Prints what each layer shows, optionally after an automatic layout
//! - Saves the network back with the editor state in its meta-data

mod demo;
mod summary;

use clap::Parser;
use netweave_editor_graph::{EditorError, EditorSettings, NetworkEditor, SettingsError, SETTINGS_FILE_NAME};
use netweave_network::{NetworkError, ProcessorNetwork};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Inspect, restore and re-save processor networks
#[derive(Debug, Parser)]
#[command(name = "netweave_editor", version, about)]
struct Cli {
    /// Network file to open; a demo network is built when omitted
    network: Option<PathBuf>,

    /// Editor settings file
    #[arg(long, default_value = SETTINGS_FILE_NAME)]
    settings: PathBuf,

    /// Write the network, including editor state, to this file
    #[arg(long)]
    save: Option<PathBuf>,

    /// Write the default settings file if none exists
    #[arg(long)]
    init_settings: bool,

    /// Arrange all nodes in layers along the data flow before printing
    #[arg(long)]
    sort: bool,
}

/// Error of an editor session
#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Editor(#[from] EditorError),
}

fn main() {
    let cli = Cli::parse();

    // Logging needs the settings' filter, so a broken settings file is reported on stderr
    let settings = match EditorSettings::load(&cli.settings) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}; using default settings");
            EditorSettings::default()
        }
    };
    init_logging(&settings.log_filter);

    tracing::info!("Starting netweave editor v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&cli, settings) {
        tracing::error!("Editor failed: {e}");
        std::process::exit(1);
    }
}

fn init_logging(default_filter: &str) {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    match default_filter.parse() {
        Ok(directive) => env_filter = env_filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring log filter '{default_filter}': {e}"),
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn run(cli: &Cli, settings: EditorSettings) -> Result<(), AppError> {
    if cli.init_settings && !cli.settings.exists() {
        settings.save(&cli.settings)?;
        tracing::info!("Wrote default settings to {}", cli.settings.display());
    }

    let mut editor = match &cli.network {
        Some(path) => NetworkEditor::open(read_network(path)?, settings)?,
        None => demo::build(settings)?,
    };
    if cli.sort {
        editor.sort_network()?;
    }
    for notice in editor.take_notices() {
        tracing::warn!("{notice}");
    }

    println!("{}", summary::describe(&editor));

    if let Some(path) = &cli.save {
        editor.save_metadata()?;
        let content = editor.network().to_ron()?;
        std::fs::write(path, content).map_err(|source| AppError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::info!("Saved network to {}", path.display());
    }
    Ok(())
}

fn read_network(path: &Path) -> Result<ProcessorNetwork, AppError> {
    let content = std::fs::read_to_string(path).map_err(|source| AppError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ProcessorNetwork::from_ron(&content)?)
}
