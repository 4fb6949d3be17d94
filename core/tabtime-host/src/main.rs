//! tabtime: browser time tracker host.
//!
//! Launched by the browser as a native messaging host, or run by hand to
//! inspect what has been recorded.
//!
//! ## Subcommands
//!
//! - `serve`: Native messaging loop on stdin/stdout (default when launched
//!   by the browser)
//! - `popup`: Total and per-domain time
//! - `dashboard`: Session counts, top sites, and the daily average
//! - `clear`: Delete all recorded sessions

mod logging;
mod render;
mod serve;

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tabtime_core::stats::{dashboard_stats, popup_stats};
use tabtime_core::{load_config, JsonFileGateway, Result, SessionGateway, TrackerConfig, TrackerError};

#[derive(Parser)]
#[command(name = "tabtime")]
#[command(about = "Per-site browsing time tracker")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.tabtime/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Session store, overriding the config file
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Extension origin passed by the browser on launch
    #[arg(hide = true, value_name = "ORIGIN")]
    origin: Option<String>,

    /// Window handle passed by the browser on Windows
    #[arg(long, hide = true)]
    parent_window: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the native messaging loop (reads framed JSON from stdin)
    Serve,

    /// Show total and per-domain time
    Popup {
        #[arg(long)]
        json: bool,
    },

    /// Show session counts, top sites, and the daily average
    Dashboard {
        #[arg(long)]
        json: bool,

        /// Number of top sites (defaults to the config value)
        #[arg(long)]
        top: Option<usize>,
    },

    /// Delete all recorded sessions
    Clear {
        /// Required; nothing is deleted without it
        #[arg(long)]
        yes: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref());
    if let Some(store) = cli.store {
        config.storage_path = Some(store);
    }

    // The browser launches the host with its origin and no subcommand.
    let command = cli.command.unwrap_or(Commands::Serve);
    let _logging_guard = match command {
        Commands::Serve => logging::init_file(config.resolve_log_dir().as_deref()),
        _ => {
            logging::init_stderr();
            None
        }
    };
    if let Some(origin) = &cli.origin {
        tracing::info!(
            origin = %origin,
            parent_window = ?cli.parent_window,
            "Launched by browser"
        );
    }

    let result = run(command, &config);

    if let Err(e) = result {
        tracing::error!(error = %e, "tabtime failed");
        std::process::exit(1);
    }
}

fn read_sessions(config: &TrackerConfig) -> Result<Vec<tabtime_core::MainSession>> {
    JsonFileGateway::new(config.resolve_storage_path()?).read_all()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| TrackerError::json("Failed to encode output", err))?;
    print_text(&format!("{}\n", text))
}

fn print_text(text: &str) -> Result<()> {
    io::stdout()
        .lock()
        .write_all(text.as_bytes())
        .map_err(|err| TrackerError::io("Failed to write output", err))
}

fn run(command: Commands, config: &TrackerConfig) -> Result<()> {
    match command {
        Commands::Serve => serve::run(config),
        Commands::Popup { json } => {
            let stats = popup_stats(&read_sessions(config)?);
            if json {
                print_json(&stats)
            } else {
                print_text(&render::render_popup(&stats))
            }
        }
        Commands::Dashboard { json, top } => {
            let sessions = read_sessions(config)?;
            let stats = dashboard_stats(
                &sessions,
                config.daily_average,
                top.unwrap_or(config.top_sites),
            );
            if json {
                print_json(&stats)
            } else {
                print_text(&render::render_dashboard(&stats))
            }
        }
        Commands::Clear { yes } => {
            if !yes {
                eprintln!("Refusing to delete recorded sessions without --yes");
                std::process::exit(2);
            }
            let path = config.resolve_storage_path()?;
            JsonFileGateway::new(&path).clear()?;
            tracing::info!(path = %path.display(), "Cleared recorded sessions");
            Ok(())
        }
    }
}
