//! Logging setup.
//!
//! `serve` owns stdout for the native messaging channel, so it logs to a
//! daily rolling file. One-shot commands log to stderr.
//!
//! `TABTIME_DEBUG_LOG=1` forces debug; otherwise `RUST_LOG`, else `info`.

use std::env;
use std::io;
use std::path::Path;

use fs_err as fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "tabtime.log";

fn env_filter() -> EnvFilter {
    let debug_enabled = env::var("TABTIME_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Logs to `log_dir`, falling back to stderr if the directory is unusable.
/// The returned guard must live until exit so buffered lines are flushed.
pub fn init_file(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let Some(dir) = log_dir else {
        init_stderr();
        return None;
    };

    if let Err(err) = fs::create_dir_all(dir) {
        init_stderr();
        tracing::warn!(error = %err, "Log directory unavailable; logging to stderr");
        return None;
    }

    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Some(guard)
}

pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .try_init();
}
