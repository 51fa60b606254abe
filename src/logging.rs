//! Structured logging setup shared by both binaries
//!
//! Events go as JSON lines to `<log_dir>/app.log`. The server also mirrors
//! them to stderr in plain text, since stdout carries the protocol.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ResearchError, Result};

/// File name of the JSON log inside the log directory
pub const LOG_FILE_NAME: &str = "app.log";

/// Open (creating if needed) the append-only log file under `log_dir`
pub fn open_log_file(log_dir: &Path) -> Result<(PathBuf, File)> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

/// Install the global subscriber.
///
/// The level comes from `RUST_LOG`, defaulting to `info`.
pub fn init_logging(log_dir: &Path, also_stderr: bool) -> Result<PathBuf> {
    let (path, file) = open_log_file(log_dir)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(Mutex::new(file))
        .with_ansi(false);

    let stderr_layer = also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| ResearchError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(path)
}
