//! `tracing` subscriber setup.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{Config, LogFormat};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("cannot open log file '{path}': {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("logging already initialized: {0}")]
    Init(String),
}

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Appends to a file; used while the terminal UI owns the screen.
    File(PathBuf),
}

pub fn build_filter(filter: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(filter).map_err(|e| LoggingError::Filter {
        filter: filter.to_string(),
        reason: e.to_string(),
    })
}

/// Installs the global subscriber. Call once, at startup.
pub fn init(config: &Config, target: &LogTarget) -> Result<(), LoggingError> {
    let filter = build_filter(&config.log_filter)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let result = match (target, config.log_format) {
        (LogTarget::Stderr, LogFormat::Pretty) => builder.with_writer(std::io::stderr).try_init(),
        (LogTarget::Stderr, LogFormat::Json) => builder.json().with_writer(std::io::stderr).try_init(),
        (LogTarget::File(path), LogFormat::Pretty) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(open_log(path)?))
            .try_init(),
        (LogTarget::File(path), LogFormat::Json) => builder
            .json()
            .with_ansi(false)
            .with_writer(Mutex::new(open_log(path)?))
            .try_init(),
    };
    result.map_err(|e| LoggingError::Init(e.to_string()))
}

fn open_log(path: &Path) -> Result<File, LoggingError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| LoggingError::File {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LoggingError::File {
            path: path.to_path_buf(),
            source: e,
        })
}
