//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Stderr level, highest priority first:
//! 1. `--verbose` (debug)
//! 2. `RUST_LOG`
//! 3. `log_level` from the config file
//!
//! When a log directory is given, everything at debug and above is also
//! appended to `cons3rt-kit.log` there.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::common::error::Cons3rtError;
use crate::common::result::{Cons3rtResult, ResultExt};

pub const LOG_FILE_NAME: &str = "cons3rt-kit.log";

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub verbose: bool,
    pub config_level: String,
    pub log_dir: Option<PathBuf>,
}

/// Stderr filter directive for the given options.
pub fn stderr_directive(verbose: bool, rust_log: Option<&str>, config_level: &str) -> String {
    if verbose {
        return "debug".to_string();
    }
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directive) => directive.to_string(),
        None if config_level.trim().is_empty() => "info".to_string(),
        None => config_level.trim().to_lowercase(),
    }
}

/// Installs the global subscriber. Call once at startup.
pub fn init_logging(options: &LogOptions) -> Cons3rtResult<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = stderr_directive(options.verbose, rust_log.as_deref(), &options.config_level);
    let stderr_filter = EnvFilter::try_new(&directive).map_err(|e| {
        Cons3rtError::config_error_with_source(format!("Invalid log filter: {directive}"), e)
    })?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    let log_file_layer = match &options.log_dir {
        Some(dir) => Some(file_layer(dir)?),
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(log_file_layer)
        .try_init()
        .map_err(|e| Cons3rtError::internal_error_with_source("Logging already initialized", e))
}

fn file_layer<S>(dir: &Path) -> Cons3rtResult<impl Layer<S>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let path = dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_filesystem_error("Unable to open log file", Some(path.clone()))?;

    Ok(fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(LevelFilter::DEBUG))
}
