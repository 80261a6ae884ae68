//! Logging setup shared by the QHYCCD binaries.

use std::path::Path;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("creating log file {path}: {source}")]
    LogFile {
        source: std::io::Error,
        path: std::path::PathBuf,
    },
    #[error("installing the global subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Keeps logging active until dropped.
pub struct Guard {}

impl Drop for Guard {
    fn drop(&mut self) {}
}

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogOptions<'a> {
    /// Also write to this file, without colors.
    pub path: Option<&'a Path>,
    /// Filter used when `RUST_LOG` is not set.
    pub default_filter: &'a str,
}

impl Default for LogOptions<'_> {
    fn default() -> Self {
        Self {
            path: None,
            default_filter: "info",
        }
    }
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Log to stderr and, if a path is given, to a file.
pub fn initiate_logging(opts: &LogOptions<'_>) -> Result<Guard, Error> {
    let file_layer = match opts.path {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|source| Error::LogFile {
                source,
                path: path.to_path_buf(),
            })?;
            Some(
                fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true),
            )
        }
        None => None,
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!cfg!(windows))
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(env_filter(opts.default_filter))
        .try_init()?;

    let log_var = match std::env::var("RUST_LOG") {
        Ok(var) => format!(" with RUST_LOG=\"{var}\""),
        Err(_) => format!(" with default filter \"{}\"", opts.default_filter),
    };
    if let Some(path) = opts.path {
        tracing::debug!("Logging to file \"{}\"{log_var}", path.display());
    }
    tracing::debug!("Logging to console{log_var}");

    Ok(Guard {})
}
