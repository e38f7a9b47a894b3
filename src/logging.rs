use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::app::{GatorError, Result};
use crate::config::LogConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Logs go to
/// stderr, and additionally to `config.file` without ANSI colors when set.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            GatorError::Other(format!("Invalid log filter {:?}: {}", config.filter, e))
        })?,
    };

    let file_layer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| GatorError::Other(format!("Failed to install logger: {}", e)))
}
