//! Structured logging setup.

use crate::config::LoggingConfig;
use crate::error::{ReactorError, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Install the global `tracing` subscriber described by `config`.
///
/// File output takes precedence over console output when both are enabled.
///
/// # Errors
/// `ConfigError` if the log file cannot be opened or a global subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let writer = match (&config.log_file_path, config.log_to_file) {
        (Some(path), true) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ReactorError::ConfigError(format!("Failed to open log file: {e}")))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        _ => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_thread_names(true)
        .with_target(true)
        .with_writer(writer);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ReactorError::ConfigError(format!("Failed to install logger: {e}")))?;

    info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}
