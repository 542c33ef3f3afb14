//! Structured logging setup
//!
//! Human-readable or JSON output on stdout, daily rolling files, or both,
//! filtered by an `EnvFilter` built from the configured level.

use thiserror::Error;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;

const LOG_FILE: &str = "oinq.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging already initialised: {0}")]
    Init(#[from] TryInitError),
}

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format for development
    Pretty,
    /// JSON format for production (structured logging)
    Json,
    /// Compact format for testing
    Compact,
}

impl LogFormat {
    /// Unknown names fall back to pretty.
    pub fn parse(name: &str) -> Self {
        match name {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }

    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT").map_or(LogFormat::Pretty, |name| Self::parse(&name))
    }
}

/// Log output configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    File,
    Both,
}

impl LogOutput {
    /// Unknown names fall back to stdout.
    pub fn parse(name: &str) -> Self {
        match name {
            "file" => LogOutput::File,
            "both" => LogOutput::Both,
            _ => LogOutput::Stdout,
        }
    }

    pub fn from_env() -> Self {
        std::env::var("LOG_OUTPUT").map_or(LogOutput::Stdout, |name| Self::parse(&name))
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn stdout_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_thread_ids(true)
            .with_target(true)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    }
}

fn file_layer(directory: &str) -> Result<BoxedLayer, LoggingError> {
    std::fs::create_dir_all(directory)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, directory, LOG_FILE);
    Ok(fmt::layer().with_writer(appender).with_ansi(false).boxed())
}

/// Initialise logging from `RUST_LOG`, `LOG_FORMAT`, `LOG_OUTPUT` and `LOG_DIR`.
pub fn init() -> Result<(), LoggingError> {
    init_with(&LoggingConfig::from_env())
}

/// Initialise logging from `config`.
///
/// Only the first successful call installs a subscriber; later calls return
/// `LoggingError::Init` and leave it in place.
pub fn init_with(config: &LoggingConfig) -> Result<(), LoggingError> {
    let format = LogFormat::parse(&config.format);
    let output = LogOutput::parse(&config.output);

    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let layers: Vec<BoxedLayer> = match output {
        LogOutput::Stdout => vec![stdout_layer(format)],
        LogOutput::File => vec![file_layer(&config.directory)?],
        LogOutput::Both => vec![stdout_layer(format), file_layer(&config.directory)?],
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    tracing::info!(format = ?format, output = ?output, "Logging initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("fancy"), LogFormat::Pretty);
    }

    #[test]
    fn test_log_output_parse() {
        assert_eq!(LogOutput::parse("file"), LogOutput::File);
        assert_eq!(LogOutput::parse("both"), LogOutput::Both);
        assert_eq!(LogOutput::parse("stdout"), LogOutput::Stdout);
        assert_eq!(LogOutput::parse(""), LogOutput::Stdout);
    }

    #[test]
    fn test_second_init_is_an_error() {
        let config = LoggingConfig {
            format: "compact".to_string(),
            ..LoggingConfig::default()
        };
        let _ = init_with(&config);
        assert!(matches!(init_with(&config), Err(LoggingError::Init(_))));
    }
}
