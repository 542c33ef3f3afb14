//! Configuration for EdgeSpring-backed queries
//!
//! Loaded from a YAML file; every section is optional and defaulted.
//! Environment variables always override file values.

use std::path::Path;

use oinq_pig::{RenderOptions, Terminal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mart_url::{with_mart, MartUrl, UrlError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `edgespring://host[:port]`, optionally with `?edgemart=`
    pub url: String,

    /// Mart used when `url` does not name one
    pub default_mart: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "edgespring://localhost:8000".to_string(),
            default_mart: None,
        }
    }
}

impl ServerConfig {
    /// The configured URL, naming `default_mart` when the URL itself does not.
    pub fn mart_url(&self) -> Result<MartUrl, UrlError> {
        match &self.default_mart {
            Some(mart) => MartUrl::create(&with_mart(&self.url, mart)),
            None => MartUrl::create(&self.url),
        }
    }
}

/// Translation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Terminal statement: "dump" or "store"
    pub terminal: String,

    /// Output path (only needed when terminal = "store")
    pub store_path: Option<String>,

    pub statement_separator: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            terminal: "dump".to_string(),
            store_path: None,
            statement_separator: " ".to_string(),
        }
    }
}

impl TranslationConfig {
    pub fn to_options(&self) -> Result<RenderOptions, ConfigError> {
        let terminal = match self.terminal.to_ascii_lowercase().as_str() {
            "dump" => Terminal::Dump,
            "store" => match &self.store_path {
                Some(path) if !path.is_empty() => Terminal::Store(path.clone()),
                _ => {
                    return Err(ConfigError::Invalid(
                        "store terminal requires store_path".to_string(),
                    ))
                }
            },
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown terminal '{other}', expected dump or store"
                )))
            }
        };
        Ok(RenderOptions {
            terminal,
            separator: self.statement_separator.clone(),
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Defaults overridden by `RUST_LOG`, `LOG_FORMAT`, `LOG_OUTPUT` and `LOG_DIR`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.directory = dir;
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub translation: TranslationConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(contents)?;
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("OINQ_SERVER_URL") {
            self.server.url = url;
        }
        if let Ok(mart) = std::env::var("OINQ_EDGEMART") {
            self.server.default_mart = Some(mart);
        }

        if let Ok(terminal) = std::env::var("OINQ_TERMINAL") {
            self.translation.terminal = terminal;
        }
        if let Ok(path) = std::env::var("OINQ_STORE_PATH") {
            self.translation.store_path = Some(path);
        }

        self.logging.apply_env();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.url, "edgespring://localhost:8000");
        assert_eq!(config.translation.terminal, "dump");
        assert_eq!(config.translation.statement_separator, " ");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.output, "stdout");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            r#"
server:
  default_mart: "people"
translation:
  statement_separator: "\n"
"#,
        )
        .unwrap();

        assert_eq!(config.server.default_mart.as_deref(), Some("people"));
        assert_eq!(config.translation.statement_separator, "\n");
        assert_eq!(config.logging.directory, "./logs");
    }

    #[test]
    fn test_to_options() {
        let options = TranslationConfig::default().to_options().unwrap();
        assert_eq!(options, RenderOptions::default());

        let store = TranslationConfig {
            terminal: "STORE".to_string(),
            store_path: Some("out/people".to_string()),
            statement_separator: "\n".to_string(),
        };
        assert_eq!(
            store.to_options().unwrap().terminal,
            Terminal::Store("out/people".to_string())
        );
    }

    #[test]
    fn test_invalid_terminal() {
        let missing_path = TranslationConfig {
            terminal: "store".to_string(),
            ..TranslationConfig::default()
        };
        assert!(matches!(missing_path.to_options(), Err(ConfigError::Invalid(_))));

        let unknown = TranslationConfig {
            terminal: "print".to_string(),
            ..TranslationConfig::default()
        };
        assert!(matches!(unknown.to_options(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_mart_url_uses_default_mart() {
        let server = ServerConfig {
            url: "edgespring://Config-Unit".to_string(),
            default_mart: Some("people".to_string()),
        };
        let url = server.mart_url().unwrap();
        assert_eq!(url.edgemart_name(), Some("people"));
        assert_eq!(url.as_str(), "edgespring://config-unit:8000?edgemart=people");
    }

    #[test]
    fn test_env_var_override() {
        std::env::set_var("OINQ_STORE_PATH", "from/env");

        let config = Config::from_yaml("translation:\n  terminal: store\n").unwrap();
        assert_eq!(config.translation.store_path.as_deref(), Some("from/env"));
        assert_eq!(
            config.translation.to_options().unwrap().terminal,
            Terminal::Store("from/env".to_string())
        );

        std::env::remove_var("OINQ_STORE_PATH");
    }
}
