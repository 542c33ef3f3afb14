//! EdgeSpring data sources
//!
//! Connects Oinq queries to EdgeMarts on an EdgeSpring server: URL parsing,
//! the mart data source, update requests, configuration and logging setup.

pub mod config;
pub mod logging;
mod mart;
mod mart_url;
mod update;

pub use config::{Config, ConfigError};
pub use mart::{EdgeMart, Transport, TransportError};
pub use mart_url::{with_mart, MartUrl, UrlError, DEFAULT_PORT};
pub use update::Update;
