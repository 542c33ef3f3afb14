//! EdgeMart data source

use std::fmt;
use std::sync::Arc;

use oinq_exec::{DataSource, ExecutorError, Query, QueryProvider, RawRow, Record};
use oinq_ir::DataType;
use oinq_pig::RenderOptions;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::mart_url::{with_mart, MartUrl, UrlError};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Server {0} is unreachable")]
    Unreachable(String),

    #[error("Server rejected script ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Carries a script to an EdgeSpring server and brings back its rows.
pub trait Transport: Send + Sync {
    fn send(&self, endpoint: &Url, mart: &str, script: &str) -> Result<Vec<RawRow>, TransportError>;
}

/// One EdgeMart on one server.
pub struct EdgeMart {
    url: MartUrl,
    name: String,
    endpoint: Url,
    transport: Arc<dyn Transport>,
}

impl EdgeMart {
    pub fn new(url: MartUrl, transport: Arc<dyn Transport>) -> Result<Self, UrlError> {
        let name = url
            .edgemart_name()
            .ok_or_else(|| UrlError::MissingMart(url.to_string()))?
            .to_string();
        let endpoint = Url::parse(&format!("http://{}:{}/remote", url.host(), url.port()))?;
        Ok(Self {
            url,
            name,
            endpoint,
            transport,
        })
    }

    pub fn connect(url: &str, transport: Arc<dyn Transport>) -> Result<Self, UrlError> {
        Self::new(MartUrl::create(url)?, transport)
    }

    /// The mart named after `T`'s record type, unless `base` already names one.
    pub fn for_record<T: Record>(
        base: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, UrlError> {
        Self::connect(&with_mart(base, &T::record_type().name), transport)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &MartUrl {
        &self.url
    }

    /// `http://host:port/remote`, where scripts are posted.
    pub fn absolute_uri(&self) -> &Url {
        &self.endpoint
    }

    /// A query over every row of this mart.
    pub fn query<T: Record>(self, options: RenderOptions) -> Query<T> {
        let provider = QueryProvider::new(Arc::new(self)).with_options(options);
        Query::new(Arc::new(provider))
    }
}

impl fmt::Debug for EdgeMart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeMart")
            .field("name", &self.name)
            .field("url", &self.url.as_str())
            .finish()
    }
}

impl DataSource for EdgeMart {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_query(&self, text: &str, _element: &DataType) -> Result<Vec<RawRow>, ExecutorError> {
        debug!(mart = %self.name, endpoint = %self.endpoint, "Sending script");
        Ok(self.transport.send(&self.endpoint, &self.name, text)?)
    }
}
