//! EdgeSpring server URLs
//!
//! `edgespring://host[:port]?edgemart=<name>` (or `http(s)://` with the same
//! query). Every URL is reduced to a canonical spelling: lower-case host,
//! explicit port (8000 when absent), lower-case query keys sorted by name.
//! Parsed URLs are cached process-wide under both the raw and the canonical
//! spelling.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use thiserror::Error;
use url::form_urlencoded;
use url::Url;

pub const DEFAULT_PORT: u16 = 8000;

const MART_KEY: &str = "edgemart";

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse url: {0}")]
    Parse(#[from] url::ParseError),

    #[error("Unsupported scheme '{0}', expected edgespring, http or https")]
    Scheme(String),

    #[error("Url '{0}' has no host")]
    MissingHost(String),

    #[error("Url '{0}' does not name an EdgeMart")]
    MissingMart(String),
}

#[derive(Debug)]
struct Parts {
    host: String,
    port: u16,
    mart: Option<String>,
    canonical: String,
}

/// A parsed, canonicalised EdgeSpring URL. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MartUrl(Arc<Parts>);

fn cache() -> &'static Mutex<HashMap<String, MartUrl>> {
    static CACHE: OnceLock<Mutex<HashMap<String, MartUrl>>> = OnceLock::new();
    CACHE.get_or_init(Default::default)
}

impl MartUrl {
    /// Parse `raw`, reusing an earlier parse of the same (or an equivalent)
    /// URL when there is one.
    pub fn create(raw: &str) -> Result<Self, UrlError> {
        let mut cache = cache().lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(url) = cache.get(raw) {
            return Ok(url.clone());
        }

        let parsed = Self::parse(raw)?;
        let url = match cache.get(parsed.as_str()).cloned() {
            Some(existing) => existing,
            None => {
                cache.insert(parsed.as_str().to_string(), parsed.clone());
                parsed
            }
        };
        cache.insert(raw.to_string(), url.clone());
        Ok(url)
    }

    /// Forget every cached URL.
    pub fn clear_cache() {
        cache()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn parse(raw: &str) -> Result<Self, UrlError> {
        let parsed = Url::parse(raw.trim())?;
        if !matches!(parsed.scheme(), "edgespring" | "http" | "https") {
            return Err(UrlError::Scheme(parsed.scheme().to_string()));
        }

        let host = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| UrlError::MissingHost(raw.to_string()))?
            .to_ascii_lowercase();
        let port = parsed.port().unwrap_or(DEFAULT_PORT);

        let mut query: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(key, value)| (key.to_ascii_lowercase(), value.into_owned()))
            .collect();
        query.sort_by(|a, b| a.0.cmp(&b.0));

        let mart = query
            .iter()
            .find(|(key, value)| key == MART_KEY && !value.is_empty())
            .map(|(_, value)| value.clone());

        let mut canonical = format!("edgespring://{host}:{port}");
        if !query.is_empty() {
            canonical.push('?');
            canonical.push_str(
                &form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(&query)
                    .finish(),
            );
        }

        Ok(Self(Arc::new(Parts {
            host,
            port,
            mart,
            canonical,
        })))
    }

    pub fn host(&self) -> &str {
        &self.0.host
    }

    pub fn port(&self) -> u16 {
        self.0.port
    }

    /// Name of the EdgeMart this URL addresses, if it names one.
    pub fn edgemart_name(&self) -> Option<&str> {
        self.0.mart.as_deref()
    }

    /// Canonical spelling.
    pub fn as_str(&self) -> &str {
        &self.0.canonical
    }

    /// Whether both handles share one cached parse.
    pub fn same_instance(a: &MartUrl, b: &MartUrl) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

/// `base` with an `edgemart=<name>` query pair, unless it already names one.
pub fn with_mart(base: &str, name: &str) -> String {
    if base.to_ascii_lowercase().contains(MART_KEY) {
        return base.to_string();
    }
    let separator = if base.contains('?') { '&' } else { '?' };
    let pair = form_urlencoded::Serializer::new(String::new())
        .append_pair(MART_KEY, name)
        .finish();
    format!("{base}{separator}{pair}")
}

impl PartialEq for MartUrl {
    fn eq(&self, other: &Self) -> bool {
        self.0.canonical == other.0.canonical
    }
}

impl Eq for MartUrl {}

impl Hash for MartUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.canonical.hash(state);
    }
}

impl fmt::Display for MartUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.canonical)
    }
}
