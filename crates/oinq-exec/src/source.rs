//! Data source trait: where rendered scripts are executed

use std::sync::Mutex;

use oinq_ir::DataType;

/// Error raised by a data source's executor. Surfaced to callers unchanged.
pub type ExecutorError = Box<dyn std::error::Error + Send + Sync>;

/// One positional, untyped output row.
pub type RawRow = Vec<serde_json::Value>;

/// A remote source that can run Pig Latin scripts.
pub trait DataSource: Send + Sync {
    /// Identifier used in the script's `LOAD` statement.
    fn name(&self) -> &str;

    /// Run `text` and return its output rows. Blocking.
    fn run_query(&self, text: &str, element: &DataType) -> Result<Vec<RawRow>, ExecutorError>;
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub String);

/// In-memory data source for testing: returns canned rows (or a canned
/// failure) and records every script it receives.
pub struct MockDataSource {
    name: String,
    rows: Vec<RawRow>,
    failure: Option<String>,
    received: Mutex<Vec<String>>,
}

impl MockDataSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            failure: None,
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn with_rows(mut self, rows: Vec<RawRow>) -> Self {
        self.rows = rows;
        self
    }

    /// Every execution fails with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Scripts received so far, oldest first.
    pub fn received(&self) -> Vec<String> {
        self.received
            .lock()
            .map(|texts| texts.clone())
            .unwrap_or_default()
    }
}

impl DataSource for MockDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_query(&self, text: &str, _element: &DataType) -> Result<Vec<RawRow>, ExecutorError> {
        if let Ok(mut received) = self.received.lock() {
            received.push(text.to_string());
        }
        match &self.failure {
            Some(message) => Err(Box::new(MockError(message.clone()))),
            None => Ok(self.rows.clone()),
        }
    }
}
