//! Query provider: translate, render, execute, project.

use std::sync::Arc;

use oinq_ir::{fingerprint, Expr, ExprError};
use oinq_pig::{Cardinality, PigTranslator, RenderOptions, TranslateError, TranslatedQuery};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::source::{DataSource, ExecutorError};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Failed to decode result: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Executor(ExecutorError),
}

impl From<ExprError> for QueryError {
    fn from(err: ExprError) -> Self {
        QueryError::Translate(err.into())
    }
}

/// Untyped result of one execution.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Sequence(Vec<Value>),
    /// `First` and aggregates: at most one value.
    Single(Option<Value>),
}

impl QueryResult {
    pub fn into_values(self) -> Vec<Value> {
        match self {
            QueryResult::Sequence(values) => values,
            QueryResult::Single(value) => value.into_iter().collect(),
        }
    }
}

/// Single entry point from a combinator chain to projected results.
///
/// Nothing is cached: every call re-translates and re-renders the chain.
pub struct QueryProvider {
    source: Arc<dyn DataSource>,
    options: RenderOptions,
}

impl QueryProvider {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            options: RenderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// Name used for the chain root's `LOAD`.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn translate(&self, chain: &Expr) -> Result<TranslatedQuery, QueryError> {
        Ok(PigTranslator::new(&self.options).translate(chain)?)
    }

    /// Render `chain` without executing it.
    pub fn render(&self, chain: &Expr) -> Result<String, QueryError> {
        Ok(self.translate(chain)?.text)
    }

    /// Execute `chain` and return untyped projected values.
    pub fn execute(&self, chain: &Expr) -> Result<QueryResult, QueryError> {
        let translated = self.translate(chain)?;
        debug!(text = %translated.text, "Rendered Pig Latin");

        let rows = self
            .source
            .run_query(&translated.text, &translated.select.element)
            .map_err(|e| {
                warn!(
                    source = self.source.name(),
                    chain = %fingerprint(chain),
                    error = %e,
                    "Data source execution failed"
                );
                QueryError::Executor(e)
            })?;

        info!(
            source = self.source.name(),
            rows = rows.len(),
            "Executed query"
        );

        let values = rows
            .iter()
            .map(|row| translated.projector.project(row))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match translated.cardinality {
            Cardinality::Many => QueryResult::Sequence(values),
            Cardinality::Single => QueryResult::Single(values.into_iter().next()),
        })
    }

    /// Execute `chain` and decode every row as `T`.
    pub fn execute_as<T: DeserializeOwned>(&self, chain: &Expr) -> Result<Vec<T>, QueryError> {
        self.execute(chain)?
            .into_values()
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(QueryError::from))
            .collect()
    }

    /// Execute `chain` and decode its first row, if any, as `T`.
    pub fn execute_single<T: DeserializeOwned>(
        &self,
        chain: &Expr,
    ) -> Result<Option<T>, QueryError> {
        let value = match self.execute(chain)? {
            QueryResult::Single(value) => value,
            QueryResult::Sequence(values) => values.into_iter().next(),
        };
        Ok(value.map(serde_json::from_value).transpose()?)
    }
}
