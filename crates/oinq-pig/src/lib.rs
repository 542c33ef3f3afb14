//! Combinator chain → Pig Latin translator
//!
//! Binds a chain into a graph of `Select` stages and writes it out as a Pig
//! Latin script, together with the projector that turns the script's output
//! rows back into host values.

use std::sync::Arc;

use oinq_ir::{fingerprint, Expr, ExprError, Projector, Select};
use tracing::debug;

mod binder;
pub mod passes;
mod render;

pub use binder::{ChainBinder, Stage};
pub use render::{alias_name, PigWriter};

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

/// How many rows the outermost stage yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Many,
    /// At most one row: `First` and aggregates.
    Single,
}

/// Statement that ends every script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Dump,
    Store(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub terminal: Terminal,
    /// Placed between statements.
    pub separator: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            terminal: Terminal::Dump,
            separator: " ".to_string(),
        }
    }
}

/// Everything one execution needs: the script, its stage graph, and how to
/// read its rows.
#[derive(Debug, Clone)]
pub struct TranslatedQuery {
    pub text: String,
    pub select: Arc<Select>,
    pub projector: Projector,
    pub cardinality: Cardinality,
}

/// Translator for combinator chains → Pig Latin
pub struct PigTranslator<'a> {
    options: &'a RenderOptions,
    binder: ChainBinder,
}

impl<'a> PigTranslator<'a> {
    pub fn new(options: &'a RenderOptions) -> Self {
        Self {
            options,
            binder: ChainBinder::new(),
        }
    }

    /// Translate a chain. Nothing is rendered unless binding succeeds.
    pub fn translate(&self, chain: &Expr) -> Result<TranslatedQuery, TranslateError> {
        let stage = self.binder.bind_chain(chain)?;
        let select = Arc::new(stage.select);
        let text = PigWriter::new(self.options).write(&select)?;

        debug!(
            chain = %fingerprint(chain),
            stages = stage_count(&select),
            "Translated chain"
        );

        Ok(TranslatedQuery {
            text,
            projector: select.projector.clone(),
            select,
            cardinality: stage.cardinality,
        })
    }
}

/// Translate `chain` with `options`.
pub fn translate(chain: &Expr, options: &RenderOptions) -> Result<TranslatedQuery, TranslateError> {
    PigTranslator::new(options).translate(chain)
}

/// Render `chain` to Pig Latin with default options.
pub fn render(chain: &Expr) -> Result<String, TranslateError> {
    Ok(translate(chain, &RenderOptions::default())?.text)
}

fn stage_count(select: &Select) -> usize {
    1 + select.inner().map_or(0, |inner| stage_count(inner))
}
