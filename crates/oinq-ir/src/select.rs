//! Relational algebra nodes: `Select` and the subquery wrappers around it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{DataType, Expr, ExprError, Projector};

/// Where a `Select` reads its rows from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SelectSource {
    /// A named base source, loaded directly.
    Base { name: String },
    /// Another `Select`; the inner stage renders first.
    Select { select: Arc<Select> },
}

/// One output column: an expression bound to a unique alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDeclaration {
    pub name: String,
    pub expr: Expr,
}

impl ColumnDeclaration {
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Grouping {
    /// Collapse every row into a single group.
    All,
    Keys(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ordering {
    pub expr: Expr,
    pub direction: Direction,
}

/// One translation stage: source, filter, projection, grouping, ordering, limit.
///
/// When `projected` is false the stage passes its input rows through and
/// `columns` only records the input fields referenced so far; when it is true
/// `columns` is the exact output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub source: SelectSource,
    pub filter: Option<Expr>,
    pub columns: Vec<ColumnDeclaration>,
    pub projected: bool,
    pub grouping: Option<Grouping>,
    pub order_by: Vec<Ordering>,
    pub limit: Option<u64>,
    /// Type of one output row.
    pub element: DataType,
    pub projector: Projector,
}

impl Select {
    /// A pass-through stage over a named base source.
    pub fn base(name: impl Into<String>, element: DataType) -> Self {
        Self {
            source: SelectSource::Base { name: name.into() },
            filter: None,
            columns: Vec::new(),
            projected: false,
            grouping: None,
            order_by: Vec::new(),
            limit: None,
            projector: Projector::for_element(&element),
            element,
        }
    }

    /// A pass-through stage reading from `inner`.
    pub fn wrap(inner: Arc<Select>) -> Self {
        let element = inner.element.clone();
        Self {
            projector: inner.projector.clone(),
            source: SelectSource::Select { select: inner },
            filter: None,
            columns: Vec::new(),
            projected: false,
            grouping: None,
            order_by: Vec::new(),
            limit: None,
            element,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDeclaration> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn inner(&self) -> Option<&Arc<Select>> {
        match &self.source {
            SelectSource::Select { select } => Some(select),
            SelectSource::Base { .. } => None,
        }
    }

    /// Number of fields in one output row.
    pub fn width(&self) -> usize {
        if self.projected {
            return self.columns.len();
        }
        match &self.element {
            DataType::Record(record) => record.fields.len(),
            DataType::Grouping { .. } => 2,
            _ => 1,
        }
    }
}

/// A nested `Select` used as an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subquery {
    pub select: Arc<Select>,
    pub data_type: DataType,
}

impl Subquery {
    pub fn new(data_type: DataType, select: Arc<Select>) -> Self {
        Self { select, data_type }
    }
}

/// A subquery yielding exactly one column and, when executed, one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scalar {
    pub select: Arc<Select>,
    pub data_type: DataType,
}

impl Scalar {
    pub fn new(data_type: DataType, select: Arc<Select>) -> Result<Self, ExprError> {
        let columns = select.width();
        if columns != 1 {
            return Err(ExprError::InvalidScalarSubquery { columns });
        }
        Ok(Self { select, data_type })
    }

    /// Name of the single output column.
    pub fn column_name(&self) -> &str {
        self.select
            .columns
            .first()
            .map(|c| c.name.as_str())
            .unwrap_or("value")
    }
}
