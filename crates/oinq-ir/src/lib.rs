//! Oinq expression tree
//!
//! Immutable expression nodes describing a combinator chain and the relational
//! `Select` algebra it is translated into. Handles are shared (`Arc`), so a
//! rewrite either hands back the original handle or builds a new node; nothing
//! is ever mutated in place and trees are acyclic by construction.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod build;
mod projector;
mod select;
mod types;
pub mod walker;

pub use projector::{ProjectedColumn, Projector, Shape};
pub use select::*;
pub use types::*;

/// Shared handle to an immutable node.
pub type Expr = Arc<Node>;

#[derive(Debug, Error)]
pub enum ExprError {
    #[error("Unsupported node kind: {0}")]
    UnsupportedNodeKind(NodeKind),

    #[error("Scalar subquery must produce exactly one column, found {columns}")]
    InvalidScalarSubquery { columns: usize },

    #[error("Type mismatch for {target}: expected {expected}, found {found}")]
    TypeMismatch {
        target: String,
        expected: String,
        found: String,
    },

    #[error("Invalid argument: {0}")]
    Argument(String),
}

impl ExprError {
    pub fn type_mismatch(
        target: impl Into<String>,
        expected: impl fmt::Display,
        found: impl fmt::Display,
    ) -> Self {
        ExprError::TypeMismatch {
            target: target.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// Tag of every node variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Constant,
    Parameter,
    Member,
    Unary,
    Binary,
    Conditional,
    Call,
    Construct,
    ArrayInit,
    ListInit,
    Lambda,
    Invocation,
    RecordInit,
    IsNull,
    Subquery,
    Scalar,
    Select,
    Column,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Node {
    Constant(Constant),
    Parameter(Parameter),
    Member(Member),
    Unary(Unary),
    Binary(Binary),
    Conditional(Conditional),
    Call(Call),
    Construct(Construct),
    ArrayInit(ArrayInit),
    ListInit(ListInit),
    Lambda(Lambda),
    Invocation(Invocation),
    RecordInit(RecordInit),
    IsNull(IsNull),
    Subquery(Subquery),
    Scalar(Scalar),
    Select(Arc<Select>),
    Column(Column),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Constant(_) => NodeKind::Constant,
            Node::Parameter(_) => NodeKind::Parameter,
            Node::Member(_) => NodeKind::Member,
            Node::Unary(_) => NodeKind::Unary,
            Node::Binary(_) => NodeKind::Binary,
            Node::Conditional(_) => NodeKind::Conditional,
            Node::Call(_) => NodeKind::Call,
            Node::Construct(_) => NodeKind::Construct,
            Node::ArrayInit(_) => NodeKind::ArrayInit,
            Node::ListInit(_) => NodeKind::ListInit,
            Node::Lambda(_) => NodeKind::Lambda,
            Node::Invocation(_) => NodeKind::Invocation,
            Node::RecordInit(_) => NodeKind::RecordInit,
            Node::IsNull(_) => NodeKind::IsNull,
            Node::Subquery(_) => NodeKind::Subquery,
            Node::Scalar(_) => NodeKind::Scalar,
            Node::Select(_) => NodeKind::Select,
            Node::Column(_) => NodeKind::Column,
        }
    }

    /// The semantic result type of this node.
    pub fn data_type(&self) -> DataType {
        match self {
            Node::Constant(n) => n.data_type.clone(),
            Node::Parameter(n) => n.data_type.clone(),
            Node::Member(n) => n.data_type.clone(),
            Node::Unary(n) => n.data_type.clone(),
            Node::Binary(n) => n.data_type.clone(),
            Node::Conditional(n) => n.data_type.clone(),
            Node::Call(n) => n.data_type.clone(),
            Node::Construct(n) => n.data_type.clone(),
            Node::ArrayInit(n) => DataType::Array(Box::new(n.element_type.clone())),
            Node::ListInit(n) => n.construct.data_type.clone(),
            Node::Lambda(n) => n.body.data_type(),
            Node::Invocation(n) => n.data_type.clone(),
            Node::RecordInit(n) => n.construct.data_type.clone(),
            Node::IsNull(_) => DataType::Bool,
            Node::Subquery(n) => n.data_type.clone(),
            Node::Scalar(n) => n.data_type.clone(),
            Node::Select(n) => DataType::query(n.element.clone()),
            Node::Column(n) => n.data_type.clone(),
        }
    }

    pub fn into_expr(self) -> Expr {
        Arc::new(self)
    }
}

macro_rules! impl_into_node {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Node {
                fn from(value: $variant) -> Self {
                    Node::$variant(value)
                }
            }
        )*
    };
}

impl_into_node!(
    Constant,
    Parameter,
    Member,
    Unary,
    Binary,
    Conditional,
    Call,
    Construct,
    ArrayInit,
    ListInit,
    Lambda,
    Invocation,
    RecordInit,
    IsNull,
    Subquery,
    Scalar,
    Column,
);

impl From<Select> for Node {
    fn from(value: Select) -> Self {
        Node::Select(Arc::new(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub value: Value,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub data_type: DataType,
}

/// Member access; `expr` is `None` for a static member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub expr: Option<Expr>,
    pub member: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
    Convert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unary {
    pub op: UnaryOp,
    pub operand: Expr,
    pub data_type: DataType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    // Logical
    And,
    Or,
    // Null handling
    Coalesce,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binary {
    pub op: BinaryOp,
    pub left: Expr,
    pub right: Expr,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditional {
    pub test: Expr,
    pub if_true: Expr,
    pub if_false: Expr,
    pub data_type: DataType,
}

/// Method call. Combinators in a chain are calls with no receiver whose first
/// argument is the inner chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub object: Option<Expr>,
    pub method: String,
    pub args: Vec<Expr>,
    pub data_type: DataType,
}

/// Record construction; `members` names each argument when non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Construct {
    pub data_type: DataType,
    pub args: Vec<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayInit {
    pub element_type: DataType,
    pub elements: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementInit {
    pub method: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListInit {
    pub construct: Construct,
    pub initializers: Vec<ElementInit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub params: Vec<Parameter>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub target: Expr,
    pub args: Vec<Expr>,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "binding")]
pub enum MemberBinding {
    Assignment {
        member: String,
        expr: Expr,
    },
    Member {
        member: String,
        bindings: Vec<MemberBinding>,
    },
    List {
        member: String,
        initializers: Vec<ElementInit>,
    },
}

impl MemberBinding {
    pub fn member(&self) -> &str {
        match self {
            MemberBinding::Assignment { member, .. }
            | MemberBinding::Member { member, .. }
            | MemberBinding::List { member, .. } => member,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordInit {
    pub construct: Construct,
    pub bindings: Vec<MemberBinding>,
}

/// Null test over a host value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsNull {
    pub expr: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnScope {
    /// A field of the current relation.
    Row,
    /// A field of the bag carried by a grouped relation; an empty name is the bag.
    Group,
}

/// Column reference produced by binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub scope: ColumnScope,
    pub data_type: DataType,
}

/// Deterministic SHA-256 of a tree, used to correlate log lines.
pub fn fingerprint(expr: &Expr) -> String {
    let json = serde_json::to_string(expr).expect("expression trees always serialize");
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::build::*;
    use super::*;

    fn person() -> DataType {
        DataType::Record(RecordType::new(
            "Person",
            vec![
                FieldType::new("Name", DataType::String),
                FieldType::new("Age", DataType::Int64),
            ],
        ))
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let a = lambda_with("r", person(), |r| r.field("Age").gt(30));
        let b = lambda_with("r", person(), |r| r.field("Age").gt(30));

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_differs() {
        let r = param("r", person());
        let a = r.field("Age").gt(30);
        let b = r.field("Age").gt(31);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_json_round_trip() {
        let expr = lambda_with("r", person(), |r| {
            r.field("Name").is_null().or(r.field("Age").le(18))
        });

        let json = serde_json::to_string(&expr).unwrap();
        let parsed: Expr = serde_json::from_str(&json).unwrap();

        assert_eq!(expr, parsed);
    }

    #[test]
    fn test_kinds_and_types() {
        let r = param("r", person());
        let age = r.field("Age");
        assert_eq!(age.kind(), NodeKind::Member);
        assert_eq!(age.data_type(), DataType::Int64);
        assert_eq!(age.is_null().data_type(), DataType::Bool);
        assert_eq!(age.add(1.5).data_type(), DataType::Float64);
        assert_eq!(r.field("Missing").data_type(), DataType::Unknown);
    }
}
