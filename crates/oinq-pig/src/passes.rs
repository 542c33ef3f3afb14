//! Rewriting passes run over lambda bodies and bound predicates.

use std::collections::HashMap;
use std::sync::Arc;

use oinq_ir::build::{is_null, unary};
use oinq_ir::walker::{walk_binary, walk_invocation, walk_lambda, Rewriter};
use oinq_ir::{
    Binary, BinaryOp, Column, ColumnDeclaration, ColumnScope, Constant, Expr, ExprError,
    Invocation, Lambda, Node, Parameter, UnaryOp, Value,
};

/// Replaces parameter references by name.
pub struct SubstituteParameters {
    bindings: HashMap<String, Expr>,
}

impl SubstituteParameters {
    pub fn new(bindings: HashMap<String, Expr>) -> Self {
        Self { bindings }
    }

    pub fn single(name: &str, expr: Expr) -> Self {
        Self::new(HashMap::from([(name.to_string(), expr)]))
    }
}

impl Rewriter for SubstituteParameters {
    type Error = ExprError;

    fn visit_parameter(&mut self, expr: &Expr, node: &Parameter) -> Result<Expr, ExprError> {
        Ok(self
            .bindings
            .get(&node.name)
            .cloned()
            .unwrap_or_else(|| Arc::clone(expr)))
    }

    fn visit_lambda(&mut self, expr: &Expr, node: &Lambda) -> Result<Expr, ExprError> {
        // Inner parameters shadow outer ones.
        let shadowed: Vec<(String, Expr)> = node
            .params
            .iter()
            .filter_map(|p| self.bindings.remove_entry(&p.name))
            .collect();
        let result = walk_lambda(self, expr, node);
        self.bindings.extend(shadowed);
        result
    }
}

/// Inlines `Invocation`s whose target is a literal lambda.
pub struct InlineInvocations;

impl Rewriter for InlineInvocations {
    type Error = ExprError;

    fn visit_invocation(&mut self, expr: &Expr, node: &Invocation) -> Result<Expr, ExprError> {
        let walked = walk_invocation(self, expr, node)?;
        let Node::Invocation(invocation) = walked.as_ref() else {
            return Ok(walked);
        };
        let Node::Lambda(lambda) = invocation.target.as_ref() else {
            return Ok(walked);
        };
        if lambda.params.len() != invocation.args.len() {
            return Err(ExprError::Argument(format!(
                "lambda takes {} arguments, invoked with {}",
                lambda.params.len(),
                invocation.args.len()
            )));
        }

        let bindings = lambda
            .params
            .iter()
            .map(|p| p.name.clone())
            .zip(invocation.args.iter().cloned())
            .collect();
        let body = SubstituteParameters::new(bindings).visit(&lambda.body)?;
        // The substituted arguments may themselves be invocations.
        self.visit(&body)
    }
}

/// Replaces row columns by the declarations that define them.
pub struct SubstituteColumns<'a> {
    columns: &'a [ColumnDeclaration],
}

impl<'a> SubstituteColumns<'a> {
    pub fn new(columns: &'a [ColumnDeclaration]) -> Self {
        Self { columns }
    }
}

impl Rewriter for SubstituteColumns<'_> {
    type Error = ExprError;

    fn visit_column(&mut self, expr: &Expr, node: &Column) -> Result<Expr, ExprError> {
        if node.scope != ColumnScope::Row {
            return Ok(Arc::clone(expr));
        }
        self.columns
            .iter()
            .find(|c| c.name == node.name)
            .map(|c| Arc::clone(&c.expr))
            .ok_or_else(|| ExprError::Argument(format!("unknown column '{}'", node.name)))
    }
}

/// Collects the names of every row column referenced, in first-seen order.
#[derive(Default)]
pub struct CollectColumns {
    pub names: Vec<String>,
}

impl CollectColumns {
    pub fn collect(expr: &Expr) -> Result<Vec<String>, ExprError> {
        let mut collector = Self::default();
        collector.visit(expr)?;
        Ok(collector.names)
    }
}

impl Rewriter for CollectColumns {
    type Error = ExprError;

    fn visit_column(&mut self, expr: &Expr, node: &Column) -> Result<Expr, ExprError> {
        if node.scope == ColumnScope::Row && !self.names.contains(&node.name) {
            self.names.push(node.name.clone());
        }
        Ok(Arc::clone(expr))
    }
}

/// `x == null` becomes `IsNull(x)` and `x != null` becomes `Not(IsNull(x))`.
pub struct NullComparisons;

impl Rewriter for NullComparisons {
    type Error = ExprError;

    fn visit_binary(&mut self, expr: &Expr, node: &Binary) -> Result<Expr, ExprError> {
        let walked = walk_binary(self, expr, node)?;
        let Node::Binary(binary) = walked.as_ref() else {
            return Ok(walked);
        };

        let operand = match (is_null_literal(&binary.left), is_null_literal(&binary.right)) {
            (false, true) => &binary.left,
            (true, false) => &binary.right,
            _ => return Ok(walked),
        };

        Ok(match binary.op {
            BinaryOp::Equal => is_null(operand),
            BinaryOp::NotEqual => unary(UnaryOp::Not, is_null(operand)),
            _ => walked.clone(),
        })
    }
}

fn is_null_literal(expr: &Expr) -> bool {
    matches!(expr.as_ref(), Node::Constant(Constant { value: Value::Null, .. }))
}

/// Rejects literals whose type disagrees with the typed operand they meet.
pub struct LiteralTypes;

impl Rewriter for LiteralTypes {
    type Error = ExprError;

    fn visit_binary(&mut self, expr: &Expr, node: &Binary) -> Result<Expr, ExprError> {
        if !node.op.is_logical() {
            check_literal(&node.left, &node.right)?;
            check_literal(&node.right, &node.left)?;
        }
        walk_binary(self, expr, node)
    }
}

fn check_literal(typed: &Expr, literal: &Expr) -> Result<(), ExprError> {
    let Node::Constant(constant) = literal.as_ref() else {
        return Ok(());
    };
    if constant.value.is_null() || matches!(typed.as_ref(), Node::Constant(_)) {
        return Ok(());
    }

    let expected = typed.data_type();
    if expected.accepts(&constant.data_type) {
        return Ok(());
    }

    let target = match typed.as_ref() {
        Node::Column(column) => column.name.clone(),
        other => other.kind().to_string(),
    };
    Err(ExprError::type_mismatch(target, expected, &constant.data_type))
}
