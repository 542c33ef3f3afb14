//! Expression builders.
//!
//! Free functions build one node each and infer its result type; `ExprExt`
//! puts the common operators on `Expr` so trees read left to right:
//!
//! ```ignore
//! let pred = lambda_with("r", person, |r| r.field("Age").gt(30));
//! ```

use std::sync::Arc;

use crate::{
    ArrayInit, Binary, BinaryOp, Call, Column, ColumnScope, Conditional, Constant, Construct,
    DataType, Expr, Invocation, IsNull, Lambda, Member, MemberBinding, Node, Parameter,
    RecordInit, RecordType, Unary, UnaryOp, Value,
};

/// Conversion of host literals and existing handles into an `Expr`.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self) -> Expr {
        Arc::clone(self)
    }
}

impl IntoExpr for Value {
    fn into_expr(self) -> Expr {
        constant(self)
    }
}

macro_rules! impl_into_expr_literal {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoExpr for $ty {
                fn into_expr(self) -> Expr {
                    constant(Value::from(self))
                }
            }
        )*
    };
}

impl_into_expr_literal!(bool, i32, i64, f64, &str, String);

/// Literal with the type the value carries on its own.
pub fn constant(value: impl Into<Value>) -> Expr {
    let value = value.into();
    let data_type = value.data_type();
    typed_constant(value, data_type)
}

pub fn typed_constant(value: Value, data_type: DataType) -> Expr {
    Node::Constant(Constant { value, data_type }).into_expr()
}

/// Alias for `constant`, for call sites that read better with it.
pub fn lit(value: impl Into<Value>) -> Expr {
    constant(value)
}

pub fn null(data_type: DataType) -> Expr {
    typed_constant(Value::Null, data_type)
}

/// Root of a combinator chain: a named base source of `element` rows.
pub fn source(name: impl Into<String>, element: DataType) -> Expr {
    typed_constant(Value::Source(name.into()), DataType::query(element))
}

pub fn parameter(name: impl Into<String>, data_type: DataType) -> Parameter {
    Parameter {
        name: name.into(),
        data_type,
    }
}

pub fn param(name: impl Into<String>, data_type: DataType) -> Expr {
    Node::Parameter(parameter(name, data_type)).into_expr()
}

/// Member access on `instance`, typed from its record (or grouping key).
pub fn member(instance: impl IntoExpr, name: impl Into<String>) -> Expr {
    let instance = instance.into_expr();
    let name = name.into();
    let data_type = member_type(&instance.data_type(), &name);
    Node::Member(Member {
        expr: Some(instance),
        member: name,
        data_type,
    })
    .into_expr()
}

fn member_type(owner: &DataType, name: &str) -> DataType {
    match owner {
        DataType::Record(record) => record
            .field(name)
            .map(|f| f.data_type.clone())
            .unwrap_or(DataType::Unknown),
        DataType::Grouping { key, .. } if name == "Key" => (**key).clone(),
        _ => DataType::Unknown,
    }
}

pub fn column(name: impl Into<String>, data_type: DataType) -> Expr {
    Node::Column(Column {
        name: name.into(),
        scope: ColumnScope::Row,
        data_type,
    })
    .into_expr()
}

/// A field of the bag carried by a grouped row; an empty name is the bag itself.
pub fn group_column(name: impl Into<String>, data_type: DataType) -> Expr {
    Node::Column(Column {
        name: name.into(),
        scope: ColumnScope::Group,
        data_type,
    })
    .into_expr()
}

pub fn unary(op: UnaryOp, operand: impl IntoExpr) -> Expr {
    let operand = operand.into_expr();
    let data_type = match op {
        UnaryOp::Not => DataType::Bool,
        UnaryOp::Negate | UnaryOp::Convert => operand.data_type(),
    };
    Node::Unary(Unary {
        op,
        operand,
        data_type,
    })
    .into_expr()
}

pub fn convert(operand: impl IntoExpr, data_type: DataType) -> Expr {
    Node::Unary(Unary {
        op: UnaryOp::Convert,
        operand: operand.into_expr(),
        data_type,
    })
    .into_expr()
}

pub fn binary(op: BinaryOp, left: impl IntoExpr, right: impl IntoExpr) -> Expr {
    let left = left.into_expr();
    let right = right.into_expr();
    let data_type = binary_type(op, &left.data_type(), &right.data_type());
    Node::Binary(Binary {
        op,
        left,
        right,
        data_type,
    })
    .into_expr()
}

fn binary_type(op: BinaryOp, left: &DataType, right: &DataType) -> DataType {
    if op.is_comparison() || op.is_logical() {
        return DataType::Bool;
    }
    match (left, right) {
        (_, _) if op == BinaryOp::Coalesce => match left {
            DataType::Unknown => right.clone(),
            _ => left.clone(),
        },
        (DataType::Float64, r) if r.is_numeric() => DataType::Float64,
        (l, DataType::Float64) if l.is_numeric() => DataType::Float64,
        (DataType::Int64, DataType::Int64) => DataType::Int64,
        (DataType::String, DataType::String) if op == BinaryOp::Add => DataType::String,
        (l, DataType::Unknown) if l.is_numeric() => l.clone(),
        (DataType::Unknown, r) if r.is_numeric() => r.clone(),
        _ => DataType::Unknown,
    }
}

pub fn conditional(test: impl IntoExpr, if_true: impl IntoExpr, if_false: impl IntoExpr) -> Expr {
    let if_true = if_true.into_expr();
    let if_false = if_false.into_expr();
    let data_type = match if_true.data_type() {
        DataType::Unknown => if_false.data_type(),
        other => other,
    };
    Node::Conditional(Conditional {
        test: test.into_expr(),
        if_true,
        if_false,
        data_type,
    })
    .into_expr()
}

pub fn call(
    object: Option<Expr>,
    method: impl Into<String>,
    args: Vec<Expr>,
    data_type: DataType,
) -> Expr {
    Node::Call(Call {
        object,
        method: method.into(),
        args,
        data_type,
    })
    .into_expr()
}

/// Record construction with one named argument per member.
pub fn construct(record: RecordType, members: Vec<(&str, Expr)>) -> Expr {
    let (names, args): (Vec<String>, Vec<Expr>) = members
        .into_iter()
        .map(|(name, expr)| (name.to_string(), expr))
        .unzip();
    Node::Construct(Construct {
        data_type: DataType::Record(record),
        args,
        members: names,
    })
    .into_expr()
}

/// Record initialiser: a default construction followed by member assignments.
pub fn record_init(record: RecordType, assignments: Vec<(&str, Expr)>) -> Expr {
    let bindings = assignments
        .into_iter()
        .map(|(member, expr)| MemberBinding::Assignment {
            member: member.to_string(),
            expr,
        })
        .collect();
    Node::RecordInit(RecordInit {
        construct: Construct {
            data_type: DataType::Record(record),
            args: Vec::new(),
            members: Vec::new(),
        },
        bindings,
    })
    .into_expr()
}

pub fn array_init(element_type: DataType, elements: Vec<Expr>) -> Expr {
    Node::ArrayInit(ArrayInit {
        element_type,
        elements,
    })
    .into_expr()
}

pub fn lambda(params: Vec<Parameter>, body: impl IntoExpr) -> Expr {
    Node::Lambda(Lambda {
        params,
        body: body.into_expr(),
    })
    .into_expr()
}

/// Single-parameter lambda whose body is built from the parameter reference.
pub fn lambda_with<F>(name: &str, data_type: DataType, body: F) -> Expr
where
    F: FnOnce(&Expr) -> Expr,
{
    let reference = param(name, data_type.clone());
    let body = body(&reference);
    lambda(vec![parameter(name, data_type)], body)
}

pub fn invoke(target: impl IntoExpr, args: Vec<Expr>) -> Expr {
    let target = target.into_expr();
    let data_type = target.data_type();
    Node::Invocation(Invocation {
        target,
        args,
        data_type,
    })
    .into_expr()
}

pub fn is_null(expr: impl IntoExpr) -> Expr {
    Node::IsNull(IsNull {
        expr: expr.into_expr(),
    })
    .into_expr()
}

/// Operator sugar on expression handles.
pub trait ExprExt {
    fn field(&self, name: &str) -> Expr;
    fn equals(&self, other: impl IntoExpr) -> Expr;
    fn not_equals(&self, other: impl IntoExpr) -> Expr;
    fn gt(&self, other: impl IntoExpr) -> Expr;
    fn ge(&self, other: impl IntoExpr) -> Expr;
    fn lt(&self, other: impl IntoExpr) -> Expr;
    fn le(&self, other: impl IntoExpr) -> Expr;
    fn and(&self, other: impl IntoExpr) -> Expr;
    fn or(&self, other: impl IntoExpr) -> Expr;
    fn not(&self) -> Expr;
    fn add(&self, other: impl IntoExpr) -> Expr;
    fn sub(&self, other: impl IntoExpr) -> Expr;
    fn mul(&self, other: impl IntoExpr) -> Expr;
    fn div(&self, other: impl IntoExpr) -> Expr;
    fn coalesce(&self, other: impl IntoExpr) -> Expr;
    fn is_null(&self) -> Expr;
    fn is_not_null(&self) -> Expr;
    /// Instance method call, e.g. `r.field("Name").method("StartsWith", ...)`.
    fn method(&self, name: &str, args: Vec<Expr>, data_type: DataType) -> Expr;
}

impl ExprExt for Expr {
    fn field(&self, name: &str) -> Expr {
        member(self, name)
    }

    fn equals(&self, other: impl IntoExpr) -> Expr {
        binary(BinaryOp::Equal, self, other)
    }

    fn not_equals(&self, other: impl IntoExpr) -> Expr {
        binary(BinaryOp::NotEqual, self, other)
    }

    fn gt(&self, other: impl IntoExpr) -> Expr {
        binary(BinaryOp::GreaterThan, self, other)
    }

    fn ge(&self, other: impl IntoExpr) -> Expr {
        binary(BinaryOp::GreaterThanOrEqual, self, other)
    }

    fn lt(&self, other: impl IntoExpr) -> Expr {
        binary(BinaryOp::LessThan, self, other)
    }

    fn le(&self, other: impl IntoExpr) -> Expr {
        binary(BinaryOp::LessThanOrEqual, self, other)
    }

    fn and(&self, other: impl IntoExpr) -> Expr {
        binary(BinaryOp::And, self, other)
    }

    fn or(&self, other: impl IntoExpr) -> Expr {
        binary(BinaryOp::Or, self, other)
    }

    fn not(&self) -> Expr {
        unary(UnaryOp::Not, self)
    }

    fn add(&self, other: impl IntoExpr) -> Expr {
        binary(BinaryOp::Add, self, other)
    }

    fn sub(&self, other: impl IntoExpr) -> Expr {
        binary(BinaryOp::Subtract, self, other)
    }

    fn mul(&self, other: impl IntoExpr) -> Expr {
        binary(BinaryOp::Multiply, self, other)
    }

    fn div(&self, other: impl IntoExpr) -> Expr {
        binary(BinaryOp::Divide, self, other)
    }

    fn coalesce(&self, other: impl IntoExpr) -> Expr {
        binary(BinaryOp::Coalesce, self, other)
    }

    fn is_null(&self) -> Expr {
        is_null(self)
    }

    fn is_not_null(&self) -> Expr {
        unary(UnaryOp::Not, is_null(self))
    }

    fn method(&self, name: &str, args: Vec<Expr>, data_type: DataType) -> Expr {
        call(Some(Arc::clone(self)), name, args, data_type)
    }
}
