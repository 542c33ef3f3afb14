//! Pig Latin writer
//!
//! Lowers a bound `Select` graph to a sequence of `<alias> = <OP> ...;`
//! statements. Inner selects and scalar subqueries are written before the
//! statement that consumes them, and every statement gets a fresh alias.

use oinq_ir::{
    Binary, BinaryOp, Call, Column, ColumnDeclaration, ColumnScope, Constant, DataType, Direction,
    Expr, ExprError, Grouping, Node, Scalar, Select, SelectSource, Unary, UnaryOp, Value,
};

use crate::{RenderOptions, Terminal, TranslateError};

/// Aliases and bag of the relation a stage leaves behind.
struct Relation {
    alias: String,
    /// Name of the bag carried by a grouped relation (the alias that was grouped).
    bag: Option<String>,
}

pub struct PigWriter<'a> {
    options: &'a RenderOptions,
    statements: Vec<String>,
    next_alias: usize,
}

impl<'a> PigWriter<'a> {
    pub fn new(options: &'a RenderOptions) -> Self {
        Self {
            options,
            statements: Vec::new(),
            next_alias: 0,
        }
    }

    /// Render a complete script for `select`, ending in the terminal statement.
    pub fn write(mut self, select: &Select) -> Result<String, TranslateError> {
        let relation = self.write_select(select)?;
        let terminal = match &self.options.terminal {
            Terminal::Dump => format!("DUMP {}", relation.alias),
            Terminal::Store(path) => format!("STORE {} INTO {}", relation.alias, quote(path)),
        };
        self.statements.push(terminal);

        Ok(self
            .statements
            .iter()
            .map(|s| format!("{s};"))
            .collect::<Vec<_>>()
            .join(&self.options.separator))
    }

    fn fresh_alias(&mut self) -> String {
        let alias = alias_name(self.next_alias);
        self.next_alias += 1;
        alias
    }

    /// Allocate an alias and emit `<alias> = <body>`.
    fn emit(&mut self, body: String) -> String {
        let alias = self.fresh_alias();
        self.statements.push(format!("{alias} = {body}"));
        alias
    }

    fn write_select(&mut self, select: &Select) -> Result<Relation, TranslateError> {
        let (mut current, mut bag) = match &select.source {
            SelectSource::Base { name } => (self.emit(format!("LOAD {}", quote(name))), None),
            SelectSource::Select { select: inner } => {
                let relation = self.write_select(inner)?;
                (relation.alias, relation.bag)
            }
        };

        if let Some(filter) = &select.filter {
            let predicate = self.write_expr(filter, bag.as_deref())?;
            current = self.emit(format!("FILTER {current} BY {predicate}"));
        }

        if select.projected {
            let columns = select
                .columns
                .iter()
                .map(|c| self.write_column(c, bag.as_deref()))
                .collect::<Result<Vec<_>, _>>()?;
            current = self.emit(format!("FOREACH {current} GENERATE {}", columns.join(", ")));
            bag = None;
        }

        if let Some(grouping) = &select.grouping {
            let by = match grouping {
                Grouping::All => "ALL".to_string(),
                Grouping::Keys(keys) => {
                    let keys = keys
                        .iter()
                        .map(|k| self.write_expr(k, bag.as_deref()))
                        .collect::<Result<Vec<_>, _>>()?;
                    match keys.as_slice() {
                        [single] => format!("BY {single}"),
                        _ => format!("BY ({})", keys.join(", ")),
                    }
                }
            };
            let grouped = current.clone();
            current = self.emit(format!("GROUP {grouped} {by}"));
            bag = Some(grouped);
        }

        if !select.order_by.is_empty() {
            let keys = select
                .order_by
                .iter()
                .map(|o| {
                    let key = self.write_expr(&o.expr, bag.as_deref())?;
                    Ok(match o.direction {
                        Direction::Ascending => format!("{key} ASC"),
                        Direction::Descending => format!("{key} DESC"),
                    })
                })
                .collect::<Result<Vec<_>, TranslateError>>()?;
            current = self.emit(format!("ORDER {current} BY {}", keys.join(", ")));
        }

        if let Some(limit) = select.limit {
            current = self.emit(format!("LIMIT {current} {limit}"));
        }

        Ok(Relation {
            alias: current,
            bag,
        })
    }

    fn write_column(
        &mut self,
        column: &ColumnDeclaration,
        bag: Option<&str>,
    ) -> Result<String, TranslateError> {
        let expr = self.write_expr(&column.expr, bag)?;
        match column.expr.as_ref() {
            Node::Column(Column { name, scope: ColumnScope::Row, .. }) if *name == column.name => {
                Ok(expr)
            }
            _ => Ok(format!("{expr} AS {}", column.name)),
        }
    }

    fn write_expr(&mut self, expr: &Expr, bag: Option<&str>) -> Result<String, TranslateError> {
        match expr.as_ref() {
            Node::Constant(constant) => write_constant(constant),
            Node::Column(column) => write_column_ref(column, bag),
            Node::Unary(unary) => self.write_unary(unary, bag),
            Node::Binary(binary) => self.write_binary(binary, bag),
            Node::Conditional(conditional) => {
                let test = self.write_operand(&conditional.test, bag)?;
                let if_true = self.write_operand(&conditional.if_true, bag)?;
                let if_false = self.write_operand(&conditional.if_false, bag)?;
                Ok(format!("({test} ? {if_true} : {if_false})"))
            }
            Node::IsNull(node) => Ok(format!("{} IS NULL", self.write_operand(&node.expr, bag)?)),
            Node::Call(call) => self.write_call(call, bag),
            Node::Scalar(scalar) => self.write_scalar(scalar),
            other => Err(ExprError::UnsupportedNodeKind(other.kind()).into()),
        }
    }

    /// Operands of an operator: compound expressions are parenthesised.
    fn write_operand(&mut self, expr: &Expr, bag: Option<&str>) -> Result<String, TranslateError> {
        let text = self.write_expr(expr, bag)?;
        Ok(match expr.as_ref() {
            Node::Binary(b) if b.op != BinaryOp::Coalesce && !is_concat(b) => format!("({text})"),
            Node::IsNull(_) | Node::Unary(Unary { op: UnaryOp::Not, .. }) => format!("({text})"),
            _ => text,
        })
    }

    fn write_unary(&mut self, unary: &Unary, bag: Option<&str>) -> Result<String, TranslateError> {
        match unary.op {
            UnaryOp::Not => match unary.operand.as_ref() {
                Node::IsNull(node) => {
                    Ok(format!("{} IS NOT NULL", self.write_operand(&node.expr, bag)?))
                }
                _ => Ok(format!("NOT {}", self.write_operand(&unary.operand, bag)?)),
            },
            UnaryOp::Negate => Ok(format!("-{}", self.write_operand(&unary.operand, bag)?)),
            UnaryOp::Convert => {
                let cast = cast_name(&unary.data_type)?;
                Ok(format!("({cast}){}", self.write_operand(&unary.operand, bag)?))
            }
        }
    }

    fn write_binary(
        &mut self,
        binary: &Binary,
        bag: Option<&str>,
    ) -> Result<String, TranslateError> {
        // Pig's `+` is numeric only.
        if is_concat(binary) {
            let left = self.write_expr(&binary.left, bag)?;
            let right = self.write_expr(&binary.right, bag)?;
            return Ok(format!("CONCAT({left}, {right})"));
        }

        let left = self.write_operand(&binary.left, bag)?;
        let right = self.write_operand(&binary.right, bag)?;
        let op = match binary.op {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Coalesce => return Ok(format!("({left} IS NULL ? {right} : {left})")),
        };
        Ok(format!("{left} {op} {right}"))
    }

    fn write_call(&mut self, call: &Call, bag: Option<&str>) -> Result<String, TranslateError> {
        let args = call
            .args
            .iter()
            .map(|a| self.write_expr(a, bag))
            .collect::<Result<Vec<_>, _>>()?;

        let Some(object) = &call.object else {
            return match (call.method.as_str(), args.as_slice()) {
                ("COUNT" | "SUM" | "AVG" | "MIN" | "MAX", [arg]) => {
                    Ok(format!("{}({arg})", call.method))
                }
                _ => Err(TranslateError::UnsupportedOperation(call.method.clone())),
            };
        };

        let object = self.write_expr(object, bag)?;
        match (call.method.as_str(), args.as_slice()) {
            ("StartsWith", [prefix]) => Ok(format!("STARTSWITH({object}, {prefix})")),
            ("EndsWith", [suffix]) => Ok(format!("ENDSWITH({object}, {suffix})")),
            ("Contains", [needle]) => Ok(format!("(INDEXOF({object}, {needle}, 0) >= 0)")),
            ("ToUpper", []) => Ok(format!("UPPER({object})")),
            ("ToLower", []) => Ok(format!("LOWER({object})")),
            ("Trim", []) => Ok(format!("TRIM({object})")),
            ("Length", []) => Ok(format!("SIZE({object})")),
            _ => Err(TranslateError::UnsupportedOperation(call.method.clone())),
        }
    }

    /// Writes the scalar's own statements, then refers to its single field.
    fn write_scalar(&mut self, scalar: &Scalar) -> Result<String, TranslateError> {
        let relation = self.write_select(&scalar.select)?;
        Ok(format!("{}.{}", relation.alias, scalar.column_name()))
    }
}

fn is_concat(binary: &Binary) -> bool {
    binary.op == BinaryOp::Add && binary.data_type == DataType::String
}

fn write_column_ref(column: &Column, bag: Option<&str>) -> Result<String, TranslateError> {
    match column.scope {
        ColumnScope::Row => Ok(column.name.clone()),
        ColumnScope::Group => {
            let bag = bag.ok_or_else(|| {
                ExprError::Argument(format!(
                    "group column '{}' used outside a grouped relation",
                    column.name
                ))
            })?;
            if column.name.is_empty() {
                Ok(bag.to_string())
            } else {
                Ok(format!("{bag}.{}", column.name))
            }
        }
    }
}

fn write_constant(constant: &Constant) -> Result<String, TranslateError> {
    Ok(match &constant.value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => format!("{f:?}"),
        Value::String(s) => quote(s),
        Value::DateTime(dt) => {
            format!("ToDate({})", quote(&dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()))
        }
        Value::Source(_) => {
            return Err(ExprError::UnsupportedNodeKind(oinq_ir::NodeKind::Constant).into())
        }
    })
}

fn cast_name(data_type: &DataType) -> Result<&'static str, TranslateError> {
    match data_type {
        DataType::Int64 => Ok("long"),
        DataType::Float64 => Ok("double"),
        DataType::String => Ok("chararray"),
        DataType::Bool => Ok("boolean"),
        DataType::DateTime => Ok("datetime"),
        other => Err(TranslateError::UnsupportedOperation(format!("convert to {other}"))),
    }
}

/// Single-quoted Pig string literal.
fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// `A`..`Z`, then `AA`, `AB`, ...
pub fn alias_name(index: usize) -> String {
    let mut n = index;
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.iter().rev().collect()
}
