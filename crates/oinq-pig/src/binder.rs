//! Chain binder: folds a combinator chain into a `Select` graph.
//!
//! The chain is peeled outward-in. The innermost node is the source constant;
//! every combinator is a receiver-less `Call` whose first argument is the
//! chain it extends. Each combinator either merges into the current `Select`
//! or wraps it, depending on whether the clause it adds can legally run in
//! the same stage given the fixed statement order
//! LOAD, FILTER, FOREACH, GROUP, ORDER, LIMIT.

use std::sync::Arc;

use oinq_ir::build::{column, group_column};
use oinq_ir::walker::{walk_call, walk_member, Rewriter};
use oinq_ir::{
    BinaryOp, Call, Column, ColumnDeclaration, ColumnScope, Constant, DataType, Direction, Expr,
    ExprError, FieldType, Grouping, Lambda, Member, MemberBinding, Node, Ordering, Parameter,
    ProjectedColumn, Projector, RecordType, Scalar, Select, Subquery, Value,
};
use tracing::trace;

use crate::passes::{
    CollectColumns, InlineInvocations, LiteralTypes, NullComparisons, SubstituteColumns,
};
use crate::{Cardinality, TranslateError};

/// Output of the binder: the outermost `Select` and how many rows it yields.
#[derive(Debug, Clone)]
pub struct Stage {
    pub select: Select,
    pub cardinality: Cardinality,
}

impl Stage {
    fn many(select: Select) -> Self {
        Self {
            select,
            cardinality: Cardinality::Many,
        }
    }

    fn map(
        self,
        f: impl FnOnce(Select) -> Result<Select, TranslateError>,
    ) -> Result<Self, TranslateError> {
        Ok(Self {
            select: f(self.select)?,
            cardinality: self.cardinality,
        })
    }
}

/// Aggregate combinators and the Pig function each lowers to.
const AGGREGATES: &[(&str, &str)] = &[
    ("Count", "COUNT"),
    ("Sum", "SUM"),
    ("Average", "AVG"),
    ("Min", "MIN"),
    ("Max", "MAX"),
];

/// Pig's reference to the only field of a primitive-valued relation.
const POSITIONAL: &str = "$0";

fn aggregate_function(method: &str) -> Option<&'static str> {
    AGGREGATES
        .iter()
        .find(|(name, _)| *name == method)
        .map(|(_, function)| *function)
}

#[derive(Debug, Default)]
pub struct ChainBinder;

impl ChainBinder {
    pub fn new() -> Self {
        Self
    }

    /// Translate a chain into its outermost stage.
    pub fn bind_chain(&self, chain: &Expr) -> Result<Stage, TranslateError> {
        match chain.as_ref() {
            Node::Constant(Constant {
                value: Value::Source(name),
                data_type,
            }) => {
                let element = data_type.element_type().cloned().ok_or_else(|| {
                    ExprError::Argument(format!(
                        "source '{name}' is not a query, found {data_type}"
                    ))
                })?;
                Ok(Stage::many(Select::base(name.clone(), element)))
            }
            Node::Select(select) => Ok(Stage::many((**select).clone())),
            Node::Call(call) if call.object.is_none() && !call.args.is_empty() => {
                // Inner chain first, so clauses apply in chain order.
                let inner = self.bind_chain(&call.args[0])?;
                self.apply(inner, call)
            }
            Node::Constant(_) => Err(ExprError::Argument(format!(
                "chain root must be a source, found {}",
                chain.data_type()
            ))
            .into()),
            other => Err(ExprError::UnsupportedNodeKind(other.kind()).into()),
        }
    }

    fn apply(&self, stage: Stage, call: &Call) -> Result<Stage, TranslateError> {
        let arg = call.args.get(1);
        match call.method.as_str() {
            "Where" => stage.map(|s| self.filter(s, required(arg, "Where")?)),
            "Select" => {
                let element = call.data_type.element_type().cloned().unwrap_or(DataType::Unknown);
                stage.map(|s| self.project(s, required(arg, "Select")?, element))
            }
            method @ ("OrderBy" | "OrderByDescending" | "ThenBy" | "ThenByDescending") => {
                let direction = if method.ends_with("Descending") {
                    Direction::Descending
                } else {
                    Direction::Ascending
                };
                let then = method.starts_with("ThenBy");
                stage.map(|s| self.order(s, required(arg, method)?, direction, then))
            }
            "GroupBy" => {
                let key = match call.data_type.element_type() {
                    Some(DataType::Grouping { key, .. }) => (**key).clone(),
                    _ => DataType::Unknown,
                };
                stage.map(|s| self.group(s, required(arg, "GroupBy")?, key))
            }
            "Take" => {
                let count = take_count(required(arg, "Take")?)?;
                stage.map(|s| Ok(take(s, count)))
            }
            "First" => {
                let mut stage = stage;
                if let Some(predicate) = arg {
                    stage = stage.map(|s| self.filter(s, predicate))?;
                }
                let mut stage = stage.map(|s| Ok(take(s, 1)))?;
                stage.cardinality = Cardinality::Single;
                Ok(stage)
            }
            method => match aggregate_function(method) {
                Some(function) => {
                    self.aggregate(stage, method, function, arg, call.data_type.clone())
                }
                None => Err(TranslateError::UnsupportedOperation(method.to_string())),
            },
        }
    }

    fn filter(&self, select: Select, predicate: &Expr) -> Result<Select, TranslateError> {
        let mut select = select;
        if select.limit.is_some() || select.grouping.is_some() {
            trace!("filter wraps a limited or grouped stage");
            select = wrap(select);
        }

        let bound = self.bind_lambda(&select, predicate)?;

        if !select.projected {
            trace!("filter merges into pass-through stage");
            add_implicit(&mut select, bound.implicit);
            select.filter = Some(conjoin(select.filter.take(), bound.expr));
            return Ok(select);
        }

        // The FILTER statement runs before this stage's FOREACH, so it may only
        // see columns that are plain renames of the stage's input.
        let referenced = CollectColumns::collect(&bound.expr)?;
        let mergeable = referenced.iter().all(|name| {
            select
                .column(name)
                .is_some_and(|c| is_plain_column(&c.expr))
        });

        if mergeable {
            trace!("filter merges through projection");
            let substituted = SubstituteColumns::new(&select.columns).visit(&bound.expr)?;
            select.filter = Some(conjoin(select.filter.take(), substituted));
            Ok(select)
        } else {
            trace!(columns = ?referenced, "filter on derived columns wraps");
            let mut outer = wrap(select);
            outer.filter = Some(bound.expr);
            Ok(outer)
        }
    }

    fn project(
        &self,
        select: Select,
        selector: &Expr,
        element: DataType,
    ) -> Result<Select, TranslateError> {
        let (param, body) = lambda_parts(selector)?;
        if matches!(body.as_ref(), Node::Parameter(p) if p.name == param.name)
            && !is_value_stage(&select)
        {
            return Ok(select);
        }

        let mut select = select;
        if select.grouping.is_some() {
            trace!("projection wraps grouped stage");
            select = wrap(select);
        }

        let columns = self.bind_projection(&select, param, body)?;
        let (element, projector) = projection_shape(&columns, element)?;

        let composed = if select.projected {
            let mut substitute = SubstituteColumns::new(&select.columns);
            columns
                .iter()
                .map(|c| Ok(ColumnDeclaration::new(c.name.clone(), substitute.visit(&c.expr)?)))
                .collect::<Result<Vec<_>, ExprError>>()?
        } else {
            columns.clone()
        };

        let mut select = if ordering_survives(&select, &composed) {
            trace!("projection merges into stage");
            let mut select = select;
            select.columns = composed;
            select
        } else {
            trace!("projection drops an ordering key, wrapping");
            let mut outer = wrap(select);
            outer.columns = columns;
            outer
        };

        select.projected = true;
        select.element = element;
        select.projector = projector;
        Ok(select)
    }

    fn order(
        &self,
        select: Select,
        key: &Expr,
        direction: Direction,
        then: bool,
    ) -> Result<Select, TranslateError> {
        if then && select.order_by.is_empty() {
            return Err(ExprError::Argument(
                "ThenBy requires a preceding OrderBy".to_string(),
            )
            .into());
        }

        let mut select = select;
        if select.limit.is_some() {
            trace!("ordering wraps a limited stage");
            let carried = if then { select.order_by.clone() } else { Vec::new() };
            select = wrap(select);
            select.order_by = carried;
        }

        let bound = self.bind_lambda(&select, key)?;
        if !matches!(bound.expr.as_ref(), Node::Column(Column { scope: ColumnScope::Row, .. })) {
            return Err(TranslateError::UnsupportedOperation(
                "order by computed expression".to_string(),
            ));
        }

        if !select.projected {
            add_implicit(&mut select, bound.implicit);
        }
        if !then {
            select.order_by.clear();
        }
        select.order_by.push(Ordering {
            expr: bound.expr,
            direction,
        });
        Ok(select)
    }

    fn group(
        &self,
        select: Select,
        selector: &Expr,
        declared_key: DataType,
    ) -> Result<Select, TranslateError> {
        let mut select = select;
        if select.grouping.is_some() || select.limit.is_some() || !select.order_by.is_empty() {
            trace!("grouping wraps stage");
            select = wrap(select);
        }

        let (param, body) = lambda_parts(selector)?;
        let keys = self.bind_projection(&select, param, body)?;

        let key_type = if declared_key != DataType::Unknown {
            declared_key
        } else if let [single] = keys.as_slice() {
            single.expr.data_type()
        } else {
            DataType::Record(RecordType::new(
                "Key",
                keys.iter()
                    .map(|k| FieldType::new(k.name.clone(), k.expr.data_type()))
                    .collect(),
            ))
        };

        let element = DataType::grouping(key_type, select.element.clone());
        select.grouping = Some(Grouping::Keys(keys.into_iter().map(|k| k.expr).collect()));
        select.projector = Projector::for_element(&element);
        select.element = element;
        Ok(select)
    }

    fn aggregate(
        &self,
        stage: Stage,
        method: &str,
        function: &str,
        selector: Option<&Expr>,
        result: DataType,
    ) -> Result<Stage, TranslateError> {
        let mut select = stage.select;

        // Aggregate over one column of the stage, projecting it first if needed.
        let bag = match (method, selector) {
            ("Count", Some(predicate)) => {
                select = self.filter(select, predicate)?;
                group_column("", DataType::Unknown)
            }
            ("Count", None) => group_column("", DataType::Unknown),
            (_, Some(selector)) => {
                select = self.project(select, selector, DataType::Unknown)?;
                aggregated_column(&select, method)?
            }
            (_, None) => aggregated_column(&select, method)?,
        };

        let result = match (method, result) {
            ("Count", _) => DataType::Int64,
            ("Average", _) => DataType::Float64,
            (_, DataType::Unknown) => bag.data_type(),
            (_, declared) => declared,
        };

        if select.grouping.is_some() || select.limit.is_some() || !select.order_by.is_empty() {
            trace!("aggregate wraps stage");
            select = wrap(select);
        }
        select.grouping = Some(Grouping::All);

        let mut outer = wrap(select);
        outer.projected = true;
        outer.columns = vec![ColumnDeclaration::new(
            "value",
            oinq_ir::build::call(None, function, vec![bag], result.clone()),
        )];
        outer.projector = Projector::value(ProjectedColumn::new("value", result.clone()));
        outer.element = result;

        Ok(Stage {
            select: outer,
            cardinality: Cardinality::Single,
        })
    }

    /// Bind a single-parameter lambda's body against the rows `select` outputs.
    fn bind_lambda(&self, select: &Select, lambda: &Expr) -> Result<Bound, TranslateError> {
        let (param, body) = lambda_parts(lambda)?;
        self.bind_body(select, param, body)
    }

    fn bind_body(
        &self,
        select: &Select,
        param: &Parameter,
        body: &Expr,
    ) -> Result<Bound, TranslateError> {
        let body = InlineInvocations.visit(body)?;
        let mut binder = RowBinder {
            chains: self,
            select,
            row: &param.name,
            implicit: Vec::new(),
        };
        let expr = binder.visit(&body)?;
        let expr = NullComparisons.visit(&expr)?;
        let expr = LiteralTypes.visit(&expr)?;
        Ok(Bound {
            expr,
            implicit: binder.implicit,
        })
    }

    /// Bind a projection body into named output columns.
    fn bind_projection(
        &self,
        select: &Select,
        param: &Parameter,
        body: &Expr,
    ) -> Result<Vec<ColumnDeclaration>, TranslateError> {
        let named: Vec<(String, Expr)> = match body.as_ref() {
            Node::RecordInit(init) => init
                .bindings
                .iter()
                .map(|binding| match binding {
                    MemberBinding::Assignment { member, expr } => {
                        Ok((member.clone(), Arc::clone(expr)))
                    }
                    other => Err(TranslateError::UnsupportedOperation(format!(
                        "nested member binding '{}'",
                        other.member()
                    ))),
                })
                .collect::<Result<_, _>>()?,
            Node::Construct(construct) => {
                let names: Vec<String> = if construct.members.is_empty() {
                    construct
                        .data_type
                        .as_record()
                        .map(|r| r.fields.iter().map(|f| f.name.clone()).collect())
                        .unwrap_or_default()
                } else {
                    construct.members.clone()
                };
                if names.len() != construct.args.len() {
                    return Err(ExprError::Argument(format!(
                        "constructor has {} arguments but {} member names",
                        construct.args.len(),
                        names.len()
                    ))
                    .into());
                }
                names.into_iter().zip(construct.args.iter().cloned()).collect()
            }
            _ => {
                let bound = self.bind_body(select, param, body)?;
                let name = match bound.expr.as_ref() {
                    Node::Column(c) if c.scope == ColumnScope::Row => {
                        c.name.rsplit('.').next().unwrap_or(&c.name).to_string()
                    }
                    _ => "value".to_string(),
                };
                return Ok(vec![ColumnDeclaration::new(name, bound.expr)]);
            }
        };

        let mut columns: Vec<ColumnDeclaration> = Vec::with_capacity(named.len());
        for (name, expr) in named {
            if columns.iter().any(|c| c.name == name) {
                return Err(ExprError::Argument(format!("duplicate column alias '{name}'")).into());
            }
            let bound = self.bind_body(select, param, &expr)?;
            columns.push(ColumnDeclaration::new(name, bound.expr));
        }
        Ok(columns)
    }
}

struct Bound {
    expr: Expr,
    implicit: Vec<ColumnDeclaration>,
}

/// Rewrites references to the lambda's row parameter into columns of the
/// relation `select` outputs.
struct RowBinder<'a> {
    chains: &'a ChainBinder,
    select: &'a Select,
    row: &'a str,
    implicit: Vec<ColumnDeclaration>,
}

impl RowBinder<'_> {
    fn is_row(&self, expr: &Expr) -> bool {
        matches!(expr.as_ref(), Node::Parameter(p) if p.name == self.row)
    }

    fn resolve_field(&mut self, node: &Member) -> Result<Expr, TranslateError> {
        let name = node.member.as_str();

        if let DataType::Grouping { key, .. } = &self.select.element {
            return match name {
                "Key" => Ok(column("group", (**key).clone())),
                _ => Err(ExprError::Argument(format!("unknown group member '{name}'")).into()),
            };
        }

        if self.select.projected {
            let declared = self
                .select
                .column(name)
                .ok_or_else(|| ExprError::Argument(format!("unknown column '{name}'")))?;
            return Ok(column(name, declared.expr.data_type()));
        }

        let field_type = match &self.select.element {
            DataType::Record(record) => record
                .field(name)
                .map(|f| f.data_type.clone())
                .ok_or_else(|| {
                    ExprError::Argument(format!("unknown column '{name}' on {}", record.name))
                })?,
            _ => node.data_type.clone(),
        };
        if !field_type.accepts(&node.data_type) {
            return Err(ExprError::type_mismatch(name, &field_type, &node.data_type).into());
        }

        let existing = self
            .select
            .column(name)
            .or_else(|| self.implicit.iter().find(|c| c.name == name));
        match existing {
            Some(declared) if declared.expr.data_type() != field_type => {
                return Err(
                    ExprError::type_mismatch(name, declared.expr.data_type(), &field_type).into(),
                );
            }
            Some(_) => {}
            None => self
                .implicit
                .push(ColumnDeclaration::new(name, column(name, field_type.clone()))),
        }

        Ok(column(name, field_type))
    }

    /// `g.Count()`, `g.Sum(x => x.Amount)` and friends over a grouped row.
    fn group_aggregate(&mut self, node: &Call) -> Result<Expr, TranslateError> {
        let function = aggregate_function(&node.method)
            .ok_or_else(|| TranslateError::UnsupportedOperation(node.method.clone()))?;
        let DataType::Grouping { element, .. } = &self.select.element else {
            return Err(TranslateError::UnsupportedOperation(node.method.clone()));
        };

        let bag = match node.args.first() {
            None if node.method == "Count" => group_column("", DataType::Unknown),
            None => {
                let message = format!("{} requires a selector", node.method);
                return Err(ExprError::Argument(message).into());
            }
            Some(selector) => {
                let (param, body) = lambda_parts(selector)?;
                match body.as_ref() {
                    Node::Member(Member { expr: Some(owner), member, .. })
                        if matches!(owner.as_ref(), Node::Parameter(p) if p.name == param.name) =>
                    {
                        let data_type = element
                            .as_record()
                            .and_then(|r| r.field(member))
                            .map(|f| f.data_type.clone())
                            .ok_or_else(|| {
                                ExprError::Argument(format!("unknown column '{member}'"))
                            })?;
                        group_column(member.clone(), data_type)
                    }
                    _ => {
                        return Err(TranslateError::UnsupportedOperation(
                            "aggregate over computed expression".to_string(),
                        ))
                    }
                }
            }
        };

        let data_type = match node.method.as_str() {
            "Count" => DataType::Int64,
            "Average" => DataType::Float64,
            _ if node.data_type != DataType::Unknown => node.data_type.clone(),
            _ => bag.data_type(),
        };
        Ok(oinq_ir::build::call(None, function, vec![bag], data_type))
    }

    /// A nested chain used as a value: a scalar when it yields one value,
    /// otherwise a plain subquery.
    fn nested_chain(&mut self, expr: &Expr, node: &Call) -> Result<Expr, TranslateError> {
        let stage = self.chains.bind_chain(expr)?;
        let select = Arc::new(stage.select);
        if node.data_type.is_query() {
            return Ok(Node::Subquery(Subquery::new(node.data_type.clone(), select)).into_expr());
        }
        Ok(Node::Scalar(Scalar::new(node.data_type.clone(), select)?).into_expr())
    }
}

impl Rewriter for RowBinder<'_> {
    type Error = TranslateError;

    fn visit_parameter(&mut self, expr: &Expr, node: &Parameter) -> Result<Expr, TranslateError> {
        if node.name != self.row {
            return Ok(Arc::clone(expr));
        }
        // A bare row of a single-value stage is its only column.
        if is_value_stage(self.select) {
            let only = &self.select.columns[0];
            return Ok(column(only.name.clone(), only.expr.data_type()));
        }
        if is_scalar_element(self.select) {
            return Ok(column(POSITIONAL, self.select.element.clone()));
        }
        Err(ExprError::Argument(format!(
            "row of type {} cannot be used as a value",
            self.select.element
        ))
        .into())
    }

    fn visit_member(&mut self, expr: &Expr, node: &Member) -> Result<Expr, TranslateError> {
        if node.expr.as_ref().is_some_and(|owner| self.is_row(owner)) {
            return self.resolve_field(node);
        }

        let walked = walk_member(self, expr, node)?;
        // Field of a record-typed column, such as a composite group key.
        if let Node::Member(Member { expr: Some(owner), member, data_type }) = walked.as_ref() {
            if let Node::Column(Column {
                name,
                scope: ColumnScope::Row,
                data_type: DataType::Record(record),
            }) = owner.as_ref()
            {
                let field_type = record
                    .field(member)
                    .map(|f| f.data_type.clone())
                    .unwrap_or_else(|| data_type.clone());
                return Ok(column(format!("{name}.{member}"), field_type));
            }
        }
        Ok(walked)
    }

    fn visit_call(&mut self, expr: &Expr, node: &Call) -> Result<Expr, TranslateError> {
        if node.object.as_ref().is_some_and(|owner| self.is_row(owner)) {
            return self.group_aggregate(node);
        }
        if node.object.is_none() && node.args.first().is_some_and(|a| a.data_type().is_query()) {
            return self.nested_chain(expr, node);
        }
        walk_call(self, expr, node)
    }
}

fn required<'a>(arg: Option<&'a Expr>, method: &str) -> Result<&'a Expr, TranslateError> {
    arg.ok_or_else(|| ExprError::Argument(format!("{method} requires an argument")).into())
}

fn lambda_parts(expr: &Expr) -> Result<(&Parameter, &Expr), TranslateError> {
    match expr.as_ref() {
        Node::Lambda(Lambda { params, body }) if params.len() == 1 => Ok((&params[0], body)),
        Node::Lambda(Lambda { params, .. }) => Err(ExprError::Argument(format!(
            "expected a single-parameter lambda, found {} parameters",
            params.len()
        ))
        .into()),
        other => {
            Err(ExprError::Argument(format!("expected a lambda, found {}", other.kind())).into())
        }
    }
}

fn take_count(arg: &Expr) -> Result<u64, TranslateError> {
    match arg.as_ref() {
        Node::Constant(Constant { value: Value::Int(n), .. }) => u64::try_from(*n).map_err(|_| {
            ExprError::Argument(format!("Take count must not be negative, found {n}")).into()
        }),
        other => Err(ExprError::Argument(format!(
            "Take expects an integer constant, found {}",
            other.kind()
        ))
        .into()),
    }
}

fn take(mut select: Select, count: u64) -> Select {
    select.limit = Some(select.limit.map_or(count, |current| current.min(count)));
    select
}

/// A pass-through stage over `inner`. When `inner` projects plain rows the
/// wrapper re-declares every column, so it renders its own FOREACH.
fn wrap(inner: Select) -> Select {
    let redeclare = inner.projected && inner.grouping.is_none();
    let columns: Vec<ColumnDeclaration> = if redeclare {
        inner
            .columns
            .iter()
            .map(|c| {
                ColumnDeclaration::new(c.name.clone(), column(c.name.clone(), c.expr.data_type()))
            })
            .collect()
    } else {
        Vec::new()
    };

    let mut outer = Select::wrap(Arc::new(inner));
    if redeclare {
        outer.projected = true;
        outer.columns = columns;
    }
    outer
}

fn add_implicit(select: &mut Select, implicit: Vec<ColumnDeclaration>) {
    for declaration in implicit {
        if select.column(&declaration.name).is_none() {
            select.columns.push(declaration);
        }
    }
}

fn conjoin(existing: Option<Expr>, predicate: Expr) -> Expr {
    match existing {
        Some(existing) => oinq_ir::build::binary(BinaryOp::And, existing, predicate),
        None => predicate,
    }
}

fn is_plain_column(expr: &Expr) -> bool {
    matches!(expr.as_ref(), Node::Column(Column { scope: ColumnScope::Row, .. }))
}

/// The single column an aggregate reads from `select`.
fn aggregated_column(select: &Select, method: &str) -> Result<Expr, TranslateError> {
    if select.projected && select.grouping.is_none() {
        return match select.columns.as_slice() {
            [only] => Ok(group_column(only.name.clone(), only.expr.data_type())),
            columns => Err(ExprError::Argument(format!(
                "{method} needs a single column, found {}",
                columns.len()
            ))
            .into()),
        };
    }
    if is_scalar_element(select) {
        return Ok(group_column(POSITIONAL, select.element.clone()));
    }
    Err(ExprError::Argument(format!(
        "{method} over {} rows needs a selector of one column",
        select.element
    ))
    .into())
}

/// An unprojected stage whose rows are bare primitive values.
fn is_scalar_element(select: &Select) -> bool {
    !select.projected
        && select.grouping.is_none()
        && matches!(
            select.element,
            DataType::Bool
                | DataType::Int64
                | DataType::Float64
                | DataType::String
                | DataType::DateTime
        )
}

/// A projected stage whose rows are single bare values.
fn is_value_stage(select: &Select) -> bool {
    select.projected
        && select.grouping.is_none()
        && select.columns.len() == 1
        && select.element.as_record().is_none()
}

/// Whether every ordering key of `select` is still produced, unchanged, by
/// `columns` (expressed over the stage's input).
fn ordering_survives(select: &Select, columns: &[ColumnDeclaration]) -> bool {
    select.order_by.iter().all(|ordering| {
        let Node::Column(key) = ordering.expr.as_ref() else {
            return false;
        };
        let definition = if select.projected {
            match select.column(&key.name) {
                Some(declared) => Arc::clone(&declared.expr),
                None => return false,
            }
        } else {
            Arc::clone(&ordering.expr)
        };
        columns.iter().any(|c| c.name == key.name && c.expr == definition)
    })
}

/// Element type and projector of a projection.
fn projection_shape(
    columns: &[ColumnDeclaration],
    declared: DataType,
) -> Result<(DataType, Projector), TranslateError> {
    let inferred = |c: &ColumnDeclaration| c.expr.data_type();

    match declared {
        DataType::Record(record) => {
            let mut projected = Vec::with_capacity(columns.len());
            for declaration in columns {
                let data_type = match record.field(&declaration.name) {
                    Some(field) => {
                        let found = inferred(declaration);
                        if !field.data_type.accepts(&found) {
                            return Err(ExprError::type_mismatch(
                                declaration.name.clone(),
                                &field.data_type,
                                &found,
                            )
                            .into());
                        }
                        field.data_type.clone()
                    }
                    None => inferred(declaration),
                };
                projected.push(ProjectedColumn::new(declaration.name.clone(), data_type));
            }
            Ok((DataType::Record(record), Projector::record(projected)))
        }
        declared if columns.len() == 1 => {
            let found = inferred(&columns[0]);
            let data_type = match declared {
                DataType::Unknown => found,
                declared if declared.accepts(&found) => declared,
                declared => {
                    let name = columns[0].name.clone();
                    return Err(ExprError::type_mismatch(name, &declared, &found).into());
                }
            };
            Ok((
                data_type.clone(),
                Projector::value(ProjectedColumn::new(columns[0].name.clone(), data_type)),
            ))
        }
        _ => {
            let fields: Vec<FieldType> = columns
                .iter()
                .map(|c| FieldType::new(c.name.clone(), inferred(c)))
                .collect();
            let projector = Projector::record(
                fields
                    .iter()
                    .map(|f| ProjectedColumn::new(f.name.clone(), f.data_type.clone()))
                    .collect(),
            );
            Ok((DataType::Record(RecordType::new("Projection", fields)), projector))
        }
    }
}
