//! Tree walker.
//!
//! `Rewriter::visit` dispatches on the node variant to a per-kind hook. Every
//! hook defaults to the matching `walk_*` function, which visits the children
//! and rebuilds the node only when at least one child came back as a
//! different handle. Lists follow the same rule: the original slice is
//! returned borrowed unless an element changed, in which case it is copied
//! once, in order.
//!
//! Passes implement `Rewriter` and override only the hooks they care about.

use std::borrow::Cow;
use std::sync::Arc;

use crate::{
    ArrayInit, Binary, Call, Column, ColumnDeclaration, Conditional, Constant, Construct,
    ElementInit, Expr, ExprError, Grouping, Invocation, IsNull, Lambda, ListInit, Member,
    MemberBinding, Node, Ordering, Parameter, RecordInit, Scalar, Select, SelectSource, Subquery,
    Unary,
};

pub trait Rewriter {
    type Error: From<ExprError>;

    fn visit(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        dispatch(self, expr)
    }

    fn visit_opt(&mut self, expr: Option<&Expr>) -> Result<Option<Expr>, Self::Error> {
        expr.map(|e| self.visit(e)).transpose()
    }

    fn visit_list<'a>(&mut self, exprs: &'a [Expr]) -> Result<Cow<'a, [Expr]>, Self::Error> {
        rewrite_list(exprs, |e| {
            let visited = self.visit(e)?;
            Ok(changed(e, visited))
        })
    }

    fn visit_constant(&mut self, expr: &Expr, _node: &Constant) -> Result<Expr, Self::Error> {
        Ok(Arc::clone(expr))
    }

    fn visit_parameter(&mut self, expr: &Expr, _node: &Parameter) -> Result<Expr, Self::Error> {
        Ok(Arc::clone(expr))
    }

    fn visit_member(&mut self, expr: &Expr, node: &Member) -> Result<Expr, Self::Error> {
        walk_member(self, expr, node)
    }

    fn visit_unary(&mut self, expr: &Expr, node: &Unary) -> Result<Expr, Self::Error> {
        walk_unary(self, expr, node)
    }

    fn visit_binary(&mut self, expr: &Expr, node: &Binary) -> Result<Expr, Self::Error> {
        walk_binary(self, expr, node)
    }

    fn visit_conditional(&mut self, expr: &Expr, node: &Conditional) -> Result<Expr, Self::Error> {
        walk_conditional(self, expr, node)
    }

    fn visit_call(&mut self, expr: &Expr, node: &Call) -> Result<Expr, Self::Error> {
        walk_call(self, expr, node)
    }

    fn visit_construct(&mut self, expr: &Expr, node: &Construct) -> Result<Expr, Self::Error> {
        walk_construct(self, expr, node)
    }

    fn visit_array_init(&mut self, expr: &Expr, node: &ArrayInit) -> Result<Expr, Self::Error> {
        walk_array_init(self, expr, node)
    }

    fn visit_list_init(&mut self, expr: &Expr, node: &ListInit) -> Result<Expr, Self::Error> {
        walk_list_init(self, expr, node)
    }

    fn visit_lambda(&mut self, expr: &Expr, node: &Lambda) -> Result<Expr, Self::Error> {
        walk_lambda(self, expr, node)
    }

    fn visit_invocation(&mut self, expr: &Expr, node: &Invocation) -> Result<Expr, Self::Error> {
        walk_invocation(self, expr, node)
    }

    fn visit_record_init(&mut self, expr: &Expr, node: &RecordInit) -> Result<Expr, Self::Error> {
        walk_record_init(self, expr, node)
    }

    fn visit_is_null(&mut self, expr: &Expr, node: &IsNull) -> Result<Expr, Self::Error> {
        walk_is_null(self, expr, node)
    }

    fn visit_subquery(&mut self, expr: &Expr, node: &Subquery) -> Result<Expr, Self::Error> {
        walk_subquery(self, expr, node)
    }

    fn visit_scalar(&mut self, expr: &Expr, node: &Scalar) -> Result<Expr, Self::Error> {
        walk_scalar(self, expr, node)
    }

    fn visit_select(&mut self, select: &Arc<Select>) -> Result<Arc<Select>, Self::Error> {
        walk_select(self, select)
    }

    fn visit_column(&mut self, expr: &Expr, _node: &Column) -> Result<Expr, Self::Error> {
        Ok(Arc::clone(expr))
    }
}

/// Route `expr` to the hook for its variant.
pub fn dispatch<R: Rewriter + ?Sized>(r: &mut R, expr: &Expr) -> Result<Expr, R::Error> {
    match expr.as_ref() {
        Node::Constant(node) => r.visit_constant(expr, node),
        Node::Parameter(node) => r.visit_parameter(expr, node),
        Node::Member(node) => r.visit_member(expr, node),
        Node::Unary(node) => r.visit_unary(expr, node),
        Node::Binary(node) => r.visit_binary(expr, node),
        Node::Conditional(node) => r.visit_conditional(expr, node),
        Node::Call(node) => r.visit_call(expr, node),
        Node::Construct(node) => r.visit_construct(expr, node),
        Node::ArrayInit(node) => r.visit_array_init(expr, node),
        Node::ListInit(node) => r.visit_list_init(expr, node),
        Node::Lambda(node) => r.visit_lambda(expr, node),
        Node::Invocation(node) => r.visit_invocation(expr, node),
        Node::RecordInit(node) => r.visit_record_init(expr, node),
        Node::IsNull(node) => r.visit_is_null(expr, node),
        Node::Subquery(node) => r.visit_subquery(expr, node),
        Node::Scalar(node) => r.visit_scalar(expr, node),
        Node::Select(select) => {
            let visited = r.visit_select(select)?;
            if Arc::ptr_eq(&visited, select) {
                Ok(Arc::clone(expr))
            } else {
                Ok(Node::Select(visited).into_expr())
            }
        }
        Node::Column(node) => r.visit_column(expr, node),
    }
}

/// `Some(new)` when `new` is a different handle from `old`.
fn changed<T: ?Sized>(old: &Arc<T>, new: Arc<T>) -> Option<Arc<T>> {
    if Arc::ptr_eq(old, &new) {
        None
    } else {
        Some(new)
    }
}

fn same_opt(old: Option<&Expr>, new: Option<&Expr>) -> bool {
    match (old, new) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Rewrite a slice with `f`, which returns `Some` only for elements it replaced.
///
/// The result borrows `items` when nothing was replaced; otherwise the slice is
/// copied exactly once, preserving order.
pub fn rewrite_list<'a, T, E, F>(items: &'a [T], mut f: F) -> Result<Cow<'a, [T]>, E>
where
    T: Clone,
    F: FnMut(&T) -> Result<Option<T>, E>,
{
    let mut out: Option<Vec<T>> = None;
    for (i, item) in items.iter().enumerate() {
        let replaced = f(item)?;
        match (&mut out, replaced) {
            (Some(out), Some(new)) => out.push(new),
            (Some(out), None) => out.push(item.clone()),
            (None, Some(new)) => {
                let mut copy = Vec::with_capacity(items.len());
                copy.extend_from_slice(&items[..i]);
                copy.push(new);
                out = Some(copy);
            }
            (None, None) => {}
        }
    }
    Ok(match out {
        Some(out) => Cow::Owned(out),
        None => Cow::Borrowed(items),
    })
}

pub fn walk_member<R: Rewriter + ?Sized>(
    r: &mut R,
    expr: &Expr,
    node: &Member,
) -> Result<Expr, R::Error> {
    let inner = r.visit_opt(node.expr.as_ref())?;
    if same_opt(node.expr.as_ref(), inner.as_ref()) {
        return Ok(Arc::clone(expr));
    }
    Ok(Node::Member(Member {
        expr: inner,
        member: node.member.clone(),
        data_type: node.data_type.clone(),
    })
    .into_expr())
}

pub fn walk_unary<R: Rewriter + ?Sized>(
    r: &mut R,
    expr: &Expr,
    node: &Unary,
) -> Result<Expr, R::Error> {
    let operand = r.visit(&node.operand)?;
    if Arc::ptr_eq(&operand, &node.operand) {
        return Ok(Arc::clone(expr));
    }
    Ok(Node::Unary(Unary {
        op: node.op,
        operand,
        data_type: node.data_type.clone(),
    })
    .into_expr())
}

pub fn walk_binary<R: Rewriter + ?Sized>(
    r: &mut R,
    expr: &Expr,
    node: &Binary,
) -> Result<Expr, R::Error> {
    let left = r.visit(&node.left)?;
    let right = r.visit(&node.right)?;
    if Arc::ptr_eq(&left, &node.left) && Arc::ptr_eq(&right, &node.right) {
        return Ok(Arc::clone(expr));
    }
    Ok(Node::Binary(Binary {
        op: node.op,
        left,
        right,
        data_type: node.data_type.clone(),
    })
    .into_expr())
}

pub fn walk_conditional<R: Rewriter + ?Sized>(
    r: &mut R,
    expr: &Expr,
    node: &Conditional,
) -> Result<Expr, R::Error> {
    let test = r.visit(&node.test)?;
    let if_true = r.visit(&node.if_true)?;
    let if_false = r.visit(&node.if_false)?;
    if Arc::ptr_eq(&test, &node.test)
        && Arc::ptr_eq(&if_true, &node.if_true)
        && Arc::ptr_eq(&if_false, &node.if_false)
    {
        return Ok(Arc::clone(expr));
    }
    Ok(Node::Conditional(Conditional {
        test,
        if_true,
        if_false,
        data_type: node.data_type.clone(),
    })
    .into_expr())
}

pub fn walk_call<R: Rewriter + ?Sized>(
    r: &mut R,
    expr: &Expr,
    node: &Call,
) -> Result<Expr, R::Error> {
    let object = r.visit_opt(node.object.as_ref())?;
    let args = r.visit_list(&node.args)?;
    if same_opt(node.object.as_ref(), object.as_ref()) && matches!(args, Cow::Borrowed(_)) {
        return Ok(Arc::clone(expr));
    }
    Ok(Node::Call(Call {
        object,
        method: node.method.clone(),
        args: args.into_owned(),
        data_type: node.data_type.clone(),
    })
    .into_expr())
}

/// Visit a constructor's arguments; `None` when none changed.
pub fn rewrite_construct<R: Rewriter + ?Sized>(
    r: &mut R,
    node: &Construct,
) -> Result<Option<Construct>, R::Error> {
    Ok(match r.visit_list(&node.args)? {
        Cow::Borrowed(_) => None,
        Cow::Owned(args) => Some(Construct {
            data_type: node.data_type.clone(),
            args,
            members: node.members.clone(),
        }),
    })
}

pub fn walk_construct<R: Rewriter + ?Sized>(
    r: &mut R,
    expr: &Expr,
    node: &Construct,
) -> Result<Expr, R::Error> {
    Ok(match rewrite_construct(r, node)? {
        Some(construct) => Node::Construct(construct).into_expr(),
        None => Arc::clone(expr),
    })
}

pub fn walk_array_init<R: Rewriter + ?Sized>(
    r: &mut R,
    expr: &Expr,
    node: &ArrayInit,
) -> Result<Expr, R::Error> {
    Ok(match r.visit_list(&node.elements)? {
        Cow::Borrowed(_) => Arc::clone(expr),
        Cow::Owned(elements) => Node::ArrayInit(ArrayInit {
            element_type: node.element_type.clone(),
            elements,
        })
        .into_expr(),
    })
}

pub fn rewrite_initializers<'a, R: Rewriter + ?Sized>(
    r: &mut R,
    initializers: &'a [ElementInit],
) -> Result<Cow<'a, [ElementInit]>, R::Error> {
    rewrite_list(initializers, |init| {
        Ok(match r.visit_list(&init.args)? {
            Cow::Borrowed(_) => None,
            Cow::Owned(args) => Some(ElementInit {
                method: init.method.clone(),
                args,
            }),
        })
    })
}

pub fn walk_list_init<R: Rewriter + ?Sized>(
    r: &mut R,
    expr: &Expr,
    node: &ListInit,
) -> Result<Expr, R::Error> {
    let construct = rewrite_construct(r, &node.construct)?;
    let initializers = rewrite_initializers(r, &node.initializers)?;
    if construct.is_none() && matches!(initializers, Cow::Borrowed(_)) {
        return Ok(Arc::clone(expr));
    }
    Ok(Node::ListInit(ListInit {
        construct: construct.unwrap_or_else(|| node.construct.clone()),
        initializers: initializers.into_owned(),
    })
    .into_expr())
}

pub fn walk_lambda<R: Rewriter + ?Sized>(
    r: &mut R,
    expr: &Expr,
    node: &Lambda,
) -> Result<Expr, R::Error> {
    let body = r.visit(&node.body)?;
    if Arc::ptr_eq(&body, &node.body) {
        return Ok(Arc::clone(expr));
    }
    Ok(Node::Lambda(Lambda {
        params: node.params.clone(),
        body,
    })
    .into_expr())
}

pub fn walk_invocation<R: Rewriter + ?Sized>(
    r: &mut R,
    expr: &Expr,
    node: &Invocation,
) -> Result<Expr, R::Error> {
    let target = r.visit(&node.target)?;
    let args = r.visit_list(&node.args)?;
    if Arc::ptr_eq(&target, &node.target) && matches!(args, Cow::Borrowed(_)) {
        return Ok(Arc::clone(expr));
    }
    Ok(Node::Invocation(Invocation {
        target,
        args: args.into_owned(),
        data_type: node.data_type.clone(),
    })
    .into_expr())
}

pub fn rewrite_bindings<'a, R: Rewriter + ?Sized>(
    r: &mut R,
    bindings: &'a [MemberBinding],
) -> Result<Cow<'a, [MemberBinding]>, R::Error> {
    rewrite_list(bindings, |binding| {
        Ok(match binding {
            MemberBinding::Assignment { member, expr } => {
                changed(expr, r.visit(expr)?).map(|expr| MemberBinding::Assignment {
                    member: member.clone(),
                    expr,
                })
            }
            MemberBinding::Member { member, bindings } => match rewrite_bindings(r, bindings)? {
                Cow::Borrowed(_) => None,
                Cow::Owned(bindings) => Some(MemberBinding::Member {
                    member: member.clone(),
                    bindings,
                }),
            },
            MemberBinding::List {
                member,
                initializers,
            } => match rewrite_initializers(r, initializers)? {
                Cow::Borrowed(_) => None,
                Cow::Owned(initializers) => Some(MemberBinding::List {
                    member: member.clone(),
                    initializers,
                }),
            },
        })
    })
}

pub fn walk_record_init<R: Rewriter + ?Sized>(
    r: &mut R,
    expr: &Expr,
    node: &RecordInit,
) -> Result<Expr, R::Error> {
    let construct = rewrite_construct(r, &node.construct)?;
    let bindings = rewrite_bindings(r, &node.bindings)?;
    if construct.is_none() && matches!(bindings, Cow::Borrowed(_)) {
        return Ok(Arc::clone(expr));
    }
    Ok(Node::RecordInit(RecordInit {
        construct: construct.unwrap_or_else(|| node.construct.clone()),
        bindings: bindings.into_owned(),
    })
    .into_expr())
}

pub fn walk_is_null<R: Rewriter + ?Sized>(
    r: &mut R,
    expr: &Expr,
    node: &IsNull,
) -> Result<Expr, R::Error> {
    let inner = r.visit(&node.expr)?;
    if Arc::ptr_eq(&inner, &node.expr) {
        return Ok(Arc::clone(expr));
    }
    Ok(Node::IsNull(IsNull { expr: inner }).into_expr())
}

pub fn walk_subquery<R: Rewriter + ?Sized>(
    r: &mut R,
    expr: &Expr,
    node: &Subquery,
) -> Result<Expr, R::Error> {
    let select = r.visit_select(&node.select)?;
    if Arc::ptr_eq(&select, &node.select) {
        return Ok(Arc::clone(expr));
    }
    Ok(Node::Subquery(Subquery::new(node.data_type.clone(), select)).into_expr())
}

/// Rebuilds through `Scalar::new`, so a rewrite that widens the select fails.
pub fn walk_scalar<R: Rewriter + ?Sized>(
    r: &mut R,
    expr: &Expr,
    node: &Scalar,
) -> Result<Expr, R::Error> {
    let select = r.visit_select(&node.select)?;
    if Arc::ptr_eq(&select, &node.select) {
        return Ok(Arc::clone(expr));
    }
    Ok(Node::Scalar(Scalar::new(node.data_type.clone(), select)?).into_expr())
}

pub fn walk_select<R: Rewriter + ?Sized>(
    r: &mut R,
    select: &Arc<Select>,
) -> Result<Arc<Select>, R::Error> {
    let source = match &select.source {
        SelectSource::Select { select: inner } => {
            changed(inner, r.visit_select(inner)?)
                .map(|inner| SelectSource::Select { select: inner })
        }
        SelectSource::Base { .. } => None,
    };
    let filter = r.visit_opt(select.filter.as_ref())?;
    let columns = rewrite_list(&select.columns, |column| {
        Ok::<_, R::Error>(changed(&column.expr, r.visit(&column.expr)?).map(|expr| {
            ColumnDeclaration::new(column.name.clone(), expr)
        }))
    })?;
    let grouping = match &select.grouping {
        Some(Grouping::Keys(keys)) => match r.visit_list(keys)? {
            Cow::Borrowed(_) => None,
            Cow::Owned(keys) => Some(Grouping::Keys(keys)),
        },
        Some(Grouping::All) | None => None,
    };
    let order_by = rewrite_list(&select.order_by, |ordering| {
        Ok::<_, R::Error>(changed(&ordering.expr, r.visit(&ordering.expr)?).map(|expr| {
            Ordering {
                expr,
                direction: ordering.direction,
            }
        }))
    })?;

    if source.is_none()
        && same_opt(select.filter.as_ref(), filter.as_ref())
        && matches!(columns, Cow::Borrowed(_))
        && grouping.is_none()
        && matches!(order_by, Cow::Borrowed(_))
    {
        return Ok(Arc::clone(select));
    }

    Ok(Arc::new(Select {
        source: source.unwrap_or_else(|| select.source.clone()),
        filter,
        columns: columns.into_owned(),
        projected: select.projected,
        grouping: grouping.or_else(|| select.grouping.clone()),
        order_by: order_by.into_owned(),
        limit: select.limit,
        element: select.element.clone(),
        projector: select.projector.clone(),
    }))
}
