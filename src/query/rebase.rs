//! Placeholder substitution used to re-anchor expression templates.
//!
//! Fragment bodies and computed schema fields are written against their own
//! placeholder. Using them at a concrete site means replacing that
//! placeholder with the site's context expression.

use tracing::trace;

use crate::query::expr::{Expr, Placeholder};

/// Returns a copy of `expr` with every reference to `target` replaced by
/// `replacement`.
///
/// The input tree is left untouched. A [`Expr::Map`] whose element
/// placeholder is `target` shadows it, so its body is copied unchanged.
pub fn rebase(expr: &Expr, target: &Placeholder, replacement: &Expr) -> Expr {
    trace!(placeholder = %target, replacement = %replacement, "rebasing expression");
    substitute(expr, target, replacement)
}

fn substitute(expr: &Expr, target: &Placeholder, replacement: &Expr) -> Expr {
    let recurse = |inner: &Expr| Box::new(substitute(inner, target, replacement));
    match expr {
        Expr::Parameter(p) if p == target => replacement.clone(),
        Expr::Parameter(_) | Expr::Constant { .. } => expr.clone(),
        Expr::Member { target: on, member, ty } => Expr::Member {
            target: recurse(on),
            member: member.clone(),
            ty: ty.clone(),
        },
        Expr::Conditional {
            test,
            if_true,
            if_false,
        } => Expr::Conditional {
            test: recurse(test),
            if_true: recurse(if_true),
            if_false: recurse(if_false),
        },
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op: *op,
            lhs: recurse(lhs),
            rhs: recurse(rhs),
        },
        Expr::Call { function, args } => Expr::Call {
            function: *function,
            args: args
                .iter()
                .map(|arg| substitute(arg, target, replacement))
                .collect(),
        },
        Expr::Map {
            source,
            element,
            body,
        } => Expr::Map {
            source: recurse(source),
            element: element.clone(),
            body: if element == target {
                body.clone()
            } else {
                recurse(body)
            },
        },
        Expr::Record { ty, fields } => Expr::Record {
            ty: ty.clone(),
            fields: fields
                .iter()
                .map(|(name, field)| (name.clone(), substitute(field, target, replacement)))
                .collect(),
        },
    }
}
