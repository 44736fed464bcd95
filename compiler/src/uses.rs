//! Read-only queries over IR trees: name references and consume counting.
//!
//! A name is referenced by a variable of that name, a `Func` call to it, or
//! a `Provide` / `Prefetch` targeting it. Binding sites (`Let`, `For`,
//! `Realize`, `ProducerConsumer`) are not references.

use crate::ir::{CallType, Expr, ExprKind, Range, Stmt, StmtKind};

pub fn expr_uses_var(e: &Expr, name: &str) -> bool {
    expr_uses_vars(e, &[name])
}

pub fn expr_uses_vars(e: &Expr, names: &[&str]) -> bool {
    match e.kind() {
        ExprKind::IntImm(_) | ExprKind::BoolImm(_) | ExprKind::StringImm(_) => false,
        ExprKind::Var { name, .. } => names.contains(&name.as_str()),
        ExprKind::Binary { a, b, .. } => expr_uses_vars(a, names) || expr_uses_vars(b, names),
        ExprKind::Call {
            name,
            args,
            call_type,
            ..
        } => {
            (*call_type == CallType::Func && names.contains(&name.as_str()))
                || args.iter().any(|a| expr_uses_vars(a, names))
        }
        ExprKind::Let { value, body, .. } => {
            expr_uses_vars(value, names) || expr_uses_vars(body, names)
        }
    }
}

fn ranges_use_vars(bounds: &[Range], names: &[&str]) -> bool {
    bounds
        .iter()
        .any(|r| expr_uses_vars(&r.min, names) || expr_uses_vars(&r.extent, names))
}

pub fn stmt_uses_var(s: &Stmt, name: &str) -> bool {
    stmt_uses_vars(s, &[name])
}

pub fn stmt_uses_vars(s: &Stmt, names: &[&str]) -> bool {
    match s.kind() {
        StmtKind::Let { value, body, .. } => {
            expr_uses_vars(value, names) || stmt_uses_vars(body, names)
        }
        StmtKind::For {
            min, extent, body, ..
        } => {
            expr_uses_vars(min, names)
                || expr_uses_vars(extent, names)
                || stmt_uses_vars(body, names)
        }
        StmtKind::Block { first, rest } | StmtKind::Fork { first, rest } => {
            stmt_uses_vars(first, names) || stmt_uses_vars(rest, names)
        }
        StmtKind::Realize {
            bounds,
            condition,
            body,
            ..
        } => {
            ranges_use_vars(bounds, names)
                || expr_uses_vars(condition, names)
                || stmt_uses_vars(body, names)
        }
        StmtKind::IfThenElse {
            condition,
            then_case,
            else_case,
        } => {
            expr_uses_vars(condition, names)
                || stmt_uses_vars(then_case, names)
                || else_case
                    .as_ref()
                    .is_some_and(|e| stmt_uses_vars(e, names))
        }
        StmtKind::ProducerConsumer { body, .. } => stmt_uses_vars(body, names),
        StmtKind::Evaluate { value } => expr_uses_vars(value, names),
        StmtKind::Provide { name, values, args } => {
            names.contains(&name.as_str())
                || values.iter().any(|v| expr_uses_vars(v, names))
                || args.iter().any(|a| expr_uses_vars(a, names))
        }
        StmtKind::Assert { condition, message } => {
            expr_uses_vars(condition, names) || expr_uses_vars(message, names)
        }
        StmtKind::Prefetch { name, bounds } => {
            names.contains(&name.as_str()) || ranges_use_vars(bounds, names)
        }
        StmtKind::Acquire {
            semaphore,
            count,
            body,
        } => {
            expr_uses_vars(semaphore, names)
                || expr_uses_vars(count, names)
                || stmt_uses_vars(body, names)
        }
    }
}

/// Number of `consume func` nodes anywhere in `s`, nested ones included.
pub fn count_consume_nodes(s: &Stmt, func: &str) -> usize {
    let here = match s.kind() {
        StmtKind::ProducerConsumer {
            name, is_producer, ..
        } => usize::from(name == func && !is_producer),
        _ => 0,
    };
    here + children(s)
        .into_iter()
        .map(|c| count_consume_nodes(c, func))
        .sum::<usize>()
}

/// Direct sub-statements of `s`, in program order.
pub fn children(s: &Stmt) -> Vec<&Stmt> {
    match s.kind() {
        StmtKind::Let { body, .. }
        | StmtKind::For { body, .. }
        | StmtKind::Realize { body, .. }
        | StmtKind::ProducerConsumer { body, .. }
        | StmtKind::Acquire { body, .. } => vec![body],
        StmtKind::Block { first, rest } | StmtKind::Fork { first, rest } => vec![first, rest],
        StmtKind::IfThenElse {
            then_case,
            else_case,
            ..
        } => {
            let mut out = vec![then_case];
            out.extend(else_case.iter());
            out
        }
        StmtKind::Evaluate { .. }
        | StmtKind::Provide { .. }
        | StmtKind::Assert { .. }
        | StmtKind::Prefetch { .. } => Vec::new(),
    }
}
