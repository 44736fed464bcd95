//! Tree-rewriting traversal shared by every middle-end pass.
//!
//! A pass implements `IrMutator` and overrides `mutate_stmt` / `mutate_expr`
//! for the node kinds it cares about, delegating everything else to
//! `walk_stmt` / `walk_expr`. The walkers rebuild a node only when one of its
//! children changed, so untouched sub-trees keep their identity.
//!
//! Passes that return `true` from `collapses_no_ops` get no-op folding
//! applied by the walkers themselves (see `crate::noop`).

use crate::ir::{Expr, ExprKind, Range, Stmt, StmtKind};

pub trait IrMutator: Sized {
    type Error;

    /// Whether the walkers should fold statements whose bodies became no-ops.
    fn collapses_no_ops(&self) -> bool {
        false
    }

    fn mutate_stmt(&mut self, s: &Stmt) -> Result<Stmt, Self::Error> {
        walk_stmt(self, s)
    }

    fn mutate_expr(&mut self, e: &Expr) -> Result<Expr, Self::Error> {
        walk_expr(self, e)
    }
}

/// Run a pass that cannot fail.
pub fn run_infallible<M>(m: &mut M, s: &Stmt) -> Stmt
where
    M: IrMutator<Error = std::convert::Infallible>,
{
    match m.mutate_stmt(s) {
        Ok(s) => s,
        Err(never) => match never {},
    }
}

fn mutate_exprs<M: IrMutator>(m: &mut M, exprs: &[Expr]) -> Result<(Vec<Expr>, bool), M::Error> {
    let mut changed = false;
    let mut out = Vec::with_capacity(exprs.len());
    for e in exprs {
        let new = m.mutate_expr(e)?;
        changed |= !new.same_as(e);
        out.push(new);
    }
    Ok((out, changed))
}

fn mutate_ranges<M: IrMutator>(
    m: &mut M,
    bounds: &[Range],
) -> Result<(Vec<Range>, bool), M::Error> {
    let mut changed = false;
    let mut out = Vec::with_capacity(bounds.len());
    for r in bounds {
        let min = m.mutate_expr(&r.min)?;
        let extent = m.mutate_expr(&r.extent)?;
        changed |= !min.same_as(&r.min) || !extent.same_as(&r.extent);
        out.push(Range::new(min, extent));
    }
    Ok((out, changed))
}

pub fn walk_stmt<M: IrMutator>(m: &mut M, s: &Stmt) -> Result<Stmt, M::Error> {
    let collapse = m.collapses_no_ops();
    let out = match s.kind() {
        StmtKind::Let { name, value, body } => {
            let new_value = m.mutate_expr(value)?;
            let new_body = m.mutate_stmt(body)?;
            if collapse && new_body.is_no_op() {
                new_body
            } else if new_value.same_as(value) && new_body.same_as(body) {
                s.clone()
            } else {
                Stmt::let_stmt(name.clone(), new_value, new_body)
            }
        }
        StmtKind::For {
            name,
            min,
            extent,
            for_type,
            body,
        } => {
            let new_min = m.mutate_expr(min)?;
            let new_extent = m.mutate_expr(extent)?;
            let new_body = m.mutate_stmt(body)?;
            if collapse && new_body.is_no_op() {
                new_body
            } else if new_min.same_as(min) && new_extent.same_as(extent) && new_body.same_as(body)
            {
                s.clone()
            } else {
                Stmt::for_loop(name.clone(), new_min, new_extent, *for_type, new_body)
            }
        }
        StmtKind::Block { first, rest } => {
            let new_first = m.mutate_stmt(first)?;
            let new_rest = m.mutate_stmt(rest)?;
            if collapse && new_first.is_no_op() {
                new_rest
            } else if collapse && new_rest.is_no_op() {
                new_first
            } else if new_first.same_as(first) && new_rest.same_as(rest) {
                s.clone()
            } else {
                Stmt::block(new_first, new_rest)
            }
        }
        StmtKind::Fork { first, rest } => {
            let new_first = m.mutate_stmt(first)?;
            let new_rest = m.mutate_stmt(rest)?;
            if collapse && new_first.is_no_op() {
                new_rest
            } else if collapse && new_rest.is_no_op() {
                new_first
            } else if new_first.same_as(first) && new_rest.same_as(rest) {
                s.clone()
            } else {
                Stmt::fork(new_first, new_rest)
            }
        }
        StmtKind::Realize {
            name,
            types,
            bounds,
            condition,
            body,
        } => {
            let (new_bounds, bounds_changed) = mutate_ranges(m, bounds)?;
            let new_condition = m.mutate_expr(condition)?;
            let new_body = m.mutate_stmt(body)?;
            if collapse && new_body.is_no_op() {
                new_body
            } else if !bounds_changed && new_condition.same_as(condition) && new_body.same_as(body)
            {
                s.clone()
            } else {
                Stmt::realize(
                    name.clone(),
                    types.clone(),
                    new_bounds,
                    new_condition,
                    new_body,
                )
            }
        }
        StmtKind::IfThenElse {
            condition,
            then_case,
            else_case,
        } => {
            let new_condition = m.mutate_expr(condition)?;
            let new_then = m.mutate_stmt(then_case)?;
            let new_else = match else_case {
                Some(e) => Some(m.mutate_stmt(e)?),
                None => None,
            };
            let else_is_no_op = new_else.as_ref().map_or(true, Stmt::is_no_op);
            let else_unchanged = match (&new_else, else_case) {
                (Some(new), Some(old)) => new.same_as(old),
                (None, None) => true,
                _ => false,
            };
            if collapse && new_then.is_no_op() && else_is_no_op {
                new_then
            } else if new_condition.same_as(condition)
                && new_then.same_as(then_case)
                && else_unchanged
            {
                s.clone()
            } else {
                Stmt::if_then_else(new_condition, new_then, new_else)
            }
        }
        StmtKind::ProducerConsumer {
            name,
            is_producer,
            body,
        } => {
            let new_body = m.mutate_stmt(body)?;
            if new_body.same_as(body) {
                s.clone()
            } else {
                Stmt::producer_consumer(name.clone(), *is_producer, new_body)
            }
        }
        StmtKind::Evaluate { value } => {
            let new_value = m.mutate_expr(value)?;
            if new_value.same_as(value) {
                s.clone()
            } else {
                Stmt::evaluate(new_value)
            }
        }
        StmtKind::Provide { name, values, args } => {
            let (new_values, values_changed) = mutate_exprs(m, values)?;
            let (new_args, args_changed) = mutate_exprs(m, args)?;
            if !values_changed && !args_changed {
                s.clone()
            } else {
                Stmt::provide(name.clone(), new_values, new_args)
            }
        }
        StmtKind::Assert { condition, message } => {
            let new_condition = m.mutate_expr(condition)?;
            let new_message = m.mutate_expr(message)?;
            if new_condition.same_as(condition) && new_message.same_as(message) {
                s.clone()
            } else {
                Stmt::assert(new_condition, new_message)
            }
        }
        StmtKind::Prefetch { name, bounds } => {
            let (new_bounds, changed) = mutate_ranges(m, bounds)?;
            if changed {
                Stmt::prefetch(name.clone(), new_bounds)
            } else {
                s.clone()
            }
        }
        StmtKind::Acquire {
            semaphore,
            count,
            body,
        } => {
            let new_semaphore = m.mutate_expr(semaphore)?;
            let new_count = m.mutate_expr(count)?;
            let new_body = m.mutate_stmt(body)?;
            if new_semaphore.same_as(semaphore)
                && new_count.same_as(count)
                && new_body.same_as(body)
            {
                s.clone()
            } else {
                Stmt::acquire(new_semaphore, new_count, new_body)
            }
        }
    };
    Ok(out)
}

pub fn walk_expr<M: IrMutator>(m: &mut M, e: &Expr) -> Result<Expr, M::Error> {
    let out = match e.kind() {
        ExprKind::IntImm(_)
        | ExprKind::BoolImm(_)
        | ExprKind::StringImm(_)
        | ExprKind::Var { .. } => e.clone(),
        ExprKind::Binary { op, a, b } => {
            let new_a = m.mutate_expr(a)?;
            let new_b = m.mutate_expr(b)?;
            if new_a.same_as(a) && new_b.same_as(b) {
                e.clone()
            } else {
                Expr::binary(*op, new_a, new_b)
            }
        }
        ExprKind::Call {
            name,
            args,
            call_type,
            ty,
        } => {
            let (new_args, changed) = mutate_exprs(m, args)?;
            if changed {
                Expr::call(name.clone(), new_args, *call_type, *ty)
            } else {
                e.clone()
            }
        }
        ExprKind::Let { name, value, body } => {
            let new_value = m.mutate_expr(value)?;
            let new_body = m.mutate_expr(body)?;
            if new_value.same_as(value) && new_body.same_as(body) {
                e.clone()
            } else {
                Expr::let_in(name.clone(), new_value, new_body)
            }
        }
    };
    Ok(out)
}
