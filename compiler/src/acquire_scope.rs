//! Acquire-scope expansion.
//!
//! Hoists an `Acquire` out of the node that immediately encloses it:
//!
//! - `Block(Acquire(s, n, b), rest)`   → `Acquire(s, n, Block(b, rest))`
//! - `Realize(.., Acquire(s, n, b))`   → `Acquire(s, n, Realize(.., b))`
//! - `Let(x, v, Acquire(s, n, b))`     → `Acquire(s, n, Let(x, v, b))`
//!   when neither `s` nor `n` mentions `x`
//! - `ProducerConsumer(.., Acquire(s, n, b))` → `Acquire(s, n, ProducerConsumer(.., b))`
//!
//! Trailing work then runs in the same task window as the wait, and
//! allocations are only made once the wait is satisfied.

use std::convert::Infallible;

use crate::ir::{Stmt, StmtKind};
use crate::mutator::{run_infallible, walk_stmt, IrMutator};
use crate::uses::expr_uses_var;

struct AcquireExpander;

impl IrMutator for AcquireExpander {
    type Error = Infallible;

    fn mutate_stmt(&mut self, s: &Stmt) -> Result<Stmt, Infallible> {
        match s.kind() {
            StmtKind::Block { first, rest } => {
                let new_first = self.mutate_stmt(first)?;
                if let StmtKind::Acquire {
                    semaphore,
                    count,
                    body,
                } = new_first.kind()
                {
                    // The rest is blocked on the same wait.
                    let inner = self.mutate_stmt(&Stmt::block(body.clone(), rest.clone()))?;
                    return Ok(Stmt::acquire(semaphore.clone(), count.clone(), inner));
                }
                let new_rest = self.mutate_stmt(rest)?;
                if new_first.same_as(first) && new_rest.same_as(rest) {
                    Ok(s.clone())
                } else {
                    Ok(Stmt::block(new_first, new_rest))
                }
            }
            StmtKind::Realize {
                name,
                types,
                bounds,
                condition,
                body,
            } => {
                let new_body = self.mutate_stmt(body)?;
                if let StmtKind::Acquire {
                    semaphore,
                    count,
                    body: inner,
                } = new_body.kind()
                {
                    let realize = Stmt::realize(
                        name.clone(),
                        types.clone(),
                        bounds.clone(),
                        condition.clone(),
                        inner.clone(),
                    );
                    let realize = self.mutate_stmt(&realize)?;
                    return Ok(Stmt::acquire(semaphore.clone(), count.clone(), realize));
                }
                if new_body.same_as(body) {
                    Ok(s.clone())
                } else {
                    Ok(Stmt::realize(
                        name.clone(),
                        types.clone(),
                        bounds.clone(),
                        condition.clone(),
                        new_body,
                    ))
                }
            }
            StmtKind::Let { name, value, body } => {
                let new_body = self.mutate_stmt(body)?;
                match new_body.kind() {
                    StmtKind::Acquire {
                        semaphore,
                        count,
                        body: inner,
                    } if !expr_uses_var(semaphore, name) && !expr_uses_var(count, name) => {
                        Ok(Stmt::acquire(
                            semaphore.clone(),
                            count.clone(),
                            Stmt::let_stmt(name.clone(), value.clone(), inner.clone()),
                        ))
                    }
                    _ if new_body.same_as(body) => Ok(s.clone()),
                    _ => Ok(Stmt::let_stmt(name.clone(), value.clone(), new_body)),
                }
            }
            StmtKind::ProducerConsumer {
                name,
                is_producer,
                body,
            } => {
                let new_body = self.mutate_stmt(body)?;
                if let StmtKind::Acquire {
                    semaphore,
                    count,
                    body: inner,
                } = new_body.kind()
                {
                    let pc = Stmt::producer_consumer(name.clone(), *is_producer, inner.clone());
                    let pc = self.mutate_stmt(&pc)?;
                    return Ok(Stmt::acquire(semaphore.clone(), count.clone(), pc));
                }
                if new_body.same_as(body) {
                    Ok(s.clone())
                } else {
                    Ok(Stmt::producer_consumer(name.clone(), *is_producer, new_body))
                }
            }
            _ => walk_stmt(self, s),
        }
    }
}

/// Widen every acquire to cover the work that is blocked on it anyway.
pub fn expand_acquire_nodes(s: &Stmt) -> Stmt {
    run_infallible(&mut AcquireExpander, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_stmt;

    fn expand(src: &str) -> String {
        expand_acquire_nodes(&parse_stmt(src)).to_string()
    }

    #[test]
    fn trailing_work_moves_under_the_acquire() {
        let out = expand("acquire (s: semaphore, 1) { a(); } b();");
        assert_eq!(out, "acquire (s: semaphore, 1) {\n  a();\n  b();\n}\n");
    }

    #[test]
    fn allocation_waits_for_the_semaphore() {
        let out = expand("realize g<i32>([0, 4]) { acquire (s: semaphore, 1) { g(0); } }");
        assert_eq!(
            out,
            "acquire (s: semaphore, 1) {\n  realize g<i32>([0, 4]) {\n    g(0);\n  }\n}\n"
        );
    }

    #[test]
    fn let_hoists_only_when_independent() {
        let out = expand("let t = 2 { acquire (s: semaphore, 1) { f(t); } }");
        assert_eq!(
            out,
            "acquire (s: semaphore, 1) {\n  let t = 2 {\n    f(t);\n  }\n}\n"
        );

        let out = expand("let t = 2 { acquire (s: semaphore, t) { f(t); } }");
        assert_eq!(
            out,
            "let t = 2 {\n  acquire (s: semaphore, t) {\n    f(t);\n  }\n}\n"
        );
    }

    #[test]
    fn producer_consumer_tag_is_reattached_inside() {
        let out = expand("consume f { acquire (s: semaphore, 1) { f(0); } }");
        assert_eq!(
            out,
            "acquire (s: semaphore, 1) {\n  consume f {\n    f(0);\n  }\n}\n"
        );
    }

    #[test]
    fn nested_hoists_compose() {
        let out = expand(
            "consume f { realize g<i32>() { acquire (s: semaphore, 1) { g(0); } } } h();",
        );
        assert_eq!(
            out,
            "acquire (s: semaphore, 1) {\n  consume f {\n    realize g<i32>() {\n      g(0);\n    }\n  }\n  h();\n}\n"
        );
    }

    #[test]
    fn untouched_trees_keep_identity() {
        let s = parse_stmt("let t = 1 { f(t); g(t); }");
        assert!(expand_acquire_nodes(&s).same_as(&s));
    }
}
