//! Fork-scope tightening.
//!
//! Inside a fork, lets and realizes whose names are no longer referenced by
//! their bodies are dropped: after splitting, an allocation often survives
//! on the side that does not touch it. At each `Fork`, bindings heading the
//! branches are pulled above it:
//!
//! - the same let (name and value) on both branches is hoisted once;
//! - a let or realize heading one branch is hoisted when the other branch
//!   does not reference it.
//!
//! A fork with a no-op branch degenerates to the other branch.

use std::convert::Infallible;

use crate::ir::{Stmt, StmtKind};
use crate::mutator::{run_infallible, walk_stmt, IrMutator};
use crate::uses::{stmt_uses_var, stmt_uses_vars};

#[derive(Default)]
struct ForkTightener {
    in_fork: bool,
}

impl IrMutator for ForkTightener {
    type Error = Infallible;

    fn mutate_stmt(&mut self, s: &Stmt) -> Result<Stmt, Infallible> {
        match s.kind() {
            StmtKind::Fork { first, rest } => {
                let outer = std::mem::replace(&mut self.in_fork, true);
                let new_first = self.mutate_stmt(first);
                let new_rest = self.mutate_stmt(rest);
                self.in_fork = outer;
                let (first, rest) = (new_first?, new_rest?);
                if first.is_no_op() {
                    Ok(rest)
                } else if rest.is_no_op() {
                    Ok(first)
                } else {
                    Ok(make_fork(first, rest))
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
                let buffer = format!("{name}.buffer");
                if self.in_fork && !stmt_uses_vars(&new_body, &[name, buffer.as_str()]) {
                    Ok(new_body)
                } else if new_body.same_as(body) {
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
                if self.in_fork && !stmt_uses_var(&new_body, name) {
                    Ok(new_body)
                } else if new_body.same_as(body) {
                    Ok(s.clone())
                } else {
                    Ok(Stmt::let_stmt(name.clone(), value.clone(), new_body))
                }
            }
            _ => walk_stmt(self, s),
        }
    }
}

fn make_fork(first: Stmt, rest: Stmt) -> Stmt {
    match (first.kind(), rest.kind()) {
        (
            StmtKind::Let {
                name: lf,
                value: vf,
                body: bf,
            },
            StmtKind::Let {
                name: lr,
                value: vr,
                body: br,
            },
        ) if lf == lr && vf == vr => {
            return Stmt::let_stmt(lf.clone(), vf.clone(), make_fork(bf.clone(), br.clone()));
        }
        _ => {}
    }
    if let StmtKind::Let { name, value, body } = first.kind() {
        if !stmt_uses_var(&rest, name) {
            return Stmt::let_stmt(name.clone(), value.clone(), make_fork(body.clone(), rest));
        }
    }
    if let StmtKind::Let { name, value, body } = rest.kind() {
        if !stmt_uses_var(&first, name) {
            return Stmt::let_stmt(name.clone(), value.clone(), make_fork(first, body.clone()));
        }
    }
    if let StmtKind::Realize {
        name,
        types,
        bounds,
        condition,
        body,
    } = first.kind()
    {
        if !stmt_uses_var(&rest, name) {
            return Stmt::realize(
                name.clone(),
                types.clone(),
                bounds.clone(),
                condition.clone(),
                make_fork(body.clone(), rest),
            );
        }
    }
    if let StmtKind::Realize {
        name,
        types,
        bounds,
        condition,
        body,
    } = rest.kind()
    {
        if !stmt_uses_var(&first, name) {
            return Stmt::realize(
                name.clone(),
                types.clone(),
                bounds.clone(),
                condition.clone(),
                make_fork(first, body.clone()),
            );
        }
    }
    Stmt::fork(first, rest)
}

/// Hoist shared bindings above forks and drop allocations a fork side no longer needs.
pub fn tighten_fork_nodes(s: &Stmt) -> Stmt {
    run_infallible(&mut ForkTightener::default(), s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_stmt;

    fn tighten(src: &str) -> String {
        tighten_fork_nodes(&parse_stmt(src)).to_string()
    }

    #[test]
    fn identical_leading_lets_are_merged() {
        let out = tighten("fork { let t = 4 { f(t); } } { let t = 4 { g(t); } }");
        assert_eq!(
            out,
            "let t = 4 {\n  fork {\n    f(t);\n  } {\n    g(t);\n  }\n}\n"
        );
    }

    #[test]
    fn different_values_stay_on_their_branches() {
        let out = tighten("fork { let t = 4 { f(t); } } { let t = 5 { g(t); } }");
        assert_eq!(
            out,
            "fork {\n  let t = 4 {\n    f(t);\n  }\n} {\n  let t = 5 {\n    g(t);\n  }\n}\n"
        );
    }

    #[test]
    fn one_sided_realize_is_hoisted() {
        let out = tighten("fork { realize h<i32>() { provide h(0) = 1; h(0); } } { g(1); }");
        assert_eq!(
            out,
            "realize h<i32>() {\n  fork {\n    provide h(0) = 1;\n    h(0);\n  } {\n    g(1);\n  }\n}\n"
        );
    }

    #[test]
    fn realize_referenced_by_the_other_side_stays() {
        let out = tighten("fork { realize h<i32>() { provide h(0) = 1; } } { g(h(0)); }");
        assert_eq!(
            out,
            "fork {\n  realize h<i32>() {\n    provide h(0) = 1;\n  }\n} {\n  g(h(0));\n}\n"
        );
    }

    #[test]
    fn dead_bindings_inside_a_fork_are_dropped() {
        let out = tighten("fork { realize h<i32>() { let u = 2 { f(1); } } } { g(1); }");
        assert_eq!(out, "fork {\n  f(1);\n} {\n  g(1);\n}\n");
    }

    #[test]
    fn dead_bindings_outside_forks_are_kept() {
        let s = parse_stmt("let u = 2 { f(1); }");
        assert!(tighten_fork_nodes(&s).same_as(&s));
    }

    #[test]
    fn fork_with_a_no_op_side_degenerates() {
        let out = tighten("fork { f(1); } { 0; }");
        assert_eq!(out, "f(1);\n");
    }
}
