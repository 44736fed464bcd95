//! Consume-scope tightening.
//!
//! Pushes every `produce`/`consume` wrapper down through `Let`, `Block`,
//! `Realize` and nested `ProducerConsumer` nodes to the smallest sub-trees
//! that reference the function (its name or its `<name>.buffer` parameter).
//! A produce wrapper whose body uses the function on both sides of a block
//! stays whole; a consume wrapper is duplicated onto each side.

use std::convert::Infallible;

use crate::ir::{Stmt, StmtKind};
use crate::mutator::{run_infallible, walk_stmt, IrMutator};
use crate::uses::stmt_uses_vars;

struct ConsumeTightener;

impl IrMutator for ConsumeTightener {
    type Error = Infallible;

    fn mutate_stmt(&mut self, s: &Stmt) -> Result<Stmt, Infallible> {
        match s.kind() {
            StmtKind::ProducerConsumer {
                name,
                is_producer,
                body,
            } => {
                let body = self.mutate_stmt(body)?;
                Ok(make_consume(name, *is_producer, &body))
            }
            _ => walk_stmt(self, s),
        }
    }
}

fn make_consume(name: &str, is_producer: bool, body: &Stmt) -> Stmt {
    match body.kind() {
        StmtKind::Let {
            name: var,
            value,
            body: inner,
        } => Stmt::let_stmt(
            var.clone(),
            value.clone(),
            make_consume(name, is_producer, inner),
        ),
        StmtKind::Block { first, rest } => {
            let buffer = format!("{name}.buffer");
            let names = [name, buffer.as_str()];
            let in_first = stmt_uses_vars(first, &names);
            let in_rest = stmt_uses_vars(rest, &names);
            match (in_first, in_rest) {
                (true, true) if is_producer => {
                    Stmt::producer_consumer(name, is_producer, body.clone())
                }
                (true, true) => Stmt::block(
                    make_consume(name, is_producer, first),
                    make_consume(name, is_producer, rest),
                ),
                (true, false) => Stmt::block(make_consume(name, is_producer, first), rest.clone()),
                (false, true) => Stmt::block(first.clone(), make_consume(name, is_producer, rest)),
                // Unreferenced on both sides: the wrapper guards nothing.
                (false, false) => body.clone(),
            }
        }
        // Already tightened: the inner wrapper covers the same region.
        StmtKind::ProducerConsumer {
            name: inner_name,
            is_producer: inner_is_producer,
            ..
        } if inner_name == name && *inner_is_producer == is_producer => body.clone(),
        StmtKind::ProducerConsumer {
            name: inner_name,
            is_producer: inner_is_producer,
            body: inner,
        } => Stmt::producer_consumer(
            inner_name.clone(),
            *inner_is_producer,
            make_consume(name, is_producer, inner),
        ),
        StmtKind::Realize {
            name: buf,
            types,
            bounds,
            condition,
            body: inner,
        } => Stmt::realize(
            buf.clone(),
            types.clone(),
            bounds.clone(),
            condition.clone(),
            make_consume(name, is_producer, inner),
        ),
        _ => Stmt::producer_consumer(name, is_producer, body.clone()),
    }
}

/// Narrow every produce/consume region to where its function is used.
pub fn tighten_consume_nodes(s: &Stmt) -> Stmt {
    run_infallible(&mut ConsumeTightener, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_stmt;

    fn tighten(src: &str) -> String {
        tighten_consume_nodes(&parse_stmt(src)).to_string()
    }

    #[test]
    fn consume_narrows_to_the_using_side() {
        let out = tighten("consume f { g(1); f(2); }");
        assert_eq!(out, "g(1);\nconsume f {\n  f(2);\n}\n");
    }

    #[test]
    fn consume_splits_across_both_using_sides() {
        let out = tighten("consume f { f(1); f(2); }");
        assert_eq!(
            out,
            "consume f {\n  f(1);\n}\nconsume f {\n  f(2);\n}\n"
        );
    }

    #[test]
    fn produce_used_on_both_sides_stays_whole() {
        let out = tighten("produce f { provide f(0) = 1; provide f(1) = f(0); }");
        assert_eq!(
            out,
            "produce f {\n  provide f(0) = 1;\n  provide f(1) = f(0);\n}\n"
        );
    }

    #[test]
    fn consume_moves_inside_lets_and_realizes() {
        let out = tighten("consume f { let t = 3 { realize g<i32>([0, t]) { f(t); } } }");
        assert_eq!(
            out,
            "let t = 3 {\n  realize g<i32>([0, t]) {\n    consume f {\n      f(t);\n    }\n  }\n}\n"
        );
    }

    #[test]
    fn buffer_parameter_counts_as_a_use() {
        let out = tighten("consume f { g(1); h(f.buffer: handle); }");
        assert_eq!(out, "g(1);\nconsume f {\n  h(f.buffer: handle);\n}\n");
    }

    #[test]
    fn nested_consume_of_the_same_function_is_not_doubled() {
        let out = tighten(
            "consume A { produce B { provide B(0) = A(0); consume A { out(A(1)); } } }",
        );
        assert_eq!(
            out,
            "produce B {\n  consume A {\n    provide B(0) = A(0);\n  }\n}\nconsume A {\n  out(A(1));\n}\n"
        );
    }

    #[test]
    fn wrapper_with_no_uses_is_dropped() {
        let out = tighten("consume f { g(1); g(2); }");
        assert_eq!(out, "g(1);\ng(2);\n");
    }
}
