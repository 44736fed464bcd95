//! No-op collapsing.
//!
//! A statement is a no-op when it is an evaluation of a constant. After its
//! children are rewritten:
//!   - `Let`, `For` and `Realize` with a no-op body collapse to a no-op;
//!   - `Block` and `Fork` with one no-op side collapse to the other side;
//!   - `IfThenElse` with no-op (or absent) branches collapses to a no-op.
//!
//! The rules live in `mutator::walk_stmt` so any pass can opt in through
//! `IrMutator::collapses_no_ops`; `NoOpCollapser` is the pass that does
//! nothing else.

use std::convert::Infallible;

use crate::ir::Stmt;
use crate::mutator::{run_infallible, IrMutator};

pub struct NoOpCollapser;

impl IrMutator for NoOpCollapser {
    type Error = Infallible;

    fn collapses_no_ops(&self) -> bool {
        true
    }
}

/// Remove every sub-tree that provably does no work.
pub fn collapse_no_ops(s: &Stmt) -> Stmt {
    run_infallible(&mut NoOpCollapser, s)
}
