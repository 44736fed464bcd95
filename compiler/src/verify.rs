// verify.rs — Post-lowering verification (A1-A2)
//
// Checks the final statement tree for the two properties code generation
// relies on.
//
// Preconditions: `s` is the output of semaphore materialization.
// Postconditions: returns a `LoweringCert`; never modifies the tree.
// Failure modes: none (failures are reported through the cert).
// Side effects: none.

use std::collections::BTreeSet;
use std::convert::Infallible;

use crate::config::RuntimeSymbols;
use crate::ir::{Expr, ExprKind, Stmt, StmtKind};
use crate::mutator::{run_infallible, walk_expr, walk_stmt, IrMutator};
use crate::pass::StageCert;
use crate::semaphore::SemaphoreRole;

/// Machine-checkable evidence for lowering postconditions (A1-A2).
#[derive(Debug, Clone)]
pub struct LoweringCert {
    /// A1: No semaphore creation call remains anywhere in the tree.
    pub a1_no_semaphore_creation_calls: bool,
    /// A2: Every acquire of a synthesized semaphore has a matching release.
    pub a2_sync_acquires_released: bool,
    /// Synthesized semaphores that are acquired but never released.
    pub unreleased: Vec<String>,
}

impl StageCert for LoweringCert {
    fn all_pass(&self) -> bool {
        self.a1_no_semaphore_creation_calls && self.a2_sync_acquires_released
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            (
                "A1_no_semaphore_creation_calls",
                self.a1_no_semaphore_creation_calls,
            ),
            ("A2_sync_acquires_released", self.a2_sync_acquires_released),
        ]
    }
}

/// Read-only walk recording semaphore traffic.
struct SemaphoreTraffic<'a> {
    symbols: &'a RuntimeSymbols,
    creations: usize,
    acquired: BTreeSet<String>,
    released: BTreeSet<String>,
}

impl IrMutator for SemaphoreTraffic<'_> {
    type Error = Infallible;

    fn mutate_stmt(&mut self, s: &Stmt) -> Result<Stmt, Infallible> {
        if let StmtKind::Acquire { semaphore, .. } = s.kind() {
            if let Some(name) = semaphore.as_var() {
                if matches!(SemaphoreRole::classify(name), SemaphoreRole::Sync { .. }) {
                    self.acquired.insert(name.to_string());
                }
            }
        }
        walk_stmt(self, s)
    }

    fn mutate_expr(&mut self, e: &Expr) -> Result<Expr, Infallible> {
        if let ExprKind::Call { name, args, .. } = e.kind() {
            if *name == self.symbols.make_semaphore {
                self.creations += 1;
            } else if *name == self.symbols.semaphore_release {
                if let Some(sema) = args.first().and_then(Expr::as_var) {
                    self.released.insert(sema.to_string());
                }
            }
        }
        walk_expr(self, e)
    }
}

/// Verify lowering postconditions.
pub fn verify_lowering(s: &Stmt, symbols: &RuntimeSymbols) -> LoweringCert {
    let mut traffic = SemaphoreTraffic {
        symbols,
        creations: 0,
        acquired: BTreeSet::new(),
        released: BTreeSet::new(),
    };
    run_infallible(&mut traffic, s);
    let unreleased: Vec<String> = traffic
        .acquired
        .difference(&traffic.released)
        .cloned()
        .collect();
    LoweringCert {
        a1_no_semaphore_creation_calls: traffic.creations == 0,
        a2_sync_acquires_released: unreleased.is_empty(),
        unreleased,
    }
}
