// pass.rs — Pass descriptor module: metadata, dependency resolution, certs
//
// Declares the five async-producer lowering passes (parse is outside the
// runner), their dependency edges, and the artifact each produces. Used by
// the pipeline runner to compute the minimal pass prefix for each --emit
// target.

use std::collections::HashSet;

// ── Pass identifiers ───────────────────────────────────────────────────────

/// Identifies each lowering pass (parsing runs before the pass runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    TightenConsume,
    ForkProducers,
    ExpandAcquires,
    TightenForks,
    InitSemaphores,
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a lowering pass.
pub struct PassDescriptor {
    /// Human-readable name for diagnostics/verbose output.
    pub name: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
    /// Name of the statement tree this pass leaves in the compilation state.
    pub output: &'static str,
    /// Pre/post conditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::TightenConsume => PassDescriptor {
            name: "tighten_consume",
            inputs: &[],
            output: "consume-tightened",
            invariants: "produce/consume wrappers enclose only sub-trees using their function",
        },
        PassId::ForkProducers => PassDescriptor {
            name: "fork_producers",
            inputs: &[PassId::TightenConsume],
            output: "forked",
            invariants: "one semaphore per consume node of each async function; \
                         producer and consumer run under a fork",
        },
        PassId::ExpandAcquires => PassDescriptor {
            name: "expand_acquires",
            inputs: &[PassId::ForkProducers],
            output: "acquire-expanded",
            invariants: "no acquire directly under a block head, realize, \
                         independent let or producer/consumer wrapper",
        },
        PassId::TightenForks => PassDescriptor {
            name: "tighten_forks",
            inputs: &[PassId::ExpandAcquires],
            output: "fork-tightened",
            invariants: "no dead let/realize inside a fork; shared bindings hoisted",
        },
        PassId::InitSemaphores => PassDescriptor {
            name: "init_semaphores",
            inputs: &[PassId::TightenForks],
            output: "lowered",
            invariants: "A1-A2 obligations verified; no semaphore creation call remains",
        },
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All 5 pass IDs in execution order.
pub const ALL_PASSES: [PassId; 5] = [
    PassId::TightenConsume,
    PassId::ForkProducers,
    PassId::ExpandAcquires,
    PassId::TightenForks,
    PassId::InitSemaphores,
];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Stage certificates ─────────────────────────────────────────────────────

/// Machine-checkable evidence that a stage met its postconditions.
pub trait StageCert {
    /// True when every obligation holds.
    fn all_pass(&self) -> bool;

    /// Named obligations and whether each holds.
    fn obligations(&self) -> Vec<(&'static str, bool)>;

    /// Names of the obligations that do not hold.
    fn failed(&self) -> Vec<&'static str> {
        self.obligations()
            .into_iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| name)
            .collect()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
