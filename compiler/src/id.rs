// id.rs — Fresh-name allocation for compiler-synthesized variables
//
// Names are numbered in allocation order with a single monotonically
// increasing counter, so the same input always yields the same names.
// One allocator is owned by each lowering invocation; nothing is global.

/// Allocator for fresh variable names derived from an existing name.
#[derive(Debug, Default)]
pub struct NameAllocator {
    next: u32,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `base` suffixed with `_<n>`, `n` unique within this allocator.
    pub fn fresh(&mut self, base: &str) -> String {
        let name = format!("{}_{}", base, self.next);
        self.next += 1;
        name
    }
}
