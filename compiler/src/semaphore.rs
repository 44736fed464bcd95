//! Semaphore naming conventions.
//!
//! The runtime's diagnostics rely on two naming schemes, so they are kept
//! verbatim:
//!   - `<func>.semaphore_<i>`: synthesized for the i-th consume node of `func`;
//!   - `<func>.folding_semaphore.<suffix>`: owned by storage folding.
//!
//! Passes never inspect the prefixes directly; they classify a name once
//! through `SemaphoreRole` and match on the result.

use std::fmt;

const SYNC_INFIX: &str = ".semaphore_";
const FOLDING_INFIX: &str = ".folding_semaphore.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemaphoreRole {
    /// Producer/consumer synchronization for one consume node.
    Sync { func: String, index: usize },
    /// Storage-folding slot semaphore; belongs to the producer side only.
    Folding { func: String, suffix: String },
    /// Anything else, including clones made during splitting.
    Other,
}

impl SemaphoreRole {
    pub fn sync(func: impl Into<String>, index: usize) -> Self {
        SemaphoreRole::Sync {
            func: func.into(),
            index,
        }
    }

    pub fn classify(name: &str) -> Self {
        if let Some(pos) = name.find(FOLDING_INFIX) {
            let suffix = &name[pos + FOLDING_INFIX.len()..];
            if pos > 0 && !suffix.is_empty() {
                return SemaphoreRole::Folding {
                    func: name[..pos].to_string(),
                    suffix: suffix.to_string(),
                };
            }
        }
        if let Some(pos) = name.rfind(SYNC_INFIX) {
            let digits = &name[pos + SYNC_INFIX.len()..];
            if pos > 0 && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(index) = digits.parse() {
                    return SemaphoreRole::Sync {
                        func: name[..pos].to_string(),
                        index,
                    };
                }
            }
        }
        SemaphoreRole::Other
    }

    /// True for a storage-folding semaphore owned by `func`.
    pub fn is_folding_for(&self, func: &str) -> bool {
        matches!(self, SemaphoreRole::Folding { func: f, .. } if f == func)
    }
}

impl fmt::Display for SemaphoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemaphoreRole::Sync { func, index } => write!(f, "{func}{SYNC_INFIX}{index}"),
            SemaphoreRole::Folding { func, suffix } => write!(f, "{func}{FOLDING_INFIX}{suffix}"),
            SemaphoreRole::Other => write!(f, "<semaphore>"),
        }
    }
}
