//! Internal-consistency failures of the async-producer lowering.
//!
//! Every variant means an earlier stage handed over malformed IR. None is
//! recoverable; the pipeline turns them into error diagnostics and stops.

use thiserror::Error;

use crate::diag::{codes, DiagCode, Diagnostic};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerError {
    #[error("realize of '{name}' has no entry in the function environment")]
    UnknownFunction { name: String },

    #[error("duplicate produce node for async function '{func}'")]
    DuplicateProduce { func: String },

    #[error("acquire on '{semaphore}' is not a plain variable reference")]
    NonVariableSemaphore { semaphore: String },

    #[error("semaphore '{name}' is not bound to a semaphore-creation call")]
    MalformedSemaphoreLet { name: String },

    #[error("call to '{symbol}' outside a semaphore binding")]
    StraySemaphoreCreation { symbol: String },

    #[error("semaphore '{name}' is created with {found} arguments, expected 1")]
    SemaphoreArity { name: String, found: usize },
}

impl LowerError {
    pub fn code(&self) -> DiagCode {
        match self {
            LowerError::UnknownFunction { .. } => codes::E0100,
            LowerError::DuplicateProduce { .. } => codes::E0101,
            LowerError::NonVariableSemaphore { .. } => codes::E0102,
            LowerError::MalformedSemaphoreLet { .. } => codes::E0103,
            LowerError::StraySemaphoreCreation { .. } => codes::E0104,
            LowerError::SemaphoreArity { .. } => codes::E0105,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.to_string())
            .with_code(self.code())
            .with_hint("the input IR is malformed; this is a bug in an earlier lowering stage")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_name_the_offender() {
        let err = LowerError::DuplicateProduce {
            func: "blur".to_string(),
        };
        let d = err.to_diagnostic();
        assert_eq!(d.code, Some(codes::E0101));
        assert!(d.message.contains("'blur'"));
        assert!(d.hint.is_some());
    }
}
