// diag.rs — Unified diagnostics model
//
// Provides the shared diagnostic types used by the parser, the lowering
// passes and post-lowering verification.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::lexer::Span;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0101`).
///
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    /// Lex or parse error in a textual IR module.
    pub const E0001: DiagCode = DiagCode("E0001");
    /// Realize of a function missing from the environment.
    pub const E0100: DiagCode = DiagCode("E0100");
    /// Two produce nodes for one async function.
    pub const E0101: DiagCode = DiagCode("E0101");
    /// Acquire on something other than a plain variable.
    pub const E0102: DiagCode = DiagCode("E0102");
    /// Semaphore binding whose value is not a creation call.
    pub const E0103: DiagCode = DiagCode("E0103");
    /// Semaphore creation call outside a semaphore binding.
    pub const E0104: DiagCode = DiagCode("E0104");
    /// Semaphore creation call with the wrong argument count.
    pub const E0105: DiagCode = DiagCode("E0105");
    /// Post-lowering verification failed.
    pub const E0600: DiagCode = DiagCode("E0600");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A compiler diagnostic emitted by any phase.
///
/// IR produced by upstream lowering carries no source positions, so `span`
/// is only set for problems found while reading a textual module.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Option<Span>,
    pub message: String,
    pub hint: Option<String>,
    pub causes: Vec<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, span, hint, or causes.
    pub fn new(level: DiagLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span: None,
            message: message.into(),
            hint: None,
            causes: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, message)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a source location.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Append one link to the cause chain.
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(span) = &self.span {
            write!(f, " (at {}..{})", span.start, span.end)?;
        }
        for cause in &self.causes {
            write!(f, "\n  caused by: {}", cause)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}
