//! Error types for the reactive lowering pipeline
//!
//! Two classes of failure exist. Unsupported-input errors abort compilation
//! of a single function unit; sibling units are unaffected. Invariant
//! violations mean an earlier pass produced state that later passes are not
//! prepared to consume, and are fatal to the whole run.

use crate::hir::Span;
use thiserror::Error;

/// Errors raised by the analysis and lowering passes
#[derive(Debug, Error, Clone)]
pub enum CompileError {
    /// Input this pipeline cannot reliably structure or scope.
    ///
    /// Compilation of the offending function unit is abandoned; other
    /// function units may still compile.
    #[error("Unsupported input: {reason}")]
    Unsupported {
        /// Short machine-stable reason
        reason: String,
        /// Optional free-form detail
        description: Option<String>,
        /// Location of the offending construct
        span: Span,
    },

    /// An internal invariant no longer holds.
    ///
    /// Downstream passes assume the invariant unconditionally, so there is
    /// no safe local recovery.
    #[error("Invariant violation: {reason}")]
    Invariant {
        /// Short machine-stable reason
        reason: String,
        /// Optional free-form detail
        description: Option<String>,
        /// Location closest to the violation
        span: Span,
    },
}

impl CompileError {
    /// Build an unsupported-input error
    pub fn unsupported(reason: impl Into<String>, span: Span) -> Self {
        CompileError::Unsupported {
            reason: reason.into(),
            description: None,
            span,
        }
    }

    /// Build an invariant-violation error
    pub fn invariant(reason: impl Into<String>, span: Span) -> Self {
        CompileError::Invariant {
            reason: reason.into(),
            description: None,
            span,
        }
    }

    /// Attach a free-form description
    pub fn with_description(mut self, detail: impl Into<String>) -> Self {
        match &mut self {
            CompileError::Unsupported { description, .. }
            | CompileError::Invariant { description, .. } => {
                *description = Some(detail.into());
            }
        }
        self
    }

    /// Get the span associated with this error
    pub fn span(&self) -> Span {
        match self {
            CompileError::Unsupported { span, .. } => *span,
            CompileError::Invariant { span, .. } => *span,
        }
    }

    /// Whether this error is fatal to the whole run rather than to a
    /// single function unit
    pub fn is_invariant(&self) -> bool {
        matches!(self, CompileError::Invariant { .. })
    }
}

/// Result alias used throughout the crate
pub type CompileResult<T> = Result<T, CompileError>;
