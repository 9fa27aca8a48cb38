//! Validation guards standing between untrusted text and the database.
//!
//! Every guard classifies its input as `Passed` or `Rejected` with one
//! human-readable reason. Rejections are values, not errors: the caller
//! decides whether to log them or translate them into a response.

pub mod ast;
pub mod linter;
pub mod sql;
pub mod text;

pub use ast::{ColumnRef, SelectFacts, StatementKind, StatementSummary};
pub use linter::SqlLinter;
pub use sql::{SelectStructureValidator, SqlGuard};
pub use text::TextGuard;

/// Outcome of one guard run. Never partially valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Passed,
    Rejected { reason: String },
}

impl ValidationOutcome {
    pub fn rejected(reason: impl Into<String>) -> Self {
        ValidationOutcome::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, ValidationOutcome::Passed)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Passed => None,
            ValidationOutcome::Rejected { reason } => Some(reason),
        }
    }
}
