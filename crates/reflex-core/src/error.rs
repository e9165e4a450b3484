use thiserror::Error;

use crate::domain::DomainKind;

/// Errors raised by domain and temporal-scope restriction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("empty intersection on {kind} domain")]
    EmptyIntersection { kind: DomainKind },

    #[error("domain kind mismatch: expected {expected}, got {found}")]
    KindMismatch {
        expected: DomainKind,
        found: DomainKind,
    },

    #[error("temporal scope emptied at {field}")]
    EmptyScope { field: &'static str },
}
