use thiserror::Error;

use reflex_core::{GoalId, TokenId};

/// Structural violations raised while editing or posting through the
/// transaction graph. All of these are recoverable: the offending edit or
/// message is rejected and the graph is left unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("timeline dependency cycle through '{timeline}'")]
    CycleDetected { timeline: String },

    #[error("timeline '{timeline}' is already owned by reactor '{owner}'")]
    AlreadyOwned { timeline: String, owner: String },

    #[error("unknown timeline '{timeline}'")]
    InvalidTimeline { timeline: String },

    #[error("reactor '{reactor}' cannot post goals on timeline '{timeline}'")]
    InvalidRequestObject { reactor: String, timeline: String },

    #[error("reactor '{reactor}' cannot post observations on timeline '{timeline}'")]
    InvalidPostObject { reactor: String, timeline: String },

    #[error("invalid graph: {reason}")]
    InvalidGraph { reason: String },
}

/// Semantic violations of the transaction protocol.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("goal {goal} is already recorded in the ledger")]
    DuplicateGoal { goal: GoalId },

    #[error("token {token} is already recorded in the ledger")]
    DuplicateToken { token: TokenId },

    #[error("predicate '{predicate}' is not defined on timeline '{timeline}'")]
    UndefinedPredicate { timeline: String, predicate: String },
}

/// Fatal per-reactor failure raised from deliberation. The scheduler
/// removes the failed reactor from the graph; the rest of the mission
/// continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliberationError {
    #[error("plan proven inconsistent and relaxation failed")]
    Unrecoverable,

    #[error("deliberation failed: {0}")]
    Failed(String),
}
