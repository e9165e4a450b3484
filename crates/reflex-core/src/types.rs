use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// System-wide identifier for a goal. Independent of any reactor's internal
/// token numbering; this is the handle recalls refer to.
pub type GoalId = Uuid;

/// Reactor-local identity of a plan token. Token ids are never sent between
/// reactors; the goal ledger maps them to and from [`GoalId`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub u64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Identity of a reactor slot within a transaction graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactorId(pub u64);

impl fmt::Display for ReactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}
