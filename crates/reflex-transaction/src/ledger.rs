use std::collections::HashMap;

use reflex_core::{Goal, GoalId, TokenId};

use crate::error::ProtocolError;

/// Bidirectional bookkeeping between internal plan tokens and external goal
/// identities. Two maps kept in lock-step: every mutation goes through the
/// operations below, so a pair is always inserted and erased together.
#[derive(Debug, Clone, Default)]
pub struct GoalLedger {
    by_token: HashMap<TokenId, Goal>,
    by_goal: HashMap<GoalId, TokenId>,
}

impl GoalLedger {
    /// Records a token ↔ goal pair. Fails without inserting when either
    /// side is already present.
    pub fn record(&mut self, token: TokenId, goal: Goal) -> Result<(), ProtocolError> {
        if self.by_token.contains_key(&token) {
            return Err(ProtocolError::DuplicateToken { token });
        }
        if self.by_goal.contains_key(&goal.id) {
            return Err(ProtocolError::DuplicateGoal { goal: goal.id });
        }
        self.by_goal.insert(goal.id, token);
        self.by_token.insert(token, goal);
        Ok(())
    }

    pub fn find_by_internal(&self, token: TokenId) -> Option<&Goal> {
        self.by_token.get(&token)
    }

    pub fn find_by_external(&self, goal: GoalId) -> Option<TokenId> {
        self.by_goal.get(&goal).copied()
    }

    pub fn contains_internal(&self, token: TokenId) -> bool {
        self.by_token.contains_key(&token)
    }

    pub fn contains_external(&self, goal: GoalId) -> bool {
        self.by_goal.contains_key(&goal)
    }

    /// Erases the pair keyed by `token`. Absent token is a no-op.
    pub fn erase_by_internal(&mut self, token: TokenId) -> Option<Goal> {
        let goal = self.by_token.remove(&token)?;
        self.by_goal.remove(&goal.id);
        Some(goal)
    }

    /// Erases the pair keyed by `goal`. Absent goal is a no-op.
    pub fn erase_by_external(&mut self, goal: GoalId) -> Option<TokenId> {
        let token = self.by_goal.remove(&goal)?;
        self.by_token.remove(&token);
        Some(token)
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TokenId, &Goal)> {
        self.by_token.iter().map(|(t, g)| (*t, g))
    }

    /// Tokens currently recorded, in no particular order.
    pub fn tokens(&self) -> Vec<TokenId> {
        self.by_token.keys().copied().collect()
    }
}

/// The two independent ledgers every reactor keeps. Goals admitted from
/// upstream clients land in `active_requests`; goals this reactor dispatched
/// to downstream owners land in `dispatched`. Token ids may repeat across
/// the two, so they are never merged.
#[derive(Debug, Clone, Default)]
pub struct LedgerPair {
    pub active_requests: GoalLedger,
    pub dispatched: GoalLedger,
}
