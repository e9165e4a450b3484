//! Internal plan representation for deliberative reactors.
//!
//! `PlanTable` is the reactor-owned token store a [`PlannerBackend`]
//! works against: facts recorded from observations, goal tokens admitted
//! from requests or created by deliberation, the current token per
//! timeline, and the delta buffers the reactor drains after each backend
//! call (state updates to publish, tokens dropped by a relax).
//!
//! [`PlannerBackend`]: crate::backend::PlannerBackend

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use reflex_core::{Domain, Observation, TemporalScope, Tick, TickInterval, TokenId};

/// Whether a token states what is (a fact) or what should be (a goal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Fact,
    Goal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    /// Not yet part of the executing plan.
    Pending,
    /// Part of the executing plan.
    Active,
    /// Unified with an existing active token.
    Merged { into: TokenId },
    /// Superseded; retired at the next tick boundary.
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Token {
    pub id: TokenId,
    pub timeline: String,
    pub predicate: String,
    pub attributes: BTreeMap<String, Domain>,
    pub scope: TemporalScope,
    pub kind: TokenKind,
    pub state: TokenState,
}

impl Token {
    fn ended_before(&self, tick: Tick) -> bool {
        self.scope.end.ub.is_some_and(|ub| ub < tick)
    }
}

/// Serializable view of the plan, handed to archivers.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSnapshot {
    pub clock: TickInterval,
    pub tokens: Vec<Token>,
    pub current: BTreeMap<String, TokenId>,
}

/// The token store of a deliberative reactor.
pub struct PlanTable {
    // timeline -> predicate -> attribute prototypes
    predicates: BTreeMap<String, BTreeMap<String, BTreeMap<String, Domain>>>,
    tokens: BTreeMap<TokenId, Token>,
    current: BTreeMap<String, TokenId>,
    working: Vec<TokenId>,
    state_updates: Vec<String>,
    dropped: Vec<TokenId>,
    clock: TickInterval,
    next_token: u64,
}

impl PlanTable {
    pub fn new() -> Self {
        PlanTable {
            predicates: BTreeMap::new(),
            tokens: BTreeMap::new(),
            current: BTreeMap::new(),
            working: Vec::new(),
            state_updates: Vec::new(),
            dropped: Vec::new(),
            clock: TickInterval::at_least(0),
            next_token: 0,
        }
    }

    // ── Model ──────────────────────────────────────────────────

    /// Declares a predicate and its attribute prototypes on a timeline.
    pub fn declare_predicate(
        &mut self,
        timeline: impl Into<String>,
        predicate: impl Into<String>,
        attributes: impl IntoIterator<Item = (String, Domain)>,
    ) {
        self.predicates
            .entry(timeline.into())
            .or_default()
            .insert(predicate.into(), attributes.into_iter().collect());
    }

    pub fn has_predicate(&self, timeline: &str, predicate: &str) -> bool {
        self.predicates
            .get(timeline)
            .is_some_and(|preds| preds.contains_key(predicate))
    }

    fn prototype(&self, timeline: &str, predicate: &str) -> BTreeMap<String, Domain> {
        self.predicates
            .get(timeline)
            .and_then(|preds| preds.get(predicate))
            .cloned()
            .unwrap_or_default()
    }

    // ── Token creation ─────────────────────────────────────────

    /// Records a fact holding at `now`. An unknown predicate falls back to
    /// the `undefined` representation; the flag tells the caller to warn.
    pub fn new_fact(&mut self, timeline: &str, predicate: &str, now: Tick) -> (TokenId, bool) {
        let undefined = !self.has_predicate(timeline, predicate);
        let (predicate, attributes) = if undefined {
            ("undefined".to_string(), BTreeMap::new())
        } else {
            (predicate.to_string(), self.prototype(timeline, predicate))
        };
        let scope = TemporalScope::new(
            TickInterval::singleton(now),
            TickInterval::at_least(1),
            TickInterval::at_least(now.saturating_add(1)),
        );
        let id = self.insert(timeline, predicate, attributes, scope, TokenKind::Fact, TokenState::Active);
        (id, undefined)
    }

    /// Creates a pending goal token with the declared attribute prototypes.
    pub fn new_goal(&mut self, timeline: &str, predicate: &str) -> TokenId {
        let attributes = self.prototype(timeline, predicate);
        self.insert(
            timeline,
            predicate.to_string(),
            attributes,
            TemporalScope::default(),
            TokenKind::Goal,
            TokenState::Pending,
        )
    }

    fn insert(
        &mut self,
        timeline: &str,
        predicate: String,
        attributes: BTreeMap<String, Domain>,
        scope: TemporalScope,
        kind: TokenKind,
        state: TokenState,
    ) -> TokenId {
        let id = TokenId(self.next_token);
        self.next_token += 1;
        self.tokens.insert(
            id,
            Token {
                id,
                timeline: timeline.to_string(),
                predicate,
                attributes,
                scope,
                kind,
                state,
            },
        );
        self.working.push(id);
        id
    }

    // ── Restriction ────────────────────────────────────────────

    /// Narrows the token's attributes to the incoming domains. Unknown
    /// attributes are skipped with a warning; a disjoint domain leaves the
    /// attribute untouched and flips the result. The token survives either
    /// way.
    pub fn restrict_token(&mut self, token: TokenId, attributes: &BTreeMap<String, Domain>) -> bool {
        let Some(tok) = self.tokens.get_mut(&token) else {
            return false;
        };
        let mut all_held = true;
        for (name, incoming) in attributes {
            match tok.attributes.get_mut(name) {
                None => {
                    warn!(
                        timeline = %tok.timeline,
                        predicate = %tok.predicate,
                        attribute = %name,
                        "ignoring unknown attribute"
                    );
                }
                Some(domain) => {
                    if let Err(err) = domain.restrict(incoming) {
                        warn!(
                            timeline = %tok.timeline,
                            predicate = %tok.predicate,
                            attribute = %name,
                            error = %err,
                            "failed to restrict attribute"
                        );
                        all_held = false;
                    }
                }
            }
        }
        all_held
    }

    /// Narrows the token's temporal scope. A failure leaves the scope
    /// untouched.
    pub fn restrict_token_time(&mut self, token: TokenId, scope: &TemporalScope) -> bool {
        let Some(tok) = self.tokens.get_mut(&token) else {
            return false;
        };
        match tok.scope.restrict_time(&scope.start, &scope.duration, &scope.end) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    timeline = %tok.timeline,
                    predicate = %tok.predicate,
                    error = %err,
                    "failed to restrict token time"
                );
                false
            }
        }
    }

    // ── Token lifecycle ────────────────────────────────────────

    /// Drops a token that was never admitted.
    pub fn discard(&mut self, token: TokenId) {
        self.remove(token, false);
    }

    /// The request backing this goal token was recalled; the token no
    /// longer needs satisfying.
    pub fn token_recalled(&mut self, token: TokenId) {
        debug!(%token, "goal token recalled");
        self.remove(token, false);
    }

    /// Unifies `token` with an existing entry: `token` is marked merged
    /// and `into` becomes (or stays) active.
    pub fn merge(&mut self, token: TokenId, into: TokenId) {
        if let Some(tok) = self.tokens.get_mut(&token) {
            tok.state = TokenState::Merged { into };
        }
        if let Some(tok) = self.tokens.get_mut(&into) {
            tok.state = TokenState::Active;
        }
    }

    /// Makes `token` the current state of `timeline`. The superseded
    /// token is marked completed and the change lands in the state-update
    /// delta.
    pub fn set_current(&mut self, timeline: &str, token: TokenId) {
        let previous = self.current.insert(timeline.to_string(), token);
        if previous == Some(token) {
            return;
        }
        if let Some(prev) = previous
            && let Some(tok) = self.tokens.get_mut(&prev)
            && !matches!(tok.state, TokenState::Merged { .. })
        {
            tok.state = TokenState::Completed;
        }
        self.state_updates.push(timeline.to_string());
    }

    /// Retires completed tokens and tokens whose scope ended before `now`.
    /// Returns the retired ids so the caller can release ledger entries.
    pub fn retire_past(&mut self, now: Tick) -> Vec<TokenId> {
        let done: Vec<TokenId> = self
            .tokens
            .values()
            .filter(|t| t.state == TokenState::Completed || t.ended_before(now))
            .map(|t| t.id)
            .collect();
        for id in &done {
            self.remove(*id, false);
        }
        done
    }

    /// Structural side of a relax. A scoped relax only touches backend
    /// search state; forgetting the past also drops every goal token and
    /// every fact that already ended. Dropped ids land in the drop delta.
    pub fn relax(&mut self, forget_past: bool, now: Tick) {
        if !forget_past {
            return;
        }
        let doomed: Vec<TokenId> = self
            .tokens
            .values()
            .filter(|t| t.kind == TokenKind::Goal || t.ended_before(now))
            .map(|t| t.id)
            .collect();
        debug!(dropped = doomed.len(), "forgetting past plan structure");
        for id in doomed {
            self.remove(id, true);
        }
    }

    fn remove(&mut self, id: TokenId, record_drop: bool) {
        if self.tokens.remove(&id).is_some() {
            self.current.retain(|_, cur| *cur != id);
            self.working.retain(|w| *w != id);
            if record_drop {
                self.dropped.push(id);
            }
        }
    }

    // ── Deliberation-facing queries ────────────────────────────

    /// Pending goal tokens on `timeline` whose start overlaps `window`.
    pub fn dispatchable(&self, timeline: &str, window: &TickInterval) -> Vec<TokenId> {
        self.tokens
            .values()
            .filter(|t| {
                t.kind == TokenKind::Goal
                    && t.state == TokenState::Pending
                    && t.timeline == timeline
            })
            .filter(|t| t.scope.start.intersect(window).is_some())
            .map(|t| t.id)
            .collect()
    }

    /// Merge targets of current tokens that were unified into an existing
    /// one. Their dispatch-ledger entries no longer need tracking.
    pub fn merged_current_tokens(&self) -> Vec<TokenId> {
        self.current
            .values()
            .filter_map(|id| self.tokens.get(id))
            .filter_map(|t| match t.state {
                TokenState::Merged { into } => Some(into),
                _ => None,
            })
            .collect()
    }

    pub fn goal_tokens_on(&self, timeline: &str) -> Vec<TokenId> {
        self.tokens
            .values()
            .filter(|t| t.kind == TokenKind::Goal && t.timeline == timeline)
            .map(|t| t.id)
            .collect()
    }

    pub fn current_token(&self, timeline: &str) -> Option<TokenId> {
        self.current.get(timeline).copied()
    }

    /// The current state of `timeline` as a publishable observation.
    pub fn current_observation(&self, timeline: &str) -> Option<Observation> {
        let token = self.tokens.get(self.current.get(timeline)?)?;
        let mut obs = Observation::new(token.timeline.as_str(), token.predicate.as_str());
        obs.attributes = token.attributes.clone();
        Some(obs)
    }

    // ── Deltas ─────────────────────────────────────────────────

    /// Timelines whose current token changed since the last drain.
    pub fn take_state_updates(&mut self) -> Vec<String> {
        let mut updates = std::mem::take(&mut self.state_updates);
        updates.dedup();
        updates
    }

    /// Tokens dropped by a relax since the last drain.
    pub fn take_dropped(&mut self) -> Vec<TokenId> {
        std::mem::take(&mut self.dropped)
    }

    /// Clears the synchronization working set. Runs on every synchronize
    /// exit.
    pub fn clear_working_set(&mut self) {
        self.working.clear();
    }

    /// Tokens created since the working set was last cleared.
    pub fn working_set(&self) -> &[TokenId] {
        &self.working
    }

    // ── Mission clock ──────────────────────────────────────────

    pub fn init_clock(&mut self, final_tick: Option<Tick>) {
        self.clock = match final_tick {
            Some(f) => TickInterval::bounded(0, f),
            None => TickInterval::at_least(0),
        };
    }

    /// Narrows the mission clock to `[now, final_tick]`. The clock only
    /// ever shrinks.
    pub fn restrict_clock(&mut self, now: Tick, final_tick: Option<Tick>) {
        let bound = match final_tick {
            Some(f) if now <= f => TickInterval::bounded(now, f),
            Some(_) => TickInterval::singleton(now),
            None => TickInterval::at_least(now),
        };
        if let Some(narrowed) = self.clock.intersect(&bound) {
            self.clock = narrowed;
        }
    }

    pub fn clock(&self) -> TickInterval {
        self.clock
    }

    // ── Lookups ────────────────────────────────────────────────

    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn snapshot(&self) -> PlanSnapshot {
        PlanSnapshot {
            clock: self.clock,
            tokens: self.tokens.values().cloned().collect(),
            current: self.current.clone(),
        }
    }
}

impl Default for PlanTable {
    fn default() -> Self {
        Self::new()
    }
}
