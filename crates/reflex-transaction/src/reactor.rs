use reflex_core::{Goal, GoalId, Observation, ReactorId, Tick, TickInterval, TickSpan};

use crate::error::{DeliberationError, GraphError};
use crate::ledger::LedgerPair;
use crate::timeline::{TimelineDeclaration, TimelineRegistry};

/// Messages buffered during a reactor callback, routed by the graph after
/// the callback returns.
#[derive(Debug)]
pub(crate) enum Outbound {
    Observation(Observation),
    Goal(Goal),
    Recall(GoalId),
}

/// Per-invocation view of the transaction graph handed to every reactor
/// callback. Posting is validated synchronously against the timeline
/// registry, then buffered; the graph routes buffered messages once the
/// callback returns.
pub struct TransactionContext<'g> {
    pub(crate) reactor: ReactorId,
    pub(crate) name: &'g str,
    pub(crate) now: Tick,
    pub(crate) final_tick: Option<Tick>,
    pub(crate) latency: TickSpan,
    pub(crate) lookahead: Option<TickSpan>,
    pub(crate) registry: &'g TimelineRegistry,
    pub(crate) ledgers: &'g mut LedgerPair,
    pub(crate) outbox: &'g mut Vec<Outbound>,
}

impl TransactionContext<'_> {
    /// The current tick.
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Last tick of the mission, None when open-ended.
    pub fn final_tick(&self) -> Option<Tick> {
        self.final_tick
    }

    pub fn latency(&self) -> TickSpan {
        self.latency
    }

    pub fn lookahead(&self) -> Option<TickSpan> {
        self.lookahead
    }

    pub fn reactor_id(&self) -> ReactorId {
        self.reactor
    }

    /// This reactor's name as registered in the graph.
    pub fn name(&self) -> &str {
        self.name
    }

    /// The tick range this reactor should plan over:
    /// `[now, min(now + latency + lookahead, final_tick)]`.
    pub fn plan_scope(&self) -> TickInterval {
        let horizon = self
            .lookahead
            .map(|la| self.now.saturating_add(self.latency).saturating_add(la));
        match (horizon, self.final_tick) {
            (Some(h), Some(f)) => TickInterval::bounded(self.now, h.min(f).max(self.now)),
            (Some(h), None) => TickInterval::bounded(self.now, h),
            (None, Some(f)) => TickInterval::bounded(self.now, f.max(self.now)),
            (None, None) => TickInterval::at_least(self.now),
        }
    }

    /// Ticks at which this reactor may currently dispatch goals on
    /// `timeline`. None when the timeline is unknown, the reactor is not a
    /// goal-dispatching subscriber, or the window is empty.
    pub fn dispatch_window(&self, timeline: &str) -> Option<TickInterval> {
        dispatch_window_for(
            self.registry,
            self.reactor,
            self.lookahead,
            self.now,
            self.final_tick,
            timeline,
            self.now,
        )
    }

    /// Publish a fact on a timeline this reactor owns.
    pub fn post_observation(&mut self, obs: Observation) -> Result<(), GraphError> {
        match self.registry.owner(&obs.timeline) {
            Some(owner) if owner == self.reactor => {
                self.outbox.push(Outbound::Observation(obs));
                Ok(())
            }
            _ if !self.registry.contains(&obs.timeline) => Err(GraphError::InvalidTimeline {
                timeline: obs.timeline,
            }),
            _ => Err(GraphError::InvalidPostObject {
                reactor: self.name.to_string(),
                timeline: obs.timeline,
            }),
        }
    }

    /// Dispatch a goal to the owner of an external timeline. Returns the
    /// goal's system-wide id for ledger bookkeeping.
    pub fn post_goal(&mut self, goal: Goal) -> Result<GoalId, GraphError> {
        let Some(tl) = self.registry.get(&goal.timeline) else {
            return Err(GraphError::InvalidTimeline {
                timeline: goal.timeline,
            });
        };
        if tl.owner.is_none() || !tl.accepts_goals_from(self.reactor) {
            return Err(GraphError::InvalidRequestObject {
                reactor: self.name.to_string(),
                timeline: goal.timeline,
            });
        }
        let id = goal.id;
        self.outbox.push(Outbound::Goal(goal));
        Ok(id)
    }

    /// Withdraw a previously dispatched goal. Recalls are forgiving by
    /// contract: an unknown or already resolved id is dropped downstream.
    pub fn post_recall(&mut self, id: GoalId) {
        self.outbox.push(Outbound::Recall(id));
    }

    /// This reactor's inbound / outbound goal ledgers.
    pub fn ledgers(&self) -> &LedgerPair {
        self.ledgers
    }

    pub fn ledgers_mut(&mut self) -> &mut LedgerPair {
        self.ledgers
    }
}

/// Shared dispatch-window formula: `[tick, tick + lookahead]` clipped to
/// `[now, final_tick]`; an unbounded upper end is clamped to the mission
/// final tick when one exists.
pub(crate) fn dispatch_window_for(
    registry: &TimelineRegistry,
    reactor: ReactorId,
    lookahead: Option<TickSpan>,
    now: Tick,
    final_tick: Option<Tick>,
    timeline: &str,
    tick: Tick,
) -> Option<TickInterval> {
    let tl = registry.get(timeline)?;
    if !tl.accepts_goals_from(reactor) {
        return None;
    }
    let base = match lookahead {
        Some(la) => TickInterval::bounded(tick, tick.saturating_add(la)),
        None => TickInterval::at_least(tick),
    };
    let horizon = match final_tick {
        Some(f) if now > f => return None,
        Some(f) => TickInterval::bounded(now, f),
        None => TickInterval::at_least(now),
    };
    base.intersect(&horizon)
}

/// The capability contract every reactor implements. The scheduler drives
/// all reactors through this one interface; no concrete reactor type gets
/// special treatment.
///
/// Per-tick call order for each reactor:
///
/// ```text
///   handle_tick_start
///     │  queued notify / handle_request / handle_recall
///     ▼
///   synchronize            false = hard failure, reactor is removed
///     │
///     ▼
///   has_work ──true──▶ resume   (round-robin until no reactor has work)
/// ```
pub trait Reactor: Send {
    /// Unique name within the graph.
    fn name(&self) -> &str;

    /// Timeline relationships this reactor wants. Applied atomically when
    /// the reactor is attached: either every declaration lands or none do.
    fn declarations(&self) -> Vec<TimelineDeclaration>;

    /// Ticks between dispatching a goal and the earliest tick the goal can
    /// take effect on this reactor's timelines.
    fn latency(&self) -> TickSpan {
        0
    }

    /// Planning horizon in ticks. None = unbounded; dispatch windows are
    /// then clamped to the mission final tick.
    fn lookahead(&self) -> Option<TickSpan> {
        Some(1)
    }

    /// One-time setup after the reactor joins the graph.
    fn handle_init(&mut self, _ctx: &mut TransactionContext<'_>) -> Result<(), GraphError> {
        Ok(())
    }

    /// Start-of-tick bookkeeping. Goal dispatching happens here.
    fn handle_tick_start(&mut self, _ctx: &mut TransactionContext<'_>) {}

    /// Reconcile internal state with the observations received for the
    /// current tick. Returning false is a hard failure: the scheduler
    /// removes this reactor from the graph and does not retry.
    fn synchronize(&mut self, ctx: &mut TransactionContext<'_>) -> bool;

    /// Whether deliberation still has work to do this tick.
    fn has_work(&mut self) -> bool {
        false
    }

    /// Run one bounded deliberation step. A fatal error removes the
    /// reactor from the graph.
    fn resume(&mut self, _ctx: &mut TransactionContext<'_>) -> Result<(), DeliberationError> {
        Ok(())
    }

    /// An observation arrived on a subscribed timeline.
    fn notify(&mut self, _ctx: &mut TransactionContext<'_>, _obs: Observation) {}

    /// A client posted a goal on a timeline this reactor owns.
    fn handle_request(&mut self, _ctx: &mut TransactionContext<'_>, _goal: Goal) {}

    /// A client recalled a goal it posted earlier. Unknown ids are a no-op.
    fn handle_recall(&mut self, _ctx: &mut TransactionContext<'_>, _id: GoalId) {}
}
