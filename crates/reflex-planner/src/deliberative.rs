//! The deliberative reactor: a [`Reactor`] that keeps an internal plan and
//! drives a [`PlannerBackend`] through the tick protocol.
//!
//! The reactor translates between the transaction layer and the planner.
//! Observations become fact tokens, admitted requests become goal tokens,
//! and at every tick start the tokens whose start window has come into
//! range are dispatched to the owners of external timelines. The reactor
//! also owns failure handling: a synchronization or deliberation failure
//! runs the relax escalation and recalls whatever commitments the repair
//! dropped.

use std::collections::BTreeSet;

use tracing::{debug, error, info, warn};

use reflex_core::{Goal, GoalId, Observation, Tick, TickSpan, Variable};
use reflex_transaction::{
    DeliberationError, GraphError, Reactor, TimelineDeclaration, TimelineMode,
    TransactionContext,
};

use crate::backend::{PlannerBackend, SolverStatus};
use crate::plan::{PlanSnapshot, PlanTable};
use crate::recovery::{RelaxOutcome, RelaxSequence};

/// Sink for plan snapshots taken at fixed points of the tick cycle: "tick"
/// at synchronization entry, "synch" at every synchronization exit,
/// "failed" and "relax" around each repair attempt, "plan" when a
/// deliberation round completes.
///
/// Archiving never fails a tick; implementations swallow and report their
/// own I/O problems.
pub trait PlanArchiver: Send {
    fn archive(&mut self, reactor: &str, label: &str, snapshot: &PlanSnapshot);
}

/// Archiver that drops every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullArchiver;

impl PlanArchiver for NullArchiver {
    fn archive(&mut self, _reactor: &str, _label: &str, _snapshot: &PlanSnapshot) {}
}

/// A planning reactor built around a [`PlannerBackend`].
pub struct DeliberativeReactor<B: PlannerBackend> {
    name: String,
    declarations: Vec<TimelineDeclaration>,
    owned: BTreeSet<String>,
    latency: TickSpan,
    lookahead: Option<TickSpan>,
    backend: B,
    plan: PlanTable,
    archiver: Box<dyn PlanArchiver>,
    /// Deliberation finished last round; the next tick start redistributes
    /// goals.
    completed: bool,
    steps: u64,
    now: Tick,
}

impl<B: PlannerBackend> DeliberativeReactor<B> {
    pub fn new(name: impl Into<String>, backend: B) -> Self {
        DeliberativeReactor {
            name: name.into(),
            declarations: Vec::new(),
            owned: BTreeSet::new(),
            latency: 0,
            lookahead: Some(1),
            backend,
            plan: PlanTable::new(),
            archiver: Box::new(NullArchiver),
            completed: false,
            steps: 0,
            now: 0,
        }
    }

    pub fn with_declaration(mut self, decl: TimelineDeclaration) -> Self {
        if decl.mode == TimelineMode::Internal {
            self.owned.insert(decl.name.clone());
        }
        self.declarations.push(decl);
        self
    }

    pub fn with_declarations(
        self,
        decls: impl IntoIterator<Item = TimelineDeclaration>,
    ) -> Self {
        decls.into_iter().fold(self, Self::with_declaration)
    }

    /// Declares a predicate and its attributes on a timeline of the model.
    pub fn with_predicate(
        mut self,
        timeline: impl Into<String>,
        predicate: impl Into<String>,
        attributes: impl IntoIterator<Item = Variable>,
    ) -> Self {
        self.plan.declare_predicate(
            timeline,
            predicate,
            attributes.into_iter().map(|v| (v.name, v.domain)),
        );
        self
    }

    pub fn with_latency(mut self, latency: TickSpan) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_lookahead(mut self, lookahead: Option<TickSpan>) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn with_archiver(mut self, archiver: impl PlanArchiver + 'static) -> Self {
        self.archiver = Box::new(archiver);
        self
    }

    pub fn plan(&self) -> &PlanTable {
        &self.plan
    }

    fn relax_sequence(&mut self, now: Tick) -> RelaxSequence<'_, B> {
        RelaxSequence {
            backend: &mut self.backend,
            plan: &mut self.plan,
            archiver: self.archiver.as_mut(),
            reactor: &self.name,
            now,
        }
    }

    fn synchronize_inner(&mut self, ctx: &mut TransactionContext<'_>) -> bool {
        let now = ctx.now();
        if !self.backend.synchronize(&mut self.plan, now) {
            warn!(
                reactor = %self.name,
                tick = now,
                "failed to synchronize, relaxing current plan"
            );
            let outcome = self.relax_sequence(now).run(true);
            self.flush_drops(ctx);
            if outcome == RelaxOutcome::Unrecoverable {
                return false;
            }
        }
        self.publish_state(ctx);
        self.backend.propagate(&mut self.plan, now)
    }

    /// Retires tokens the plan no longer carries: dispatched goals are
    /// silently released, admitted requests are discarded.
    fn retire_past(&mut self, ctx: &mut TransactionContext<'_>) {
        for token in self.plan.retire_past(ctx.now()) {
            if ctx.ledgers_mut().dispatched.erase_by_internal(token).is_some() {
                debug!(reactor = %self.name, %token, "released past dispatched goal");
            } else if let Some(goal) = ctx.ledgers_mut().active_requests.erase_by_internal(token)
            {
                info!(reactor = %self.name, goal = %goal.id, "discarded past request");
            }
        }
    }

    /// Drains the tokens a relax dropped. Dispatched goals are recalled,
    /// the commitment no longer stands; admitted requests are discarded.
    fn flush_drops(&mut self, ctx: &mut TransactionContext<'_>) {
        for token in self.plan.take_dropped() {
            if let Some(goal) = ctx.ledgers_mut().dispatched.erase_by_internal(token) {
                info!(reactor = %self.name, goal = %goal.id, %token, "recalling dropped goal");
                ctx.post_recall(goal.id);
            } else if let Some(goal) = ctx.ledgers_mut().active_requests.erase_by_internal(token)
            {
                info!(reactor = %self.name, goal = %goal.id, %token, "discarded request");
            }
        }
    }

    /// Stops tracking dispatched goals whose active token absorbed the
    /// current observation; the owner is already executing them.
    fn purge_merged(&mut self, ctx: &mut TransactionContext<'_>) {
        for token in self.plan.merged_current_tokens() {
            if ctx.ledgers_mut().dispatched.erase_by_internal(token).is_some() {
                debug!(reactor = %self.name, %token, "dispatched goal confirmed, releasing");
            }
        }
    }

    /// Posts goal tokens whose start window overlaps the current dispatch
    /// window of their external timeline. A token already dispatched is
    /// skipped; a failed post is not recorded and will be retried.
    fn dispatch_goals(&mut self, ctx: &mut TransactionContext<'_>) {
        for decl in &self.declarations {
            if !decl.mode.dispatches_goals() {
                continue;
            }
            let Some(window) = ctx.dispatch_window(&decl.name) else {
                continue;
            };
            for token in self.plan.dispatchable(&decl.name, &window) {
                if ctx.ledgers().dispatched.contains_internal(token) {
                    continue;
                }
                let Some(tok) = self.plan.token(token) else {
                    continue;
                };
                let mut goal = Goal::new(tok.timeline.as_str(), tok.predicate.as_str());
                goal.attributes = tok.attributes.clone();
                goal.scope = tok.scope.clone();
                match ctx.post_goal(goal.clone()) {
                    Ok(id) => {
                        info!(
                            reactor = %self.name,
                            timeline = %decl.name,
                            goal = %id,
                            %token,
                            "dispatched goal"
                        );
                        if let Err(err) = ctx.ledgers_mut().dispatched.record(token, goal) {
                            warn!(
                                reactor = %self.name,
                                error = %err,
                                "dispatch bookkeeping failed"
                            );
                        }
                    }
                    Err(err) => {
                        warn!(
                            reactor = %self.name,
                            timeline = %decl.name,
                            error = %err,
                            "failed to dispatch goal"
                        );
                    }
                }
            }
        }
    }

    /// Publishes the current token of every owned timeline whose state
    /// changed since the last drain.
    fn publish_state(&mut self, ctx: &mut TransactionContext<'_>) {
        for timeline in self.plan.take_state_updates() {
            if !self.owned.contains(&timeline) {
                continue;
            }
            if let Some(obs) = self.plan.current_observation(&timeline)
                && let Err(err) = ctx.post_observation(obs)
            {
                warn!(
                    reactor = %self.name,
                    timeline = %timeline,
                    error = %err,
                    "failed to publish state update"
                );
            }
        }
    }
}

impl<B: PlannerBackend> Reactor for DeliberativeReactor<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn declarations(&self) -> Vec<TimelineDeclaration> {
        self.declarations.clone()
    }

    fn latency(&self) -> TickSpan {
        self.latency
    }

    fn lookahead(&self) -> Option<TickSpan> {
        self.lookahead
    }

    fn handle_init(&mut self, ctx: &mut TransactionContext<'_>) -> Result<(), GraphError> {
        self.now = ctx.now();
        self.plan.init_clock(ctx.final_tick());
        Ok(())
    }

    fn handle_tick_start(&mut self, ctx: &mut TransactionContext<'_>) {
        self.now = ctx.now();
        self.plan.restrict_clock(ctx.now(), ctx.final_tick());
        self.retire_past(ctx);
        if self.completed {
            self.completed = false;
            self.purge_merged(ctx);
            self.dispatch_goals(ctx);
        }
    }

    fn synchronize(&mut self, ctx: &mut TransactionContext<'_>) -> bool {
        self.archiver
            .archive(&self.name, "tick", &self.plan.snapshot());
        let ok = self.synchronize_inner(ctx);
        // Cleanup runs on every exit path.
        self.plan.clear_working_set();
        self.archiver
            .archive(&self.name, "synch", &self.plan.snapshot());
        debug!(
            reactor = %self.name,
            tick = ctx.now(),
            tokens = self.plan.len(),
            "synchronization complete"
        );
        ok
    }

    fn has_work(&mut self) -> bool {
        match self.backend.status(&self.plan, self.now) {
            SolverStatus::Inconsistent => {
                error!(reactor = %self.name, "plan database is inconsistent");
                false
            }
            SolverStatus::Exhausted => {
                warn!(reactor = %self.name, "deliberation solver is exhausted");
                false
            }
            SolverStatus::Complete => {
                if !self.completed {
                    self.completed = true;
                    self.backend.clear();
                    if self.steps > 0 {
                        info!(
                            reactor = %self.name,
                            steps = self.steps,
                            "deliberation complete"
                        );
                        self.archiver
                            .archive(&self.name, "plan", &self.plan.snapshot());
                    }
                    self.steps = 0;
                }
                false
            }
            SolverStatus::Working => true,
        }
    }

    fn resume(&mut self, ctx: &mut TransactionContext<'_>) -> Result<(), DeliberationError> {
        let now = ctx.now();
        let status = if self.backend.propagate(&mut self.plan, now) {
            let status = self.backend.step(&mut self.plan, now)?;
            self.steps += 1;
            status
        } else {
            SolverStatus::Inconsistent
        };
        if !matches!(
            status,
            SolverStatus::Inconsistent | SolverStatus::Exhausted
        ) {
            return Ok(());
        }
        warn!(
            reactor = %self.name,
            steps = self.steps,
            status = ?status,
            "inconsistency found during deliberation, relaxing"
        );
        let outcome = self.relax_sequence(now).run(false);
        self.flush_drops(ctx);
        if outcome == RelaxOutcome::Unrecoverable {
            error!(reactor = %self.name, "unable to recover from plan inconsistency");
            return Err(DeliberationError::Unrecoverable);
        }
        Ok(())
    }

    fn notify(&mut self, ctx: &mut TransactionContext<'_>, obs: Observation) {
        let (token, undefined) = self.plan.new_fact(&obs.timeline, &obs.predicate, ctx.now());
        if undefined {
            warn!(
                reactor = %self.name,
                timeline = %obs.timeline,
                predicate = %obs.predicate,
                "unknown predicate, recorded as undefined"
            );
        } else if !self.plan.restrict_token(token, &obs.attributes) {
            error!(
                reactor = %self.name,
                timeline = %obs.timeline,
                predicate = %obs.predicate,
                "failed to restrict observation attributes"
            );
        }
        self.plan.set_current(&obs.timeline, token);
    }

    fn handle_request(&mut self, ctx: &mut TransactionContext<'_>, goal: Goal) {
        if !self.plan.has_predicate(&goal.timeline, &goal.predicate) {
            error!(
                reactor = %self.name,
                timeline = %goal.timeline,
                predicate = %goal.predicate,
                goal = %goal.id,
                "ignoring request with unknown predicate"
            );
            return;
        }
        let token = self.plan.new_goal(&goal.timeline, &goal.predicate);
        let attrs_ok = self.plan.restrict_token(token, &goal.attributes);
        let time_ok = self.plan.restrict_token_time(token, &goal.scope);
        if !(attrs_ok && time_ok) {
            error!(
                reactor = %self.name,
                goal = %goal.id,
                "failed to restrict request attributes, rejecting it"
            );
            self.plan.discard(token);
            return;
        }
        let id = goal.id;
        if let Err(err) = ctx.ledgers_mut().active_requests.record(token, goal) {
            error!(reactor = %self.name, goal = %id, error = %err, "rejecting request");
            self.plan.discard(token);
            return;
        }
        info!(reactor = %self.name, goal = %id, %token, "integrated request");
    }

    fn handle_recall(&mut self, ctx: &mut TransactionContext<'_>, id: GoalId) {
        if let Some(token) = ctx.ledgers_mut().active_requests.erase_by_external(id) {
            self.plan.token_recalled(token);
        }
    }
}
