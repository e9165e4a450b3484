//! The transaction graph: reactor slots, timeline ownership, message
//! routing, and goal-ledger custody.
//!
//! ```text
//!   submit_goal / submit_recall          (mission traffic)
//!          │
//!          ▼
//!   ┌─────────────────────────────────────────────┐
//!   │ TransactionGraph                            │
//!   │   registry: timeline → owner + subscribers  │
//!   │   entries:  inbox + ledgers per reactor     │
//!   │   reactors: Box<dyn Reactor> per slot       │
//!   └─────────────────────────────────────────────┘
//!          │ routed at callback exit
//!          ▼
//!   owner inbox (requests, recalls) / subscriber inboxes (observations)
//! ```
//!
//! All graph edits validate against a staged copy of the registry, so a
//! rejected attach leaves no trace.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use tracing::{debug, info, warn};

use reflex_core::{Goal, GoalId, Observation, ReactorId, Tick, TickInterval, TickSpan};

use crate::error::{DeliberationError, GraphError};
use crate::ledger::LedgerPair;
use crate::reactor::{Outbound, Reactor, TransactionContext, dispatch_window_for};
use crate::timeline::{TimelineMode, TimelineRegistry, resolve_declarations};

/// Counters for messages routed during the current tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingStats {
    pub observations: usize,
    pub goals: usize,
    pub recalls: usize,
}

#[derive(Debug, Default)]
struct Inbox {
    observations: VecDeque<Observation>,
    requests: VecDeque<Goal>,
    recalls: VecDeque<GoalId>,
}

impl Inbox {
    fn len(&self) -> usize {
        self.observations.len() + self.requests.len() + self.recalls.len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct ReactorEntry {
    name: String,
    latency: TickSpan,
    lookahead: Option<TickSpan>,
    inbound: Inbox,
    ledgers: LedgerPair,
}

/// Where a recall for a routed goal would go, and until when it could still
/// matter. A goal whose temporal scope has wholly passed can no longer be
/// active anywhere, so its route is pruned when the clock moves past
/// `expires`.
#[derive(Debug, Clone)]
struct RecallRoute {
    timeline: String,
    expires: Option<Tick>,
}

/// Owns the reactors, the timeline registry, per-reactor message queues,
/// and per-reactor goal ledgers. Single-threaded: one callback runs at a
/// time, and messages posted during a callback are routed when it returns.
pub struct TransactionGraph {
    reactors: BTreeMap<ReactorId, Box<dyn Reactor>>,
    entries: BTreeMap<ReactorId, ReactorEntry>,
    registry: TimelineRegistry,
    tick_order: Vec<ReactorId>,
    dispatch_index: HashMap<GoalId, RecallRoute>,
    stats: RoutingStats,
    now: Tick,
    final_tick: Option<Tick>,
    next_id: u64,
}

impl TransactionGraph {
    pub fn new(final_tick: Option<Tick>) -> Self {
        TransactionGraph {
            reactors: BTreeMap::new(),
            entries: BTreeMap::new(),
            registry: TimelineRegistry::default(),
            tick_order: Vec::new(),
            dispatch_index: HashMap::new(),
            stats: RoutingStats::default(),
            now: 0,
            final_tick,
            next_id: 0,
        }
    }

    // ── Graph edits ────────────────────────────────────────────

    /// Adds a reactor and applies its timeline declarations atomically:
    /// if any declaration is invalid or would create a dependency cycle,
    /// nothing takes effect.
    pub fn attach(&mut self, reactor: Box<dyn Reactor>) -> Result<ReactorId, GraphError> {
        let name = reactor.name().to_string();
        if self.entries.values().any(|e| e.name == name) {
            return Err(GraphError::InvalidGraph {
                reason: format!("duplicate reactor name '{name}'"),
            });
        }

        let id = ReactorId(self.next_id);
        let decls = resolve_declarations(&name, reactor.declarations());

        let mut staged = self.registry.clone();
        for decl in &decls {
            match decl.mode {
                TimelineMode::Internal => {
                    if let Err(owner) = staged.claim(&decl.name, id) {
                        return Err(GraphError::AlreadyOwned {
                            timeline: decl.name.clone(),
                            owner: self.reactor_name(owner).unwrap_or("<unknown>").to_string(),
                        });
                    }
                }
                TimelineMode::External => staged.subscribe(&decl.name, id, true),
                TimelineMode::Observe => staged.subscribe(&decl.name, id, false),
                TimelineMode::Ignore => {
                    debug!(reactor = %name, timeline = %decl.name, "timeline ignored");
                }
                TimelineMode::Private => {}
            }
        }

        let order = compute_tick_order(&staged, self.entries.keys().copied().chain([id]))?;

        self.registry = staged;
        self.tick_order = order;
        self.entries.insert(
            id,
            ReactorEntry {
                name: name.clone(),
                latency: reactor.latency(),
                lookahead: reactor.lookahead(),
                inbound: Inbox::default(),
                ledgers: LedgerPair::default(),
            },
        );
        self.reactors.insert(id, reactor);
        self.next_id += 1;
        info!(reactor = %name, %id, timelines = decls.len(), "reactor attached");
        Ok(id)
    }

    /// Removes a reactor, releasing its timelines. Subscribers of a
    /// timeline that loses its owner keep their subscriptions, but goals
    /// on it become undeliverable until a new owner attaches.
    pub fn detach(&mut self, id: ReactorId) -> Option<Box<dyn Reactor>> {
        let entry = self.entries.remove(&id)?;
        let reactor = self.reactors.remove(&id);
        let orphaned = self.registry.remove_reactor(id);
        // Recalls on a timeline without an owner have nowhere to go.
        let registry = &self.registry;
        self.dispatch_index
            .retain(|_, route| registry.owner(&route.timeline).is_some());
        for timeline in &orphaned {
            warn!(
                reactor = %entry.name,
                timeline = %timeline,
                "timeline lost its owner; goals on it are now undeliverable"
            );
        }
        // A subsequence of a valid tick order stays valid, no recompute.
        self.tick_order.retain(|r| *r != id);
        if !entry.inbound.is_empty() {
            debug!(
                reactor = %entry.name,
                dropped = entry.inbound.len(),
                "dropping undelivered messages"
            );
        }
        info!(reactor = %entry.name, %id, "reactor detached");
        reactor
    }

    // ── Clock ──────────────────────────────────────────────────

    /// Advances the graph clock and clears the per-tick routing counters.
    /// Recall routes for goals whose scope has wholly passed are pruned.
    pub fn advance_tick(&mut self) -> Tick {
        self.now += 1;
        self.stats = RoutingStats::default();
        let now = self.now;
        self.dispatch_index
            .retain(|_, route| route.expires.is_none_or(|e| e >= now));
        self.now
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    pub fn final_tick(&self) -> Option<Tick> {
        self.final_tick
    }

    /// Messages routed since the clock last advanced.
    pub fn stats(&self) -> RoutingStats {
        self.stats
    }

    /// Goal ids the graph can still route a recall for.
    pub fn routed_goals(&self) -> usize {
        self.dispatch_index.len()
    }

    // ── Mission traffic ────────────────────────────────────────

    /// Routes an externally supplied goal to the owner of its timeline.
    /// This is how mission goals enter the graph.
    pub fn submit_goal(&mut self, goal: Goal) -> Result<GoalId, GraphError> {
        let Some(tl) = self.registry.get(&goal.timeline) else {
            return Err(GraphError::InvalidTimeline {
                timeline: goal.timeline,
            });
        };
        if tl.owner.is_none() {
            return Err(GraphError::InvalidRequestObject {
                reactor: "agent".into(),
                timeline: goal.timeline,
            });
        }
        let id = goal.id;
        self.route_goal(goal);
        Ok(id)
    }

    /// Routes an externally supplied recall. Unknown goal ids are a no-op.
    pub fn submit_recall(&mut self, id: GoalId) {
        self.route_recall(id);
    }

    // ── Per-tick reactor operations ────────────────────────────
    //
    // Each returns None when the reactor is no longer attached, so a
    // scheduler iterating over a snapshot of the tick order can skip
    // reactors that were removed mid-tick.

    pub fn run_init(&mut self, id: ReactorId) -> Option<Result<(), GraphError>> {
        self.with_context(id, |r, ctx| r.handle_init(ctx))
    }

    pub fn run_tick_start(&mut self, id: ReactorId) -> Option<()> {
        self.with_context(id, |r, ctx| r.handle_tick_start(ctx))
    }

    /// Delivers every queued message to `id`: observations first, then
    /// goal requests, then recalls. Returns the number delivered.
    pub fn deliver_pending(&mut self, id: ReactorId) -> Option<usize> {
        let entry = self.entries.get_mut(&id)?;
        let inbox = std::mem::take(&mut entry.inbound);
        let count = inbox.len();
        for obs in inbox.observations {
            self.with_context(id, |r, ctx| r.notify(ctx, obs))?;
        }
        for goal in inbox.requests {
            self.with_context(id, |r, ctx| r.handle_request(ctx, goal))?;
        }
        for gid in inbox.recalls {
            self.with_context(id, |r, ctx| r.handle_recall(ctx, gid))?;
        }
        Some(count)
    }

    pub fn run_synchronize(&mut self, id: ReactorId) -> Option<bool> {
        self.with_context(id, |r, ctx| r.synchronize(ctx))
    }

    pub fn run_has_work(&mut self, id: ReactorId) -> Option<bool> {
        // has_work never touches the graph; skip the context plumbing.
        Some(self.reactors.get_mut(&id)?.has_work())
    }

    pub fn run_resume(&mut self, id: ReactorId) -> Option<Result<(), DeliberationError>> {
        self.with_context(id, |r, ctx| r.resume(ctx))
    }

    // ── Lookups ────────────────────────────────────────────────

    /// Ticks at which `id` may dispatch goals on `timeline`, computed for
    /// a (possibly future) `tick`.
    pub fn dispatch_window(
        &self,
        id: ReactorId,
        timeline: &str,
        tick: Tick,
    ) -> Option<TickInterval> {
        let entry = self.entries.get(&id)?;
        dispatch_window_for(
            &self.registry,
            id,
            entry.lookahead,
            self.now,
            self.final_tick,
            timeline,
            tick,
        )
    }

    pub fn tick_order(&self) -> Vec<ReactorId> {
        self.tick_order.clone()
    }

    pub fn reactor_name(&self, id: ReactorId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.name.as_str())
    }

    pub fn find_reactor(&self, name: &str) -> Option<ReactorId> {
        self.entries
            .iter()
            .find(|(_, e)| e.name == name)
            .map(|(id, _)| *id)
    }

    pub fn is_attached(&self, id: ReactorId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn registry(&self) -> &TimelineRegistry {
        &self.registry
    }

    /// Read access to a reactor's goal ledgers.
    pub fn ledgers(&self, id: ReactorId) -> Option<&LedgerPair> {
        self.entries.get(&id).map(|e| &e.ledgers)
    }

    /// Undelivered messages currently queued for `id`.
    pub fn pending_messages(&self, id: ReactorId) -> usize {
        self.entries.get(&id).map_or(0, |e| e.inbound.len())
    }

    // ── Internals ──────────────────────────────────────────────

    /// Runs one reactor callback with a context over this graph, then
    /// routes whatever the callback posted.
    fn with_context<R>(
        &mut self,
        id: ReactorId,
        f: impl FnOnce(&mut dyn Reactor, &mut TransactionContext<'_>) -> R,
    ) -> Option<R> {
        let now = self.now;
        let final_tick = self.final_tick;
        let reactor = self.reactors.get_mut(&id)?;
        let entry = self.entries.get_mut(&id)?;
        let mut outbox = Vec::new();
        let result = {
            let mut ctx = TransactionContext {
                reactor: id,
                name: &entry.name,
                now,
                final_tick,
                latency: entry.latency,
                lookahead: entry.lookahead,
                registry: &self.registry,
                ledgers: &mut entry.ledgers,
                outbox: &mut outbox,
            };
            f(reactor.as_mut(), &mut ctx)
        };
        self.route_outbox(outbox);
        Some(result)
    }

    fn route_outbox(&mut self, outbox: Vec<Outbound>) {
        for msg in outbox {
            match msg {
                Outbound::Observation(obs) => self.route_observation(obs),
                Outbound::Goal(goal) => self.route_goal(goal),
                Outbound::Recall(id) => self.route_recall(id),
            }
        }
    }

    fn route_observation(&mut self, obs: Observation) {
        let Some(tl) = self.registry.get(&obs.timeline) else {
            return;
        };
        let owner = tl.owner;
        let targets: Vec<ReactorId> = tl
            .subscribers
            .iter()
            .map(|s| s.reactor)
            .filter(|r| Some(*r) != owner)
            .collect();
        debug!(
            timeline = %obs.timeline,
            predicate = %obs.predicate,
            subscribers = targets.len(),
            "observation routed"
        );
        self.stats.observations += 1;
        for target in targets {
            if let Some(entry) = self.entries.get_mut(&target) {
                entry.inbound.observations.push_back(obs.clone());
            }
        }
    }

    fn route_goal(&mut self, goal: Goal) {
        let Some(owner) = self.registry.owner(&goal.timeline) else {
            warn!(goal = %goal.id, timeline = %goal.timeline, "goal on ownerless timeline dropped");
            return;
        };
        let expires = goal.scope.end.ub.or(self.final_tick);
        self.dispatch_index.insert(
            goal.id,
            RecallRoute {
                timeline: goal.timeline.clone(),
                expires,
            },
        );
        self.stats.goals += 1;
        debug!(goal = %goal.id, timeline = %goal.timeline, owner = %owner, "goal routed");
        if let Some(entry) = self.entries.get_mut(&owner) {
            entry.inbound.requests.push_back(goal);
        }
    }

    fn route_recall(&mut self, id: GoalId) {
        let Some(route) = self.dispatch_index.remove(&id) else {
            debug!(goal = %id, "recall for unknown goal ignored");
            return;
        };
        let timeline = route.timeline;
        let Some(owner) = self.registry.owner(&timeline) else {
            warn!(goal = %id, timeline = %timeline, "recall on ownerless timeline dropped");
            return;
        };
        self.stats.recalls += 1;
        debug!(goal = %id, timeline = %timeline, owner = %owner, "recall routed");
        if let Some(entry) = self.entries.get_mut(&owner) {
            entry.inbound.recalls.push_back(id);
        }
    }
}

/// Kahn's algorithm over owner → subscriber edges: owners synchronize
/// before their subscribers. Leftover nodes mean a dependency cycle.
fn compute_tick_order(
    registry: &TimelineRegistry,
    ids: impl Iterator<Item = ReactorId>,
) -> Result<Vec<ReactorId>, GraphError> {
    let nodes: Vec<ReactorId> = ids.collect();
    let mut indegree: BTreeMap<ReactorId, usize> = nodes.iter().map(|id| (*id, 0)).collect();
    let mut adjacency: BTreeMap<ReactorId, Vec<ReactorId>> = BTreeMap::new();

    let edges = registry.dependency_edges();
    for (owner, sub, timeline) in &edges {
        if owner == sub {
            return Err(GraphError::CycleDetected {
                timeline: timeline.to_string(),
            });
        }
        if !indegree.contains_key(owner) {
            continue;
        }
        if let Some(d) = indegree.get_mut(sub) {
            *d += 1;
            adjacency.entry(*owner).or_default().push(*sub);
        }
    }

    let mut ready: VecDeque<ReactorId> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(id) = ready.pop_front() {
        order.push(id);
        if let Some(next) = adjacency.get(&id) {
            for sub in next {
                if let Some(d) = indegree.get_mut(sub) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push_back(*sub);
                    }
                }
            }
        }
    }

    if order.len() < nodes.len() {
        let placed: BTreeSet<ReactorId> = order.iter().copied().collect();
        let timeline = edges
            .iter()
            .find(|(o, s, _)| !placed.contains(o) && !placed.contains(s))
            .map(|(_, _, t)| t.to_string())
            .unwrap_or_default();
        return Err(GraphError::CycleDetected { timeline });
    }
    Ok(order)
}
