//! Tick-synchronized mission scheduler.
//!
//! [`Agent`] owns the transaction graph and drives every attached reactor
//! through one tick cycle per [`Agent::step`] call: tick-start bookkeeping,
//! message delivery, synchronization, then round-robin deliberation under a
//! per-tick step budget. Everything inside a tick runs on the calling thread;
//! concurrency lives outside, in the runner that decides when ticks happen.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use reflex_config::ReflexConfig;
use reflex_core::{Goal, GoalId, ReactorId, Tick};
use reflex_transaction::{GraphError, Reactor, TransactionGraph};

/// A scheduling fault surfaced by [`Agent::step`].
///
/// Faults are degradations of the tick cycle itself, as opposed to reactor
/// failures, which remove the offending reactor and land in
/// [`TickReport::failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickFault {
    /// The deliberation budget ran out while the named reactor still had
    /// work. The remaining work carries over to the next tick.
    DeadlineOverrun { reactor: String },
}

/// Summary of a single executed tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: Tick,
    pub timestamp: DateTime<Utc>,
    /// Reactors that completed synchronization this tick.
    pub synchronized: usize,
    /// Reactors removed this tick after a synchronization or deliberation
    /// failure.
    pub failed: Vec<String>,
    /// Deliberation steps executed across all reactors.
    pub deliberation_steps: usize,
    /// Observations routed to observers this tick.
    pub observations: usize,
    /// Goals dispatched across timeline boundaries this tick.
    pub dispatched_goals: usize,
    /// Recalls routed this tick.
    pub recalled_goals: usize,
    pub faults: Vec<TickFault>,
}

/// The mission executive: a transaction graph plus the loop that drives it.
///
/// Reactors are attached before the mission starts, goals and recalls can be
/// injected at any point, and each [`step`](Agent::step) advances the clock
/// by exactly one tick. The agent never retries a failed reactor; a `false`
/// from synchronization or an error from deliberation detaches it and its
/// orphaned observers keep running on stale state.
pub struct Agent {
    graph: TransactionGraph,
    max_steps_per_tick: u32,
}

impl Agent {
    pub fn new(final_tick: Option<Tick>, max_steps_per_tick: u32) -> Self {
        Agent {
            graph: TransactionGraph::new(final_tick),
            max_steps_per_tick,
        }
    }

    /// Builds an agent from the `[mission]` and `[agent]` config sections.
    pub fn from_config(config: &ReflexConfig) -> Self {
        Self::new(config.mission.final_tick, config.agent.max_steps_per_tick)
    }

    /// Attaches a reactor. Fails if its declarations clash with timelines
    /// already owned or would create a dependency cycle. External timelines
    /// may be ownerless at attach; goals on them are dropped until an owner
    /// appears.
    pub fn add_reactor(&mut self, reactor: impl Reactor + 'static) -> Result<ReactorId, GraphError> {
        self.graph.attach(Box::new(reactor))
    }

    pub fn graph(&self) -> &TransactionGraph {
        &self.graph
    }

    pub fn now(&self) -> Tick {
        self.graph.now()
    }

    pub fn final_tick(&self) -> Option<Tick> {
        self.graph.final_tick()
    }

    /// True once the clock has reached the mission's final tick. Open-ended
    /// missions never complete on their own.
    pub fn mission_complete(&self) -> bool {
        self.graph
            .final_tick()
            .is_some_and(|last| self.graph.now() >= last)
    }

    /// Injects a mission goal; it is delivered to the owning reactor at the
    /// next tick boundary.
    pub fn post_goal(&mut self, goal: Goal) -> Result<GoalId, GraphError> {
        self.graph.submit_goal(goal)
    }

    pub fn post_recall(&mut self, id: GoalId) {
        self.graph.submit_recall(id);
    }

    /// Runs every reactor's init hook in dependency order. Must be called
    /// once, before the first tick.
    pub fn initialize(&mut self) -> Result<(), GraphError> {
        for id in self.graph.tick_order() {
            if let Some(result) = self.graph.run_init(id) {
                result?;
            }
        }
        info!(
            reactors = self.graph.len(),
            final_tick = ?self.graph.final_tick(),
            "agent initialized"
        );
        Ok(())
    }

    /// Executes one full tick and reports what happened.
    pub fn step(&mut self) -> TickReport {
        let tick = self.graph.advance_tick();
        let order = self.graph.tick_order();

        let mut report = TickReport {
            tick,
            timestamp: Utc::now(),
            synchronized: 0,
            failed: Vec::new(),
            deliberation_steps: 0,
            observations: 0,
            dispatched_goals: 0,
            recalled_goals: 0,
            faults: Vec::new(),
        };

        // Tick-start bookkeeping runs for every reactor before anything is
        // delivered, so goals dispatched at the boundary reach their owner
        // within this tick regardless of dependency order.
        for id in &order {
            let _ = self.graph.run_tick_start(*id);
        }

        for id in &order {
            if self.graph.deliver_pending(*id).is_none() {
                continue;
            }
            match self.graph.run_synchronize(*id) {
                Some(true) => report.synchronized += 1,
                Some(false) => {
                    if let Some(reactor) = self.graph.detach(*id) {
                        let name = reactor.name().to_string();
                        error!(reactor = %name, tick, "synchronization failed; reactor removed");
                        report.failed.push(name);
                    }
                }
                None => {}
            }
        }

        self.deliberate(&order, &mut report);

        let stats = self.graph.stats();
        report.observations = stats.observations;
        report.dispatched_goals = stats.goals;
        report.recalled_goals = stats.recalls;
        report
    }

    /// Round-robin deliberation: one resume per busy reactor per round, until
    /// nobody has work left or the tick budget runs out.
    fn deliberate(&mut self, order: &[ReactorId], report: &mut TickReport) {
        let mut budget = self.max_steps_per_tick;
        'rounds: loop {
            let mut busy = false;
            for id in order {
                if self.graph.run_has_work(*id) != Some(true) {
                    continue;
                }
                if budget == 0 {
                    let name = match self.graph.reactor_name(*id) {
                        Some(name) => name.to_string(),
                        None => id.to_string(),
                    };
                    warn!(
                        reactor = %name,
                        budget = self.max_steps_per_tick,
                        "deliberation budget exhausted with work remaining"
                    );
                    report
                        .faults
                        .push(TickFault::DeadlineOverrun { reactor: name });
                    break 'rounds;
                }
                busy = true;
                budget -= 1;
                match self.graph.run_resume(*id) {
                    Some(Ok(())) => report.deliberation_steps += 1,
                    Some(Err(err)) => {
                        if let Some(reactor) = self.graph.detach(*id) {
                            let name = reactor.name().to_string();
                            error!(reactor = %name, error = %err, "deliberation failed; reactor removed");
                            report.failed.push(name);
                        }
                    }
                    None => {}
                }
            }
            if !busy {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_defaults() {
        let agent = Agent::from_config(&ReflexConfig::default());
        assert_eq!(agent.now(), 0);
        assert_eq!(agent.final_tick(), None);
        assert!(!agent.mission_complete());
    }

    #[test]
    fn mission_complete_at_final_tick() {
        let mut agent = Agent::new(Some(2), 10);
        assert!(!agent.mission_complete());
        agent.step();
        assert!(!agent.mission_complete());
        let report = agent.step();
        assert_eq!(report.tick, 2);
        assert!(agent.mission_complete());
    }

    #[test]
    fn empty_graph_step_reports_nothing() {
        let mut agent = Agent::new(None, 10);
        let report = agent.step();
        assert_eq!(report.tick, 1);
        assert_eq!(report.synchronized, 0);
        assert!(report.failed.is_empty());
        assert!(report.faults.is_empty());
    }
}
