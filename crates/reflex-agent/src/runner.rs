//! Async mission runner.
//!
//! [`MissionRunner`] owns the agent for the duration of a mission and is the
//! only place ticks are triggered, so every reactor callback stays on one
//! task. External inputs arrive as [`Stimulus`] values through a
//! [`MissionHandle`] and join the tick after the next boundary.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use reflex_core::{Goal, GoalId, Recall};

use crate::clock::Clock;
use crate::scheduler::{Agent, TickReport};

/// An external input for a running mission.
#[derive(Debug)]
pub enum Stimulus {
    Goal(Goal),
    Recall(Recall),
}

/// Drives an [`Agent`] from a [`Clock`] until the mission horizon is reached
/// or the mission is cancelled, then hands the agent back for inspection.
pub struct MissionRunner {
    agent: Agent,
    clock: Box<dyn Clock>,
    stimuli: mpsc::Receiver<Stimulus>,
    cancel: CancellationToken,
    last_report: Arc<RwLock<Option<TickReport>>>,
}

impl MissionRunner {
    pub fn new(agent: Agent, clock: impl Clock + 'static) -> (Self, MissionHandle) {
        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let last_report = Arc::new(RwLock::new(None));
        let handle = MissionHandle {
            stimuli: tx,
            cancel: cancel.clone(),
            last_report: Arc::clone(&last_report),
        };
        let runner = MissionRunner {
            agent,
            clock: Box::new(clock),
            stimuli: rx,
            cancel,
            last_report,
        };
        (runner, handle)
    }

    /// Initializes the agent and runs the mission to completion. Returns the
    /// agent so callers can inspect final timeline and ledger state.
    pub async fn run(mut self) -> Agent {
        if let Err(err) = self.agent.initialize() {
            error!(error = %err, "mission aborted: initialization failed");
            self.cancel.cancel();
            return self.agent;
        }
        info!(tick_millis = self.clock.tick_millis(), "mission started");
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(tick = self.agent.now(), "mission cancelled");
                    break;
                }
                Some(stimulus) = self.stimuli.recv() => {
                    self.apply(stimulus);
                    while let Ok(next) = self.stimuli.try_recv() {
                        self.apply(next);
                    }
                }
                _ = self.clock.tick() => {
                    // Anything submitted before the boundary joins this tick.
                    while let Ok(next) = self.stimuli.try_recv() {
                        self.apply(next);
                    }
                    let report = self.agent.step();
                    debug!(
                        tick = report.tick,
                        synchronized = report.synchronized,
                        steps = report.deliberation_steps,
                        dispatched = report.dispatched_goals,
                        "tick complete"
                    );
                    if !report.faults.is_empty() {
                        warn!(tick = report.tick, faults = report.faults.len(), "tick degraded");
                    }
                    *self.last_report.write() = Some(report);
                    if self.agent.mission_complete() {
                        info!(tick = self.agent.now(), "mission horizon reached");
                        break;
                    }
                }
            }
        }
        self.cancel.cancel();
        self.agent
    }

    fn apply(&mut self, stimulus: Stimulus) {
        match stimulus {
            Stimulus::Goal(goal) => {
                if let Err(err) = self.agent.post_goal(goal) {
                    warn!(error = %err, "mission goal rejected");
                }
            }
            Stimulus::Recall(recall) => self.agent.post_recall(recall.id),
        }
    }
}

/// Cheap clonable handle for feeding and stopping a running mission.
#[derive(Clone)]
pub struct MissionHandle {
    stimuli: mpsc::Sender<Stimulus>,
    cancel: CancellationToken,
    last_report: Arc<RwLock<Option<TickReport>>>,
}

impl MissionHandle {
    /// Queues a goal for the next tick boundary. Returns its id, or `None`
    /// when the mission has already stopped.
    pub async fn post_goal(&self, goal: Goal) -> Option<GoalId> {
        let id = goal.id;
        self.stimuli.send(Stimulus::Goal(goal)).await.ok()?;
        Some(id)
    }

    pub async fn post_recall(&self, id: GoalId) {
        if self.stimuli.send(Stimulus::Recall(Recall::new(id))).await.is_err() {
            debug!(goal = %id, "recall ignored; mission already stopped");
        }
    }

    /// Asks the runner to stop at the next opportunity.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Report from the most recently executed tick.
    pub fn last_report(&self) -> Option<TickReport> {
        self.last_report.read().clone()
    }
}
