//! Mock planner backend for deterministic testing.
//!
//! Returns scripted results without doing any search. Queues pop front to
//! back; an empty queue falls back to the healthy default, so a fresh mock
//! synchronizes, propagates, and reports a complete plan forever.

use std::sync::{Arc, Mutex};

use reflex_core::{TemporalScope, Tick, TickInterval};
use reflex_transaction::DeliberationError;

use crate::backend::{PlannerBackend, SolverStatus};
use crate::plan::PlanTable;

/// One mutating backend call, as recorded by [`MockPlanner`]. Status
/// queries are not recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Synchronize { now: Tick },
    Relax { forget_past: bool },
    Propagate,
    Step { now: Tick },
    Clear,
}

/// A mock planner backend driven by scripted queues.
///
/// # Example
/// ```
/// use reflex_planner::mock::MockPlanner;
/// let planner = MockPlanner::new()
///     .with_sync_failures(1)
///     .with_flaws(2);
/// ```
pub struct MockPlanner {
    /// Track every mutating call in order (for assertions in tests).
    pub calls: Arc<Mutex<Vec<BackendCall>>>,
    sync_results: Arc<Mutex<Vec<bool>>>,
    relax_results: Arc<Mutex<Vec<bool>>>,
    propagate_results: Arc<Mutex<Vec<bool>>>,
    status_results: Arc<Mutex<Vec<SolverStatus>>>,
    step_results: Arc<Mutex<Vec<Result<SolverStatus, DeliberationError>>>>,
    flaws: Arc<Mutex<usize>>,
    subgoals: Arc<Mutex<Vec<(String, String, TickInterval)>>>,
    currents: Arc<Mutex<Vec<(String, String)>>>,
    merges: Arc<Mutex<Vec<String>>>,
}

fn pop<T>(queue: &Arc<Mutex<Vec<T>>>) -> Option<T> {
    let mut q = queue.lock().unwrap();
    if q.is_empty() { None } else { Some(q.remove(0)) }
}

fn pop_or<T>(queue: &Arc<Mutex<Vec<T>>>, default: T) -> T {
    pop(queue).unwrap_or(default)
}

impl MockPlanner {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(vec![])),
            sync_results: Arc::new(Mutex::new(vec![])),
            relax_results: Arc::new(Mutex::new(vec![])),
            propagate_results: Arc::new(Mutex::new(vec![])),
            status_results: Arc::new(Mutex::new(vec![])),
            step_results: Arc::new(Mutex::new(vec![])),
            flaws: Arc::new(Mutex::new(0)),
            subgoals: Arc::new(Mutex::new(vec![])),
            currents: Arc::new(Mutex::new(vec![])),
            merges: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Queue one synchronization result.
    pub fn with_sync_result(self, ok: bool) -> Self {
        self.sync_results.lock().unwrap().push(ok);
        self
    }

    /// Queue `count` failing synchronizations.
    pub fn with_sync_failures(self, count: usize) -> Self {
        self.sync_results
            .lock()
            .unwrap()
            .extend(std::iter::repeat_n(false, count));
        self
    }

    /// Queue `count` failing relaxations.
    pub fn with_relax_failures(self, count: usize) -> Self {
        self.relax_results
            .lock()
            .unwrap()
            .extend(std::iter::repeat_n(false, count));
        self
    }

    /// Queue `count` failing propagations.
    pub fn with_propagate_failures(self, count: usize) -> Self {
        self.propagate_results
            .lock()
            .unwrap()
            .extend(std::iter::repeat_n(false, count));
        self
    }

    /// Queue one status query result, overriding the flaw countdown.
    pub fn with_status(self, status: SolverStatus) -> Self {
        self.status_results.lock().unwrap().push(status);
        self
    }

    /// Queue one step result, overriding the flaw countdown.
    pub fn with_step_status(self, status: SolverStatus) -> Self {
        self.step_results.lock().unwrap().push(Ok(status));
        self
    }

    /// Queue one fatal step error.
    pub fn with_step_error(self, message: &str) -> Self {
        self.step_results
            .lock()
            .unwrap()
            .push(Err(DeliberationError::Failed(message.to_string())));
        self
    }

    /// Deliberation takes `count` steps before the plan is complete.
    pub fn with_flaws(self, count: usize) -> Self {
        *self.flaws.lock().unwrap() = count;
        self
    }

    /// A deliberation step creates a goal token on `timeline` whose start
    /// falls in `start`.
    pub fn with_subgoal(self, timeline: &str, predicate: &str, start: TickInterval) -> Self {
        self.subgoals.lock().unwrap().push((
            timeline.to_string(),
            predicate.to_string(),
            start,
        ));
        self
    }

    /// A successful synchronization records `predicate` as the current
    /// state of `timeline`.
    pub fn with_current(self, timeline: &str, predicate: &str) -> Self {
        self.currents
            .lock()
            .unwrap()
            .push((timeline.to_string(), predicate.to_string()));
        self
    }

    /// A successful synchronization merges the current token of `timeline`
    /// into a goal token on the same timeline, once both exist.
    pub fn with_merge_current(self, timeline: &str) -> Self {
        self.merges.lock().unwrap().push(timeline.to_string());
        self
    }

    /// Get all calls made to this backend.
    pub fn recorded_calls(&self) -> Arc<Mutex<Vec<BackendCall>>> {
        Arc::clone(&self.calls)
    }
}

impl Default for MockPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl PlannerBackend for MockPlanner {
    fn synchronize(&mut self, plan: &mut PlanTable, now: Tick) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::Synchronize { now });
        if !pop_or(&self.sync_results, true) {
            return false;
        }
        // Scripted merges wait until both tokens exist.
        {
            let mut merges = self.merges.lock().unwrap();
            if let Some(timeline) = merges.first().cloned()
                && let Some(current) = plan.current_token(&timeline)
                && let Some(goal) = plan
                    .goal_tokens_on(&timeline)
                    .into_iter()
                    .find(|t| *t != current)
            {
                plan.merge(current, goal);
                merges.remove(0);
            }
        }
        if let Some((timeline, predicate)) = pop(&self.currents) {
            let (token, _) = plan.new_fact(&timeline, &predicate, now);
            plan.set_current(&timeline, token);
        }
        true
    }

    fn relax(&mut self, _plan: &mut PlanTable, forget_past: bool, _now: Tick) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::Relax { forget_past });
        pop_or(&self.relax_results, true)
    }

    fn propagate(&mut self, _plan: &mut PlanTable, _now: Tick) -> bool {
        self.calls.lock().unwrap().push(BackendCall::Propagate);
        pop_or(&self.propagate_results, true)
    }

    fn status(&mut self, _plan: &PlanTable, _now: Tick) -> SolverStatus {
        if let Some(status) = pop(&self.status_results) {
            return status;
        }
        let busy =
            *self.flaws.lock().unwrap() > 0 || !self.subgoals.lock().unwrap().is_empty();
        if busy {
            SolverStatus::Working
        } else {
            SolverStatus::Complete
        }
    }

    fn step(&mut self, plan: &mut PlanTable, now: Tick) -> Result<SolverStatus, DeliberationError> {
        self.calls.lock().unwrap().push(BackendCall::Step { now });
        if let Some(result) = pop(&self.step_results) {
            return result;
        }
        if let Some((timeline, predicate, start)) = pop(&self.subgoals) {
            let token = plan.new_goal(&timeline, &predicate);
            plan.restrict_token_time(token, &TemporalScope::starting_in(start));
        }
        {
            let mut flaws = self.flaws.lock().unwrap();
            if *flaws > 0 {
                *flaws -= 1;
            }
        }
        let done =
            *self.flaws.lock().unwrap() == 0 && self.subgoals.lock().unwrap().is_empty();
        Ok(if done {
            SolverStatus::Complete
        } else {
            SolverStatus::Working
        })
    }

    fn clear(&mut self) {
        self.calls.lock().unwrap().push(BackendCall::Clear);
    }
}
