//! Contract between a deliberative reactor and the planner that does its
//! thinking.
//!
//! The reactor owns the [`PlanTable`] and the tick-synchronous protocol;
//! the backend owns search. Every call hands the backend the table and the
//! current tick so it can read facts, merge or activate goal tokens, and
//! record the refinements it makes.

use reflex_transaction::DeliberationError;

use reflex_core::Tick;

use crate::plan::PlanTable;

/// What the solver reports about the current plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// Flaws remain; deliberation should continue.
    Working,
    /// No flaws remain; the plan covers the planning horizon.
    Complete,
    /// The plan database is contradictory.
    Inconsistent,
    /// The search space is exhausted without a plan.
    Exhausted,
}

/// A planning engine driven by a deliberative reactor.
///
/// All methods are synchronous and must stay bounded: `step` performs one
/// unit of search, never a full solve. Backends signal recoverable trouble
/// through return values ([`SolverStatus`], `false`); `Err` from `step` is
/// fatal and removes the reactor from the graph.
pub trait PlannerBackend: Send {
    /// Reconciles the executing plan with the facts recorded for `now`:
    /// merges matching goal tokens, activates what execution confirms, and
    /// updates each internal timeline's current token. Returns false when
    /// no consistent reconciliation exists.
    fn synchronize(&mut self, plan: &mut PlanTable, now: Tick) -> bool;

    /// Discards search state after the table's structural relax has run.
    /// `forget_past` marks the destructive variant: past structure is gone
    /// and the backend must not rebuild on top of it. Returns false when
    /// even the relaxed database cannot be made consistent.
    fn relax(&mut self, plan: &mut PlanTable, forget_past: bool, now: Tick) -> bool;

    /// Folds outside restrictions into the plan. Returns false when
    /// propagation proves the database inconsistent.
    fn propagate(&mut self, plan: &mut PlanTable, now: Tick) -> bool;

    /// Current solver verdict without performing search.
    fn status(&mut self, plan: &PlanTable, now: Tick) -> SolverStatus;

    /// One bounded unit of search.
    fn step(&mut self, plan: &mut PlanTable, now: Tick) -> Result<SolverStatus, DeliberationError>;

    /// Drops accumulated search state after a completed deliberation
    /// round. The plan itself is untouched.
    fn clear(&mut self);
}
