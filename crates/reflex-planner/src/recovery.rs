//! Plan repair when synchronization or deliberation proves the database
//! inconsistent.
//!
//! Repair runs in two stages. The scoped relax discards only solver search
//! state and retries; if that is not enough, the destructive relax also
//! forgets past plan structure (goal tokens and ended facts) before
//! retrying. A snapshot is archived before and after each attempt so a
//! failed mission leaves a trace worth reading.

use tracing::warn;

use reflex_core::Tick;

use crate::backend::PlannerBackend;
use crate::deliberative::PlanArchiver;
use crate::plan::PlanTable;

/// How far the escalation had to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxOutcome {
    /// The scoped relax restored consistency.
    Recovered,
    /// Only the destructive relax restored consistency; goal tokens were
    /// dropped and their requests must be recalled or discarded.
    ForgotPast,
    /// Neither relax restored consistency. The reactor is beyond repair.
    Unrecoverable,
}

/// One run of the relax escalation, borrowing the reactor's parts for the
/// duration of the repair.
pub(crate) struct RelaxSequence<'a, B: PlannerBackend> {
    pub(crate) backend: &'a mut B,
    pub(crate) plan: &'a mut PlanTable,
    pub(crate) archiver: &'a mut dyn PlanArchiver,
    pub(crate) reactor: &'a str,
    pub(crate) now: Tick,
}

impl<B: PlannerBackend> RelaxSequence<'_, B> {
    /// Runs the escalation. `resynchronize` re-checks each attempt against
    /// the current tick's facts; repairs during deliberation skip that and
    /// let the next tick's synchronization judge the result.
    pub(crate) fn run(mut self, resynchronize: bool) -> RelaxOutcome {
        if self.attempt(false, resynchronize) {
            return RelaxOutcome::Recovered;
        }
        warn!(
            reactor = %self.reactor,
            "scoped relax did not recover, forgetting past"
        );
        if self.attempt(true, resynchronize) {
            RelaxOutcome::ForgotPast
        } else {
            RelaxOutcome::Unrecoverable
        }
    }

    fn attempt(&mut self, forget_past: bool, resynchronize: bool) -> bool {
        self.archiver
            .archive(self.reactor, "failed", &self.plan.snapshot());
        self.plan.relax(forget_past, self.now);
        let relaxed = self.backend.relax(self.plan, forget_past, self.now);
        self.archiver
            .archive(self.reactor, "relax", &self.plan.snapshot());
        relaxed && (!resynchronize || self.backend.synchronize(self.plan, self.now))
    }
}
