//! # reflex-planner
//!
//! The deliberative layer of the Reflex executive: the plan table a
//! reactor keeps between ticks, the backend contract a planning engine
//! implements, the relax escalation that repairs an inconsistent plan, and
//! the [`DeliberativeReactor`] that ties them into the transaction
//! protocol. A mock backend makes the whole layer testable without a
//! solver.

pub mod backend;
pub mod deliberative;
pub mod mock;
pub mod plan;
pub mod recovery;

pub use backend::{PlannerBackend, SolverStatus};
pub use deliberative::{DeliberativeReactor, NullArchiver, PlanArchiver};
pub use mock::{BackendCall, MockPlanner};
pub use plan::{PlanSnapshot, PlanTable, Token, TokenKind, TokenState};
pub use recovery::RelaxOutcome;
