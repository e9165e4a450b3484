//! # reflex-transaction
//!
//! The transaction layer of the Reflex executive: timelines and their
//! ownership modes, the reactor capability contract, the goal ledgers, and
//! the graph that routes observations, goal requests, and recalls between
//! reactors. Owners publish state on their timelines; subscribers observe
//! it and may dispatch goals back to the owner. The graph enforces single
//! ownership and acyclic dependencies, and keeps every reactor's inbound /
//! outbound goal ledgers.

pub mod error;
pub mod graph;
pub mod ledger;
pub mod reactor;
pub mod timeline;

pub use error::{DeliberationError, GraphError, ProtocolError};
pub use graph::{RoutingStats, TransactionGraph};
pub use ledger::{GoalLedger, LedgerPair};
pub use reactor::{Reactor, TransactionContext};
pub use timeline::{Subscription, Timeline, TimelineDeclaration, TimelineMode, TimelineRegistry};
