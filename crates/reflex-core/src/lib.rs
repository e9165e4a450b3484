//! # reflex-core
//!
//! Core types for the Reflex reactive executive. This crate defines the
//! shared vocabulary used by every other crate in the workspace: ticks and
//! tick intervals, restrictable value domains, and the observation / goal /
//! recall messages that reactors exchange over timelines.

pub mod domain;
pub mod error;
pub mod message;
pub mod tick;
pub mod types;

pub use domain::{Domain, DomainKind, Restriction, Variable};
pub use error::DomainError;
pub use message::{Goal, Observation, Recall, TemporalScope};
pub use tick::{Tick, TickInterval, TickSpan};
pub use types::*;
