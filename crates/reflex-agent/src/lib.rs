//! # reflex-agent
//!
//! Mission-level executive: the tick scheduler that drives a reactor graph,
//! the clocks that decide when ticks happen, an async runner with a handle
//! for injecting goals mid-mission, JSON plan archiving, and a passive
//! timeline recorder.
//!
//! A mission is assembled bottom-up: build an [`Agent`], attach reactors,
//! then either call [`Agent::step`] yourself or hand the agent to a
//! [`MissionRunner`] driven by a [`Clock`].

pub mod archive;
pub mod clock;
pub mod recorder;
pub mod runner;
pub mod scheduler;

pub use archive::JsonArchiver;
pub use clock::{Clock, IntervalClock, StepClock};
pub use recorder::{RecorderHandle, TimelineRecorder};
pub use runner::{MissionHandle, MissionRunner, Stimulus};
pub use scheduler::{Agent, TickFault, TickReport};
