//! # reflex-config
//!
//! Configuration system for the Reflex executive. Reads `reflex.toml` first,
//! then lets environment variables override it. Mission timing parameters
//! are fixed for the lifetime of a run; there is no hot reload.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    AgentSection, ArchiveSection, ConfigError, ConfigWarning, LoggingSection, MissionSection,
    ReflexConfig, WarningSeverity,
};
