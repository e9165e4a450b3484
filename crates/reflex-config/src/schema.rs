use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use reflex_core::{Tick, TickSpan};

/// Errors raised while locating, parsing, or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("configuration errors:\n  {0}")]
    Invalid(String),
}

/// Root configuration, maps to `reflex.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflexConfig {
    pub mission: MissionSection,
    pub agent: AgentSection,
    pub archive: ArchiveSection,
    pub logging: LoggingSection,
}

// ── Mission ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionSection {
    /// Mission name, used in log output and archive paths.
    pub name: String,
    /// Last tick of the mission. None = open-ended; goal horizons that
    /// would otherwise be infinite are clamped to this tick.
    pub final_tick: Option<Tick>,
    /// Wall-clock duration of one tick in milliseconds.
    pub tick_millis: u64,
}

impl Default for MissionSection {
    fn default() -> Self {
        Self {
            name: "mission".into(),
            final_tick: None,
            tick_millis: 1000,
        }
    }
}

// ── Agent ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// Default execution latency (in ticks) for reactors that do not set
    /// their own: how long a dispatched goal takes to start influencing
    /// the owner's timeline.
    pub latency: TickSpan,
    /// Default planning lookahead (in ticks). None = unbounded; dispatch
    /// windows then extend to the mission final tick.
    pub lookahead: Option<TickSpan>,
    /// Upper bound on deliberation steps executed across all reactors in a
    /// single tick before the scheduler reports a deadline fault.
    pub max_steps_per_tick: u32,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            latency: 0,
            lookahead: Some(1),
            max_steps_per_tick: 200,
        }
    }
}

// ── Archive ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSection {
    /// Write plan snapshots to disk at tick, synchronization, relax, and
    /// failure points.
    pub enabled: bool,
    /// Directory receiving snapshot files.
    pub directory: PathBuf,
}

impl Default for ArchiveSection {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from("reflex-archive"),
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
    /// Log file path (None = stdout only).
    pub file: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
            file: None,
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, " ({})", h)?;
        }
        Ok(())
    }
}

impl ReflexConfig {
    /// Validate the config and return a list of warnings.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        let mut warnings = Vec::new();

        // ── Tick cadence ───
        if self.mission.tick_millis == 0 {
            warnings.push(ConfigWarning {
                field: "mission.tick_millis".into(),
                message: "tick duration is zero; the clock cannot advance".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 1000 for one-second ticks".into()),
            });
        }

        // ── Mission horizon ───
        if self.mission.final_tick == Some(0) {
            warnings.push(ConfigWarning {
                field: "mission.final_tick".into(),
                message: "final tick is 0; the mission ends before it starts".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to a positive tick, or omit for an open-ended mission".into()),
            });
        }

        // ── Lookahead ───
        if self.agent.lookahead == Some(0) {
            warnings.push(ConfigWarning {
                field: "agent.lookahead".into(),
                message: "lookahead 0 means reactors can only dispatch goals for the current tick"
                    .into(),
                severity: WarningSeverity::Warning,
                hint: None,
            });
        }
        if self.agent.lookahead.is_none() && self.mission.final_tick.is_none() {
            warnings.push(ConfigWarning {
                field: "agent.lookahead".into(),
                message: "unbounded lookahead on an open-ended mission: dispatch windows have \
                          no upper bound"
                    .into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set agent.lookahead or mission.final_tick".into()),
            });
        }

        // ── Step budget ───
        if self.agent.max_steps_per_tick == 0 {
            warnings.push(ConfigWarning {
                field: "agent.max_steps_per_tick".into(),
                message: "step budget is 0; deliberation can never run".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set to e.g. 200".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors.join("\n  ")));
        }

        Ok(warnings)
    }
}
