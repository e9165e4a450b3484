use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::schema::{ConfigError, ReflexConfig};

/// Loads the Reflex configuration. Timing parameters are fixed once a
/// mission is running, so the loader reads the file exactly once.
pub struct ConfigLoader {
    config: Arc<RwLock<ReflexConfig>>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > REFLEX_CONFIG env > ./reflex.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("REFLEX_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("reflex.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
                path: config_path.display().to_string(),
                source: e,
            })?;
            toml::from_str::<ReflexConfig>(&raw).map_err(|e| ConfigError::Parse {
                path: config_path.display().to_string(),
                reason: e.to_string(),
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            ReflexConfig::default()
        };

        // Apply environment variable overrides
        let config = Self::apply_env_overrides(config);

        // Validate: log warnings, fail on errors
        let warnings = config.validate()?;
        for w in &warnings {
            warn!("{}", w);
        }

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// Get a read snapshot of the current config.
    pub fn get(&self) -> ReflexConfig {
        self.config.read().clone()
    }

    /// Get a shared reference for handing to long-lived components.
    pub fn shared(&self) -> Arc<RwLock<ReflexConfig>> {
        Arc::clone(&self.config)
    }

    /// Path the config was read from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (REFLEX_FINAL_TICK, REFLEX_TICK_MILLIS, etc.)
    fn apply_env_overrides(mut config: ReflexConfig) -> ReflexConfig {
        if let Ok(v) = std::env::var("REFLEX_MISSION_NAME") {
            config.mission.name = v;
        }
        if let Ok(v) = std::env::var("REFLEX_FINAL_TICK")
            && let Ok(tick) = v.parse::<u64>()
        {
            config.mission.final_tick = Some(tick);
        }
        if let Ok(v) = std::env::var("REFLEX_TICK_MILLIS")
            && let Ok(millis) = v.parse::<u64>()
        {
            config.mission.tick_millis = millis;
        }
        if let Ok(v) = std::env::var("REFLEX_LOG_LEVEL") {
            config.logging.level = v;
        }
        config
    }
}
