//! Plan snapshot archiving.
//!
//! [`JsonArchiver`] writes one pretty-printed JSON file per snapshot into a
//! mission archive directory. File names carry a sequence number, so a
//! directory listing reads as a chronological trace of the reactor's
//! deliberation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use reflex_config::ArchiveSection;
use reflex_planner::{PlanArchiver, PlanSnapshot};

#[derive(Serialize)]
struct SnapshotRecord<'a> {
    reactor: &'a str,
    label: &'a str,
    recorded_at: DateTime<Utc>,
    plan: &'a PlanSnapshot,
}

/// Archives plan snapshots as JSON files.
///
/// Archiving is best effort: an unwritable directory downgrades to a warning
/// instead of failing the mission.
pub struct JsonArchiver {
    directory: PathBuf,
    sequence: u64,
}

impl JsonArchiver {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        JsonArchiver {
            directory: directory.into(),
            sequence: 0,
        }
    }

    /// Built from the `[archive]` config section; `None` when disabled.
    pub fn from_config(archive: &ArchiveSection) -> Option<Self> {
        archive
            .enabled
            .then(|| Self::new(archive.directory.clone()))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn write_snapshot(
        &self,
        reactor: &str,
        label: &str,
        snapshot: &PlanSnapshot,
    ) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.directory)
            .with_context(|| format!("creating {}", self.directory.display()))?;
        let record = SnapshotRecord {
            reactor,
            label,
            recorded_at: Utc::now(),
            plan: snapshot,
        };
        let path = self
            .directory
            .join(format!("{:06}-{reactor}-{label}.json", self.sequence));
        fs::write(&path, serde_json::to_vec_pretty(&record)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

impl PlanArchiver for JsonArchiver {
    fn archive(&mut self, reactor: &str, label: &str, snapshot: &PlanSnapshot) {
        self.sequence += 1;
        match self.write_snapshot(reactor, label, snapshot) {
            Ok(path) => debug!(reactor, label, path = %path.display(), "plan snapshot archived"),
            Err(err) => warn!(reactor, label, error = %err, "failed to archive plan snapshot"),
        }
    }
}
