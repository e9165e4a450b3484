//! Passive timeline recorder.
//!
//! [`TimelineRecorder`] observes a set of timelines and keeps the most recent
//! observation for each one. It owns nothing and never deliberates, so it can
//! be attached to any mission as a monitoring tap. State is shared through a
//! [`RecorderHandle`] that stays usable after the recorder moves into the
//! graph.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use reflex_core::Observation;
use reflex_transaction::{Reactor, TimelineDeclaration, TransactionContext};

type Latest = Arc<Mutex<BTreeMap<String, Observation>>>;

pub struct TimelineRecorder {
    name: String,
    timelines: Vec<String>,
    latest: Latest,
}

impl TimelineRecorder {
    pub fn new(
        name: impl Into<String>,
        timelines: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        TimelineRecorder {
            name: name.into(),
            timelines: timelines.into_iter().map(Into::into).collect(),
            latest: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Handle onto the recorded state, usable after the recorder is attached.
    pub fn handle(&self) -> RecorderHandle {
        RecorderHandle {
            latest: Arc::clone(&self.latest),
        }
    }
}

impl Reactor for TimelineRecorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn declarations(&self) -> Vec<TimelineDeclaration> {
        self.timelines
            .iter()
            .map(|t| TimelineDeclaration::observe(t.as_str()))
            .collect()
    }

    fn synchronize(&mut self, _ctx: &mut TransactionContext<'_>) -> bool {
        true
    }

    fn notify(&mut self, _ctx: &mut TransactionContext<'_>, obs: Observation) {
        debug!(
            reactor = %self.name,
            timeline = %obs.timeline,
            predicate = %obs.predicate,
            "state recorded"
        );
        self.latest.lock().insert(obs.timeline.clone(), obs);
    }
}

/// Read side of a [`TimelineRecorder`].
#[derive(Clone)]
pub struct RecorderHandle {
    latest: Latest,
}

impl RecorderHandle {
    /// Most recent observation on the timeline, if any arrived yet.
    pub fn latest(&self, timeline: &str) -> Option<Observation> {
        self.latest.lock().get(timeline).cloned()
    }

    /// Copy of the full state table.
    pub fn snapshot(&self) -> BTreeMap<String, Observation> {
        self.latest.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.lock().is_empty()
    }
}
