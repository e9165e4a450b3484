use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use reflex_core::ReactorId;

/// How a reactor relates to a timeline it declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineMode {
    /// Subscribe to observations and dispatch goals to the owner.
    External,
    /// Claim ownership: publish observations, admit goals from clients.
    Internal,
    /// Subscribe to observations only; never dispatch goals.
    Observe,
    /// Suppress the timeline entirely.
    Ignore,
    /// Keep the timeline out of the graph altogether.
    Private,
}

impl TimelineMode {
    /// Lenient parse used when loading reactor models. An unknown mode
    /// degrades to `Private` instead of failing the load; the bool is false
    /// when the input was unrecognized.
    pub fn parse_lenient(s: &str) -> (TimelineMode, bool) {
        match s.to_ascii_lowercase().as_str() {
            "external" => (TimelineMode::External, true),
            "internal" => (TimelineMode::Internal, true),
            "observe" => (TimelineMode::Observe, true),
            "ignore" => (TimelineMode::Ignore, true),
            "private" => (TimelineMode::Private, true),
            _ => (TimelineMode::Private, false),
        }
    }

    /// Whether this mode subscribes with the right to dispatch goals.
    pub fn dispatches_goals(&self) -> bool {
        matches!(self, TimelineMode::External)
    }

    /// Declaration precedence when a reactor names the same timeline twice.
    fn rank(&self) -> u8 {
        match self {
            TimelineMode::Internal => 4,
            TimelineMode::External => 3,
            TimelineMode::Observe => 2,
            TimelineMode::Ignore => 1,
            TimelineMode::Private => 0,
        }
    }
}

/// A timeline relationship declared by a reactor's model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineDeclaration {
    pub name: String,
    pub mode: TimelineMode,
}

impl TimelineDeclaration {
    pub fn new(name: impl Into<String>, mode: TimelineMode) -> Self {
        TimelineDeclaration {
            name: name.into(),
            mode,
        }
    }

    pub fn internal(name: impl Into<String>) -> Self {
        Self::new(name, TimelineMode::Internal)
    }

    pub fn external(name: impl Into<String>) -> Self {
        Self::new(name, TimelineMode::External)
    }

    pub fn observe(name: impl Into<String>) -> Self {
        Self::new(name, TimelineMode::Observe)
    }

    pub fn ignore(name: impl Into<String>) -> Self {
        Self::new(name, TimelineMode::Ignore)
    }
}

/// Collapses a reactor's declarations to one mode per timeline. When the
/// same timeline is named twice the stronger mode wins: Internal > External
/// > Observe > Ignore > Private.
pub(crate) fn resolve_declarations(
    reactor: &str,
    decls: Vec<TimelineDeclaration>,
) -> Vec<TimelineDeclaration> {
    let mut resolved: BTreeMap<String, TimelineMode> = BTreeMap::new();
    for decl in decls {
        match resolved.get(&decl.name) {
            Some(existing) if *existing == decl.mode => {}
            Some(existing) if existing.rank() >= decl.mode.rank() => {
                warn!(
                    reactor,
                    timeline = %decl.name,
                    kept = ?existing,
                    dropped = ?decl.mode,
                    "conflicting timeline declarations, keeping the stronger mode"
                );
            }
            Some(existing) => {
                warn!(
                    reactor,
                    timeline = %decl.name,
                    kept = ?decl.mode,
                    dropped = ?existing,
                    "conflicting timeline declarations, keeping the stronger mode"
                );
                resolved.insert(decl.name, decl.mode);
            }
            None => {
                resolved.insert(decl.name, decl.mode);
            }
        }
    }
    resolved
        .into_iter()
        .map(|(name, mode)| TimelineDeclaration { name, mode })
        .collect()
}

/// A reactor listening on a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub reactor: ReactorId,
    pub accepts_goals: bool,
}

/// Registry record for one timeline: at most one owner, any number of
/// subscribers.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub owner: Option<ReactorId>,
    pub subscribers: Vec<Subscription>,
}

impl Timeline {
    pub fn is_subscribed(&self, reactor: ReactorId) -> bool {
        self.subscribers.iter().any(|s| s.reactor == reactor)
    }

    pub fn accepts_goals_from(&self, reactor: ReactorId) -> bool {
        self.subscribers
            .iter()
            .any(|s| s.reactor == reactor && s.accepts_goals)
    }
}

/// The timeline registry. Owned by the transaction graph; edits are staged
/// on a clone so a failed attach leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct TimelineRegistry {
    timelines: BTreeMap<String, Timeline>,
}

impl TimelineRegistry {
    pub fn get(&self, name: &str) -> Option<&Timeline> {
        self.timelines.get(name)
    }

    pub fn owner(&self, name: &str) -> Option<ReactorId> {
        self.timelines.get(name).and_then(|t| t.owner)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.timelines.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Timeline)> {
        self.timelines.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// Claim ownership of a timeline. Err carries the current owner.
    pub(crate) fn claim(&mut self, name: &str, reactor: ReactorId) -> Result<(), ReactorId> {
        let tl = self.timelines.entry(name.to_string()).or_default();
        match tl.owner {
            Some(owner) if owner != reactor => Err(owner),
            _ => {
                tl.owner = Some(reactor);
                Ok(())
            }
        }
    }

    /// Subscribe a reactor, creating the timeline record when absent. A
    /// repeated subscription keeps the stronger goal right.
    pub(crate) fn subscribe(&mut self, name: &str, reactor: ReactorId, accepts_goals: bool) {
        let tl = self.timelines.entry(name.to_string()).or_default();
        match tl.subscribers.iter_mut().find(|s| s.reactor == reactor) {
            Some(sub) => sub.accepts_goals |= accepts_goals,
            None => tl.subscribers.push(Subscription {
                reactor,
                accepts_goals,
            }),
        }
    }

    /// Remove every relationship `reactor` holds. Returns the names of
    /// timelines that lost their owner while still having subscribers.
    pub(crate) fn remove_reactor(&mut self, reactor: ReactorId) -> Vec<String> {
        let mut orphaned = Vec::new();
        for (name, tl) in self.timelines.iter_mut() {
            if tl.owner == Some(reactor) {
                tl.owner = None;
                if !tl.subscribers.is_empty() {
                    orphaned.push(name.clone());
                }
            }
            tl.subscribers.retain(|s| s.reactor != reactor);
        }
        self.timelines
            .retain(|_, tl| tl.owner.is_some() || !tl.subscribers.is_empty());
        orphaned
    }

    /// Dependency edges (owner, subscriber, timeline) for order computation.
    pub(crate) fn dependency_edges(&self) -> Vec<(ReactorId, ReactorId, &str)> {
        let mut edges = Vec::new();
        for (name, tl) in &self.timelines {
            let Some(owner) = tl.owner else { continue };
            for sub in &tl.subscribers {
                edges.push((owner, sub.reactor, name.as_str()));
            }
        }
        edges
    }
}
