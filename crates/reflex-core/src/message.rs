use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Domain;
use crate::error::DomainError;
use crate::tick::TickInterval;
use crate::types::GoalId;

/// Flexible placement of a token in time: `start + duration = end`, each an
/// integer-tick interval narrowed as planning and execution pin it down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalScope {
    pub start: TickInterval,
    pub duration: TickInterval,
    pub end: TickInterval,
}

impl Default for TemporalScope {
    fn default() -> Self {
        TemporalScope {
            start: TickInterval::at_least(0),
            duration: TickInterval::at_least(1),
            end: TickInterval::at_least(1),
        }
    }
}

impl TemporalScope {
    pub fn new(start: TickInterval, duration: TickInterval, end: TickInterval) -> Self {
        TemporalScope {
            start,
            duration,
            end,
        }
    }

    /// Unconstrained scope whose start must fall inside `window`.
    pub fn starting_in(window: TickInterval) -> Self {
        TemporalScope {
            start: window,
            ..TemporalScope::default()
        }
    }

    /// Intersects all three intervals with the given bounds, then runs one
    /// arithmetic pass over `start + duration = end`. An empty result fails
    /// and leaves `self` untouched.
    pub fn restrict_time(
        &mut self,
        start: &TickInterval,
        duration: &TickInterval,
        end: &TickInterval,
    ) -> Result<(), DomainError> {
        let mut s = self
            .start
            .intersect(start)
            .ok_or(DomainError::EmptyScope { field: "start" })?;
        let mut d = self
            .duration
            .intersect(duration)
            .ok_or(DomainError::EmptyScope { field: "duration" })?;
        let mut e = self
            .end
            .intersect(end)
            .ok_or(DomainError::EmptyScope { field: "end" })?;

        e.lb = e.lb.max(s.lb.saturating_add(d.lb));
        if let (Some(s_ub), Some(d_ub)) = (s.ub, d.ub) {
            let cap = s_ub.saturating_add(d_ub);
            e.ub = Some(e.ub.map_or(cap, |ub| ub.min(cap)));
        }
        if let Some(d_ub) = d.ub {
            s.lb = s.lb.max(e.lb.saturating_sub(d_ub));
        }
        if let Some(e_ub) = e.ub {
            if e_ub < d.lb {
                return Err(DomainError::EmptyScope { field: "start" });
            }
            let cap = e_ub - d.lb;
            s.ub = Some(s.ub.map_or(cap, |ub| ub.min(cap)));
        }
        if let Some(s_ub) = s.ub {
            d.lb = d.lb.max(e.lb.saturating_sub(s_ub));
        }
        if let Some(e_ub) = e.ub {
            if e_ub < s.lb {
                return Err(DomainError::EmptyScope { field: "duration" });
            }
            let cap = e_ub - s.lb;
            d.ub = Some(d.ub.map_or(cap, |ub| ub.min(cap)));
        }

        for (iv, field) in [(&s, "start"), (&d, "duration"), (&e, "end")] {
            if let Some(ub) = iv.ub
                && ub < iv.lb
            {
                return Err(DomainError::EmptyScope { field });
            }
        }

        self.start = s;
        self.duration = d;
        self.end = e;
        Ok(())
    }
}

/// A fact about the state of a timeline at the current tick. Observations
/// are immutable once posted; a later observation supersedes an earlier one,
/// it never retracts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timeline: String,
    pub predicate: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Domain>,
}

impl Observation {
    pub fn new(timeline: impl Into<String>, predicate: impl Into<String>) -> Self {
        Observation {
            timeline: timeline.into(),
            predicate: predicate.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, domain: Domain) -> Self {
        self.attributes.insert(name.into(), domain);
        self
    }
}

/// A desired future state on a timeline owned by another reactor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub timeline: String,
    pub predicate: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Domain>,
    #[serde(default)]
    pub scope: TemporalScope,
}

impl Goal {
    pub fn new(timeline: impl Into<String>, predicate: impl Into<String>) -> Self {
        Goal {
            id: Uuid::new_v4(),
            timeline: timeline.into(),
            predicate: predicate.into(),
            attributes: BTreeMap::new(),
            scope: TemporalScope::default(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, domain: Domain) -> Self {
        self.attributes.insert(name.into(), domain);
        self
    }

    pub fn with_scope(mut self, scope: TemporalScope) -> Self {
        self.scope = scope;
        self
    }

    /// Constrains the goal to start inside `window`.
    pub fn starting_in(mut self, window: TickInterval) -> Self {
        self.scope.start = window;
        self
    }
}

/// Cancels a previously posted goal. Recalling a goal that is unknown or
/// already resolved is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recall {
    pub id: GoalId,
}

impl Recall {
    pub fn new(id: GoalId) -> Self {
        Recall { id }
    }
}
