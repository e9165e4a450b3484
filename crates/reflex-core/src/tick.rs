use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete execution time. Ticks are global to a transaction graph and
/// advance monotonically.
pub type Tick = u64;

/// A distance in ticks (latencies, lookaheads, durations).
pub type TickSpan = u64;

/// A closed integer interval over ticks. An absent upper bound means the
/// interval extends to the infinite horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickInterval {
    pub lb: Tick,
    #[serde(default)]
    pub ub: Option<Tick>,
}

impl TickInterval {
    /// Interval with both bounds known. Callers must keep `lb <= ub`.
    pub const fn bounded(lb: Tick, ub: Tick) -> Self {
        debug_assert!(lb <= ub);
        TickInterval { lb, ub: Some(ub) }
    }

    /// Interval unbounded above.
    pub const fn at_least(lb: Tick) -> Self {
        TickInterval { lb, ub: None }
    }

    /// Interval holding exactly one tick.
    pub const fn singleton(tick: Tick) -> Self {
        TickInterval {
            lb: tick,
            ub: Some(tick),
        }
    }

    pub fn contains(&self, tick: Tick) -> bool {
        tick >= self.lb && self.ub.is_none_or(|ub| tick <= ub)
    }

    pub fn is_singleton(&self) -> bool {
        self.ub == Some(self.lb)
    }

    pub fn is_unbounded(&self) -> bool {
        self.ub.is_none()
    }

    /// Intersection of two intervals, `None` when they do not overlap.
    pub fn intersect(&self, other: &TickInterval) -> Option<TickInterval> {
        let lb = self.lb.max(other.lb);
        let ub = match (self.ub, other.ub) {
            (None, None) => None,
            (Some(a), None) | (None, Some(a)) => Some(a),
            (Some(a), Some(b)) => Some(a.min(b)),
        };
        match ub {
            Some(u) if u < lb => None,
            _ => Some(TickInterval { lb, ub }),
        }
    }

    /// Caps the upper bound at `cap`. An unbounded interval becomes bounded.
    pub fn clamp_ub(&self, cap: Tick) -> TickInterval {
        TickInterval {
            lb: self.lb,
            ub: Some(self.ub.map_or(cap, |ub| ub.min(cap))),
        }
    }
}

impl fmt::Display for TickInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ub {
            Some(ub) => write!(f, "[{}, {}]", self.lb, ub),
            None => write!(f, "[{}, +inf)", self.lb),
        }
    }
}
