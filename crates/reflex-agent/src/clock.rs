//! Mission clocks.
//!
//! A [`Clock`] decides when tick boundaries happen; the scheduler itself has
//! no notion of wall time. Missions run on an [`IntervalClock`] in the field
//! and a [`StepClock`] in tests and batch replays.

use async_trait::async_trait;
use tokio::time::{interval, Duration, Interval, MissedTickBehavior};

use reflex_core::Tick;

/// Drives the tick boundary for a mission runner.
#[async_trait]
pub trait Clock: Send {
    /// Waits until the next tick boundary and returns how many boundaries
    /// have passed since the clock started.
    async fn tick(&mut self) -> Tick;

    /// Nominal tick length. Zero for free-running clocks.
    fn tick_millis(&self) -> u64;
}

/// Wall-clock driver with a fixed tick period.
///
/// The first boundary fires immediately. If the executive overruns a period,
/// missed boundaries are skipped rather than replayed in a burst, so the
/// tick counter tracks boundaries crossed, not wall time elapsed.
pub struct IntervalClock {
    interval: Interval,
    millis: u64,
    count: Tick,
}

impl IntervalClock {
    pub fn new(tick_millis: u64) -> Self {
        // A zero period would panic inside tokio::time::interval.
        let millis = tick_millis.max(1);
        let mut interval = interval(Duration::from_millis(millis));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        IntervalClock {
            interval,
            millis,
            count: 0,
        }
    }
}

#[async_trait]
impl Clock for IntervalClock {
    async fn tick(&mut self) -> Tick {
        self.interval.tick().await;
        self.count += 1;
        self.count
    }

    fn tick_millis(&self) -> u64 {
        self.millis
    }
}

/// Free-running clock: every boundary is ready as soon as it is polled.
#[derive(Debug, Default)]
pub struct StepClock {
    count: Tick,
}

impl StepClock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Clock for StepClock {
    async fn tick(&mut self) -> Tick {
        self.count += 1;
        self.count
    }

    fn tick_millis(&self) -> u64 {
        0
    }
}
