//! Execution time budget
//!
//! The crawl loop asks the budget for the remaining time before every fetch
//! attempt and stops once it drops below its safety margin.

use std::time::{Duration, Instant};

/// Source of "time left before forced termination"
pub trait TimeBudget: Send + Sync {
    fn remaining(&self) -> Duration;
}

/// A budget that expires at a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn at(at: Instant) -> Self {
        Self { at }
    }
}

impl TimeBudget for Deadline {
    fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}
