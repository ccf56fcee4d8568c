//! Wall-clock budget shared by every component of a run.

use std::time::{Duration, Instant};

/// Caller-owned time budget, created once at the start of a run and passed
/// by reference to whatever needs to check or spend time.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    start: Instant,
    limit: Duration,
    finished: Option<Instant>,
}

impl TimeBudget {
    /// Start the clock with the given limit.
    pub fn new(limit: Duration) -> Self {
        Self {
            start: Instant::now(),
            limit,
            finished: None,
        }
    }

    /// Start the clock with a limit in seconds.
    pub fn from_secs_f64(seconds: f64) -> Self {
        Self::new(Duration::from_secs_f64(seconds.max(0.0)))
    }

    /// Budget without a practical limit.
    pub fn unlimited() -> Self {
        Self::new(Duration::from_secs(u64::MAX / 4))
    }

    /// Configured limit.
    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Time since the start (frozen once [`TimeBudget::finish`] was called).
    pub fn elapsed(&self) -> Duration {
        match self.finished {
            Some(end) => end.duration_since(self.start),
            None => self.start.elapsed(),
        }
    }

    /// Time left, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.elapsed())
    }

    /// True once no time is left.
    pub fn is_exhausted(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Instant at which the budget runs out.
    pub fn deadline(&self) -> Instant {
        self.start
            .checked_add(self.limit)
            .unwrap_or_else(|| self.start + Duration::from_secs(u32::MAX as u64))
    }

    /// Freeze the elapsed time at the current instant.
    pub fn finish(&mut self) {
        self.finished.get_or_insert_with(Instant::now);
    }
}
