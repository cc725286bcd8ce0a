use instant::Duration;
use serde::{Deserialize, Serialize};

/// Progressive retry schedule with a hard cap on automatic attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    schedule: Vec<Duration>,
    max_attempts: u32,
}

impl RetryPolicy {
    pub const DEFAULT_SCHEDULE_MS: [u64; 3] = [2_000, 5_000, 10_000];
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub fn new(schedule: Vec<Duration>, max_attempts: u32) -> Self {
        Self {
            schedule,
            max_attempts,
        }
    }

    pub fn from_millis(schedule_ms: &[u64], max_attempts: u32) -> Self {
        Self::new(
            schedule_ms.iter().copied().map(Duration::from_millis).collect(),
            max_attempts,
        )
    }

    /// Delay before the retry following `attempt` (0-based); the last entry repeats
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.schedule
            .get(attempt as usize)
            .or_else(|| self.schedule.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_millis(&Self::DEFAULT_SCHEDULE_MS, Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// Retry bookkeeping for the live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryContext {
    pub attempt: u32,
    pub max_attempts: u32,
    pub scheduled_delay_ms: u64,
}

impl RetryContext {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            scheduled_delay_ms: 0,
        }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
        self.scheduled_delay_ms = 0;
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Claim the next automatic attempt.
    ///
    /// Returns the delay to wait, or `None` once the cap is reached. `attempt`
    /// never exceeds `max_attempts`.
    pub fn schedule(&mut self, policy: &RetryPolicy) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        let delay = policy.delay_for(self.attempt);
        self.attempt += 1;
        self.scheduled_delay_ms = delay.as_millis() as u64;
        Some(delay)
    }
}
