//! Traversal pacing and parallelism settings.
//!
//! Each setting carries a default and an inclusive range; `validate()`
//! rejects anything outside it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_STEP_DELAY_MS: u64 = 50;
pub const DEFAULT_PAUSE_POLL_MS: u64 = 10;
pub const DEFAULT_WORKERS: usize = 4;

const STEP_DELAY_RANGE: (u64, u64) = (0, 10_000);
const PAUSE_POLL_RANGE: (u64, u64) = (1, 1_000);
const WORKERS_RANGE: (u64, u64) = (1, 256);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Delay after each processed vertex (sequential) or level (parallel BFS),
    /// so an observer can follow the visit order. 0 runs unthrottled.
    pub step_delay_ms: u64,
    /// Upper bound on how long a paused worker sleeps before re-checking its
    /// flags when no wake-up arrives.
    pub pause_poll_ms: u64,
    /// Pool size for parallel BFS runs started by a session.
    pub workers: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: DEFAULT_STEP_DELAY_MS,
            pause_poll_ms: DEFAULT_PAUSE_POLL_MS,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl TraversalConfig {
    /// No pacing delay; for tests and benchmarks.
    pub fn unthrottled() -> Self {
        Self {
            step_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn with_step_delay_ms(mut self, ms: u64) -> Self {
        self.step_delay_ms = ms;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Parse a JSON object; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("step_delay_ms", self.step_delay_ms, STEP_DELAY_RANGE)?;
        check_range("pause_poll_ms", self.pause_poll_ms, PAUSE_POLL_RANGE)?;
        check_range("workers", self.workers as u64, WORKERS_RANGE)?;
        Ok(())
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }

    /// Sleep for one pacing step. No-op when unthrottled.
    pub(crate) fn pace(&self) {
        if self.step_delay_ms > 0 {
            std::thread::sleep(self.step_delay());
        }
    }
}

fn check_range(name: &'static str, value: u64, (min, max): (u64, u64)) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}
