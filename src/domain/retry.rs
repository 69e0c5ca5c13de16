//! Retry policy for the data provider boundary.
//!
//! Retries live here and nowhere else: domain code never loops on its own,
//! it passes one policy object to the temporal gate. Timeouts are excluded
//! from retrying entirely; the gate maps them straight to no-data for the
//! round.

use std::time::Duration;

use crate::ports::data_port::ProviderFailure;

/// Bounded retry with a fixed backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            backoff: vec![
                Duration::from_millis(50),
                Duration::from_millis(200),
                Duration::from_millis(500),
            ],
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries. Used by tests and dry runs.
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            backoff: Vec::new(),
        }
    }

    /// Delay before retry attempt `attempt` (0-based). Past the end of the
    /// schedule the last entry repeats.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.backoff.is_empty() {
            return Duration::ZERO;
        }
        let idx = (attempt as usize).min(self.backoff.len() - 1);
        self.backoff[idx]
    }

    /// Run `call` under this policy. Transient failures are retried up to
    /// `max_attempts` total calls; a timeout aborts immediately.
    pub fn run<T, F>(&self, mut call: F) -> Result<T, ProviderFailure>
    where
        F: FnMut() -> Result<T, ProviderFailure>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last = None;
        for attempt in 0..attempts {
            match call() {
                Ok(value) => return Ok(value),
                Err(ProviderFailure::Timeout) => return Err(ProviderFailure::Timeout),
                Err(err @ ProviderFailure::Transient(_)) => {
                    last = Some(err);
                    if attempt + 1 < attempts {
                        std::thread::sleep(self.delay_for(attempt));
                    }
                }
            }
        }
        Err(last.unwrap_or_else(|| ProviderFailure::Transient("no attempts made".into())))
    }
}
