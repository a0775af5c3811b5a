use std::time::Duration;

use crate::error::HandlerError;

pub const POLL_INTERVAL_ENV: &str = "WAIT_POLL_INTERVAL_SECS";
pub const MIN_REMAINING_ENV: &str = "MIN_REMAINING_MILLIS";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MIN_REMAINING: Duration = Duration::from_millis(10_000);

/// Time left before the function invocation is cut off.
pub trait ExecutionBudget {
    fn remaining(&self) -> Duration;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerConfig {
    pub poll_interval: Duration,
    /// Below this much remaining time the wait loop hands off to a fresh
    /// invocation instead of polling again.
    pub min_remaining: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            min_remaining: DEFAULT_MIN_REMAINING,
        }
    }
}

impl HandlerConfig {
    pub fn from_env() -> Result<Self, HandlerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HandlerError> {
        let poll_interval = parse_u64(&lookup, POLL_INTERVAL_ENV)?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        let min_remaining = parse_u64(&lookup, MIN_REMAINING_ENV)?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MIN_REMAINING);

        if min_remaining <= poll_interval {
            return Err(HandlerError::Config(format!(
                "{MIN_REMAINING_ENV} ({} ms) must exceed {POLL_INTERVAL_ENV} ({} s) so a poll never sleeps past the deadline",
                min_remaining.as_millis(),
                poll_interval.as_secs()
            )));
        }

        Ok(Self {
            poll_interval,
            min_remaining,
        })
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>, HandlerError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|error| HandlerError::Config(format!("{key} must be an unsigned integer: {error}"))),
    }
}
