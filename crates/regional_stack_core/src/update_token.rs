//! Forced-update tokens.
//!
//! The deployment engine only re-invokes a custom resource handler when a
//! child's properties differ from the previous deployment. Every generation
//! run stamps one fresh token on all children, so every run re-provisions
//! every region even when nothing else changed.

use std::fmt;

use serde::{Serialize, Serializer};

/// Source of the wall-clock reading a token is taken from.
pub trait UpdateClock {
    fn unix_seconds(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl UpdateClock for SystemClock {
    fn unix_seconds(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock pinned to one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i64);

impl UpdateClock for FixedClock {
    fn unix_seconds(&self) -> i64 {
        self.0
    }
}

/// Emitted as a string property, which is how stack parameters travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForceUpdateToken(i64);

impl ForceUpdateToken {
    /// Samples the clock once; callers share the result across a whole run.
    pub fn issue(clock: &dyn UpdateClock) -> Self {
        Self(clock.unix_seconds())
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// A child carrying a different token than its previous deployment is
    /// always treated as changed by the engine.
    pub fn forces_update_over(self, previous: ForceUpdateToken) -> bool {
        self != previous
    }
}

impl fmt::Display for ForceUpdateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ForceUpdateToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
