use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Accuracy/power trade-off passed through to the position source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Most accurate fix available, typically GPS.
    HighAccuracy,
    /// Block-level accuracy.
    #[default]
    Balanced,
    /// City-level accuracy.
    LowPower,
    /// Only fixes other clients already caused.
    Passive,
}

/// Parameters of one update subscription.
///
/// The controller never interprets these; they are handed unchanged to the
/// settings checker and the position source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRequest {
    /// Desired interval between updates.
    #[serde(default = "default_interval")]
    pub interval: Duration,
    /// Updates are never delivered faster than this.
    #[serde(default = "default_fastest_interval")]
    pub fastest_interval: Duration,
    /// Desired accuracy.
    #[serde(default)]
    pub priority: Priority,
}

const fn default_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

const fn default_fastest_interval() -> Duration {
    Duration::from_secs(10 * 60)
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            fastest_interval: default_fastest_interval(),
            priority: Priority::Balanced,
        }
    }
}

impl LocationRequest {
    /// Create a request with platform defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the update interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the fastest update interval.
    #[must_use]
    pub const fn with_fastest_interval(mut self, interval: Duration) -> Self {
        self.fastest_interval = interval;
        self
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}
