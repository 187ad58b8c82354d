use serde::{Deserialize, Serialize};

/// A single location fix supplied by a [`PositionSource`](crate::PositionSource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
    /// Altitude in meters above sea level, if available.
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Horizontal accuracy in meters, if available.
    #[serde(default)]
    pub horizontal_accuracy: Option<f64>,
    /// Vertical accuracy in meters, if available.
    #[serde(default)]
    pub vertical_accuracy: Option<f64>,
    /// Timestamp as Unix epoch milliseconds.
    pub timestamp: u64,
}

impl Position {
    /// A fix with only coordinates and a timestamp.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64, timestamp: u64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            horizontal_accuracy: None,
            vertical_accuracy: None,
            timestamp,
        }
    }

    /// Set the horizontal accuracy.
    #[must_use]
    pub const fn with_accuracy(mut self, meters: f64) -> Self {
        self.horizontal_accuracy = Some(meters);
        self
    }
}
