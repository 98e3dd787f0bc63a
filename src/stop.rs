//! Stops: named waypoints with a scheduled time and a geographic position.
//!
//! A stop is immutable once it is part of a route. The scheduled time is a
//! display string in `HH:MM` form; it is carried verbatim and never parsed
//! or enforced against wall-clock time.

use serde::{Deserialize, Serialize};

/// A geographic position (latitude, longitude).
///
/// On the wire a position is a two-element array `[lat, lon]`, matching the
/// observation contract.
///
/// # Examples
///
/// ```
/// use fleetsim::Position;
///
/// let p = Position::new(22.5941, 88.2676);
/// assert_eq!(<[f64; 2]>::from(p), [22.5941, 88.2676]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Position {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Position {
    /// Creates a position from decimal-degree coordinates.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<[f64; 2]> for Position {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<Position> for [f64; 2] {
    fn from(p: Position) -> Self {
        [p.latitude, p.longitude]
    }
}

/// A named waypoint on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    /// Display name of the stop.
    pub name: String,

    /// Scheduled arrival time as an `HH:MM` display string. Not validated.
    pub scheduled_time: String,

    /// Geographic position of the stop.
    pub position: Position,
}

impl Stop {
    /// Creates a stop.
    #[must_use]
    pub fn new(name: impl Into<String>, scheduled_time: impl Into<String>, position: Position) -> Self {
        Self {
            name: name.into(),
            scheduled_time: scheduled_time.into(),
            position,
        }
    }
}
