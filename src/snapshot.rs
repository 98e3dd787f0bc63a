//! Derived, read-only views of vehicle state.
//!
//! Snapshots are computed fresh from the live simulation record on every
//! request and handed to observers by value. The presentation layer renders
//! these; it never touches the mutable state behind them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stop::{Position, Stop};
use crate::vehicle::VehicleId;

/// Status message shown while the bus is running.
pub const MESSAGE_RUNNING: &str = "Bus is running";

/// Status message shown while the bus is stopped.
pub const MESSAGE_STOPPED: &str = "Bus is stopped";

/// A point-in-time view of one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSnapshot {
    /// The vehicle's stable identifier.
    pub id: VehicleId,

    /// Display name ("Salt Lake Express").
    pub name: String,

    /// Human-readable route label ("Sealdah → Salt Lake").
    pub route_label: String,

    /// Whether the vehicle advances on ticks.
    pub is_running: bool,

    /// The stop the vehicle is currently at.
    pub current_stop: Stop,

    /// The stop the vehicle will reach on the next tick. For a single-stop
    /// route this equals `current_stop`.
    pub next_stop: Stop,

    /// Current geographic position (the current stop's position).
    pub position: Position,

    /// When this snapshot was derived.
    pub generated_at: DateTime<Utc>,
}

/// The served single-vehicle status body.
///
/// Field names (camelCase on the wire) and message strings are the
/// client-visible contract:
/// `{isRunning, busName, currentLocation, route, message}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusStatus {
    /// Whether the bus advances on ticks.
    pub is_running: bool,

    /// Display name of the bus.
    pub bus_name: String,

    /// Current position as `[lat, lon]`.
    pub current_location: Position,

    /// The full ordered waypoint list as `[[lat, lon], ...]`.
    pub route: Vec<Position>,

    /// "Bus is running" or "Bus is stopped".
    pub message: String,
}

impl BusStatus {
    /// The contract message for a running flag.
    #[must_use]
    pub const fn message_for(is_running: bool) -> &'static str {
        if is_running {
            MESSAGE_RUNNING
        } else {
            MESSAGE_STOPPED
        }
    }
}
