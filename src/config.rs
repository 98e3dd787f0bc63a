//! Fleet configuration.
//!
//! A `FleetConfig` describes the tracked vehicles and the tick cadence. It
//! is the only input to engine construction: vehicle records are created
//! from it once, at initialization, and live for the process lifetime.
//!
//! Configs are plain JSON and can be loaded from a file. Two built-in
//! fixtures cover the demo deployments: a three-bus fleet for the embedded
//! shape and a single-bus route for the served shape.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default scheduler period in milliseconds.
pub const DEFAULT_TICK_PERIOD_MS: u64 = 3000;

const fn default_tick_period_ms() -> u64 {
    DEFAULT_TICK_PERIOD_MS
}

/// One stop in a configured route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopConfig {
    /// Display name of the stop.
    pub name: String,

    /// Scheduled arrival time, `HH:MM` display string. Not validated.
    pub time: String,

    /// Position as `[lat, lon]`.
    pub position: [f64; 2],
}

/// One tracked vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleConfig {
    /// Display name ("Salt Lake Express").
    pub name: String,

    /// Human-readable route label ("Sealdah → Salt Lake").
    #[serde(default)]
    pub route_label: String,

    /// Ordered stop list. Must be non-empty.
    pub stops: Vec<StopConfig>,
}

/// Fleet-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Scheduler period in milliseconds. Defaults to 3000.
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    /// Tracked vehicles. Must be non-empty.
    pub vehicles: Vec<VehicleConfig>,
}

impl FleetConfig {
    /// Loads a fleet configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidConfig`] if the file cannot be
    /// read or parsed, or any structural validation error afterwards.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ValidationError::InvalidConfig {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| ValidationError::InvalidConfig {
                reason: format!("failed to parse {}: {e}", path.display()),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation: a non-empty fleet of named vehicles, each
    /// with a non-empty route.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.vehicles.is_empty() {
            return Err(ValidationError::EmptyFleet);
        }
        for vehicle in &self.vehicles {
            if vehicle.name.trim().is_empty() {
                return Err(ValidationError::EmptyVehicleName);
            }
            if vehicle.stops.is_empty() {
                return Err(ValidationError::EmptyRoute {
                    label: route_label_or_name(vehicle),
                });
            }
        }
        Ok(())
    }

    /// The scheduler period.
    #[must_use]
    pub const fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// The three-bus Kolkata demo fleet used by the embedded display.
    #[must_use]
    pub fn demo() -> Self {
        Self {
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            vehicles: vec![
                VehicleConfig {
                    name: "Howrah Metro Bus".to_string(),
                    route_label: "Howrah → Esplanade".to_string(),
                    stops: vec![
                        stop("Howrah Station", "08:00", [22.5941, 88.2676]),
                        stop("Dalhousie Square", "08:15", [22.5596, 88.3639]),
                        stop("Park Street", "08:30", [22.5548, 88.3679]),
                        stop("Esplanade", "08:45", [22.5568, 88.3749]),
                    ],
                },
                VehicleConfig {
                    name: "Salt Lake Express".to_string(),
                    route_label: "Sealdah → Salt Lake".to_string(),
                    stops: vec![
                        stop("Sealdah Station", "09:00", [22.5624, 88.3603]),
                        stop("Maidan", "09:20", [22.5630, 88.3584]),
                        stop("Bidhannagar", "09:40", [22.5988, 88.4064]),
                        stop("Salt Lake Sector V", "10:00", [22.5577, 88.4433]),
                    ],
                },
                VehicleConfig {
                    name: "Kolkata City Bus".to_string(),
                    route_label: "Rabindra Sarovar → South City".to_string(),
                    stops: vec![
                        stop("Rabindra Sarovar", "07:30", [22.5485, 88.3589]),
                        stop("Gariahat", "07:50", [22.5239, 88.3811]),
                        stop("Ballygunge", "08:10", [22.5164, 88.3869]),
                        stop("South City", "08:30", [22.5055, 88.3923]),
                    ],
                },
            ],
        }
    }

    /// The single-bus Siliguri route served by the default backend.
    #[must_use]
    pub fn demo_single() -> Self {
        Self {
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            vehicles: vec![VehicleConfig {
                name: "College Bus 1".to_string(),
                route_label: "College Loop".to_string(),
                stops: vec![
                    stop("Waypoint 1", "08:00", [26.7271, 88.3953]),
                    stop("Waypoint 2", "08:05", [26.7300, 88.4000]),
                    stop("Waypoint 3", "08:10", [26.7350, 88.4050]),
                    stop("Waypoint 4", "08:15", [26.7400, 88.4100]),
                ],
            }],
        }
    }
}

pub(crate) fn route_label_or_name(vehicle: &VehicleConfig) -> String {
    if vehicle.route_label.trim().is_empty() {
        vehicle.name.clone()
    } else {
        vehicle.route_label.clone()
    }
}

fn stop(name: &str, time: &str, position: [f64; 2]) -> StopConfig {
    StopConfig {
        name: name.to_string(),
        time: time.to_string(),
        position,
    }
}
