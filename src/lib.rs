//! # fleetsim - simulated vehicle tracking
//!
//! fleetsim is the simulation core behind a demonstration bus-tracking
//! display. Each vehicle follows a fixed, cyclic route of stops; a shared
//! scheduler advances every running vehicle by one stop on a fixed tick,
//! and observers read derived snapshots rather than live state.
//!
//! ## Core Concepts
//!
//! - **Stop**: a named waypoint with a scheduled time and a position
//! - **Route**: the fixed, ordered, cyclic stop sequence a vehicle follows
//! - **Tick**: one scheduler firing that advances every running vehicle
//! - **Snapshot**: a derived, read-only view of a vehicle at a point in time
//!
//! ## Usage
//!
//! ```rust
//! use fleetsim::{FleetConfig, FleetEngine};
//!
//! let engine = FleetEngine::new(FleetConfig::demo()).unwrap();
//! let buses = engine.snapshots();
//! assert_eq!(buses.len(), 3);
//!
//! engine.start(buses[0].id).unwrap();
//! assert_eq!(engine.running_count(), 1);
//! ```
//!
//! The `transport-grpc` feature adds the served deployment shape: a tonic
//! service exposing the single-vehicle bus contract, plus a client-side
//! status poller.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod error;
pub mod route;
pub mod snapshot;
pub mod stop;
pub mod vehicle;

#[cfg(feature = "transport-grpc")]
pub mod transport;

// Re-export primary types at crate root for convenience
pub use config::{FleetConfig, StopConfig, VehicleConfig, DEFAULT_TICK_PERIOD_MS};
pub use engine::scheduler::{TickEvent, TickStream};
pub use engine::FleetEngine;
pub use error::{ExecutionError, FleetError, FleetResult, TransportError, ValidationError};
pub use route::Route;
pub use snapshot::{BusStatus, VehicleSnapshot, MESSAGE_RUNNING, MESSAGE_STOPPED};
pub use stop::{Position, Stop};
pub use vehicle::VehicleId;
