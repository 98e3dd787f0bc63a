//! Simulation engine: the process-wide owner of all vehicle state.
//!
//! This module provides a synchronous engine that applies start/stop/reset
//! transitions against the fleet's vehicle records and derives read-only
//! snapshots on demand. All mutation is serialized under one mutex: the
//! scheduler's tick and externally triggered transitions can never observe
//! or produce an inconsistent running-flag/stop-index pair.

/// Periodic advance worker and tick subscriptions.
pub mod scheduler;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;

use crate::config::{route_label_or_name, FleetConfig};
use crate::error::{ExecutionError, FleetError, FleetResult};
use crate::route::Route;
use crate::snapshot::{BusStatus, VehicleSnapshot};
use crate::stop::{Position, Stop};
use crate::vehicle::{VehicleId, VehicleState};

use self::scheduler::{TickScheduler, TickStream};

/// The simulation engine.
///
/// Exactly one engine owns a fleet: vehicle records are created from the
/// configuration at construction and live as long as the engine. Observers
/// only ever receive derived [`VehicleSnapshot`] values; the mutable state
/// never escapes.
///
/// The tick scheduler is owned by the engine and follows one policy in
/// every deployment shape: it runs whenever at least one vehicle is
/// running, and stops when none are.
#[derive(Debug)]
pub struct FleetEngine {
    vehicles: Arc<Mutex<Vec<VehicleState>>>,
    scheduler: TickScheduler,
    tick_period: Duration,
}

impl FleetEngine {
    /// Builds an engine from a fleet configuration.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty fleet, a blank vehicle
    /// name, or a vehicle without stops.
    pub fn new(config: FleetConfig) -> FleetResult<Self> {
        config.validate()?;

        let mut records = Vec::with_capacity(config.vehicles.len());
        for vehicle in &config.vehicles {
            let stops: Vec<Stop> = vehicle
                .stops
                .iter()
                .map(|s| Stop::new(s.name.clone(), s.time.clone(), Position::from(s.position)))
                .collect();
            let route = Arc::new(Route::new(route_label_or_name(vehicle), stops)?);
            records.push(VehicleState::new(vehicle.name.clone(), route));
        }

        let tick_period = config.tick_period();
        let vehicles = Arc::new(Mutex::new(records));
        let scheduler = TickScheduler::new(tick_period, Arc::clone(&vehicles));

        Ok(Self {
            vehicles,
            scheduler,
            tick_period,
        })
    }

    /// The configured scheduler period.
    #[must_use]
    pub const fn tick_period(&self) -> Duration {
        self.tick_period
    }

    /// Transitions a vehicle from stopped to running.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::AlreadyRunning`] if the vehicle is running, or
    /// [`ExecutionError::VehicleNotFound`] for an unknown id.
    pub fn start(&self, id: VehicleId) -> FleetResult<()> {
        let mut table = self.table()?;
        let vehicle = find_mut(&mut table, id)?;
        if vehicle.is_running {
            return Err(ExecutionError::AlreadyRunning {
                name: vehicle.name.clone(),
            }
            .into());
        }
        vehicle.is_running = true;
        self.sync_scheduler(&table)
    }

    /// Transitions a vehicle from running to stopped.
    ///
    /// Once this returns, no further advance occurs for the vehicle: the
    /// running flag is cleared under the same mutex the tick reads it.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::AlreadyStopped`] if the vehicle is stopped, or
    /// [`ExecutionError::VehicleNotFound`] for an unknown id.
    pub fn stop(&self, id: VehicleId) -> FleetResult<()> {
        let mut table = self.table()?;
        let vehicle = find_mut(&mut table, id)?;
        if !vehicle.is_running {
            return Err(ExecutionError::AlreadyStopped {
                name: vehicle.name.clone(),
            }
            .into());
        }
        vehicle.is_running = false;
        self.sync_scheduler(&table)
    }

    /// Returns a vehicle to its first stop and stops it.
    ///
    /// Total and idempotent: succeeds regardless of the vehicle's prior
    /// state.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::VehicleNotFound`] for an unknown id.
    pub fn reset(&self, id: VehicleId) -> FleetResult<()> {
        let mut table = self.table()?;
        let vehicle = find_mut(&mut table, id)?;
        vehicle.reset();
        self.sync_scheduler(&table)
    }

    /// Starts every vehicle. Vehicles already running are left as they
    /// are; no index is reset.
    ///
    /// # Errors
    ///
    /// Only on an unreachable internal condition (poisoned table or dead
    /// scheduler).
    pub fn start_all(&self) -> FleetResult<()> {
        let mut table = self.table()?;
        for vehicle in table.iter_mut() {
            vehicle.is_running = true;
        }
        self.sync_scheduler(&table)
    }

    /// Stops every vehicle. Vehicles already stopped are left as they are.
    ///
    /// # Errors
    ///
    /// Only on an unreachable internal condition (poisoned table or dead
    /// scheduler).
    pub fn stop_all(&self) -> FleetResult<()> {
        let mut table = self.table()?;
        for vehicle in table.iter_mut() {
            vehicle.is_running = false;
        }
        self.sync_scheduler(&table)
    }

    /// Derives a fresh snapshot of one vehicle. Unknown ids quietly yield
    /// `None`.
    #[must_use]
    pub fn snapshot(&self, id: VehicleId) -> Option<VehicleSnapshot> {
        let table = self.vehicles.lock().ok()?;
        table.iter().find(|v| v.id == id).map(make_snapshot)
    }

    /// Derives fresh snapshots of the whole fleet, in configuration order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<VehicleSnapshot> {
        let Ok(table) = self.vehicles.lock() else {
            tracing::warn!("vehicle table lock poisoned; returning empty snapshot list");
            return Vec::new();
        };
        table.iter().map(make_snapshot).collect()
    }

    /// Case-insensitive substring search over vehicle names and route
    /// labels.
    #[must_use]
    pub fn find_by_name(&self, query: &str) -> Vec<VehicleSnapshot> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.snapshots();
        }

        self.snapshots()
            .into_iter()
            .filter(|s| {
                s.name.to_lowercase().contains(&needle)
                    || s.route_label.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Number of vehicles currently running.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.vehicles
            .lock()
            .map(|table| count_running(&table))
            .unwrap_or(0)
    }

    /// The served single-vehicle status body for one vehicle. Unknown ids
    /// quietly yield `None`.
    #[must_use]
    pub fn bus_status(&self, id: VehicleId) -> Option<BusStatus> {
        let table = self.vehicles.lock().ok()?;
        table.iter().find(|v| v.id == id).map(|v| BusStatus {
            is_running: v.is_running,
            bus_name: v.name.clone(),
            current_location: v.route.stop(v.current_stop_index).position,
            route: v.route.waypoints(),
            message: BusStatus::message_for(v.is_running).to_string(),
        })
    }

    /// Subscribes to scheduler ticks.
    ///
    /// The stream yields one event per tick while the scheduler is active.
    /// Slow subscribers lose events rather than delaying the tick.
    ///
    /// # Errors
    ///
    /// Only if the scheduler worker has shut down.
    pub fn subscribe(&self) -> FleetResult<TickStream> {
        self.scheduler.subscribe()
    }

    /// Number of tick events dropped because subscribers were slow.
    #[must_use]
    pub fn dropped_tick_events(&self) -> u64 {
        self.scheduler.dropped_events()
    }

    fn table(&self) -> FleetResult<MutexGuard<'_, Vec<VehicleState>>> {
        self.vehicles
            .lock()
            .map_err(|_| FleetError::internal("vehicle table lock poisoned"))
    }

    /// Applies the scheduler policy to the current table: active while at
    /// least one vehicle runs, idle otherwise. Called with the table lock
    /// held so racing transitions cannot reorder their control messages.
    fn sync_scheduler(&self, table: &[VehicleState]) -> FleetResult<()> {
        if count_running(table) > 0 {
            self.scheduler.activate()
        } else {
            self.scheduler.deactivate()
        }
    }
}

fn count_running(table: &[VehicleState]) -> usize {
    table.iter().filter(|v| v.is_running).count()
}

fn find_mut(table: &mut [VehicleState], id: VehicleId) -> FleetResult<&mut VehicleState> {
    table
        .iter_mut()
        .find(|v| v.id == id)
        .ok_or_else(|| ExecutionError::VehicleNotFound { id }.into())
}

fn make_snapshot(vehicle: &VehicleState) -> VehicleSnapshot {
    let route = &vehicle.route;
    let current = route.stop(vehicle.current_stop_index).clone();
    let next = route.stop(route.next_index(vehicle.current_stop_index)).clone();
    let position = current.position;

    VehicleSnapshot {
        id: vehicle.id,
        name: vehicle.name.clone(),
        route_label: route.label().to_string(),
        is_running: vehicle.is_running,
        current_stop: current,
        next_stop: next,
        position,
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::{StopConfig, VehicleConfig};

    // Long enough that no tick fires during a test.
    const QUIET_PERIOD_MS: u64 = 60_000;

    fn station(name: &str, position: [f64; 2]) -> StopConfig {
        StopConfig {
            name: name.to_string(),
            time: "08:00".to_string(),
            position,
        }
    }

    fn four_station_config() -> FleetConfig {
        FleetConfig {
            tick_period_ms: QUIET_PERIOD_MS,
            vehicles: vec![VehicleConfig {
                name: "Line 1".to_string(),
                route_label: "StationA → StationD".to_string(),
                stops: vec![
                    station("StationA", [0.0, 0.0]),
                    station("StationB", [1.0, 0.0]),
                    station("StationC", [2.0, 0.0]),
                    station("StationD", [3.0, 0.0]),
                ],
            }],
        }
    }

    fn engine_with_one_vehicle() -> (FleetEngine, VehicleId) {
        let engine = FleetEngine::new(four_station_config()).unwrap();
        let id = engine.snapshots()[0].id;
        (engine, id)
    }

    #[test]
    fn rejects_invalid_config() {
        let config = FleetConfig {
            tick_period_ms: QUIET_PERIOD_MS,
            vehicles: Vec::new(),
        };
        let err = FleetEngine::new(config).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn vehicles_start_stopped_at_first_stop() {
        let (engine, id) = engine_with_one_vehicle();
        let snap = engine.snapshot(id).unwrap();
        assert!(!snap.is_running);
        assert_eq!(snap.current_stop.name, "StationA");
        assert_eq!(snap.next_stop.name, "StationB");
        assert_eq!(snap.position, Position::new(0.0, 0.0));
    }

    #[test]
    fn start_then_start_reports_already_running() {
        let (engine, id) = engine_with_one_vehicle();
        engine.start(id).unwrap();
        assert!(engine.snapshot(id).unwrap().is_running);

        let err = engine.start(id).unwrap_err();
        assert!(matches!(
            err,
            FleetError::Execution(ExecutionError::AlreadyRunning { .. })
        ));
        // The failed start did not alter state.
        assert!(engine.snapshot(id).unwrap().is_running);
    }

    #[test]
    fn stop_then_stop_reports_already_stopped() {
        let (engine, id) = engine_with_one_vehicle();
        engine.start(id).unwrap();
        engine.stop(id).unwrap();
        assert!(!engine.snapshot(id).unwrap().is_running);

        let err = engine.stop(id).unwrap_err();
        assert!(matches!(
            err,
            FleetError::Execution(ExecutionError::AlreadyStopped { .. })
        ));
    }

    #[test]
    fn reset_is_total_and_idempotent() {
        let (engine, id) = engine_with_one_vehicle();
        engine.start(id).unwrap();
        scheduler::advance_running(&engine.vehicles);
        scheduler::advance_running(&engine.vehicles);
        assert_eq!(engine.snapshot(id).unwrap().current_stop.name, "StationC");

        engine.reset(id).unwrap();
        let snap = engine.snapshot(id).unwrap();
        assert!(!snap.is_running);
        assert_eq!(snap.current_stop.name, "StationA");

        // Reset of an already-reset vehicle succeeds unchanged.
        engine.reset(id).unwrap();
        let snap = engine.snapshot(id).unwrap();
        assert!(!snap.is_running);
        assert_eq!(snap.current_stop.name, "StationA");
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let (engine, _) = engine_with_one_vehicle();
        let ghost = VehicleId::new();

        assert!(engine.snapshot(ghost).is_none());
        for result in [engine.start(ghost), engine.stop(ghost), engine.reset(ghost)] {
            assert!(matches!(
                result.unwrap_err(),
                FleetError::Execution(ExecutionError::VehicleNotFound { .. })
            ));
        }
    }

    #[test]
    fn advance_cycles_through_the_route() {
        let (engine, id) = engine_with_one_vehicle();
        engine.start(id).unwrap();

        let names = ["StationB", "StationC", "StationD", "StationA"];
        for name in names {
            scheduler::advance_running(&engine.vehicles);
            assert_eq!(engine.snapshot(id).unwrap().current_stop.name, name);
        }
    }

    #[test]
    fn stop_start_then_two_advances_reaches_station_c() {
        // Route [A, B, C, D], start at 0: stop, start, two ticks → C.
        let (engine, id) = engine_with_one_vehicle();
        engine.start(id).unwrap();
        engine.stop(id).unwrap();
        engine.start(id).unwrap();
        scheduler::advance_running(&engine.vehicles);
        scheduler::advance_running(&engine.vehicles);
        assert_eq!(engine.snapshot(id).unwrap().current_stop.name, "StationC");
    }

    #[test]
    fn stopped_vehicle_does_not_advance() {
        let (engine, id) = engine_with_one_vehicle();
        for _ in 0..3 {
            scheduler::advance_running(&engine.vehicles);
        }
        assert_eq!(engine.snapshot(id).unwrap().current_stop.name, "StationA");
    }

    #[test]
    fn demo_fleet_bulk_operations() {
        let mut config = FleetConfig::demo();
        config.tick_period_ms = QUIET_PERIOD_MS;
        let engine = FleetEngine::new(config).unwrap();
        assert_eq!(engine.running_count(), 0);

        engine.start_all().unwrap();
        assert_eq!(engine.running_count(), 3);

        // start_all tolerates vehicles that are already running.
        engine.start_all().unwrap();
        assert_eq!(engine.running_count(), 3);

        engine.stop_all().unwrap();
        assert_eq!(engine.running_count(), 0);
        engine.stop_all().unwrap();
        assert_eq!(engine.running_count(), 0);
    }

    #[test]
    fn find_by_name_matches_names_and_route_labels() {
        let mut config = FleetConfig::demo();
        config.tick_period_ms = QUIET_PERIOD_MS;
        let engine = FleetEngine::new(config).unwrap();

        let by_name = engine.find_by_name("salt lake");
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name, "Salt Lake Express");

        let by_label = engine.find_by_name("esplanade");
        assert_eq!(by_label.len(), 1);
        assert_eq!(by_label[0].name, "Howrah Metro Bus");

        assert!(engine.find_by_name("tram").is_empty());
        assert_eq!(engine.find_by_name("  ").len(), 3);
    }

    #[test]
    fn bus_status_reflects_state() {
        let (engine, id) = engine_with_one_vehicle();
        let status = engine.bus_status(id).unwrap();
        assert!(!status.is_running);
        assert_eq!(status.bus_name, "Line 1");
        assert_eq!(status.current_location, Position::new(0.0, 0.0));
        assert_eq!(status.route.len(), 4);
        assert_eq!(status.message, "Bus is stopped");

        engine.start(id).unwrap();
        scheduler::advance_running(&engine.vehicles);
        let status = engine.bus_status(id).unwrap();
        assert!(status.is_running);
        assert_eq!(status.current_location, Position::new(1.0, 0.0));
        assert_eq!(status.message, "Bus is running");

        assert!(engine.bus_status(VehicleId::new()).is_none());
    }

    #[test]
    fn single_stop_route_next_is_current() {
        let config = FleetConfig {
            tick_period_ms: QUIET_PERIOD_MS,
            vehicles: vec![VehicleConfig {
                name: "Shuttle".to_string(),
                route_label: String::new(),
                stops: vec![station("Depot", [5.0, 5.0])],
            }],
        };
        let engine = FleetEngine::new(config).unwrap();
        let id = engine.snapshots()[0].id;
        engine.start(id).unwrap();

        scheduler::advance_running(&engine.vehicles);
        let snap = engine.snapshot(id).unwrap();
        assert_eq!(snap.current_stop.name, "Depot");
        assert_eq!(snap.next_stop.name, "Depot");
        // Empty route labels fall back to the vehicle name.
        assert_eq!(snap.route_label, "Shuttle");
    }
}
