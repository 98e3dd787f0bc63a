//! Tick scheduler worker.
//!
//! One dedicated thread owns the periodic advance for the whole fleet.
//! Activation and deactivation are control messages; the worker swaps its
//! ticker between a live `tick` channel and `never()`, so an activate while
//! already active keeps the existing ticker and a second concurrent timer
//! can never exist. Each tick advances every running vehicle exactly once
//! under the table mutex, then fans a `TickEvent` out to subscribers with
//! non-blocking sends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, never, select, tick, unbounded, Receiver, Sender, TrySendError};

use crate::error::{ExecutionError, FleetError, FleetResult};
use crate::vehicle::VehicleState;

/// Per-subscription event buffer capacity.
const STREAM_CAPACITY: usize = 64;

/// One scheduler firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickEvent {
    /// Monotonic tick counter, starting at 1 for the first tick.
    pub seq: u64,

    /// How many vehicles advanced on this tick.
    pub advanced: usize,

    /// When the tick fired.
    pub at: DateTime<Utc>,
}

#[derive(Debug)]
enum ControlMsg {
    Activate,
    Deactivate,
    Subscribe {
        tx: Sender<TickEvent>,
        reply: Sender<()>,
    },
}

/// A subscription stream yielding one event per scheduler tick.
///
/// Dropping the stream unsubscribes: the worker prunes disconnected
/// subscribers on the next tick.
#[derive(Debug)]
pub struct TickStream {
    rx: Receiver<TickEvent>,
}

impl TickStream {
    /// Receive the next tick event (blocking).
    ///
    /// # Errors
    ///
    /// Returns a disconnection error once the scheduler worker has shut
    /// down.
    pub fn recv(&self) -> FleetResult<TickEvent> {
        self.rx.recv().map_err(|_| {
            FleetError::Execution(ExecutionError::Disconnected {
                path: "tick_stream".to_string(),
            })
        })
    }

    /// Receive the next tick event with a timeout.
    ///
    /// # Errors
    ///
    /// Returns a timeout error if no tick fires within `timeout`, or a
    /// disconnection error once the scheduler worker has shut down.
    pub fn recv_timeout(&self, timeout: Duration) -> FleetResult<TickEvent> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            crossbeam_channel::RecvTimeoutError::Timeout => {
                FleetError::Execution(ExecutionError::Timeout {
                    duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
                })
            }
            crossbeam_channel::RecvTimeoutError::Disconnected => {
                FleetError::Execution(ExecutionError::Disconnected {
                    path: "tick_stream".to_string(),
                })
            }
        })
    }
}

/// Fleet-wide tick scheduler.
///
/// Exactly one per engine. The worker thread lives for the engine lifetime;
/// activation only swaps the ticker on and off.
#[derive(Debug)]
pub(crate) struct TickScheduler {
    control_tx: Sender<ControlMsg>,
    dropped_events: Arc<AtomicU64>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl TickScheduler {
    pub(crate) fn new(period: Duration, vehicles: Arc<Mutex<Vec<VehicleState>>>) -> Self {
        // The control channel must accept sends made while the caller holds
        // the vehicle table lock, so it is unbounded: a bounded send could
        // block against a worker that is itself waiting for the table.
        let (control_tx, control_rx) = unbounded::<ControlMsg>();
        let dropped_events = Arc::new(AtomicU64::new(0));

        let thread_dropped = Arc::clone(&dropped_events);
        let join = thread::Builder::new()
            .name("fleetsim-scheduler".to_string())
            .spawn(move || worker_loop(period, vehicles, thread_dropped, control_rx))
            .expect("failed to spawn fleetsim scheduler worker");

        Self {
            control_tx,
            dropped_events,
            join: Mutex::new(Some(join)),
        }
    }

    /// Turn the periodic tick on. Idempotent: an already-active scheduler
    /// keeps its existing ticker.
    pub(crate) fn activate(&self) -> FleetResult<()> {
        self.send(ControlMsg::Activate)
    }

    /// Turn the periodic tick off. No-op when already idle.
    pub(crate) fn deactivate(&self) -> FleetResult<()> {
        self.send(ControlMsg::Deactivate)
    }

    /// Register a subscriber and obtain its event stream.
    pub(crate) fn subscribe(&self) -> FleetResult<TickStream> {
        let (tx, rx) = bounded::<TickEvent>(STREAM_CAPACITY);
        let (reply_tx, reply_rx) = bounded::<()>(1);
        self.send(ControlMsg::Subscribe {
            tx,
            reply: reply_tx,
        })?;

        // Wait for the worker to acknowledge the registration.
        reply_rx.recv().map_err(|_| {
            FleetError::Execution(ExecutionError::Disconnected {
                path: "scheduler_control".to_string(),
            })
        })?;

        Ok(TickStream { rx })
    }

    /// Number of tick events dropped because a subscriber was slow.
    pub(crate) fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    fn send(&self, msg: ControlMsg) -> FleetResult<()> {
        self.control_tx.send(msg).map_err(|_| {
            FleetError::Execution(ExecutionError::Disconnected {
                path: "scheduler_control".to_string(),
            })
        })
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        // Close the control channel so the worker exits, then join it.
        // Streams hold only receivers, so nothing can keep the worker alive.
        let (dummy_tx, _) = unbounded::<ControlMsg>();
        let old_tx = std::mem::replace(&mut self.control_tx, dummy_tx);
        drop(old_tx);

        if let Ok(mut guard) = self.join.lock() {
            if let Some(handle) = guard.take() {
                let _ = handle.join();
            }
        }
    }
}

fn worker_loop(
    period: Duration,
    vehicles: Arc<Mutex<Vec<VehicleState>>>,
    dropped_events: Arc<AtomicU64>,
    control_rx: Receiver<ControlMsg>,
) {
    let mut ticker: Receiver<Instant> = never();
    let mut active = false;
    let mut subscribers: Vec<Sender<TickEvent>> = Vec::new();
    let mut seq: u64 = 0;

    loop {
        select! {
            recv(control_rx) -> msg => {
                match msg {
                    Ok(ControlMsg::Activate) => {
                        if !active {
                            active = true;
                            ticker = tick(period);
                            tracing::debug!(period_ms = period.as_millis() as u64, "scheduler activated");
                        }
                    }
                    Ok(ControlMsg::Deactivate) => {
                        if active {
                            active = false;
                            ticker = never();
                            tracing::debug!("scheduler deactivated");
                        }
                    }
                    Ok(ControlMsg::Subscribe { tx, reply }) => {
                        subscribers.push(tx);
                        let _ = reply.send(());
                    }
                    Err(_) => break,
                }
            }
            recv(ticker) -> msg => {
                if msg.is_err() {
                    // Tick channels do not close; treat it as a dead ticker.
                    ticker = never();
                    continue;
                }

                let advanced = advance_running(&vehicles);
                seq += 1;
                let event = TickEvent {
                    seq,
                    advanced,
                    at: Utc::now(),
                };

                subscribers.retain(|tx| match tx.try_send(event) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        // Never block the tick thread on a slow subscriber.
                        dropped_events.fetch_add(1, Ordering::Relaxed);
                        true
                    }
                    Err(TrySendError::Disconnected(_)) => false,
                });
            }
        }
    }
}

/// Advances every running vehicle exactly once. Stopped vehicles are
/// skipped without error. The running flag is read under the same mutex
/// that `stop` writes it, so a tick racing a stop can never advance a
/// vehicle whose stop call has returned.
pub(crate) fn advance_running(vehicles: &Mutex<Vec<VehicleState>>) -> usize {
    let Ok(mut table) = vehicles.lock() else {
        tracing::warn!("vehicle table lock poisoned; skipping tick");
        return 0;
    };

    let mut advanced = 0;
    for vehicle in table.iter_mut() {
        if vehicle.is_running {
            vehicle.advance();
            advanced += 1;
        }
    }
    advanced
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::route::Route;
    use crate::stop::{Position, Stop};

    const PERIOD: Duration = Duration::from_millis(40);
    const GENEROUS: Duration = Duration::from_secs(2);

    fn table(running: bool) -> Arc<Mutex<Vec<VehicleState>>> {
        let stops = (0..4)
            .map(|i| Stop::new(format!("S{i}"), "08:00", Position::new(i as f64, 0.0)))
            .collect();
        let route = Arc::new(Route::new("r", stops).unwrap());
        let mut state = VehicleState::new("bus".to_string(), route);
        state.is_running = running;
        Arc::new(Mutex::new(vec![state]))
    }

    fn index_of(vehicles: &Mutex<Vec<VehicleState>>) -> usize {
        vehicles.lock().unwrap()[0].current_stop_index
    }

    #[test]
    fn ticks_advance_running_vehicle() {
        let vehicles = table(true);
        let scheduler = TickScheduler::new(PERIOD, Arc::clone(&vehicles));
        let stream = scheduler.subscribe().unwrap();
        scheduler.activate().unwrap();

        let event = stream.recv_timeout(GENEROUS).unwrap();
        assert_eq!(event.seq, 1);
        assert_eq!(event.advanced, 1);

        // Freeze the vehicle before reading, so no further tick moves it.
        vehicles.lock().unwrap()[0].is_running = false;
        assert!(index_of(&vehicles) >= 1);
    }

    #[test]
    fn stopped_vehicles_are_skipped() {
        let vehicles = table(false);
        let scheduler = TickScheduler::new(PERIOD, Arc::clone(&vehicles));
        let stream = scheduler.subscribe().unwrap();
        scheduler.activate().unwrap();

        let event = stream.recv_timeout(GENEROUS).unwrap();
        assert_eq!(event.advanced, 0);
        assert_eq!(index_of(&vehicles), 0);
    }

    #[test]
    fn activate_is_idempotent() {
        let vehicles = table(true);
        let scheduler = TickScheduler::new(PERIOD, Arc::clone(&vehicles));
        let stream = scheduler.subscribe().unwrap();
        scheduler.activate().unwrap();
        scheduler.activate().unwrap();

        // With a second concurrent timer the window would hold roughly
        // twice as many ticks; allow generous slack for scheduling jitter.
        let window = PERIOD * 6;
        let deadline = Instant::now() + window;
        let mut events = 0;
        while Instant::now() < deadline {
            if stream.recv_timeout(PERIOD * 2).is_ok() {
                events += 1;
            }
        }
        assert!(events <= 8, "one timer expected, saw {events} events");
        assert!(events >= 2, "scheduler did not tick");
    }

    #[test]
    fn deactivate_silences_the_ticker() {
        let vehicles = table(true);
        let scheduler = TickScheduler::new(PERIOD, Arc::clone(&vehicles));
        let stream = scheduler.subscribe().unwrap();
        scheduler.activate().unwrap();

        stream.recv_timeout(GENEROUS).unwrap();
        scheduler.deactivate().unwrap();

        // Drain anything that fired before the deactivate took effect.
        while stream.recv_timeout(PERIOD * 2).is_ok() {}

        let err = stream.recv_timeout(PERIOD * 4).unwrap_err();
        assert!(matches!(
            err,
            FleetError::Execution(ExecutionError::Timeout { .. })
        ));
    }

    #[test]
    fn deactivate_when_idle_is_a_noop() {
        let vehicles = table(false);
        let scheduler = TickScheduler::new(PERIOD, Arc::clone(&vehicles));
        scheduler.deactivate().unwrap();
        scheduler.deactivate().unwrap();
        assert_eq!(scheduler.dropped_events(), 0);
    }

    #[test]
    fn stream_disconnects_after_scheduler_drop() {
        let vehicles = table(false);
        let scheduler = TickScheduler::new(PERIOD, Arc::clone(&vehicles));
        let stream = scheduler.subscribe().unwrap();
        drop(scheduler);

        let err = stream.recv().unwrap_err();
        assert!(matches!(
            err,
            FleetError::Execution(ExecutionError::Disconnected { .. })
        ));
    }

    #[test]
    fn advance_running_cycles_modulo_route_length() {
        let vehicles = table(true);
        for _ in 0..4 {
            assert_eq!(advance_running(&vehicles), 1);
        }
        assert_eq!(index_of(&vehicles), 0);
    }
}
