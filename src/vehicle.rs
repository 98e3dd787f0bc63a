//! Vehicle identity and simulation state.
//!
//! `VehicleState` is owned exclusively by the engine: it is created at
//! engine initialization from configuration, lives for the process lifetime,
//! and is never destroyed — only reset. Observers read derived snapshots;
//! the mutable record itself never leaves this crate.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::route::Route;

/// Stable, unique vehicle identifier.
///
/// # Examples
///
/// ```
/// use fleetsim::VehicleId;
///
/// let id = VehicleId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(Uuid);

impl VehicleId {
    /// Creates a new random vehicle ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a vehicle ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Creates a nil vehicle ID (for testing or sentinel values).
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for VehicleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for VehicleId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<VehicleId> for Uuid {
    fn from(id: VehicleId) -> Self {
        id.0
    }
}

/// Per-vehicle mutable simulation record.
///
/// Invariant: `current_stop_index` is always in `[0, route.len())`.
#[derive(Debug, Clone)]
pub(crate) struct VehicleState {
    pub(crate) id: VehicleId,
    pub(crate) name: String,
    pub(crate) route: Arc<Route>,
    pub(crate) is_running: bool,
    pub(crate) current_stop_index: usize,
}

impl VehicleState {
    pub(crate) fn new(name: String, route: Arc<Route>) -> Self {
        Self {
            id: VehicleId::new(),
            name,
            route,
            is_running: false,
            current_stop_index: 0,
        }
    }

    /// Moves to the next stop in cyclic order. Does not touch the
    /// running flag.
    pub(crate) fn advance(&mut self) {
        self.current_stop_index = self.route.next_index(self.current_stop_index);
    }

    /// Returns to the first stop and stops the vehicle.
    pub(crate) fn reset(&mut self) {
        self.current_stop_index = 0;
        self.is_running = false;
    }
}
