//! Routes: the fixed, ordered, cyclic sequence of stops a vehicle follows.
//!
//! A route never changes after construction. Traversal is cyclic: the stop
//! after the last one is the first, so index arithmetic is always modulo the
//! route length. A single-stop route is legal; its next stop is itself.

use serde::Serialize;

use crate::error::ValidationError;
use crate::stop::{Position, Stop};

/// An ordered, non-empty, cyclic sequence of stops.
///
/// # Examples
///
/// ```
/// use fleetsim::{Position, Route, Stop};
///
/// let route = Route::new(
///     "Howrah → Esplanade",
///     vec![
///         Stop::new("Howrah Station", "08:00", Position::new(22.5941, 88.2676)),
///         Stop::new("Esplanade", "08:45", Position::new(22.5568, 88.3749)),
///     ],
/// )
/// .unwrap();
///
/// assert_eq!(route.len(), 2);
/// assert_eq!(route.next_index(1), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    label: String,
    stops: Vec<Stop>,
}

impl Route {
    /// Creates a route from an ordered stop list.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyRoute`] if `stops` is empty.
    pub fn new(label: impl Into<String>, stops: Vec<Stop>) -> Result<Self, ValidationError> {
        let label = label.into();
        if stops.is_empty() {
            return Err(ValidationError::EmptyRoute { label });
        }
        Ok(Self { label, stops })
    }

    /// Human-readable route label ("Howrah → Esplanade" style).
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of stops. Always at least 1.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// Routes are non-empty by construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The stop at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`. Engine state maintains the in-range
    /// invariant, so internal callers never trip this.
    #[must_use]
    pub fn stop(&self, index: usize) -> &Stop {
        &self.stops[index]
    }

    /// All stops in order.
    #[must_use]
    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    /// The index that follows `index` in cyclic order.
    #[must_use]
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.stops.len()
    }

    /// The ordered waypoint positions (the wire `route` array).
    #[must_use]
    pub fn waypoints(&self) -> Vec<Position> {
        self.stops.iter().map(|s| s.position).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops(n: usize) -> Vec<Stop> {
        (0..n)
            .map(|i| Stop::new(format!("S{i}"), "08:00", Position::new(i as f64, 0.0)))
            .collect()
    }

    #[test]
    fn rejects_empty_stop_list() {
        let err = Route::new("empty", Vec::new()).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyRoute { .. }));
    }

    #[test]
    fn next_index_wraps_to_first() {
        let route = Route::new("r", stops(4)).unwrap();
        assert_eq!(route.next_index(0), 1);
        assert_eq!(route.next_index(3), 0);
    }

    #[test]
    fn single_stop_route_cycles_to_itself() {
        let route = Route::new("r", stops(1)).unwrap();
        assert_eq!(route.next_index(0), 0);
    }

    #[test]
    fn advancing_len_times_returns_to_start() {
        for n in 1..=5 {
            let route = Route::new("r", stops(n)).unwrap();
            for start in 0..n {
                let mut index = start;
                for _ in 0..n {
                    index = route.next_index(index);
                }
                assert_eq!(index, start, "route of length {n} did not cycle");
            }
        }
    }

    #[test]
    fn waypoints_preserve_stop_order() {
        let route = Route::new("r", stops(3)).unwrap();
        let lats: Vec<f64> = route.waypoints().iter().map(|p| p.latitude).collect();
        assert_eq!(lats, vec![0.0, 1.0, 2.0]);
    }
}
