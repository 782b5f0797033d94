//! Fixed-capacity waypoint buffer

use crate::common::Waypoint;
use crate::error::{Result, RoverError};
use tracing::warn;

/// Ordered route storage. Unpopulated slots hold [`Waypoint::EMPTY`].
///
/// The capacity is fixed when the buffer is built; slots are never added or
/// removed afterwards, only overwritten.
#[derive(Debug, Clone)]
pub struct WaypointBuffer {
    slots: Box<[Waypoint]>,
}

impl WaypointBuffer {
    /// Empty buffer with `capacity` slots
    pub fn new(capacity: usize) -> Self {
        WaypointBuffer {
            slots: vec![Waypoint::EMPTY; capacity].into_boxed_slice(),
        }
    }

    /// Seed the buffer from route rows. Loading stops at the first row with a
    /// NaN field; rows beyond the capacity are dropped with a warning.
    pub fn from_route(capacity: usize, rows: &[[f64; 4]]) -> Self {
        let mut buffer = Self::new(capacity);
        let route: Vec<Waypoint> = rows
            .iter()
            .map(|row| Waypoint::from_row(*row))
            .take_while(|waypoint| !waypoint.is_empty())
            .collect();
        if route.len() > capacity {
            warn!(
                "Route has {} waypoints, only the first {} fit the buffer",
                route.len(),
                capacity
            );
        }
        for (slot, waypoint) in buffer.slots.iter_mut().zip(route) {
            *slot = waypoint;
        }
        buffer
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of populated slots before the first empty one
    pub fn len(&self) -> usize {
        self.slots.iter().take_while(|w| !w.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Populated waypoint at `index`. Out-of-range and empty slots give `None`.
    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.slots.get(index).filter(|w| !w.is_empty())
    }

    /// Raw slot contents, including the empty sentinel
    pub fn slot(&self, index: usize) -> Waypoint {
        self.slots.get(index).copied().unwrap_or(Waypoint::EMPTY)
    }

    /// Store `waypoint` in the first empty slot and return its index
    pub fn push(&mut self, waypoint: Waypoint) -> Result<usize> {
        if waypoint.is_empty() {
            return Err(RoverError::EmptyWaypoint);
        }
        let capacity = self.capacity();
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_empty())
            .ok_or(RoverError::WaypointBufferFull { capacity })?;
        *slot = waypoint;
        Ok(index)
    }

    /// Reset every slot to the empty sentinel
    pub fn clear(&mut self) {
        self.slots.fill(Waypoint::EMPTY);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Waypoint> {
        self.slots.iter().take_while(|w| !w.is_empty())
    }
}
