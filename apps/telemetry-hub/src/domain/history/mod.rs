//! Reading History Window
//!
//! Keeps the most recent readings in insertion order, bounded at a fixed
//! capacity. When an append pushes the buffer past capacity, the surplus is
//! drained from the front in a single step.
//!
//! All access goes through one mutex. Snapshots are owned copies, so a
//! reader never holds the lock while iterating and a concurrent append can
//! never tear a read.

use std::sync::Arc;

use parking_lot::Mutex;

use super::reading::Reading;

/// Default number of readings retained.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Largest window a store will hold.
pub const MAX_HISTORY_CAPACITY: usize = 1_000_000;

/// Slots reserved up front; larger windows grow on demand.
const PREALLOCATED_SLOTS: usize = 4096;

// =============================================================================
// History Store
// =============================================================================

/// Bounded, append-only buffer of recent readings.
///
/// # Example
///
/// ```rust
/// use telemetry_hub::domain::history::HistoryStore;
/// use telemetry_hub::domain::reading::Reading;
///
/// let store = HistoryStore::new(2);
/// store.append(Reading::now("Fridge001", 80.0));
/// store.append(Reading::now("Fridge001", 90.0));
/// store.append(Reading::now("Fridge001", 100.0));
///
/// let window = store.snapshot();
/// assert_eq!(window.len(), 2);
/// assert_eq!(window[0].consumption_watts, 90.0);
/// ```
#[derive(Debug)]
pub struct HistoryStore {
    capacity: usize,
    readings: Mutex<Vec<Reading>>,
}

impl HistoryStore {
    /// Create an empty store holding at most `capacity` readings.
    ///
    /// The capacity is clamped to `1..=MAX_HISTORY_CAPACITY`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_HISTORY_CAPACITY);
        Self {
            capacity,
            readings: Mutex::new(Vec::with_capacity(capacity.min(PREALLOCATED_SLOTS) + 1)),
        }
    }

    /// Create an empty store with [`DEFAULT_HISTORY_CAPACITY`].
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }

    /// Append a reading, evicting the oldest surplus if over capacity.
    pub fn append(&self, reading: Reading) {
        let mut readings = self.readings.lock();
        readings.push(reading);

        if readings.len() > self.capacity {
            let surplus = readings.len() - self.capacity;
            readings.drain(..surplus);
        }
    }

    /// Copy the current window, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.lock().clone()
    }

    /// Number of readings currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.lock().len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.lock().is_empty()
    }

    /// Maximum number of readings retained.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Shared history store reference.
pub type SharedHistoryStore = Arc<HistoryStore>;

// =============================================================================
// Tests
// =============================================================================
