//! History Queries
//!
//! Catch-up reads for subscribers that have just (re)connected.

use crate::domain::history::SharedHistoryStore;
use crate::domain::reading::Reading;

/// Read-only access to the history window.
#[derive(Debug, Clone)]
pub struct HistoryQueryService {
    history: SharedHistoryStore,
}

impl HistoryQueryService {
    /// Create a new query service over the shared store.
    #[must_use]
    pub const fn new(history: SharedHistoryStore) -> Self {
        Self { history }
    }

    /// The whole current window, oldest first.
    #[must_use]
    pub fn get_history(&self) -> Vec<Reading> {
        self.history.snapshot()
    }

    /// Number of readings currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether no readings are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Maximum window size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.history.capacity()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::history::HistoryStore;

    #[test]
    fn returns_store_snapshot_verbatim() {
        let store = Arc::new(HistoryStore::new(2));
        let query = HistoryQueryService::new(Arc::clone(&store));
        assert!(query.is_empty());

        let a = Reading::now("Fridge001", 80.0);
        let b = Reading::now("Fridge001", 200.0);
        let c = Reading::now("Lights003", 45.0);
        store.append(a);
        store.append(b.clone());
        store.append(c.clone());

        assert_eq!(query.get_history(), vec![b, c]);
        assert_eq!(query.len(), 2);
        assert_eq!(query.capacity(), 2);
    }
}
