//! Bounded registry of in-flight runs, keyed by external id.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::domain::{RemedyError, Result};

/// Tracks which external ids have a run in progress.
///
/// A second run for the same id is rejected with
/// [`RemedyError::RunInProgress`]; once `capacity` runs are active, new ids
/// are rejected with [`RemedyError::RunCapacity`] so callers can queue.
#[derive(Debug)]
pub struct InFlightRuns {
    ids: Mutex<HashSet<String>>,
    capacity: usize,
}

impl InFlightRuns {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: Mutex::new(HashSet::new()),
            capacity,
        }
    }

    /// Claim `external_id` until the returned guard drops.
    pub fn try_acquire(self: &Arc<Self>, external_id: &str) -> Result<RunGuard> {
        let mut ids = self.ids.lock().unwrap();
        if ids.contains(external_id) {
            return Err(RemedyError::RunInProgress(external_id.to_string()));
        }
        if ids.len() >= self.capacity {
            return Err(RemedyError::RunCapacity {
                capacity: self.capacity,
            });
        }
        ids.insert(external_id.to_string());
        Ok(RunGuard {
            runs: Arc::clone(self),
            external_id: external_id.to_string(),
        })
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.ids.lock().unwrap().contains(external_id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Releases its external id on drop.
#[derive(Debug)]
pub struct RunGuard {
    runs: Arc<InFlightRuns>,
    external_id: String,
}

impl RunGuard {
    pub fn external_id(&self) -> &str {
        &self.external_id
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Ok(mut ids) = self.runs.ids.lock() {
            ids.remove(&self.external_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_id_rejected_until_guard_drops() {
        let runs = Arc::new(InFlightRuns::new(4));
        let guard = runs.try_acquire("deploy-1").unwrap();
        assert!(matches!(
            runs.try_acquire("deploy-1"),
            Err(RemedyError::RunInProgress(id)) if id == "deploy-1"
        ));
        assert!(runs.contains("deploy-1"));

        drop(guard);
        assert!(runs.is_empty());
        assert!(runs.try_acquire("deploy-1").is_ok());
    }

    #[test]
    fn test_capacity_bound() {
        let runs = Arc::new(InFlightRuns::new(2));
        let _a = runs.try_acquire("a").unwrap();
        let _b = runs.try_acquire("b").unwrap();
        assert!(matches!(
            runs.try_acquire("c"),
            Err(RemedyError::RunCapacity { capacity: 2 })
        ));
        assert_eq!(runs.len(), 2);
    }
}
