//! Rollback records for applied changes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Pre-apply state of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackEntry {
    pub path: PathBuf,
    /// Original bytes, or `None` when the file did not exist.
    pub original: Option<Vec<u8>>,
}

/// Rollback entries keyed by rollback id.
///
/// Shared by reference between the components that apply and revert
/// changes. Each id can be taken at most once.
#[derive(Debug, Default)]
pub struct RollbackStore {
    entries: Mutex<HashMap<String, Vec<RollbackEntry>>>,
}

impl RollbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<String>, entries: Vec<RollbackEntry>) {
        self.entries.lock().unwrap().insert(id.into(), entries);
    }

    /// Remove and return the entries for `id`.
    pub fn take(&self, id: &str) -> Option<Vec<RollbackEntry>> {
        self.entries.lock().unwrap().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().unwrap().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_is_at_most_once() {
        let store = RollbackStore::new();
        store.insert(
            "rb-1",
            vec![RollbackEntry {
                path: PathBuf::from("a.txt"),
                original: Some(b"x".to_vec()),
            }],
        );
        assert!(store.contains("rb-1"));
        assert_eq!(store.take("rb-1").map(|e| e.len()), Some(1));
        assert!(store.take("rb-1").is_none());
        assert!(store.is_empty());
    }
}
