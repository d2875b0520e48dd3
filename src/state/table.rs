//! ExecutorTable - canonical key to live executor state
//!
//! Entries are created lazily on first reference and never removed one by one;
//! the whole table is dropped with [`ExecutorTable::reset`] on reconfiguration.

use super::types::ExecutorState;
use crate::address::ExecKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type StateMap = HashMap<ExecKey, ExecutorState>;

/// Shared executor state table
///
/// Lookup-or-create happens under a single lock, so concurrent lookups for the
/// same key always end up on the same entry.
#[derive(Clone, Default)]
pub struct ExecutorTable {
    execs: Arc<Mutex<StateMap>>,
}

impl ExecutorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the entry for `key`, creating a blank one if needed
    pub fn get(&self, key: &ExecKey) -> ExecutorState {
        self.update(key, |state| state.clone())
    }

    /// Run `f` on the entry for `key`, creating a blank one if needed
    pub fn update<R>(&self, key: &ExecKey, f: impl FnOnce(&mut ExecutorState) -> R) -> R {
        let mut execs = self.execs.lock();
        let state = execs
            .entry(key.clone())
            .or_insert_with(|| ExecutorState::new(key.clone()));
        f(state)
    }

    /// Mark `key` as exposed through host variables
    pub fn bind_variable(&self, key: &ExecKey) {
        self.update(key, |state| state.has_variable_binding = true);
    }

    /// Drop every entry
    pub fn reset(&self) {
        self.execs.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.execs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.execs.lock().is_empty()
    }

    /// All entries, sorted by key
    pub fn snapshot(&self) -> Vec<ExecutorState> {
        let mut states: Vec<_> = self.execs.lock().values().cloned().collect();
        states.sort_by(|a, b| a.key.cmp(&b.key));
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_get_creates_blank_entry() {
        let table = ExecutorTable::new();
        let key = ExecKey::new(1, 5);

        assert!(table.is_empty());
        let state = table.get(&key);
        assert_eq!(state, ExecutorState::new(key));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_get_is_idempotent() {
        let table = ExecutorTable::new();
        let key = ExecKey::new(1, 5);

        table.update(&key, |state| state.fader = Some(42));

        let again = table.get(&key);
        assert_eq!(again.fader, Some(42));
        assert_eq!(table.get(&key), again);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_bind_variable() {
        let table = ExecutorTable::new();
        let key = ExecKey::new(2, 3);

        table.bind_variable(&key);
        assert!(table.get(&key).has_variable_binding);
        assert!(!table.get(&ExecKey::new(2, 4)).has_variable_binding);
    }

    #[test]
    fn test_reset_clears_everything() {
        let table = ExecutorTable::new();
        table.bind_variable(&ExecKey::new(1, 1));
        table.update(&ExecKey::new(1, 2), |state| state.active = Some(true));
        assert_eq!(table.len(), 2);

        table.reset();
        assert!(table.is_empty());
        assert!(!table.get(&ExecKey::new(1, 1)).has_variable_binding);
    }

    #[test]
    fn test_clones_share_entries() {
        let table = ExecutorTable::new();
        let other = table.clone();
        other.update(&ExecKey::new(1, 9), |state| state.paused = Some(true));
        assert_eq!(table.get(&ExecKey::new(1, 9)).paused, Some(true));
    }

    #[test]
    fn test_concurrent_lookups_never_lose_updates() {
        let table = ExecutorTable::new();
        let key = ExecKey::new(1, 1);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = table.clone();
                let key = key.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        table.update(&key, |state| {
                            state.fader = Some(state.fader.unwrap_or(0).wrapping_add(1));
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(table.len(), 1);
        // 800 increments on a u8 wrap around to 800 % 256
        assert_eq!(table.get(&key).fader, Some((800 % 256) as u8));
    }

    #[test]
    fn test_snapshot_sorted() {
        let table = ExecutorTable::new();
        table.get(&ExecKey::new(2, 1));
        table.get(&ExecKey::new(1, 1));
        let keys: Vec<_> = table
            .snapshot()
            .into_iter()
            .map(|s| s.key.to_string())
            .collect();
        assert_eq!(keys, vec!["1.1", "2.1"]);
    }
}
