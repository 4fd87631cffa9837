//! Session buffer for recent dialogue
//!
//! Holds the last N completed turns of one conversation in memory. Appending
//! is constant time and never fails; when the buffer is full the oldest turn
//! is evicted first. Nothing here survives a restart.

use std::collections::VecDeque;

use crate::memory::types::SessionTurn;

/// Bounded FIFO buffer of completed turns, owned by a single session
#[derive(Debug, Clone)]
pub struct SessionStore {
    turns: VecDeque<SessionTurn>,
    capacity: usize,
}

impl SessionStore {
    /// Create an empty store. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a turn, evicting the oldest one when the store is full
    pub fn append(&mut self, turn: SessionTurn) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// The last `n` turns in chronological order (oldest first).
    ///
    /// `n` larger than the store returns every turn.
    pub fn recent(&self, n: usize) -> Vec<SessionTurn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    /// Drop every turn (user-requested reset)
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate over turns, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &SessionTurn> {
        self.turns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(i: usize) -> SessionTurn {
        SessionTurn::new(format!("user {i}"), format!("assistant {i}"))
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = SessionStore::new(4);
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.capacity(), 4);
        assert!(store.recent(3).is_empty());
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut store = SessionStore::new(0);
        assert_eq!(store.capacity(), 1);
        store.append(turn(1));
        store.append(turn(2));
        assert_eq!(store.len(), 1);
        assert_eq!(store.recent(1)[0].user_text, "user 2");
    }

    #[test]
    fn test_eviction_is_fifo() {
        let mut store = SessionStore::new(3);
        for i in 0..5 {
            store.append(turn(i));
        }

        assert_eq!(store.len(), 3);
        let users: Vec<_> = store.iter().map(|t| t.user_text.as_str()).collect();
        assert_eq!(users, vec!["user 2", "user 3", "user 4"]);
    }

    #[test]
    fn test_recent_is_chronological_and_clamped() {
        let mut store = SessionStore::new(10);
        for i in 0..4 {
            store.append(turn(i));
        }

        let last_two = store.recent(2);
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].user_text, "user 2");
        assert_eq!(last_two[1].user_text, "user 3");

        assert_eq!(store.recent(100).len(), 4);
        assert!(store.recent(0).is_empty());
    }

    #[test]
    fn test_recent_has_no_side_effects() {
        let mut store = SessionStore::new(3);
        store.append(turn(1));
        let _ = store.recent(5);
        let _ = store.recent(5);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut store = SessionStore::new(3);
        store.append(turn(1));
        store.append(turn(2));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 3);
    }
}
