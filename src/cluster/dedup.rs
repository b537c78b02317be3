//! Bounded memory of already-delivered notifications.

use std::collections::{HashSet, VecDeque};

type Stamp = (String, String, u64);

/// Remembers the most recent `(origin, incarnation, sequence)` stamps.
///
/// The oldest stamp is forgotten once `capacity` is exceeded.
pub struct DedupWindow {
    capacity: usize,
    order: VecDeque<Stamp>,
    seen: HashSet<Stamp>,
}

impl DedupWindow {
    /// Create a window holding at most `capacity` stamps (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Record a stamp. Returns `false` if it was already in the window.
    pub fn insert(&mut self, origin: &str, incarnation: &str, sequence: u64) -> bool {
        let key = (origin.to_string(), incarnation.to_string(), sequence);
        if self.seen.contains(&key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        true
    }

    /// Number of remembered stamps.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
