//! Bounded deduplication window.

use std::collections::{HashSet, VecDeque};

/// Number of event ids remembered by default.
pub const DEFAULT_DEDUP_CAPACITY: usize = 100;

/// Insertion-ordered set of the most recent event ids.
///
/// When full, inserting a new id evicts the oldest one, which is then
/// treated as unseen if it arrives again.
#[derive(Debug, Clone)]
pub struct DedupWindow {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl DedupWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Record `id`. Returns `true` if it was not in the window.
    pub fn check_and_insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }

        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }

        self.order.push_back(id.to_string());
        self.seen.insert(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_rejected() {
        let mut window = DedupWindow::default();
        assert!(window.check_and_insert("a"));
        assert!(!window.check_and_insert("a"));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut window = DedupWindow::new(100);
        for i in 0..100 {
            assert!(window.check_and_insert(&format!("id-{i}")));
        }
        assert_eq!(window.len(), 100);

        // 101st insert evicts id-0
        assert!(window.check_and_insert("id-100"));
        assert_eq!(window.len(), 100);
        assert!(!window.contains("id-0"));
        assert!(window.contains("id-1"));

        // The evicted id is new again, and evicts id-1 in turn
        assert!(window.check_and_insert("id-0"));
        assert!(!window.contains("id-1"));
        assert!(!window.check_and_insert("id-100"));
    }

    #[test]
    fn test_clear() {
        let mut window = DedupWindow::new(3);
        window.check_and_insert("a");
        window.clear();
        assert!(window.is_empty());
        assert!(window.check_and_insert("a"));
    }
}
