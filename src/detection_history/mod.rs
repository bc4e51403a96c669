//! DetectionHistory - Bounded Detection History
//!
//! ## Responsibilities
//!
//! - Keep new detections most-recent-first
//! - Drop the oldest entry once capacity is reached

use crate::models::DetectionSnapshot;
use std::collections::VecDeque;

/// Default number of retained detections
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Most-recent-first ring of detection snapshots
#[derive(Debug, Clone)]
pub struct DetectionHistory {
    entries: VecDeque<DetectionSnapshot>,
    capacity: usize,
}

impl DetectionHistory {
    /// Create a history holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepend a detection, dropping the oldest when full
    pub fn push(&mut self, snapshot: DetectionSnapshot) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(snapshot);
    }

    /// Copy of all entries, most recent first
    pub fn to_vec(&self) -> Vec<DetectionSnapshot> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for DetectionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(ts: &str) -> DetectionSnapshot {
        DetectionSnapshot {
            detected: true,
            timestamp: Some(ts.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_push_is_most_recent_first() {
        let mut history = DetectionHistory::new(3);
        history.push(snap("T1"));
        history.push(snap("T2"));
        let entries = history.to_vec();
        assert_eq!(entries[0].timestamp.as_deref(), Some("T2"));
        assert_eq!(entries[1].timestamp.as_deref(), Some("T1"));
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = DetectionHistory::default();
        for i in 0..60 {
            history.push(snap(&format!("T{}", i)));
        }
        assert_eq!(history.len(), DEFAULT_HISTORY_CAPACITY);
        let entries = history.to_vec();
        assert_eq!(entries[0].timestamp.as_deref(), Some("T59"));
        assert_eq!(entries[49].timestamp.as_deref(), Some("T10"));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut history = DetectionHistory::new(0);
        history.push(snap("T1"));
        history.push(snap("T2"));
        assert_eq!(history.len(), 1);
        assert_eq!(history.to_vec()[0].timestamp.as_deref(), Some("T2"));
    }
}
