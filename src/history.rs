//! Bounded undo history of whole-scene snapshots.
//!
//! Every entry is an owned deep copy of the widget list, so no two entries
//! (and no entry and the live scene) share mutable state.

use crate::constants::MAX_UNDO_HISTORY;
use crate::types::Widget;
use std::collections::VecDeque;

/// Undo stack with FIFO eviction once it reaches capacity.
#[derive(Debug, Clone)]
pub struct History {
    snapshots: VecDeque<Vec<Widget>>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl History {
    /// Creates an empty history keeping at most `capacity` snapshots.
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records a copy of `widgets`, evicting the oldest entry when full.
    ///
    /// # Arguments
    ///
    /// * `widgets` - The widget list as it is right before a mutation
    pub fn snapshot(&mut self, widgets: &[Widget]) {
        if self.capacity == 0 {
            return;
        }
        self.snapshots.push_back(widgets.to_vec());
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
    }

    /// Pops the most recent snapshot.
    ///
    /// # Returns
    ///
    /// The widget list to restore, or `None` if there is nothing to undo
    pub fn undo(&mut self) -> Option<Vec<Widget>> {
        self.snapshots.pop_back()
    }

    /// Drops the most recent snapshot without restoring it.
    ///
    /// Used when a gesture that snapshotted at its start ends up changing
    /// nothing, or is cancelled.
    pub fn discard_latest(&mut self) {
        self.snapshots.pop_back();
    }

    /// Returns true if there are snapshots that can be undone.
    pub fn can_undo(&self) -> bool {
        !self.snapshots.is_empty()
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns true if the history is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Maximum number of stored snapshots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forgets every snapshot.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
