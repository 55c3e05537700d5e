//! Bounded undo/redo history of labelled snapshots.
//!
//! The buffer holds up to `capacity` entries and a cursor pointing at the
//! entry that matches the live state. Committing after an undo drops every
//! entry after the cursor, so redo is only possible right after undo.
//!
//! ```
//! use filament::history::UndoBuffer;
//!
//! let mut history = UndoBuffer::new(3);
//! history.commit("load", 0);
//! history.commit("edit", 1);
//! assert_eq!(history.undo().map(|e| e.state), Some(0));
//! assert_eq!(history.redo().map(|e| e.state), Some(1));
//! assert!(history.redo().is_none());
//! ```

use std::collections::VecDeque;

/// Default number of retained snapshots.
pub const DEFAULT_CAPACITY: usize = 10;

/// One labelled snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry<T> {
    /// What produced this state.
    pub label: String,
    /// The stored state.
    pub state: T,
}

/// A fixed-capacity ring of snapshots with an undo cursor.
#[derive(Debug, Clone)]
pub struct UndoBuffer<T> {
    entries: VecDeque<HistoryEntry<T>>,
    cursor: usize,
    capacity: usize,
}

impl<T> Default for UndoBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<T> UndoBuffer<T> {
    /// Create an empty buffer; a capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            cursor: 0,
            capacity,
        }
    }

    /// Maximum number of entries kept.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been committed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Push a new state, discarding redo entries and evicting the oldest
    /// entry when full.
    pub fn commit(&mut self, label: impl Into<String>, state: T) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            label: label.into(),
            state,
        });
        self.cursor = self.entries.len() - 1;
    }

    /// The entry matching the live state.
    pub fn current(&self) -> Option<&HistoryEntry<T>> {
        self.entries.get(self.cursor)
    }

    /// Whether [`UndoBuffer::undo`] would succeed.
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Whether [`UndoBuffer::redo`] would succeed.
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Step back one entry. Returns `None` at the oldest entry.
    pub fn undo(&mut self) -> Option<&HistoryEntry<T>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// Step forward one entry. Returns `None` if nothing was undone since
    /// the last commit.
    pub fn redo(&mut self) -> Option<&HistoryEntry<T>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor)
    }

    /// Labels from oldest to newest.
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.label.as_str())
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}
