//! # History Manager
//!
//! Undo and redo over committed snapshots.
//!
//! ## Design
//!
//! - An entry is the snapshot *before* a history-eligible commit; the
//!   selection travels inside the snapshot
//! - Undo swaps the current snapshot for the top entry and moves the
//!   current one to the redo stack
//! - A new entry clears the redo stack
//! - Typing is coalesced: a commit merges into the previous entry when it
//!   only inserted text into the same text node as the previous commit,
//!   arrived within the merge interval, and the selection was not moved
//!   in between
//!
//! Time is passed in by the caller so coalescing is deterministic in tests.

use crate::key::NodeKey;
use crate::selection::Selection;
use crate::state::EditorState;
use crate::transaction::ChangeKind;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub state: Arc<EditorState>,
    pub recorded_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    /// A new undo step was pushed
    Pushed,
    /// The commit was folded into the previous undo step
    Merged,
    /// Nothing to record
    Skipped,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Pushed => "pushed",
            HistoryAction::Merged => "merged",
            HistoryAction::Skipped => "skipped",
        }
    }
}

/// The typing session the next commit may merge into
#[derive(Debug, Clone)]
struct OpenEdit {
    key: NodeKey,
    at: Instant,
    selection_after: Option<Selection>,
}

#[derive(Debug)]
pub struct HistoryManager {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    /// Maximum number of undo levels (0 = unlimited)
    max_depth: usize,
    merge_interval: Duration,
    open_edit: Option<OpenEdit>,
}

impl HistoryManager {
    pub fn new(max_depth: usize, merge_interval: Duration) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth,
            merge_interval,
            open_edit: None,
        }
    }

    /// Record the transition `prev → next` made by a commit of kind `change`
    pub fn record(
        &mut self,
        prev: &Arc<EditorState>,
        next: &Arc<EditorState>,
        change: &ChangeKind,
        now: Instant,
    ) -> HistoryAction {
        let key = match change {
            ChangeKind::None => return HistoryAction::Skipped,
            ChangeKind::TextInsertion(key) => Some(key),
            ChangeKind::Other => None,
        };

        if let (Some(key), Some(open)) = (key, self.open_edit.as_mut()) {
            let adjacent = open.key == *key
                && now.saturating_duration_since(open.at) <= self.merge_interval
                && prev.selection() == open.selection_after.as_ref()
                && !self.undo_stack.is_empty();
            if adjacent {
                open.at = now;
                open.selection_after = next.selection().cloned();
                self.redo_stack.clear();
                return HistoryAction::Merged;
            }
        }

        self.push(HistoryEntry {
            state: Arc::clone(prev),
            recorded_at: now,
        });
        self.open_edit = key.map(|key| OpenEdit {
            key: key.clone(),
            at: now,
            selection_after: next.selection().cloned(),
        });
        HistoryAction::Pushed
    }

    fn push(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);

        if self.max_depth > 0 && self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }

        self.redo_stack.clear();
    }

    /// Pop the snapshot to restore; `current` moves to the redo stack
    pub fn undo(&mut self, current: &Arc<EditorState>, now: Instant) -> Option<Arc<EditorState>> {
        let entry = self.undo_stack.pop()?;
        self.redo_stack.push(HistoryEntry {
            state: Arc::clone(current),
            recorded_at: now,
        });
        self.open_edit = None;
        Some(entry.state)
    }

    pub fn redo(&mut self, current: &Arc<EditorState>, now: Instant) -> Option<Arc<EditorState>> {
        let entry = self.redo_stack.pop()?;
        self.undo_stack.push(HistoryEntry {
            state: Arc::clone(current),
            recorded_at: now,
        });
        self.open_edit = None;
        Some(entry.state)
    }

    /// Stop the current typing session from absorbing further commits
    pub fn break_coalescing(&mut self) {
        self.open_edit = None;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.open_edit = None;
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(100, Duration::from_millis(1000))
    }
}
