//! Named event channels
//!
//! Listeners are owned by one editor instance and called synchronously
//! after a commit has been reconciled and applied.

use crate::errors::EditorError;
use crate::key::NodeKey;
use crate::render::RenderBatch;
use crate::selection::Selection;
use crate::state::EditorState;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerChannel {
    Update,
    Error,
    SelectionChange,
}

impl ListenerChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerChannel::Update => "update",
            ListenerChannel::Error => "error",
            ListenerChannel::SelectionChange => "selection-change",
        }
    }
}

impl fmt::Display for ListenerChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of the `update` channel
#[derive(Debug)]
pub struct UpdateEvent<'a> {
    pub prev_state: &'a EditorState,
    pub state: &'a EditorState,
    pub batch: &'a RenderBatch,
    pub dirty: &'a [NodeKey],
    pub tags: &'a [String],
}

impl UpdateEvent<'_> {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

pub type UpdateListener = Box<dyn FnMut(&UpdateEvent<'_>)>;
pub type ErrorListener = Box<dyn FnMut(&EditorError)>;
pub type SelectionListener = Box<dyn FnMut(Option<&Selection>)>;

#[derive(Default)]
pub struct Listeners {
    next_id: u64,
    update: Vec<(ListenerId, UpdateListener)>,
    error: Vec<(ListenerId, ErrorListener)>,
    selection: Vec<(ListenerId, SelectionListener)>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    pub fn add_update(&mut self, listener: impl FnMut(&UpdateEvent<'_>) + 'static) -> ListenerId {
        let id = self.allocate();
        self.update.push((id, Box::new(listener)));
        id
    }

    pub fn add_error(&mut self, listener: impl FnMut(&EditorError) + 'static) -> ListenerId {
        let id = self.allocate();
        self.error.push((id, Box::new(listener)));
        id
    }

    pub fn add_selection_change(&mut self, listener: impl FnMut(Option<&Selection>) + 'static) -> ListenerId {
        let id = self.allocate();
        self.selection.push((id, Box::new(listener)));
        id
    }

    /// Unsubscribe from whichever channel `id` belongs to
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.len();
        self.update.retain(|(i, _)| *i != id);
        self.error.retain(|(i, _)| *i != id);
        self.selection.retain(|(i, _)| *i != id);
        self.len() != before
    }

    pub fn count(&self, channel: ListenerChannel) -> usize {
        match channel {
            ListenerChannel::Update => self.update.len(),
            ListenerChannel::Error => self.error.len(),
            ListenerChannel::SelectionChange => self.selection.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.update.len() + self.error.len() + self.selection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn emit_update(&mut self, event: &UpdateEvent<'_>) {
        for (_, listener) in self.update.iter_mut() {
            listener(event);
        }
    }

    /// Returns false when nobody is subscribed to the error channel
    pub(crate) fn emit_error(&mut self, error: &EditorError) -> bool {
        for (_, listener) in self.error.iter_mut() {
            listener(error);
        }
        !self.error.is_empty()
    }

    pub(crate) fn emit_selection_change(&mut self, selection: Option<&Selection>) {
        for (_, listener) in self.selection.iter_mut() {
            listener(selection);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("update", &self.update.len())
            .field("error", &self.error.len())
            .field("selection_change", &self.selection.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_remove_unsubscribes_only_that_listener() {
        let mut listeners = Listeners::new();
        let calls = Rc::new(Cell::new(0));

        let counter = Rc::clone(&calls);
        let first = listeners.add_error(move |_| counter.set(counter.get() + 1));
        let counter = Rc::clone(&calls);
        listeners.add_error(move |_| counter.set(counter.get() + 10));

        assert!(listeners.emit_error(&EditorError::no_transaction()));
        assert_eq!(calls.get(), 11);

        assert!(listeners.remove(first));
        assert!(!listeners.remove(first));
        listeners.emit_error(&EditorError::no_transaction());
        assert_eq!(calls.get(), 21);
        assert_eq!(listeners.count(ListenerChannel::Error), 1);
    }

    #[test]
    fn test_emit_error_reports_missing_subscribers() {
        let mut listeners = Listeners::new();
        assert!(!listeners.emit_error(&EditorError::no_transaction()));
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(ListenerChannel::Update.to_string(), "update");
        assert_eq!(ListenerChannel::SelectionChange.as_str(), "selection-change");
    }
}
