//! # Editing Commands
//!
//! The operations an input layer drives from key presses, built only from
//! the public [`Transaction`] mutators. Every command works on the current
//! selection and leaves a collapsed or re-anchored selection behind.

use crate::errors::{EditorError, EditorResult};
use crate::key::NodeKey;
use crate::node::{Attributes, NodeKind, TextFormat};
use crate::selection::{end_point_of, Point, PointType, Selection};
use crate::transaction::{ChangeKind, Transaction};
use crate::tree::NodeMap;

impl Transaction {
    fn require_selection(&self) -> EditorResult<Selection> {
        self.selection()
            .cloned()
            .ok_or_else(|| EditorError::invalid("the command needs a selection"))
    }

    fn caret(&mut self, key: &NodeKey, offset: usize, format: TextFormat) {
        self.set_selection(Some(Selection::caret(key.clone(), offset).with_format(format)));
    }

    /// Child of `container` that is `key` or holds it
    fn child_holding(&self, container: &NodeKey, key: &NodeKey) -> Option<NodeKey> {
        let mut current = key.clone();
        loop {
            let parent = self.node(&current)?.parent()?.clone();
            if &parent == container {
                return Some(current);
            }
            current = parent;
        }
    }

    /// Remove `key` and then every ancestor left empty by that, stopping
    /// below the root
    fn remove_with_empty_ancestors(&mut self, key: &NodeKey) -> EditorResult<()> {
        let mut parent = self.get(key)?.parent().cloned();
        self.remove(key)?;
        while let Some(current) = parent {
            if &current == self.root_key() || !self.children_of(&current).is_empty() {
                break;
            }
            parent = self.get(&current)?.parent().cloned();
            self.remove(&current)?;
        }
        Ok(())
    }

    /// Type text at the selection
    ///
    /// A range is deleted first. Typing into a text node of the selection's
    /// format extends it; any other format gets its own text node.
    pub fn insert_text(&mut self, text: &str) -> EditorResult<()> {
        let before = self.change().clone();
        let mut selection = self.require_selection()?;
        let mut replaced_range = false;
        if !selection.is_collapsed() {
            self.delete_range()?;
            replaced_range = true;
            selection = self.require_selection()?;
        }
        if text.is_empty() {
            return Ok(());
        }

        let format = selection.format;
        let point = selection.anchor;
        let inserted = text.chars().count();

        let target = match point.point_type {
            PointType::Text => {
                let node = self.get(&point.key)?;
                let len = node.content_len();
                if node.format() == format {
                    self.splice_text(&point.key, point.offset, 0, text)?;
                    self.caret(&point.key, point.offset + inserted, format);
                    point.key
                } else {
                    let run = self.create_formatted_text(text, format)?;
                    if point.offset == 0 {
                        self.insert_before(&point.key, &run)?;
                    } else if point.offset >= len {
                        self.insert_after(&point.key, &run)?;
                    } else {
                        let parts = self.split_text(&point.key, &[point.offset])?;
                        self.insert_after(&parts[0], &run)?;
                    }
                    self.caret(&run, inserted, format);
                    run
                }
            }
            PointType::Element => {
                let (container, index) = if &point.key == self.root_key() {
                    let paragraph = self.create_element("paragraph")?;
                    let root = self.root_key().clone();
                    self.insert_at(&root, &paragraph, point.offset)?;
                    (paragraph, 0)
                } else {
                    (point.key.clone(), point.offset)
                };
                self.insert_text_at_slot(&container, index, text, format)?
            }
        };

        let change = if replaced_range {
            ChangeKind::Other
        } else {
            before.combine(ChangeKind::TextInsertion(target))
        };
        self.set_change(change);
        Ok(())
    }

    /// Insert at child slot `index` of `container`, reusing a neighbouring
    /// text node of the same format
    fn insert_text_at_slot(
        &mut self,
        container: &NodeKey,
        index: usize,
        text: &str,
        format: TextFormat,
    ) -> EditorResult<NodeKey> {
        let inserted = text.chars().count();
        let children = self.children_of(container).to_vec();
        let same_format = |key: &NodeKey| {
            self.node(key)
                .map(|n| n.is_text() && n.format() == format)
                .unwrap_or(false)
        };

        let previous = index
            .checked_sub(1)
            .and_then(|i| children.get(i))
            .filter(|k| same_format(k))
            .cloned();
        let next = children.get(index).filter(|k| same_format(k)).cloned();

        if let Some(previous) = previous {
            let len = self.get(&previous)?.content_len();
            self.splice_text(&previous, len, 0, text)?;
            self.caret(&previous, len + inserted, format);
            return Ok(previous);
        }
        if let Some(next) = next {
            self.splice_text(&next, 0, 0, text)?;
            self.caret(&next, inserted, format);
            return Ok(next);
        }

        let run = self.create_formatted_text(text, format)?;
        self.insert_at(container, &run, index)?;
        self.caret(&run, inserted, format);
        Ok(run)
    }

    /// Remove everything between the selection's start and end
    pub fn delete_range(&mut self) -> EditorResult<()> {
        let selection = self.require_selection()?;
        if selection.is_collapsed() {
            return Ok(());
        }
        let (start, end) = selection.start_end(&*self);

        if start.key == end.key && start.point_type == PointType::Text {
            self.splice_text(&start.key, start.offset, end.offset - start.offset, "")?;
            let format = self.get(&start.key)?.format();
            self.caret(&start.key, start.offset, format);
            return Ok(());
        }

        let start_block = self.block_of(&start.key).map(|n| n.key().clone());
        let end_block = self.block_of(&end.key).map(|n| n.key().clone());

        // Pre-order window strictly between the two points
        let order = self.traverse();
        let position = |key: &NodeKey| order.iter().position(|k| k == key);
        let after_subtree = |key: &NodeKey| {
            self.last_descendant(key)
                .and_then(|n| position(n.key()))
                .map(|i| i + 1)
        };
        let lo = match start.point_type {
            PointType::Text => position(&start.key).map(|i| i + 1),
            PointType::Element => match self.children_of(&start.key).get(start.offset) {
                Some(child) => position(child),
                None => after_subtree(&start.key),
            },
        };
        let hi = match end.point_type {
            PointType::Text => position(&end.key),
            PointType::Element => match self.children_of(&end.key).get(end.offset) {
                Some(child) => position(child),
                None => after_subtree(&end.key),
            },
        };
        let (Some(lo), Some(hi)) = (lo, hi) else {
            return Err(EditorError::invalid("selection does not resolve against the tree"));
        };

        let candidates: Vec<NodeKey> = order
            .get(lo..hi.max(lo))
            .unwrap_or_default()
            .iter()
            .filter(|k| *k != &end.key && !self.is_ancestor_of(k, &end.key))
            .cloned()
            .collect();

        // Trim the partial text runs at both ends
        if start.point_type == PointType::Text {
            let len = self.get(&start.key)?.content_len();
            self.splice_text(&start.key, start.offset, len - start.offset.min(len), "")?;
        }
        if end.point_type == PointType::Text {
            self.splice_text(&end.key, 0, end.offset, "")?;
        }

        let mut removed: Vec<NodeKey> = Vec::new();
        for key in candidates {
            if removed.iter().any(|r| self.is_ancestor_of(r, &key)) {
                continue;
            }
            self.remove(&key)?;
            removed.push(key);
        }

        match start.point_type {
            PointType::Text => {
                let format = self.get(&start.key)?.format();
                self.caret(&start.key, start.offset, format);
            }
            PointType::Element => self.set_selection(Some(Selection::collapsed(start.clone()))),
        }

        if let (Some(start_block), Some(end_block)) = (start_block, end_block) {
            if start_block != end_block && self.contains(&end_block) {
                self.move_children(&end_block, &start_block)?;
                self.remove_with_empty_ancestors(&end_block)?;
            }
        }
        Ok(())
    }

    /// Backspace
    pub fn delete_backward(&mut self) -> EditorResult<()> {
        let selection = self.require_selection()?;
        if !selection.is_collapsed() {
            return self.delete_range();
        }
        let point = selection.anchor;

        if point.point_type == PointType::Text && point.offset > 0 {
            self.splice_text(&point.key, point.offset - 1, 1, "")?;
            self.caret(&point.key, point.offset - 1, selection.format);
            return Ok(());
        }

        let slot = match point.point_type {
            PointType::Text => {
                let parent = self.get(&point.key)?.parent().cloned();
                parent.zip(self.index_in_parent(&point.key))
            }
            PointType::Element => Some((point.key.clone(), point.offset)),
        };

        if let Some((container, index)) = slot {
            if index > 0 && self.get(&container)?.kind() == NodeKind::Element && &container != self.root_key() {
                let previous = self
                    .children_of(&container)
                    .get(index - 1)
                    .cloned()
                    .ok_or_else(|| EditorError::invalid(format!("offset {} is past the children of {}", index, container)))?;
                let previous_node = self.get(&previous)?;
                match previous_node.kind() {
                    NodeKind::Text if previous_node.content_len() > 0 => {
                        let len = previous_node.content_len();
                        self.splice_text(&previous, len - 1, 1, "")?;
                        self.select_text(&previous, len - 1)?;
                    }
                    NodeKind::Element if !previous_node.children().is_empty() => {
                        self.select_end(&previous)?;
                        return self.delete_backward();
                    }
                    _ => self.remove(&previous)?,
                }
                return Ok(());
            }
        }

        self.collapse_block_at_start(&point)
    }

    fn collapse_block_at_start(&mut self, point: &Point) -> EditorResult<()> {
        let Some(block) = self.block_of(&point.key).map(|n| n.key().clone()) else {
            return Ok(());
        };
        let behavior = self.registry().get(self.get(&block)?.node_type())?;
        if behavior.collapse_at_start(self, &block)? {
            return Ok(());
        }

        // Nearest previous sibling of the block or of one of its ancestors
        let mut current = block.clone();
        let previous = loop {
            if &current == self.root_key() {
                return Ok(());
            }
            if let Some(previous) = self.previous_sibling(&current) {
                break previous.key().clone();
            }
            match self.get(&current)?.parent() {
                Some(parent) => current = parent.clone(),
                None => return Ok(()),
            }
        };

        if self.get(&previous)?.kind() != NodeKind::Element {
            return self.remove(&previous);
        }

        // Merge into the last inline-holding element of the previous block
        let mut target = previous;
        while let Some(last) = self.last_child(&target).filter(|n| n.is_element()) {
            target = last.key().clone();
        }
        let merge_point = end_point_of(&*self, &target)
            .ok_or_else(|| EditorError::NodeNotFound(target.clone()))?;
        let format = self.get(&merge_point.key)?.format();

        self.move_children(&block, &target)?;
        self.set_selection(Some(Selection::collapsed(merge_point).with_format(format)));
        self.remove_with_empty_ancestors(&block)
    }

    /// Enter: split the current block at the caret
    pub fn insert_paragraph(&mut self) -> EditorResult<()> {
        let mut selection = self.require_selection()?;
        if !selection.is_collapsed() {
            self.delete_range()?;
            selection = self.require_selection()?;
        }
        let point = selection.anchor.clone();

        let Some(block) = self.block_of(&point.key).map(|n| n.key().clone()) else {
            let paragraph = self.create_element("paragraph")?;
            let root = self.root_key().clone();
            let index = if point.key == root { point.offset } else { self.children_of(&root).len() };
            self.insert_at(&root, &paragraph, index)?;
            return self.select_start(&paragraph);
        };

        let children = self.children_of(&block).to_vec();
        let split_index = match point.point_type {
            PointType::Element if point.key == block => point.offset,
            _ => {
                let holder = self
                    .child_holding(&block, &point.key)
                    .ok_or_else(|| EditorError::NodeNotFound(point.key.clone()))?;
                let index = self.index_in_parent(&holder).unwrap_or(children.len());
                let len = self.get(&point.key)?.content_len();
                match point.point_type {
                    PointType::Text if holder == point.key && point.offset == 0 => index,
                    PointType::Text if holder == point.key && point.offset < len => {
                        self.split_text(&point.key, &[point.offset])?;
                        index + 1
                    }
                    _ => index + 1,
                }
            }
        };

        let children = self.children_of(&block).to_vec();
        if split_index == 0 && !children.is_empty() {
            // Enter at the very start keeps the block and opens one above
            let paragraph = self.create_element("paragraph")?;
            let direction = self.get(&block)?.direction();
            self.set_direction(&paragraph, direction)?;
            self.insert_before(&block, &paragraph)?;
            self.set_selection(Some(selection));
            return Ok(());
        }

        let next = self.insert_new_after(&block)?;
        for child in children.iter().skip(split_index) {
            self.append(&next, child)?;
        }
        self.select_start(&next)?;
        if let Some(mut caret) = self.selection().cloned() {
            if caret.anchor.point_type == PointType::Element {
                caret.format = selection.format;
                self.set_selection(Some(caret));
            }
        }
        Ok(())
    }

    /// Shift+Enter: insert a line break at the caret
    pub fn insert_line_break(&mut self) -> EditorResult<()> {
        let mut selection = self.require_selection()?;
        if !selection.is_collapsed() {
            self.delete_range()?;
            selection = self.require_selection()?;
        }
        let point = selection.anchor;
        let line_break = self.create_node("linebreak", Attributes::new())?;

        match point.point_type {
            PointType::Text => {
                let len = self.get(&point.key)?.content_len();
                if point.offset == 0 {
                    self.insert_before(&point.key, &line_break)?;
                } else if point.offset >= len {
                    self.insert_after(&point.key, &line_break)?;
                } else {
                    let parts = self.split_text(&point.key, &[point.offset])?;
                    self.insert_after(&parts[0], &line_break)?;
                }
            }
            PointType::Element => {
                if &point.key == self.root_key() {
                    return Err(EditorError::invalid("a line break needs a block"));
                }
                self.insert_at(&point.key, &line_break, point.offset)?;
            }
        }

        let (parent, index) = self
            .get(&line_break)?
            .parent()
            .cloned()
            .zip(self.index_in_parent(&line_break))
            .ok_or_else(|| EditorError::NodeNotFound(line_break.clone()))?;
        let caret = Selection::collapsed(Point::element(parent, index + 1)).with_format(selection.format);
        self.set_selection(Some(caret));
        Ok(())
    }

    /// Toggle `flag` on the selected text, or on the typing format when the
    /// selection is collapsed
    ///
    /// The flag is removed only when every selected run already has it.
    pub fn format_text(&mut self, flag: TextFormat) -> EditorResult<()> {
        let mut selection = self.require_selection()?;
        if selection.is_collapsed() {
            selection.format ^= flag;
            self.set_selection(Some(selection));
            return Ok(());
        }
        let (start, end) = selection.start_end(&*self);

        // Split the boundary runs so the range covers whole text nodes
        let mut first: Option<NodeKey> = None;
        let mut last: Option<NodeKey> = None;
        if start.point_type == PointType::Text && start.key == end.key {
            let parts = self.split_text(&start.key, &[start.offset, end.offset])?;
            let index = usize::from(start.offset > 0);
            first = parts.get(index).cloned();
            last = first.clone();
        } else {
            if start.point_type == PointType::Text {
                let len = self.get(&start.key)?.content_len();
                if start.offset == 0 {
                    first = Some(start.key.clone());
                } else if start.offset < len {
                    first = self.split_text(&start.key, &[start.offset])?.get(1).cloned();
                }
            }
            if end.point_type == PointType::Text && end.offset > 0 {
                let parts = self.split_text(&end.key, &[end.offset])?;
                last = parts.first().cloned();
            }
        }

        let order = self.text_nodes();
        let position = |key: &NodeKey| order.iter().position(|k| k == key);
        let lo = match &first {
            Some(key) => position(key),
            None => order
                .iter()
                .position(|k| Point::text(k.clone(), 0).compare(&start, &*self).is_ge()),
        };
        let hi = match &last {
            Some(key) => position(key),
            None => order
                .iter()
                .rposition(|k| Point::text(k.clone(), 0).compare(&end, &*self).is_lt()),
        };
        let targets: Vec<NodeKey> = match (lo, hi) {
            (Some(lo), Some(hi)) if lo <= hi => order[lo..=hi]
                .iter()
                .filter(|k| self.node(k).map(|n| n.content_len() > 0).unwrap_or(false))
                .cloned()
                .collect(),
            _ => Vec::new(),
        };
        if targets.is_empty() {
            return Ok(());
        }

        let all_have = targets
            .iter()
            .all(|k| self.node(k).map(|n| n.has_format(flag)).unwrap_or(false));
        for key in &targets {
            let format = self.get(key)?.format();
            let next = if all_have { format - flag } else { format | flag };
            self.set_format(key, next)?;
        }

        let first = &targets[0];
        let last = &targets[targets.len() - 1];
        let last_len = self.get(last)?.content_len();
        let format = self.get(first)?.format();
        self.set_selection(Some(
            Selection::new(Point::text(first.clone(), 0), Point::text(last.clone(), last_len)).with_format(format),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::EditorError;
    use crate::key::{KeyGenerator, NodeKey};
    use crate::node::TextFormat;
    use crate::registry::NodeRegistry;
    use crate::selection::{Point, Selection};
    use crate::state::EditorState;
    use crate::transaction::{ChangeKind, Transaction, UpdateOptions};
    use crate::tree::NodeMap;
    use std::sync::Arc;

    fn open(state: EditorState) -> Transaction {
        Transaction::new(
            Arc::new(state),
            Arc::new(NodeRegistry::with_builtins()),
            KeyGenerator::new(),
            UpdateOptions::new(),
        )
    }

    // paragraph "1" > text "2" ("hello"), text "3" ("world"); paragraph "4" > text "5" ("second")
    fn sample_with(selection: Selection) -> Transaction {
        let state = EditorState::builder()
            .paragraph(&["hello", "world"])
            .paragraph(&["second"])
            .build()
            .with_selection(Some(selection));
        open(state)
    }

    fn texts_of(txn: &Transaction, block: &str) -> Vec<String> {
        txn.children_of(&NodeKey::new(block))
            .iter()
            .filter_map(|k| txn.node(k).and_then(|n| n.text()).map(str::to_string))
            .collect()
    }

    #[test]
    fn test_insert_text_extends_run() {
        let mut txn = sample_with(Selection::caret(NodeKey::new("2"), 5));
        txn.insert_text("!").unwrap();

        assert_eq!(texts_of(&txn, "1"), vec!["hello!", "world"]);
        assert_eq!(txn.selection(), Some(&Selection::caret(NodeKey::new("2"), 6)));
        assert_eq!(txn.change(), &ChangeKind::TextInsertion(NodeKey::new("2")));
    }

    #[test]
    fn test_insert_text_with_other_format_splits_run() {
        let caret = Selection::caret(NodeKey::new("2"), 2).with_format(TextFormat::BOLD);
        let mut txn = sample_with(caret);
        txn.insert_text("X").unwrap();

        assert_eq!(texts_of(&txn, "1"), vec!["he", "X", "llo", "world"]);
        let run = txn.selection().unwrap().anchor.key.clone();
        assert!(txn.get(&run).unwrap().has_format(TextFormat::BOLD));
    }

    #[test]
    fn test_insert_text_into_empty_root_creates_paragraph() {
        let state = EditorState::empty().with_selection(Some(Selection::collapsed(Point::element(NodeKey::root(), 0))));
        let mut txn = open(state);
        txn.insert_text("hi").unwrap();

        let paragraph = txn.children_of(&NodeKey::root())[0].clone();
        assert_eq!(txn.get(&paragraph).unwrap().node_type(), "paragraph");
        assert_eq!(txn.text_content(&paragraph), "hi");
    }

    #[test]
    fn test_delete_backward_inside_text() {
        let mut txn = sample_with(Selection::caret(NodeKey::new("3"), 1));
        txn.delete_backward().unwrap();
        assert_eq!(texts_of(&txn, "1"), vec!["hello", "orld"]);
        assert_eq!(txn.selection(), Some(&Selection::caret(NodeKey::new("3"), 0)));

        // at the start of a run the previous run loses its last character
        txn.delete_backward().unwrap();
        assert_eq!(texts_of(&txn, "1"), vec!["hell", "orld"]);
    }

    #[test]
    fn test_delete_backward_merges_blocks() {
        let mut txn = sample_with(Selection::caret(NodeKey::new("5"), 0));
        txn.delete_backward().unwrap();

        assert_eq!(txn.children_of(&NodeKey::root()), &[NodeKey::new("1")]);
        assert_eq!(texts_of(&txn, "1"), vec!["hello", "world", "second"]);
        assert_eq!(txn.selection().unwrap().anchor, Point::text(NodeKey::new("3"), 5));
    }

    #[test]
    fn test_delete_backward_at_document_start_is_noop() {
        let mut txn = sample_with(Selection::caret(NodeKey::new("2"), 0));
        txn.delete_backward().unwrap();
        assert_eq!(txn.change(), &ChangeKind::None);
        assert_eq!(txn.children_of(&NodeKey::root()).len(), 2);
    }

    #[test]
    fn test_delete_backward_rejects_element_offset_past_children() {
        let mut txn = sample_with(Selection::collapsed(Point::element(NodeKey::new("1"), 5)));
        let err = txn.delete_backward().unwrap_err();

        assert!(matches!(err, EditorError::InvalidOperation(_)));
        assert_eq!(texts_of(&txn, "1"), vec!["hello", "world"]);
    }

    #[test]
    fn test_delete_range_across_blocks() {
        let selection = Selection::new(Point::text(NodeKey::new("2"), 2), Point::text(NodeKey::new("5"), 3));
        let mut txn = sample_with(selection);
        txn.delete_range().unwrap();

        assert_eq!(txn.children_of(&NodeKey::root()), &[NodeKey::new("1")]);
        assert_eq!(txn.text_content(&NodeKey::new("1")), "heond");
        assert_eq!(txn.selection(), Some(&Selection::caret(NodeKey::new("2"), 2)));
    }

    #[test]
    fn test_insert_paragraph_splits_block() {
        let mut txn = sample_with(Selection::caret(NodeKey::new("2"), 3));
        txn.insert_paragraph().unwrap();

        let blocks = txn.children_of(&NodeKey::root()).to_vec();
        assert_eq!(blocks.len(), 3);
        assert_eq!(txn.text_content(&blocks[0]), "hel");
        assert_eq!(txn.text_content(&blocks[1]), "loworld");
        let anchor = &txn.selection().unwrap().anchor;
        assert_eq!(anchor.offset, 0);
        assert_eq!(txn.block_of(&anchor.key).unwrap().key(), &blocks[1]);
    }

    #[test]
    fn test_insert_paragraph_at_end_opens_empty_block() {
        let mut txn = sample_with(Selection::caret(NodeKey::new("5"), 6));
        txn.insert_paragraph().unwrap();

        let blocks = txn.children_of(&NodeKey::root()).to_vec();
        assert_eq!(blocks.len(), 3);
        assert!(txn.children_of(&blocks[2]).is_empty());
        assert_eq!(txn.selection().unwrap().anchor, Point::element(blocks[2].clone(), 0));
    }

    #[test]
    fn test_insert_line_break() {
        let mut txn = sample_with(Selection::caret(NodeKey::new("5"), 3));
        txn.insert_line_break().unwrap();
        txn.insert_text("x").unwrap();

        assert_eq!(txn.text_content(&NodeKey::new("4")), "sec\nxond");
    }

    #[test]
    fn test_format_text_range_toggles() {
        let selection = Selection::new(Point::text(NodeKey::new("2"), 1), Point::text(NodeKey::new("2"), 4));
        let mut txn = sample_with(selection);
        txn.format_text(TextFormat::BOLD).unwrap();

        assert_eq!(texts_of(&txn, "1"), vec!["h", "ell", "o", "world"]);
        let selected = txn.selection().unwrap().anchor.key.clone();
        assert!(txn.get(&selected).unwrap().has_format(TextFormat::BOLD));

        txn.format_text(TextFormat::BOLD).unwrap();
        assert!(!txn.get(&selected).unwrap().has_format(TextFormat::BOLD));
    }

    #[test]
    fn test_format_text_collapsed_changes_typing_format() {
        let mut txn = sample_with(Selection::caret(NodeKey::new("2"), 5));
        txn.format_text(TextFormat::ITALIC).unwrap();
        assert_eq!(txn.selection().unwrap().format, TextFormat::ITALIC);
        assert_eq!(txn.change(), &ChangeKind::None);
    }

    #[test]
    fn test_commands_need_selection() {
        let state = EditorState::builder().paragraph(&["a"]).build();
        let mut txn = open(state);
        assert!(matches!(txn.insert_text("x"), Err(EditorError::InvalidOperation(_))));
    }
}
