//! # Transaction Engine
//!
//! A [`Transaction`] is the only way to change a document. It is opened on
//! the last committed snapshot and owns a copy-on-write working tree:
//!
//! - The node table starts as a pointer copy of the snapshot's table.
//! - The first write to a node clones it (`Arc::make_mut`) together with
//!   every ancestor up to the root, so root-to-node paths of modified nodes
//!   are private to the transaction while every other subtree keeps the
//!   snapshot's exact `Arc`.
//! - Removing a node only detaches it. Detached nodes are collected when
//!   the transaction is finished, just before tree validation.
//!
//! Selection points are rewritten by every mutation that removes, splits
//! or merges the node they reference, so the selection stays meaningful
//! even when several structural changes happen in one transaction.

use crate::errors::{EditorError, EditorResult, SelectionWarning};
use crate::key::{KeyGenerator, NodeKey};
use crate::node::{byte_index, Attributes, Direction, Node, NodeKind, TextFormat};
use crate::registry::NodeRegistry;
use crate::selection::{end_point_of, resolve_selection, start_point_of, Point, PointType, Selection};
use crate::state::{validate_nodes, EditorState, NodeTable};
use crate::tree::NodeMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Tag carried by undo/redo commits
pub const HISTORIC_TAG: &str = "historic";
/// Tag carried by commits made by a [`Transform`](crate::Transform)
pub const TRANSFORM_TAG: &str = "transform";
/// Tag carried by the editor's initial commit
pub const INIT_TAG: &str = "init";

/// What a transaction did, as far as history coalescing is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// No tree mutation (selection-only or empty)
    None,
    /// Only plain text typed into this text node
    TextInsertion(NodeKey),
    /// Anything else
    Other,
}

impl ChangeKind {
    pub(crate) fn combine(self, next: ChangeKind) -> ChangeKind {
        match (self, next) {
            (ChangeKind::None, next) => next,
            (current, ChangeKind::None) => current,
            (ChangeKind::TextInsertion(a), ChangeKind::TextInsertion(b)) if a == b => ChangeKind::TextInsertion(a),
            _ => ChangeKind::Other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Commit without recording a history entry
    pub skip_history: bool,
    /// Free-form tags forwarded to update listeners
    pub tags: Vec<String>,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_history(mut self) -> Self {
        self.skip_history = true;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Validated result of a finished transaction, ready to be reconciled
#[derive(Debug)]
pub(crate) struct PreparedCommit {
    pub state: EditorState,
    pub dirty: Vec<NodeKey>,
    pub warnings: Vec<SelectionWarning>,
    pub change: ChangeKind,
    pub options: UpdateOptions,
}

pub struct Transaction {
    registry: Arc<NodeRegistry>,
    pub(crate) keys: KeyGenerator,
    base: Arc<EditorState>,
    nodes: NodeTable,
    root: NodeKey,
    /// Nodes private to this transaction (cloned or created here)
    cloned: HashSet<NodeKey>,
    selection: Option<Selection>,
    change: ChangeKind,
    options: UpdateOptions,
}

impl Transaction {
    pub(crate) fn new(
        base: Arc<EditorState>,
        registry: Arc<NodeRegistry>,
        keys: KeyGenerator,
        options: UpdateOptions,
    ) -> Self {
        Self {
            registry,
            keys,
            nodes: base.table().clone(),
            root: base.root_key().clone(),
            selection: base.selection().cloned(),
            base,
            cloned: HashSet::new(),
            change: ChangeKind::None,
            options,
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Snapshot this transaction started from
    pub fn base(&self) -> &EditorState {
        &self.base
    }

    pub fn options(&self) -> &UpdateOptions {
        &self.options
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.options.tags.push(tag.into());
    }

    pub fn change(&self) -> &ChangeKind {
        &self.change
    }

    /// Keys written so far that are still part of the working tree
    pub fn dirty_keys(&self) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = self
            .cloned
            .iter()
            .filter(|k| self.nodes.contains_key(*k))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn is_dirty(&self, key: &NodeKey) -> bool {
        self.cloned.contains(key)
    }

    pub(crate) fn record(&mut self, change: ChangeKind) {
        let current = std::mem::replace(&mut self.change, ChangeKind::None);
        self.change = current.combine(change);
    }

    fn touch(&mut self) {
        self.record(ChangeKind::Other);
    }

    pub(crate) fn set_change(&mut self, change: ChangeKind) {
        self.change = change;
    }

    // --- copy on write ---------------------------------------------------

    /// Clone `key` and its ancestors into the working tree
    fn mark_writable(&mut self, key: &NodeKey) -> EditorResult<()> {
        if !self.nodes.contains_key(key) {
            return Err(EditorError::NodeNotFound(key.clone()));
        }
        let mut current = Some(key.clone());
        while let Some(k) = current {
            // A private node always has private ancestors
            if !self.cloned.insert(k.clone()) {
                break;
            }
            match self.nodes.get_mut(&k) {
                Some(node) => current = Arc::make_mut(node).parent().cloned(),
                None => break,
            }
        }
        Ok(())
    }

    fn writable(&mut self, key: &NodeKey) -> EditorResult<&mut Node> {
        self.mark_writable(key)?;
        self.nodes
            .get_mut(key)
            .map(Arc::make_mut)
            .ok_or_else(|| EditorError::NodeNotFound(key.clone()))
    }

    /// Next generated key not already present in the tree
    fn fresh_key(&mut self) -> NodeKey {
        loop {
            let key = self.keys.next_key();
            if !self.nodes.contains_key(&key) {
                return key;
            }
        }
    }

    fn require_kind(&self, key: &NodeKey, kind: NodeKind) -> EditorResult<&Node> {
        let node = self.get(key)?;
        if node.kind() != kind {
            return Err(EditorError::invalid(format!(
                "{} node {} is not {:?}",
                node.node_type(),
                key,
                kind
            )));
        }
        Ok(node)
    }

    // --- construction ----------------------------------------------------

    /// Create a detached node through its type's constructor
    pub fn create_node(&mut self, node_type: &str, attributes: Attributes) -> EditorResult<NodeKey> {
        let behavior = self.registry.get(node_type)?;
        let key = self.fresh_key();
        let node = behavior.construct(key.clone(), attributes)?;
        self.nodes.insert(key.clone(), Arc::new(node));
        self.cloned.insert(key.clone());
        self.touch();
        Ok(key)
    }

    pub fn create_element(&mut self, node_type: &str) -> EditorResult<NodeKey> {
        let key = self.create_node(node_type, Attributes::new())?;
        self.require_kind(&key, NodeKind::Element)?;
        Ok(key)
    }

    pub fn create_text(&mut self, text: &str) -> EditorResult<NodeKey> {
        self.create_formatted_text(text, TextFormat::empty())
    }

    pub fn create_formatted_text(&mut self, text: &str, format: TextFormat) -> EditorResult<NodeKey> {
        let key = self.create_node("text", Attributes::new())?;
        let node = self.writable(&key)?;
        if let Some(content) = node.text_mut() {
            content.push_str(text);
        }
        node.set_format(format);
        Ok(key)
    }

    // --- structure -------------------------------------------------------

    pub fn append(&mut self, parent: &NodeKey, child: &NodeKey) -> EditorResult<()> {
        let len = self.children_of(parent).len();
        self.insert_at(parent, child, len)
    }

    /// Attach `child` at `index` of `parent`, detaching it from its current
    /// position first
    pub fn insert_at(&mut self, parent: &NodeKey, child: &NodeKey, index: usize) -> EditorResult<()> {
        self.require_kind(parent, NodeKind::Element)?;
        self.get(child)?;
        if child == &self.root {
            return Err(EditorError::invalid("the root cannot be attached to a parent"));
        }
        if child == parent {
            return Err(EditorError::invalid(format!("node {child} cannot contain itself")));
        }

        let mut index = index;
        if let Some(old_parent) = self.get(child)?.parent().cloned() {
            let old_index = self.index_in_parent(child);
            if &old_parent == parent && old_index.map(|i| i < index).unwrap_or(false) {
                index -= 1;
            }
            self.detach(child)?;
        }

        let parent_node = self.writable(parent)?;
        let children = parent_node
            .children_mut()
            .ok_or_else(|| EditorError::invalid(format!("node {parent} cannot hold children")))?;
        let index = index.min(children.len());
        children.insert(index, child.clone());
        self.writable(child)?.set_parent(Some(parent.clone()));

        self.shift_element_points(parent, index, true);
        self.touch();
        Ok(())
    }

    pub fn insert_before(&mut self, target: &NodeKey, node: &NodeKey) -> EditorResult<()> {
        let (parent, index) = self.position_of(target)?;
        self.insert_at(&parent, node, index)
    }

    pub fn insert_after(&mut self, target: &NodeKey, node: &NodeKey) -> EditorResult<()> {
        let (parent, index) = self.position_of(target)?;
        self.insert_at(&parent, node, index + 1)
    }

    fn position_of(&self, key: &NodeKey) -> EditorResult<(NodeKey, usize)> {
        let parent = self
            .get(key)?
            .parent()
            .cloned()
            .ok_or_else(|| EditorError::invalid(format!("node {key} has no parent")))?;
        let index = self
            .index_in_parent(key)
            .ok_or_else(|| EditorError::invalid(format!("node {key} is not listed by its parent")))?;
        Ok((parent, index))
    }

    /// Remove `key` (and its subtree) from the document
    ///
    /// A selection inside the removed subtree moves to the end of the
    /// previous sibling, else the start of the next sibling, else the
    /// removed node's slot in its parent.
    pub fn remove(&mut self, key: &NodeKey) -> EditorResult<()> {
        if key == &self.root {
            return Err(EditorError::invalid("the root cannot be removed"));
        }
        self.get(key)?;
        self.relocate_selection_from(key);
        self.detach(key)?;
        self.touch();
        Ok(())
    }

    /// Put `new` in the place of `old`, which is removed
    pub fn replace(&mut self, old: &NodeKey, new: &NodeKey) -> EditorResult<()> {
        self.insert_before(old, new)?;
        self.remove(old)
    }

    /// Move every child of `from` to the end of `to`
    pub fn move_children(&mut self, from: &NodeKey, to: &NodeKey) -> EditorResult<()> {
        self.require_kind(to, NodeKind::Element)?;
        let base = self.children_of(to).len();
        let children = self.children_of(from).to_vec();
        // element points on `from`, taken before detaching shifts them
        let slots = self.selection.as_ref().map(|s| {
            [&s.anchor, &s.focus]
                .map(|p| (&p.key == from && p.point_type == PointType::Element).then_some(p.offset))
        });
        for child in &children {
            self.append(to, child)?;
        }
        if let (Some(selection), Some(slots)) = (self.selection.as_mut(), slots) {
            for (point, slot) in selection.points_mut().into_iter().zip(slots) {
                if let Some(offset) = slot {
                    *point = Point::element(to.clone(), base + offset);
                }
            }
        }
        self.touch();
        Ok(())
    }

    fn detach(&mut self, key: &NodeKey) -> EditorResult<()> {
        let Some(parent) = self.get(key)?.parent().cloned() else {
            return Ok(());
        };
        let index = self.index_in_parent(key);
        if let Some(index) = index {
            if let Some(children) = self.writable(&parent)?.children_mut() {
                children.remove(index);
            }
            self.shift_element_points(&parent, index, false);
        }
        self.writable(key)?.set_parent(None);
        Ok(())
    }

    fn shift_element_points(&mut self, parent: &NodeKey, index: usize, inserted: bool) {
        let Some(selection) = self.selection.as_mut() else {
            return;
        };
        for point in selection.points_mut() {
            if point.point_type == PointType::Element && &point.key == parent && point.offset > index {
                if inserted {
                    point.offset += 1;
                } else {
                    point.offset -= 1;
                }
            }
        }
    }

    fn relocate_selection_from(&mut self, key: &NodeKey) {
        let Some(mut selection) = self.selection.clone() else {
            return;
        };
        let this: &Self = self;
        let inside = |point: &Point| &point.key == key || this.is_ancestor_of(key, &point.key);
        let anchor_inside = inside(&selection.anchor);
        let focus_inside = inside(&selection.focus);
        if !anchor_inside && !focus_inside {
            return;
        }

        let replacement = this
            .previous_sibling(key)
            .and_then(|prev| end_point_of(this, prev.key()))
            .or_else(|| this.next_sibling(key).and_then(|next| start_point_of(this, next.key())))
            .or_else(|| {
                let parent = this.node(key)?.parent()?.clone();
                let index = this.index_in_parent(key)?;
                Some(Point::element(parent, index))
            });
        let Some(replacement) = replacement else {
            return;
        };

        if anchor_inside {
            selection.anchor = replacement.clone();
        }
        if focus_inside {
            selection.focus = replacement;
        }
        self.selection = Some(selection);
    }

    // --- attributes and content -----------------------------------------

    pub fn set_attribute(
        &mut self,
        key: &NodeKey,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> EditorResult<()> {
        self.writable(key)?.attributes_mut().insert(name.into(), value.into());
        self.touch();
        Ok(())
    }

    pub fn remove_attribute(&mut self, key: &NodeKey, name: &str) -> EditorResult<()> {
        self.writable(key)?.attributes_mut().remove(name);
        self.touch();
        Ok(())
    }

    /// Replace the content of a text node; selection offsets are clamped
    pub fn set_text(&mut self, key: &NodeKey, text: &str) -> EditorResult<()> {
        self.require_kind(key, NodeKind::Text)?;
        if let Some(content) = self.writable(key)?.text_mut() {
            *content = text.to_string();
        }
        let len = text.chars().count();
        if let Some(selection) = self.selection.as_mut() {
            for point in selection.points_mut() {
                if &point.key == key {
                    point.offset = point.offset.min(len);
                }
            }
        }
        self.touch();
        Ok(())
    }

    /// Delete `delete` characters at `offset` and insert `insert` there
    ///
    /// Selection points after the edit shift with the content; points in
    /// the deleted span move to `offset`.
    pub fn splice_text(&mut self, key: &NodeKey, offset: usize, delete: usize, insert: &str) -> EditorResult<()> {
        let len = self.require_kind(key, NodeKind::Text)?.content_len();
        if offset > len {
            return Err(EditorError::invalid(format!(
                "offset {offset} is past the end of text node {key} ({len})"
            )));
        }
        let delete = delete.min(len - offset);
        if let Some(content) = self.writable(key)?.text_mut() {
            let start = byte_index(content, offset);
            let end = byte_index(content, offset + delete);
            content.replace_range(start..end, insert);
        }

        let inserted = insert.chars().count();
        if let Some(selection) = self.selection.as_mut() {
            for point in selection.points_mut() {
                if &point.key != key {
                    continue;
                }
                if point.offset >= offset + delete && point.offset > offset {
                    point.offset = point.offset - delete + inserted;
                } else if point.offset > offset {
                    point.offset = offset;
                }
            }
        }
        self.touch();
        Ok(())
    }

    pub fn set_format(&mut self, key: &NodeKey, format: TextFormat) -> EditorResult<()> {
        self.require_kind(key, NodeKind::Text)?;
        self.writable(key)?.set_format(format);
        self.touch();
        Ok(())
    }

    pub fn toggle_format(&mut self, key: &NodeKey, flag: TextFormat) -> EditorResult<()> {
        let format = self.require_kind(key, NodeKind::Text)?.format();
        self.set_format(key, format ^ flag)
    }

    pub fn set_direction(&mut self, key: &NodeKey, direction: Option<Direction>) -> EditorResult<()> {
        self.require_kind(key, NodeKind::Element)?;
        self.writable(key)?.set_direction(direction);
        self.touch();
        Ok(())
    }

    pub fn set_indent(&mut self, key: &NodeKey, indent: u32) -> EditorResult<()> {
        self.require_kind(key, NodeKind::Element)?;
        self.writable(key)?.set_indent(indent);
        self.touch();
        Ok(())
    }

    /// Split a text node at the given character offsets
    ///
    /// Returns the keys of all parts in order; the first part keeps the
    /// original key. Offsets outside `1..len` are ignored.
    pub fn split_text(&mut self, key: &NodeKey, offsets: &[usize]) -> EditorResult<Vec<NodeKey>> {
        let node = self.require_kind(key, NodeKind::Text)?;
        let text = node.text().unwrap_or_default().to_string();
        let format = node.format();
        let attributes = node.attributes().clone();
        let len = text.chars().count();

        let mut cuts: Vec<usize> = offsets.iter().copied().filter(|o| *o > 0 && *o < len).collect();
        cuts.sort_unstable();
        cuts.dedup();
        if cuts.is_empty() {
            return Ok(vec![key.clone()]);
        }

        let mut bounds = vec![0];
        bounds.extend(cuts.iter().copied());
        bounds.push(len);
        let segment = |i: usize| -> String {
            let start = byte_index(&text, bounds[i]);
            let end = byte_index(&text, bounds[i + 1]);
            text[start..end].to_string()
        };

        let mut parts = vec![key.clone()];
        for i in 1..bounds.len() - 1 {
            let part = self.create_node("text", attributes.clone())?;
            let part_node = self.writable(&part)?;
            if let Some(content) = part_node.text_mut() {
                *content = segment(i);
            }
            part_node.set_format(format);
            let previous = parts[i - 1].clone();
            self.insert_after(&previous, &part)?;
            parts.push(part);
        }
        if let Some(content) = self.writable(key)?.text_mut() {
            *content = segment(0);
        }

        if let Some(selection) = self.selection.as_mut() {
            for point in selection.points_mut() {
                if &point.key != key || point.point_type != PointType::Text {
                    continue;
                }
                if let Some(i) = (1..bounds.len() - 1).rev().find(|i| point.offset > bounds[*i]) {
                    *point = Point::text(parts[i].clone(), point.offset - bounds[i]);
                }
            }
        }
        self.touch();
        Ok(parts)
    }

    /// Append the text of `source` to `target` and remove `source`
    pub fn merge_text(&mut self, target: &NodeKey, source: &NodeKey) -> EditorResult<()> {
        let target_len = self.require_kind(target, NodeKind::Text)?.content_len();
        let source_text = self
            .require_kind(source, NodeKind::Text)?
            .text()
            .unwrap_or_default()
            .to_string();

        if let Some(content) = self.writable(target)?.text_mut() {
            content.push_str(&source_text);
        }
        if let Some(selection) = self.selection.as_mut() {
            for point in selection.points_mut() {
                if &point.key == source {
                    *point = Point::text(target.clone(), target_len + point.offset);
                }
            }
        }
        self.detach(source)?;
        self.touch();
        Ok(())
    }

    // --- selection -------------------------------------------------------

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    /// Collapse the selection to a text offset, typing with the node's format
    pub fn select_text(&mut self, key: &NodeKey, offset: usize) -> EditorResult<()> {
        let format = self.require_kind(key, NodeKind::Text)?.format();
        self.selection = Some(Selection::caret(key.clone(), offset).with_format(format));
        Ok(())
    }

    pub fn select_start(&mut self, key: &NodeKey) -> EditorResult<()> {
        let point = start_point_of(&*self, key).ok_or_else(|| EditorError::NodeNotFound(key.clone()))?;
        self.select_point(point)
    }

    pub fn select_end(&mut self, key: &NodeKey) -> EditorResult<()> {
        let point = end_point_of(&*self, key).ok_or_else(|| EditorError::NodeNotFound(key.clone()))?;
        self.select_point(point)
    }

    fn select_point(&mut self, point: Point) -> EditorResult<()> {
        match point.point_type {
            PointType::Text => self.select_text(&point.key, point.offset),
            PointType::Element => {
                self.selection = Some(Selection::collapsed(point));
                Ok(())
            }
        }
    }

    /// Insert whatever block follows `key` on Enter, as decided by its type
    pub fn insert_new_after(&mut self, key: &NodeKey) -> EditorResult<NodeKey> {
        let behavior = self.registry.get(self.get(key)?.node_type())?;
        match behavior.insert_new_after(self, key)? {
            Some(next) => Ok(next),
            None => crate::builtin::insert_paragraph_after(self, key),
        }
    }

    // --- commit ----------------------------------------------------------

    /// Normalize, collect garbage, validate and resolve the selection
    pub(crate) fn finish(mut self, normalize_text: bool) -> EditorResult<PreparedCommit> {
        if normalize_text {
            self.normalize()?;
        }
        self.collect_garbage();

        validate_nodes(&self.nodes, &self.root, self.cloned.iter())?;

        let dirty = self.dirty_keys();
        let version = self.base.version() + 1;
        let provisional = EditorState::from_parts(self.nodes, self.root, None, version);
        let (selection, warnings) = resolve_selection(&provisional, self.selection);

        Ok(PreparedCommit {
            state: provisional.with_selection(selection),
            dirty,
            warnings,
            change: self.change,
            options: self.options,
        })
    }

    /// Inside touched elements: drop empty text nodes (except the one the
    /// selection is in) and merge adjacent text nodes of equal format
    fn normalize(&mut self) -> EditorResult<()> {
        let mut elements: Vec<NodeKey> = self
            .cloned
            .iter()
            .filter(|k| self.node(k).map(|n| n.is_element() && n.parent().is_some() || k.is_root()).unwrap_or(false))
            .cloned()
            .collect();
        elements.sort();

        for element in elements {
            let children = self.children_of(&element).to_vec();
            let mut previous_text: Option<NodeKey> = None;
            for child in children {
                let Some((is_text, is_empty)) = self.node(&child).map(|n| (n.is_text(), n.content_len() == 0)) else {
                    continue;
                };
                if !is_text {
                    previous_text = None;
                    continue;
                }
                let holds_selection = self.selection.as_ref().map(|s| s.touches(&child)).unwrap_or(false);
                if is_empty && !holds_selection {
                    self.detach(&child)?;
                    continue;
                }
                let mergeable = match (previous_text.as_ref().and_then(|p| self.node(p)), self.node(&child)) {
                    (Some(prev), Some(node)) => {
                        prev.format() == node.format() && prev.attributes() == node.attributes()
                    }
                    _ => false,
                };
                match previous_text.clone() {
                    Some(prev) if mergeable => self.merge_text(&prev, &child)?,
                    _ => previous_text = Some(child),
                }
            }
        }
        Ok(())
    }

    /// Drop detached nodes and their subtrees from the working tree
    fn collect_garbage(&mut self) {
        let detached: Vec<NodeKey> = self
            .cloned
            .iter()
            .filter(|k| *k != &self.root)
            .filter(|k| self.nodes.get(*k).map(|n| n.parent().is_none()).unwrap_or(false))
            .cloned()
            .collect();

        for key in detached {
            let mut stack = vec![key];
            while let Some(current) = stack.pop() {
                let Some(node) = self.nodes.remove(&current) else {
                    continue;
                };
                for child in node.children() {
                    let owned = self
                        .nodes
                        .get(child)
                        .map(|c| c.parent() == Some(&current))
                        .unwrap_or(false);
                    if owned {
                        stack.push(child.clone());
                    }
                }
            }
        }
    }
}

impl NodeMap for Transaction {
    fn node(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.get(key).map(|n| n.as_ref())
    }

    fn root_key(&self) -> &NodeKey {
        &self.root
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("base_version", &self.base.version())
            .field("dirty", &self.cloned.len())
            .field("change", &self.change)
            .finish()
    }
}
