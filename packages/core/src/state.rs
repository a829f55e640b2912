//! # Immutable State Snapshot
//!
//! An [`EditorState`] is the committed document: a key → node mapping, the
//! root key and the selection. Snapshots are never mutated after commit.
//!
//! ## Structural sharing
//!
//! Nodes are held behind `Arc`. A transaction starts from a shallow copy of
//! the map (pointer copies only) and replaces an entry only when it writes
//! to that node, cloning the node and every ancestor up to the root. An
//! unmodified subtree therefore keeps the exact same `Arc` in consecutive
//! snapshots, which is what the reconciler tests to skip it.

use crate::errors::ValidationError;
use crate::key::{KeyGenerator, NodeKey};
use crate::node::{Node, NodeBody, NodeKind, TextFormat};
use crate::selection::Selection;
use crate::tree::NodeMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub(crate) type NodeTable = HashMap<NodeKey, Arc<Node>>;

#[derive(Debug, Clone)]
pub struct EditorState {
    nodes: NodeTable,
    root: NodeKey,
    selection: Option<Selection>,
    version: u64,
}

impl EditorState {
    /// Snapshot holding only an empty root
    pub fn empty() -> Self {
        let root = NodeKey::root();
        let mut nodes = NodeTable::new();
        nodes.insert(root.clone(), Arc::new(Node::element(root.clone(), "root")));
        Self {
            nodes,
            root,
            selection: None,
            version: 0,
        }
    }

    /// Snapshot with no nodes at all; the baseline for a full render
    pub(crate) fn blank() -> Self {
        Self {
            nodes: NodeTable::new(),
            root: NodeKey::root(),
            selection: None,
            version: 0,
        }
    }

    pub(crate) fn from_parts(
        nodes: NodeTable,
        root: NodeKey,
        selection: Option<Selection>,
        version: u64,
    ) -> Self {
        Self {
            nodes,
            root,
            selection,
            version,
        }
    }

    pub(crate) fn with_selection(mut self, selection: Option<Selection>) -> Self {
        self.selection = selection;
        self
    }

    /// Same tree and selection under a new version number
    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn builder() -> StateBuilder {
        StateBuilder::new()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Shared handle of a node, for identity comparison across snapshots
    pub fn node_arc(&self, key: &NodeKey) -> Option<&Arc<Node>> {
        self.nodes.get(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the root has no children
    pub fn is_empty(&self) -> bool {
        self.children_of(&self.root).is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.nodes.keys()
    }

    pub(crate) fn table(&self) -> &NodeTable {
        &self.nodes
    }

    /// Check every tree invariant over the whole snapshot
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_nodes(&self.nodes, &self.root, self.nodes.keys())
    }
}

impl NodeMap for EditorState {
    fn node(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.get(key).map(|n| n.as_ref())
    }

    fn root_key(&self) -> &NodeKey {
        &self.root
    }
}

/// Validate the invariants that involve `keys`
///
/// Checking only the nodes written by a transaction is enough at commit
/// time: untouched nodes keep their relations from the previous, already
/// valid snapshot.
pub(crate) fn validate_nodes<'a>(
    nodes: &NodeTable,
    root: &NodeKey,
    keys: impl IntoIterator<Item = &'a NodeKey>,
) -> Result<(), ValidationError> {
    let root_node = nodes.get(root).ok_or(ValidationError::RootMissing)?;
    if let Some(parent) = root_node.parent() {
        return Err(ValidationError::RootHasParent(parent.clone()));
    }

    for key in keys {
        let Some(node) = nodes.get(key) else {
            continue;
        };

        let mut seen = HashSet::new();
        for child in node.children() {
            if !seen.insert(child) {
                return Err(ValidationError::DuplicateChild {
                    parent: key.clone(),
                    child: child.clone(),
                });
            }
            let child_node = nodes.get(child).ok_or_else(|| ValidationError::DanglingChild {
                parent: key.clone(),
                child: child.clone(),
            })?;
            if child_node.parent() != Some(key) {
                return Err(ValidationError::ParentMismatch {
                    key: child.clone(),
                    expected: child_node.parent().cloned(),
                    actual: key.clone(),
                });
            }
        }

        if key == root {
            continue;
        }

        // Walk up to the root; more steps than nodes means a cycle
        let mut steps = 0;
        let mut current = key.clone();
        loop {
            let current_node = nodes
                .get(&current)
                .ok_or_else(|| ValidationError::Orphaned(key.clone()))?;
            let parent = current_node
                .parent()
                .ok_or_else(|| ValidationError::Orphaned(current.clone()))?;
            let parent_node = nodes
                .get(parent)
                .ok_or_else(|| ValidationError::Orphaned(current.clone()))?;
            if !parent_node.children().contains(&current) {
                return Err(ValidationError::Orphaned(current.clone()));
            }
            if parent == root {
                break;
            }
            steps += 1;
            if steps > nodes.len() || parent == key {
                return Err(ValidationError::CycleDetected(key.clone()));
            }
            current = parent.clone();
        }
    }

    Ok(())
}

/// Builds snapshots directly, without a transaction
#[derive(Debug)]
pub struct StateBuilder {
    keys: KeyGenerator,
    nodes: NodeTable,
    root_children: Vec<NodeKey>,
}

impl StateBuilder {
    pub fn new() -> Self {
        Self {
            keys: KeyGenerator::new(),
            nodes: NodeTable::new(),
            root_children: Vec::new(),
        }
    }

    /// Append a paragraph holding one plain text node per entry
    pub fn paragraph(self, texts: &[&str]) -> Self {
        let runs: Vec<(&str, TextFormat)> = texts.iter().map(|t| (*t, TextFormat::empty())).collect();
        self.block("paragraph", &runs)
    }

    /// Append a block of `node_type` holding formatted text runs
    pub fn block(mut self, node_type: &str, runs: &[(&str, TextFormat)]) -> Self {
        let block_key = self.keys.next_key();
        let mut block = Node::element(block_key.clone(), node_type);
        for (text, format) in runs {
            let text_key = self.keys.next_key();
            let mut text_node = Node::new(
                text_key.clone(),
                "text",
                NodeBody::Text {
                    text: text.to_string(),
                    format: *format,
                },
            );
            text_node.set_parent(Some(block_key.clone()));
            if let Some(children) = block.children_mut() {
                children.push(text_key.clone());
            }
            self.nodes.insert(text_key, Arc::new(text_node));
        }
        block.set_parent(Some(NodeKey::root()));
        self.nodes.insert(block_key.clone(), Arc::new(block));
        self.root_children.push(block_key);
        self
    }

    pub fn build(self) -> EditorState {
        let root_key = NodeKey::root();
        let mut root = Node::new(root_key.clone(), "root", NodeBody::empty(NodeKind::Element));
        if let Some(children) = root.children_mut() {
            *children = self.root_children;
        }
        let mut nodes = self.nodes;
        nodes.insert(root_key.clone(), Arc::new(root));
        EditorState::from_parts(nodes, root_key, None, 0)
    }
}

impl Default for StateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state_is_valid() {
        let state = EditorState::empty();
        assert!(state.validate().is_ok());
        assert!(state.is_empty());
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_builder_state_is_valid_tree() {
        let state = EditorState::builder()
            .paragraph(&["hello ", "world"])
            .paragraph(&["again"])
            .build();

        assert!(state.validate().is_ok());
        assert_eq!(state.len(), 6);
        assert_eq!(state.text_content(state.root_key()), "hello world\n\nagain");
        assert_eq!(state.traverse().len(), 6);
    }

    #[test]
    fn test_validation_detects_dangling_child() {
        let state = EditorState::builder().paragraph(&["a"]).build();
        let mut nodes = state.table().clone();
        let text = state.text_nodes()[0].clone();
        nodes.remove(&text);

        let result = validate_nodes(&nodes, state.root_key(), nodes.keys());
        assert!(matches!(result, Err(ValidationError::DanglingChild { .. })));
    }

    #[test]
    fn test_validation_detects_cycle() {
        let state = EditorState::builder().paragraph(&["a"]).paragraph(&["b"]).build();
        let blocks = state.children_of(state.root_key()).to_vec();
        let mut nodes = state.table().clone();

        // first ⇄ second, both detached from the root
        let mut first = (*nodes[&blocks[0]]).clone();
        let mut second = (*nodes[&blocks[1]]).clone();
        first.set_parent(Some(blocks[1].clone()));
        first.children_mut().unwrap().push(blocks[1].clone());
        second.set_parent(Some(blocks[0].clone()));
        second.children_mut().unwrap().push(blocks[0].clone());
        let mut root = (*nodes[state.root_key()]).clone();
        root.children_mut().unwrap().clear();
        nodes.insert(blocks[0].clone(), Arc::new(first));
        nodes.insert(blocks[1].clone(), Arc::new(second));
        nodes.insert(state.root_key().clone(), Arc::new(root));

        let result = validate_nodes(&nodes, state.root_key(), [&blocks[0]]);
        assert!(matches!(
            result,
            Err(ValidationError::CycleDetected(_)) | Err(ValidationError::Orphaned(_))
        ));
    }

    #[test]
    fn test_validation_detects_missing_root() {
        let state = EditorState::blank();
        assert_eq!(state.validate(), Err(ValidationError::RootMissing));
    }
}
