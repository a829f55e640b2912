//! Read-only navigation shared by committed snapshots and open transactions

use crate::errors::{EditorError, EditorResult};
use crate::key::NodeKey;
use crate::node::{Node, NodeKind};

/// Key-indexed view of a document tree
///
/// Implementors only provide lookup and the root key; every navigation
/// helper (siblings, descendants, text content) is derived from those.
pub trait NodeMap {
    fn node(&self, key: &NodeKey) -> Option<&Node>;

    fn root_key(&self) -> &NodeKey;

    fn contains(&self, key: &NodeKey) -> bool {
        self.node(key).is_some()
    }

    fn get(&self, key: &NodeKey) -> EditorResult<&Node> {
        self.node(key)
            .ok_or_else(|| EditorError::NodeNotFound(key.clone()))
    }

    fn root(&self) -> EditorResult<&Node> {
        self.get(self.root_key())
    }

    fn parent_of(&self, key: &NodeKey) -> Option<&Node> {
        self.node(key)?.parent().and_then(|p| self.node(p))
    }

    fn children_of(&self, key: &NodeKey) -> &[NodeKey] {
        self.node(key).map(|n| n.children()).unwrap_or(&[])
    }

    fn first_child(&self, key: &NodeKey) -> Option<&Node> {
        self.children_of(key).first().and_then(|k| self.node(k))
    }

    fn last_child(&self, key: &NodeKey) -> Option<&Node> {
        self.children_of(key).last().and_then(|k| self.node(k))
    }

    /// Position of `key` within its parent's child list
    fn index_in_parent(&self, key: &NodeKey) -> Option<usize> {
        let parent = self.parent_of(key)?;
        parent.children().iter().position(|k| k == key)
    }

    fn next_sibling(&self, key: &NodeKey) -> Option<&Node> {
        let parent = self.parent_of(key)?;
        let index = parent.children().iter().position(|k| k == key)?;
        parent.children().get(index + 1).and_then(|k| self.node(k))
    }

    fn previous_sibling(&self, key: &NodeKey) -> Option<&Node> {
        let parent = self.parent_of(key)?;
        let index = parent.children().iter().position(|k| k == key)?;
        if index == 0 {
            return None;
        }
        parent.children().get(index - 1).and_then(|k| self.node(k))
    }

    /// Ancestors from the direct parent up to the root
    fn ancestors(&self, key: &NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut current = self.node(key).and_then(|n| n.parent().cloned());
        while let Some(parent) = current {
            if out.contains(&parent) {
                break;
            }
            current = self.node(&parent).and_then(|n| n.parent().cloned());
            out.push(parent);
        }
        out
    }

    fn is_ancestor_of(&self, ancestor: &NodeKey, key: &NodeKey) -> bool {
        self.ancestors(key).iter().any(|k| k == ancestor)
    }

    /// Keys of the subtree rooted at `key` in pre-order (render order)
    fn traverse_from(&self, key: &NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack = vec![key.clone()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.node(&current) {
                stack.extend(node.children().iter().rev().cloned());
                out.push(current);
            }
        }
        out
    }

    fn traverse(&self) -> Vec<NodeKey> {
        self.traverse_from(self.root_key())
    }

    fn first_descendant(&self, key: &NodeKey) -> Option<&Node> {
        let mut current = self.node(key)?;
        while let Some(child) = current.children().first().and_then(|k| self.node(k)) {
            current = child;
        }
        Some(current)
    }

    fn last_descendant(&self, key: &NodeKey) -> Option<&Node> {
        let mut current = self.node(key)?;
        while let Some(child) = current.children().last().and_then(|k| self.node(k)) {
            current = child;
        }
        Some(current)
    }

    /// Nearest element at or above `key` whose parent is the root
    fn top_level_block(&self, key: &NodeKey) -> Option<&Node> {
        let mut current = self.node(key)?;
        loop {
            match current.parent() {
                Some(parent) if parent == self.root_key() => return Some(current),
                Some(parent) => current = self.node(parent)?,
                None => return None,
            }
        }
    }

    /// Nearest element ancestor-or-self that holds inline content
    fn block_of(&self, key: &NodeKey) -> Option<&Node> {
        let mut current = self.node(key)?;
        loop {
            if current.is_element() && !current.key().is_root() {
                let holds_blocks = current
                    .children()
                    .iter()
                    .filter_map(|k| self.node(k))
                    .any(|c| c.is_element());
                if !holds_blocks {
                    return Some(current);
                }
            }
            current = self.node(current.parent()?)?;
        }
    }

    /// Plain text of a subtree; sibling blocks are separated by a blank line
    fn text_content(&self, key: &NodeKey) -> String {
        let mut out = String::new();
        self.collect_text(key, &mut out);
        out
    }

    fn collect_text(&self, key: &NodeKey, out: &mut String) {
        let Some(node) = self.node(key) else {
            return;
        };
        match node.kind() {
            NodeKind::Text => out.push_str(node.text().unwrap_or_default()),
            NodeKind::LineBreak => out.push('\n'),
            NodeKind::Decorator => {}
            NodeKind::Element => {
                let children = node.children();
                for (i, child) in children.iter().enumerate() {
                    self.collect_text(child, out);
                    let is_block = self.node(child).map(|c| c.is_element()).unwrap_or(false);
                    if is_block && i + 1 < children.len() {
                        out.push_str("\n\n");
                    }
                }
            }
        }
    }

    /// Text nodes of the whole document in document order
    fn text_nodes(&self) -> Vec<NodeKey> {
        self.traverse()
            .into_iter()
            .filter(|k| self.node(k).map(|n| n.is_text()).unwrap_or(false))
            .collect()
    }
}
