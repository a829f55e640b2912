//! # Serialization
//!
//! Transportable form of a document. Keys are not part of the format:
//! they are only meaningful inside one editor instance, so parsing always
//! allocates fresh keys from the editor's generator.

use crate::errors::{EditorError, EditorResult};
use crate::key::{KeyGenerator, NodeKey};
use crate::node::{Attributes, Direction, Node, NodeBody, TextFormat};
use crate::registry::NodeRegistry;
use crate::selection::{document_start, Selection};
use crate::state::{EditorState, NodeTable};
use crate::tree::NodeMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Format version written into every serialized node
pub const SERIALIZED_VERSION: u32 = 1;

fn default_version() -> u32 {
    SERIALIZED_VERSION
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode {
    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "TextFormat::is_empty")]
    pub format: TextFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub indent: u32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SerializedNode>,
}

impl SerializedNode {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            version: SERIALIZED_VERSION,
            attributes: Attributes::new(),
            text: None,
            format: TextFormat::empty(),
            direction: None,
            indent: 0,
            children: Vec::new(),
        }
    }

    /// Own fields of `node`; children are filled in by the tree walk
    pub fn from_node(node: &Node) -> Self {
        let mut repr = Self::new(node.node_type());
        repr.attributes = node.attributes().clone();
        match node.body() {
            NodeBody::Element {
                direction, indent, ..
            } => {
                repr.direction = *direction;
                repr.indent = *indent;
            }
            NodeBody::Text { text, format } => {
                repr.text = Some(text.clone());
                repr.format = *format;
            }
            NodeBody::Decorator | NodeBody::LineBreak => {}
        }
        repr
    }

    /// Copy content fields onto a freshly constructed node of the same kind
    pub fn restore_fields(&self, node: &mut Node) {
        if let Some(text) = node.text_mut() {
            *text = self.text.clone().unwrap_or_default();
        }
        node.set_format(self.format);
        node.set_direction(self.direction);
        node.set_indent(self.indent);
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: SerializedNode) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedEditorState {
    pub root: SerializedNode,
}

impl SerializedEditorState {
    pub fn from_json(json: &str) -> EditorResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> EditorResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl EditorState {
    /// Serialize every node through its type's behavior
    pub fn to_serialized(&self, registry: &NodeRegistry) -> EditorResult<SerializedEditorState> {
        Ok(SerializedEditorState {
            root: serialize_subtree(self, registry, self.root_key())?,
        })
    }

    pub fn to_json(&self, registry: &NodeRegistry) -> EditorResult<String> {
        self.to_serialized(registry)?.to_json()
    }
}

fn serialize_subtree(
    state: &EditorState,
    registry: &NodeRegistry,
    key: &NodeKey,
) -> EditorResult<SerializedNode> {
    let node = state.get(key)?;
    let mut repr = registry.get(node.node_type())?.serialize(node);
    repr.children = node
        .children()
        .iter()
        .map(|child| serialize_subtree(state, registry, child))
        .collect::<EditorResult<Vec<_>>>()?;
    Ok(repr)
}

/// Rebuild a snapshot with fresh keys and a caret at the document start
pub(crate) fn deserialize_state(
    serialized: &SerializedEditorState,
    registry: &NodeRegistry,
    keys: &mut KeyGenerator,
) -> EditorResult<EditorState> {
    if serialized.root.node_type != "root" {
        return Err(EditorError::invalid(format!(
            "serialized root has type {}",
            serialized.root.node_type
        )));
    }

    let mut nodes = NodeTable::new();
    let root_key = NodeKey::root();
    build_subtree(&serialized.root, root_key.clone(), None, registry, keys, &mut nodes)?;

    let state = EditorState::from_parts(nodes, root_key, None, 0);
    state.validate()?;
    let caret = Selection::collapsed(document_start(&state));
    Ok(state.with_selection(Some(caret)))
}

fn build_subtree(
    repr: &SerializedNode,
    key: NodeKey,
    parent: Option<NodeKey>,
    registry: &NodeRegistry,
    keys: &mut KeyGenerator,
    nodes: &mut NodeTable,
) -> EditorResult<()> {
    let mut node = registry.get(&repr.node_type)?.deserialize(key.clone(), repr)?;
    node.set_parent(parent);

    if !repr.children.is_empty() && !node.is_element() {
        return Err(EditorError::invalid(format!(
            "{} node cannot hold children",
            repr.node_type
        )));
    }

    let mut child_keys = Vec::with_capacity(repr.children.len());
    for child in &repr.children {
        let child_key = keys.next_key();
        build_subtree(child, child_key.clone(), Some(key.clone()), registry, keys, nodes)?;
        child_keys.push(child_key);
    }
    if let Some(children) = node.children_mut() {
        *children = child_keys;
    }

    nodes.insert(key, Arc::new(node));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SerializedEditorState {
        SerializedEditorState {
            root: SerializedNode::new("root").with_child(
                SerializedNode::new("paragraph")
                    .with_child(SerializedNode::new("text").with_text("hello "))
                    .with_child({
                        let mut bold = SerializedNode::new("text").with_text("world");
                        bold.format = TextFormat::BOLD;
                        bold
                    }),
            ),
        }
    }

    #[test]
    fn test_deserialize_assigns_fresh_keys_and_caret() {
        let registry = NodeRegistry::with_builtins();
        let mut keys = KeyGenerator::new();
        let state = deserialize_state(&sample(), &registry, &mut keys).unwrap();

        assert_eq!(state.len(), 4);
        assert_eq!(keys.allocated(), 3);
        assert_eq!(state.text_content(state.root_key()), "hello world");

        let first_text = state.text_nodes()[0].clone();
        assert_eq!(state.selection(), Some(&Selection::caret(first_text, 0)));
    }

    #[test]
    fn test_serialize_preserves_format_and_omits_defaults() {
        let registry = NodeRegistry::with_builtins();
        let mut keys = KeyGenerator::new();
        let state = deserialize_state(&sample(), &registry, &mut keys).unwrap();

        let serialized = state.to_serialized(&registry).unwrap();
        assert_eq!(serialized, sample());

        let json: serde_json::Value = serde_json::from_str(&state.to_json(&registry).unwrap()).unwrap();
        let runs = &json["root"]["children"][0]["children"];
        assert_eq!(runs[1]["format"], 1);
        assert!(runs[0].get("format").is_none());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let registry = NodeRegistry::with_builtins();
        let mut keys = KeyGenerator::new();
        let bad = SerializedEditorState {
            root: SerializedNode::new("root").with_child(SerializedNode::new("table")),
        };
        let err = deserialize_state(&bad, &registry, &mut keys).unwrap_err();
        assert!(matches!(err, EditorError::Registration(_)));
    }

    #[test]
    fn test_text_with_children_is_rejected() {
        let registry = NodeRegistry::with_builtins();
        let mut keys = KeyGenerator::new();
        let bad = SerializedEditorState {
            root: SerializedNode::new("root").with_child(
                SerializedNode::new("paragraph").with_child(
                    SerializedNode::new("text").with_child(SerializedNode::new("text")),
                ),
            ),
        };
        assert!(deserialize_state(&bad, &registry, &mut keys).is_err());
    }
}
