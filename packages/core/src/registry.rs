//! # Extension Registry
//!
//! Maps a node type tag to the behavior of that type. The transaction
//! engine, the reconciler and serialization only ever go through a
//! [`NodeBehavior`]; none of them matches on a concrete type tag.
//!
//! ## Capability set
//!
//! | capability         | used by                                   |
//! |--------------------|-------------------------------------------|
//! | `construct`        | `Transaction::create_node`, parsing       |
//! | `create_element`   | reconciler, for new nodes                 |
//! | `compute_delta`    | reconciler, for surviving nodes           |
//! | `apply_patch`      | render surfaces                           |
//! | `serialize`        | `EditorState::to_serialized`              |
//! | `deserialize`      | `Editor::parse_state`                     |
//! | `insert_new_after` | `insert_paragraph` (what follows a block) |
//! | `collapse_at_start`| `delete_backward` at the start of a block  |

use crate::builtin::{LineBreakNode, ParagraphNode, RootNode, TextNode};
use crate::errors::{EditorResult, RegistryError};
use crate::key::NodeKey;
use crate::node::{Attributes, Node, NodeBody, NodeKind};
use crate::render::{ElementSpec, Patch};
use crate::serialization::SerializedNode;
use crate::transaction::Transaction;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub trait NodeBehavior: Send + Sync {
    /// Unique type tag
    fn node_type(&self) -> &str;

    fn kind(&self) -> NodeKind;

    /// Build a detached node of this type
    fn construct(&self, key: NodeKey, attributes: Attributes) -> EditorResult<Node> {
        Ok(Node::new(key, self.node_type(), NodeBody::empty(self.kind())).with_attributes(attributes))
    }

    /// Rendered form of `node`
    fn create_element(&self, node: &Node) -> ElementSpec;

    /// Change between two versions of the same node, `None` when they
    /// render identically
    fn compute_delta(&self, old: &Node, new: &Node) -> Option<Patch> {
        Patch::between(&self.create_element(old), &self.create_element(new))
    }

    fn apply_patch(&self, element: &mut ElementSpec, patch: &Patch) {
        patch.apply_to(element);
    }

    fn serialize(&self, node: &Node) -> SerializedNode {
        SerializedNode::from_node(node)
    }

    fn deserialize(&self, key: NodeKey, repr: &SerializedNode) -> EditorResult<Node> {
        let mut node = self.construct(key, repr.attributes.clone())?;
        repr.restore_fields(&mut node);
        Ok(node)
    }

    /// Insert the block that continues editing after `key` (end-of-block
    /// Enter) and return it; `None` lets the caller fall back to a
    /// paragraph
    fn insert_new_after(&self, _txn: &mut Transaction, _key: &NodeKey) -> EditorResult<Option<NodeKey>> {
        Ok(None)
    }

    /// Handle Backspace at the very start of block `key`; `true` when the
    /// behavior consumed it
    fn collapse_at_start(&self, _txn: &mut Transaction, _key: &NodeKey) -> EditorResult<bool> {
        Ok(false)
    }
}

#[derive(Clone, Default)]
pub struct NodeRegistry {
    behaviors: HashMap<String, Arc<dyn NodeBehavior>>,
}

impl NodeRegistry {
    /// Registry without any node type, not even the root
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `root`, `paragraph`, `text` and `linebreak`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [Arc<dyn NodeBehavior>; 4] = [
            Arc::new(RootNode),
            Arc::new(ParagraphNode),
            Arc::new(TextNode),
            Arc::new(LineBreakNode),
        ];
        for behavior in builtins {
            let node_type = behavior.node_type().to_string();
            registry.behaviors.insert(node_type, behavior);
        }
        registry
    }

    pub fn register<B: NodeBehavior + 'static>(&mut self, behavior: B) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(behavior))
    }

    pub fn register_arc(&mut self, behavior: Arc<dyn NodeBehavior>) -> Result<(), RegistryError> {
        let node_type = behavior.node_type().to_string();
        if self.behaviors.contains_key(&node_type) {
            return Err(RegistryError::Conflict(node_type));
        }
        tracing::debug!(node_type = %node_type, "Registered node type");
        self.behaviors.insert(node_type, behavior);
        Ok(())
    }

    pub fn get(&self, node_type: &str) -> Result<Arc<dyn NodeBehavior>, RegistryError> {
        self.behaviors
            .get(node_type)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownType(node_type.to_string()))
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.behaviors.contains_key(node_type)
    }

    /// Registered tags, sorted
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.behaviors.keys().map(|t| t.as_str()).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("types", &self.types())
            .finish()
    }
}
