//! Node types every editor knows about
//!
//! They are registered through the same [`NodeBehavior`] contract as any
//! external node type.

use crate::errors::{EditorError, EditorResult};
use crate::key::NodeKey;
use crate::node::{Attributes, Node, NodeBody, NodeKind, TextFormat};
use crate::registry::NodeBehavior;
use crate::render::ElementSpec;
use crate::transaction::Transaction;
use crate::tree::NodeMap;

/// Attributes shared by every block element: `dir` and indentation
pub fn block_element(tag: &str, node: &Node) -> ElementSpec {
    let mut spec = ElementSpec::new(tag);
    if let Some(direction) = node.direction() {
        spec = spec.with_attribute("dir", direction.as_str());
    }
    if node.indent() > 0 {
        spec = spec.with_attribute("style", format!("padding-inline-start: {}px", node.indent() * 40));
    }
    spec
}

/// Insert an empty paragraph after `key`, keeping its direction
pub fn insert_paragraph_after(txn: &mut Transaction, key: &NodeKey) -> EditorResult<NodeKey> {
    let direction = txn.get(key)?.direction();
    let paragraph = txn.create_element("paragraph")?;
    txn.set_direction(&paragraph, direction)?;
    txn.insert_after(key, &paragraph)?;
    Ok(paragraph)
}

/// Swap block `key` for a new block of `node_type` that takes over its
/// children, direction and indentation
pub fn replace_block(
    txn: &mut Transaction,
    key: &NodeKey,
    node_type: &str,
    attributes: Attributes,
) -> EditorResult<NodeKey> {
    let (direction, indent) = {
        let node = txn.get(key)?;
        (node.direction(), node.indent())
    };
    let block = txn.create_node(node_type, attributes)?;
    txn.set_direction(&block, direction)?;
    txn.set_indent(&block, indent)?;
    txn.move_children(key, &block)?;
    txn.replace(key, &block)?;
    Ok(block)
}

#[derive(Debug, Clone, Copy)]
pub struct RootNode;

impl NodeBehavior for RootNode {
    fn node_type(&self) -> &str {
        "root"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    fn construct(&self, key: NodeKey, attributes: Attributes) -> EditorResult<Node> {
        if !key.is_root() {
            return Err(EditorError::invalid("a root node can only exist at the root key"));
        }
        Ok(Node::element(key, "root").with_attributes(attributes))
    }

    fn create_element(&self, _node: &Node) -> ElementSpec {
        ElementSpec::new("div")
            .with_attribute("contenteditable", "true")
            .with_attribute("data-outline-editor", "true")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParagraphNode;

impl NodeBehavior for ParagraphNode {
    fn node_type(&self) -> &str {
        "paragraph"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    fn create_element(&self, node: &Node) -> ElementSpec {
        block_element("p", node)
    }

    fn insert_new_after(&self, txn: &mut Transaction, key: &NodeKey) -> EditorResult<Option<NodeKey>> {
        insert_paragraph_after(txn, key).map(Some)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TextNode;

impl TextNode {
    fn tag_for(format: TextFormat) -> &'static str {
        if format.contains(TextFormat::CODE) {
            "code"
        } else if format.contains(TextFormat::BOLD) {
            "strong"
        } else if format.contains(TextFormat::ITALIC) {
            "em"
        } else if format.contains(TextFormat::SUBSCRIPT) {
            "sub"
        } else if format.contains(TextFormat::SUPERSCRIPT) {
            "sup"
        } else {
            "span"
        }
    }
}

impl NodeBehavior for TextNode {
    fn node_type(&self) -> &str {
        "text"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Text
    }

    fn create_element(&self, node: &Node) -> ElementSpec {
        let format = node.format();
        let mut spec = ElementSpec::new(Self::tag_for(format))
            .with_attribute("data-outline-text", "true")
            .with_text(node.text().unwrap_or_default());

        let mut decorations = Vec::new();
        if format.contains(TextFormat::UNDERLINE) {
            decorations.push("underline");
        }
        if format.contains(TextFormat::STRIKETHROUGH) {
            decorations.push("line-through");
        }
        if !decorations.is_empty() {
            spec = spec.with_attribute("style", format!("text-decoration: {}", decorations.join(" ")));
        }
        // Bold and italic together: the tag only shows one of them
        if format.contains(TextFormat::BOLD | TextFormat::ITALIC) && !format.contains(TextFormat::CODE) {
            spec = spec.with_attribute("class", "outline-text-italic");
        }
        spec
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LineBreakNode;

impl NodeBehavior for LineBreakNode {
    fn node_type(&self) -> &str {
        "linebreak"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::LineBreak
    }

    fn construct(&self, key: NodeKey, _attributes: Attributes) -> EditorResult<Node> {
        Ok(Node::new(key, "linebreak", NodeBody::LineBreak))
    }

    fn create_element(&self, _node: &Node) -> ElementSpec {
        ElementSpec::new("br")
    }
}
