//! # Node Model
//!
//! Typed, polymorphic tree elements with stable identity.
//!
//! A [`Node`] never holds references to other nodes. Parent and child
//! relations are [`NodeKey`]s resolved against the snapshot (or open
//! transaction) the node lives in, so "parent" is a lookup rather than an
//! owning pointer and the tree cannot form retain cycles.
//!
//! Behavior that differs per node type (rendering, serialization, what
//! follows a block on Enter) is not on the node itself: it is looked up by
//! the node's type tag in the [`NodeRegistry`](crate::NodeRegistry).

use crate::key::NodeKey;
use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Type-specific fields (heading level, list type, ...)
pub type Attributes = BTreeMap<String, serde_json::Value>;

bitflags! {
    /// Inline format flags of a text run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextFormat: u32 {
        const BOLD          = 1;
        const ITALIC        = 1 << 1;
        const STRIKETHROUGH = 1 << 2;
        const UNDERLINE     = 1 << 3;
        const CODE          = 1 << 4;
        const SUBSCRIPT     = 1 << 5;
        const SUPERSCRIPT   = 1 << 6;
    }
}

// Serialized as the raw bit set so stored documents stay compact
impl Serialize for TextFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for TextFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        Ok(TextFormat::from_bits_truncate(bits))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

/// Structural category of a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Container with ordered children
    Element,
    /// Run of formatted text
    Text,
    /// Leaf rendered entirely by its node type
    Decorator,
    /// Hard line break inside a block
    LineBreak,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeBody {
    Element {
        children: Vec<NodeKey>,
        direction: Option<Direction>,
        indent: u32,
    },
    Text {
        text: String,
        format: TextFormat,
    },
    Decorator,
    LineBreak,
}

impl NodeBody {
    pub fn empty(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Element => NodeBody::Element {
                children: Vec::new(),
                direction: None,
                indent: 0,
            },
            NodeKind::Text => NodeBody::Text {
                text: String::new(),
                format: TextFormat::empty(),
            },
            NodeKind::Decorator => NodeBody::Decorator,
            NodeKind::LineBreak => NodeBody::LineBreak,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeBody::Element { .. } => NodeKind::Element,
            NodeBody::Text { .. } => NodeKind::Text,
            NodeBody::Decorator => NodeKind::Decorator,
            NodeBody::LineBreak => NodeKind::LineBreak,
        }
    }
}

/// A single tree element
///
/// Cloning keeps key, type, attributes, parent and child list: a clone is
/// the copy-on-write successor of the same logical node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    key: NodeKey,
    node_type: String,
    parent: Option<NodeKey>,
    body: NodeBody,
    attributes: Attributes,
}

impl Node {
    pub fn new(key: NodeKey, node_type: impl Into<String>, body: NodeBody) -> Self {
        Self {
            key,
            node_type: node_type.into(),
            parent: None,
            body,
            attributes: Attributes::new(),
        }
    }

    pub fn element(key: NodeKey, node_type: impl Into<String>) -> Self {
        Self::new(key, node_type, NodeBody::empty(NodeKind::Element))
    }

    pub fn new_text(key: NodeKey, text: impl Into<String>) -> Self {
        Self::new(
            key,
            "text",
            NodeBody::Text {
                text: text.into(),
                format: TextFormat::empty(),
            },
        )
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_format(mut self, new_format: TextFormat) -> Self {
        if let NodeBody::Text { ref mut format, .. } = self.body {
            *format = new_format;
        }
        self
    }

    pub fn with_direction(mut self, new_direction: Option<Direction>) -> Self {
        if let NodeBody::Element { ref mut direction, .. } = self.body {
            *direction = new_direction;
        }
        self
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn parent(&self) -> Option<&NodeKey> {
        self.parent.as_ref()
    }

    pub fn kind(&self) -> NodeKind {
        self.body.kind()
    }

    pub fn body(&self) -> &NodeBody {
        &self.body
    }

    pub fn is_element(&self) -> bool {
        matches!(self.body, NodeBody::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.body, NodeBody::Text { .. })
    }

    /// Child keys in render order (empty for leaves)
    pub fn children(&self) -> &[NodeKey] {
        match &self.body {
            NodeBody::Element { children, .. } => children,
            _ => &[],
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            NodeBody::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn format(&self) -> TextFormat {
        match &self.body {
            NodeBody::Text { format, .. } => *format,
            _ => TextFormat::empty(),
        }
    }

    pub fn has_format(&self, flag: TextFormat) -> bool {
        self.format().contains(flag)
    }

    pub fn direction(&self) -> Option<Direction> {
        match &self.body {
            NodeBody::Element { direction, .. } => *direction,
            _ => None,
        }
    }

    pub fn indent(&self) -> u32 {
        match &self.body {
            NodeBody::Element { indent, .. } => *indent,
            _ => 0,
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(|v| v.as_str())
    }

    pub fn attribute_u64(&self, name: &str) -> Option<u64> {
        self.attributes.get(name).and_then(|v| v.as_u64())
    }

    /// Length in selection offsets: characters for text, children for
    /// elements, zero for other leaves
    pub fn content_len(&self) -> usize {
        match &self.body {
            NodeBody::Element { children, .. } => children.len(),
            NodeBody::Text { text, .. } => text.chars().count(),
            NodeBody::Decorator | NodeBody::LineBreak => 0,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeKey>) {
        self.parent = parent;
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeKey>> {
        match &mut self.body {
            NodeBody::Element { children, .. } => Some(children),
            _ => None,
        }
    }

    pub(crate) fn text_mut(&mut self) -> Option<&mut String> {
        match &mut self.body {
            NodeBody::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub(crate) fn set_format(&mut self, new_format: TextFormat) -> bool {
        match &mut self.body {
            NodeBody::Text { format, .. } => {
                *format = new_format;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn set_direction(&mut self, new_direction: Option<Direction>) -> bool {
        match &mut self.body {
            NodeBody::Element { direction, .. } => {
                *direction = new_direction;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn set_indent(&mut self, new_indent: u32) -> bool {
        match &mut self.body {
            NodeBody::Element { indent, .. } => {
                *indent = new_indent;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

/// Byte index of the `char_offset`-th character (or the end of the string)
pub(crate) fn byte_index(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_preserves_identity_fields() {
        let mut paragraph = Node::element(NodeKey::new("1"), "paragraph")
            .with_attribute("align", "left")
            .with_direction(Some(Direction::Ltr));
        paragraph.set_parent(Some(NodeKey::root()));
        paragraph.children_mut().unwrap().push(NodeKey::new("2"));

        let clone = paragraph.clone();
        assert_eq!(clone.key(), paragraph.key());
        assert_eq!(clone.node_type(), "paragraph");
        assert_eq!(clone.parent(), Some(&NodeKey::root()));
        assert_eq!(clone.children(), &[NodeKey::new("2")]);
        assert_eq!(clone.attribute_str("align"), Some("left"));
        assert_eq!(clone.direction(), Some(Direction::Ltr));
    }

    #[test]
    fn test_content_len_counts_characters() {
        let text = Node::new_text(NodeKey::new("1"), "héllo");
        assert_eq!(text.content_len(), 5);
        assert_eq!(byte_index("héllo", 2), 3);
        assert_eq!(byte_index("héllo", 9), "héllo".len());
    }

    #[test]
    fn test_leaf_accessors_are_empty() {
        let text = Node::new_text(NodeKey::new("1"), "x").with_format(TextFormat::BOLD);
        assert!(text.children().is_empty());
        assert_eq!(text.direction(), None);
        assert!(text.has_format(TextFormat::BOLD));
        assert!(!text.has_format(TextFormat::ITALIC));

        let br = Node::new(NodeKey::new("2"), "linebreak", NodeBody::LineBreak);
        assert_eq!(br.kind(), NodeKind::LineBreak);
        assert_eq!(br.text(), None);
        assert_eq!(br.content_len(), 0);
    }
}
