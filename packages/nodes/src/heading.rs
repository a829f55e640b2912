use outline_core::{
    block_element, insert_paragraph_after, replace_block, Attributes, EditorResult, ElementSpec, Node, NodeBehavior,
    NodeBody, NodeKey, NodeKind, RegistryError, Transaction,
};

/// Attributes of a heading of `level` (1 to 6)
pub fn heading_attributes(level: u8) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("level".to_string(), level.into());
    attributes
}

/// `h1` to `h6`; the `level` attribute is required
#[derive(Debug, Clone, Copy)]
pub struct HeadingNode;

impl NodeBehavior for HeadingNode {
    fn node_type(&self) -> &str {
        "heading"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    fn construct(&self, key: NodeKey, attributes: Attributes) -> EditorResult<Node> {
        let level = attributes.get("level").and_then(|v| v.as_u64());
        if !matches!(level, Some(1..=6)) {
            return Err(RegistryError::InvalidAttributes {
                node_type: "heading".to_string(),
                message: "level must be a number from 1 to 6".to_string(),
            }
            .into());
        }
        Ok(Node::new(key, "heading", NodeBody::empty(NodeKind::Element)).with_attributes(attributes))
    }

    fn create_element(&self, node: &Node) -> ElementSpec {
        let level = node.attribute_u64("level").unwrap_or(1);
        block_element(&format!("h{}", level), node)
    }

    fn insert_new_after(&self, txn: &mut Transaction, key: &NodeKey) -> EditorResult<Option<NodeKey>> {
        insert_paragraph_after(txn, key).map(Some)
    }

    /// Backspace at the start turns the heading back into a paragraph
    fn collapse_at_start(&self, txn: &mut Transaction, key: &NodeKey) -> EditorResult<bool> {
        replace_block(txn, key, "paragraph", Attributes::new())?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outline_core::EditorError;

    #[test]
    fn test_heading_requires_level() {
        assert!(HeadingNode.construct(NodeKey::new("1"), heading_attributes(2)).is_ok());

        let err = HeadingNode.construct(NodeKey::new("1"), Attributes::new()).unwrap_err();
        assert!(matches!(
            err,
            EditorError::Registration(RegistryError::InvalidAttributes { .. })
        ));
        assert!(HeadingNode.construct(NodeKey::new("1"), heading_attributes(7)).is_err());
    }

    #[test]
    fn test_heading_renders_level_tag() {
        let node = HeadingNode.construct(NodeKey::new("1"), heading_attributes(3)).unwrap();
        assert_eq!(HeadingNode.create_element(&node).tag, "h3");
    }

    #[test]
    fn test_level_change_is_a_tag_patch() {
        let old = HeadingNode.construct(NodeKey::new("1"), heading_attributes(1)).unwrap();
        let new = old.clone().with_attribute("level", 2);

        let patch = HeadingNode.compute_delta(&old, &new).unwrap();
        let mut element = HeadingNode.create_element(&old);
        HeadingNode.apply_patch(&mut element, &patch);
        assert_eq!(element.tag, "h2");
    }
}
