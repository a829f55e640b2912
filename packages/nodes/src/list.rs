//! Bullet and numbered lists
//!
//! A `list` holds `listitem`s; nesting is a `list` inside a `listitem`.

use outline_core::{
    block_element, insert_paragraph_after, Attributes, EditorError, EditorResult, ElementSpec, Node, NodeBehavior,
    NodeBody, NodeKey, NodeKind, NodeMap, RegistryError, Transaction,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListType {
    Bullet,
    Number,
}

impl ListType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListType::Bullet => "bullet",
            ListType::Number => "number",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bullet" => Some(ListType::Bullet),
            "number" => Some(ListType::Number),
            _ => None,
        }
    }
}

pub fn list_attributes(list_type: ListType, start: u64) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("listType".to_string(), list_type.as_str().into());
    if list_type == ListType::Number {
        attributes.insert("start".to_string(), start.into());
    }
    attributes
}

#[derive(Debug, Clone, Copy)]
pub struct ListNode;

impl NodeBehavior for ListNode {
    fn node_type(&self) -> &str {
        "list"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    fn construct(&self, key: NodeKey, mut attributes: Attributes) -> EditorResult<Node> {
        let list_type = match attributes.get("listType") {
            None => ListType::Bullet,
            Some(value) => value.as_str().and_then(ListType::parse).ok_or_else(|| {
                RegistryError::InvalidAttributes {
                    node_type: "list".to_string(),
                    message: format!("unknown listType {}", value),
                }
            })?,
        };
        attributes.insert("listType".to_string(), list_type.as_str().into());
        Ok(Node::new(key, "list", NodeBody::empty(NodeKind::Element)).with_attributes(attributes))
    }

    fn create_element(&self, node: &Node) -> ElementSpec {
        match node.attribute_str("listType").and_then(ListType::parse) {
            Some(ListType::Number) => {
                let spec = block_element("ol", node);
                match node.attribute_u64("start") {
                    Some(start) if start != 1 => spec.with_attribute("start", start.to_string()),
                    _ => spec,
                }
            }
            _ => block_element("ul", node),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListItemNode;

impl ListItemNode {
    fn list_of(txn: &Transaction, key: &NodeKey) -> EditorResult<NodeKey> {
        txn.parent_of(key)
            .map(|list| list.key().clone())
            .ok_or_else(|| EditorError::InvalidOperation(format!("list item {} has no list", key)))
    }

    /// Remove `item`, and its list when that leaves the list empty
    fn remove_item(txn: &mut Transaction, list: &NodeKey, item: &NodeKey) -> EditorResult<()> {
        txn.remove(item)?;
        if txn.children_of(list).is_empty() {
            txn.remove(list)?;
        }
        Ok(())
    }
}

impl NodeBehavior for ListItemNode {
    fn node_type(&self) -> &str {
        "listitem"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    fn create_element(&self, node: &Node) -> ElementSpec {
        block_element("li", node)
    }

    /// Enter on an empty item leaves the list; otherwise opens a new item
    fn insert_new_after(&self, txn: &mut Transaction, key: &NodeKey) -> EditorResult<Option<NodeKey>> {
        if !txn.children_of(key).is_empty() {
            let item = txn.create_element("listitem")?;
            txn.insert_after(key, &item)?;
            return Ok(Some(item));
        }

        let list = Self::list_of(txn, key)?;
        let paragraph = insert_paragraph_after(txn, &list)?;

        // Items below the empty one continue in a list of their own
        let index = txn.index_in_parent(key).unwrap_or(0);
        let rest = txn.children_of(&list)[index + 1..].to_vec();
        if !rest.is_empty() {
            let attributes = txn.get(&list)?.attributes().clone();
            let tail = txn.create_node("list", attributes)?;
            txn.insert_after(&paragraph, &tail)?;
            for item in &rest {
                txn.append(&tail, item)?;
            }
        }

        Self::remove_item(txn, &list, key)?;
        debug!(list = %list, split = !rest.is_empty(), "Left list from empty item");
        Ok(Some(paragraph))
    }

    /// Backspace at the start of the first item turns it into a paragraph
    /// placed before the list
    fn collapse_at_start(&self, txn: &mut Transaction, key: &NodeKey) -> EditorResult<bool> {
        let list = Self::list_of(txn, key)?;
        if txn.index_in_parent(key) != Some(0) {
            return Ok(false);
        }
        let paragraph = txn.create_element("paragraph")?;
        txn.insert_before(&list, &paragraph)?;
        txn.move_children(key, &paragraph)?;
        Self::remove_item(txn, &list, key)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_tags() {
        let bullet = ListNode
            .construct(NodeKey::new("1"), list_attributes(ListType::Bullet, 1))
            .unwrap();
        assert_eq!(ListNode.create_element(&bullet).tag, "ul");

        let numbered = ListNode
            .construct(NodeKey::new("2"), list_attributes(ListType::Number, 25))
            .unwrap();
        let spec = ListNode.create_element(&numbered);
        assert_eq!(spec.tag, "ol");
        assert_eq!(spec.attributes.get("start").map(String::as_str), Some("25"));

        let first = ListNode
            .construct(NodeKey::new("3"), list_attributes(ListType::Number, 1))
            .unwrap();
        assert!(ListNode.create_element(&first).attributes.get("start").is_none());
    }

    #[test]
    fn test_list_defaults_to_bullet() {
        let node = ListNode.construct(NodeKey::new("1"), Attributes::new()).unwrap();
        assert_eq!(node.attribute_str("listType"), Some("bullet"));
    }

    #[test]
    fn test_unknown_list_type_is_rejected() {
        let mut attributes = Attributes::new();
        attributes.insert("listType".to_string(), "check".into());
        assert!(ListNode.construct(NodeKey::new("1"), attributes).is_err());
    }
}
