use outline_core::{
    block_element, insert_paragraph_after, replace_block, Attributes, EditorResult, ElementSpec, Node, NodeBehavior,
    NodeKey, NodeKind, Transaction,
};

#[derive(Debug, Clone, Copy)]
pub struct QuoteNode;

impl NodeBehavior for QuoteNode {
    fn node_type(&self) -> &str {
        "quote"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    fn create_element(&self, node: &Node) -> ElementSpec {
        block_element("blockquote", node)
    }

    fn insert_new_after(&self, txn: &mut Transaction, key: &NodeKey) -> EditorResult<Option<NodeKey>> {
        insert_paragraph_after(txn, key).map(Some)
    }

    fn collapse_at_start(&self, txn: &mut Transaction, key: &NodeKey) -> EditorResult<bool> {
        replace_block(txn, key, "paragraph", Attributes::new())?;
        Ok(true)
    }
}
