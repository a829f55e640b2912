use outline_core::{ElementSpec, Node, NodeBehavior, NodeKind};

/// Leaf divider rendered outside the text flow
#[derive(Debug, Clone, Copy)]
pub struct HorizontalRuleNode;

impl NodeBehavior for HorizontalRuleNode {
    fn node_type(&self) -> &str {
        "horizontalrule"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }

    fn create_element(&self, _node: &Node) -> ElementSpec {
        ElementSpec::new("hr")
    }
}
