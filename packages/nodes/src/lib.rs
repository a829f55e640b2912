//! # Outline Nodes
//!
//! Rich-text block types for the Outline editor. Each one is an ordinary
//! [`NodeBehavior`] registered on the editor; the core knows nothing about
//! them beyond that contract.
//!
//! | type             | kind      | renders             |
//! |------------------|-----------|---------------------|
//! | `heading`        | element   | `h1` … `h6`         |
//! | `quote`          | element   | `blockquote`        |
//! | `list`           | element   | `ul` / `ol`         |
//! | `listitem`       | element   | `li`                |
//! | `horizontalrule` | decorator | `hr`                |

mod heading;
mod horizontal_rule;
mod list;
mod quote;

pub use heading::{heading_attributes, HeadingNode};
pub use horizontal_rule::HorizontalRuleNode;
pub use list::{list_attributes, ListItemNode, ListNode, ListType};
pub use quote::QuoteNode;

use outline_core::{EditorBuilder, EditorResult, NodeRegistry, RegistryError};

pub fn register_all(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    registry.register(HeadingNode)?;
    registry.register(QuoteNode)?;
    registry.register(ListNode)?;
    registry.register(ListItemNode)?;
    registry.register(HorizontalRuleNode)?;
    Ok(())
}

/// Register every rich-text node type on an editor builder
pub fn register_rich_text_nodes(mut builder: EditorBuilder) -> EditorResult<EditorBuilder> {
    register_all(builder.registry_mut())?;
    Ok(builder)
}
