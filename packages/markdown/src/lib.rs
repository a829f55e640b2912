//! # Outline Markdown
//!
//! Markdown-style typing shortcuts, run as an ordinary editor [`Transform`].
//!
//! | typed               | becomes                    |
//! |---------------------|----------------------------|
//! | `# ` … `###### `    | heading of that level      |
//! | `> `                | quote                      |
//! | `- `, `* `, `+ `    | bullet list item           |
//! | `1. `               | numbered list item         |
//! | `--- `, `*** `      | horizontal rule            |
//! | `*a*`, `_a_`        | italic                     |
//! | `**a**`, `__a__`    | bold                       |
//! | `***a***`           | bold italic                |
//! | `~~a~~`             | strikethrough              |
//! | `` `a` ``           | inline code                |
//!
//! Block shortcuts fire when the space after the marker is typed at the start
//! of a top-level paragraph; inline ones when the closing marker is typed.
//! Block shortcuts need the node types from `outline-nodes` to be
//! registered and are skipped otherwise.
//!
//! ```rust,ignore
//! let editor = outline_nodes::register_rich_text_nodes(Editor::builder())?
//!     .transform(MarkdownShortcuts::new()?)
//!     .build()?;
//! ```

mod block;
mod inline;

pub use block::{BlockRules, BlockShortcut};
pub use inline::{InlineMatch, InlineRules};

use outline_core::{EditorResult, NodeKey, NodeMap, PointType, Transaction, Transform};

#[derive(Debug, Clone)]
pub struct MarkdownShortcuts {
    block: BlockRules,
    inline: InlineRules,
}

/// Caret position a shortcut can fire at
struct Caret {
    key: NodeKey,
    before: String,
    after: String,
}

impl MarkdownShortcuts {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            block: BlockRules::new()?,
            inline: InlineRules::new()?,
        })
    }

    /// Collapsed caret inside a text node the triggering commit wrote
    fn caret(txn: &Transaction, dirty: &[NodeKey]) -> Option<Caret> {
        let selection = txn.selection()?;
        if !selection.is_collapsed() || selection.anchor.point_type != PointType::Text {
            return None;
        }
        let key = selection.anchor.key.clone();
        if !dirty.contains(&key) {
            return None;
        }
        let text = txn.node(&key)?.text()?;
        let offset = selection.anchor.offset;
        Some(Caret {
            before: text.chars().take(offset).collect(),
            after: text.chars().skip(offset).collect(),
            key,
        })
    }

    /// Paragraph directly under the root whose first child is `key`
    fn leading_paragraph(txn: &Transaction, key: &NodeKey) -> Option<NodeKey> {
        let paragraph = txn.parent_of(key)?;
        let top_level = paragraph.parent() == Some(txn.root_key());
        let first = paragraph.children().first() == Some(key);
        (paragraph.node_type() == "paragraph" && top_level && first).then(|| paragraph.key().clone())
    }

    fn try_block(&self, txn: &mut Transaction, caret: &Caret) -> EditorResult<bool> {
        let Some(paragraph) = Self::leading_paragraph(txn, &caret.key) else {
            return Ok(false);
        };
        let Some(shortcut) = self.block.match_marker(&caret.before) else {
            return Ok(false);
        };
        let registry = txn.registry();
        let registered = registry.contains(shortcut.node_type())
            && (shortcut.node_type() != "list" || registry.contains("listitem"));
        if !registered {
            return Ok(false);
        }
        let len = caret.before.chars().count();
        block::apply(txn, &paragraph, &caret.key, len, &shortcut)?;
        Ok(true)
    }

    fn try_inline(&self, txn: &mut Transaction, caret: &Caret) -> EditorResult<bool> {
        let Some(found) = self.inline.match_closing(&caret.before) else {
            return Ok(false);
        };
        inline::apply(txn, &caret.key, &found, &caret.after)?;
        Ok(true)
    }
}

impl Transform for MarkdownShortcuts {
    fn name(&self) -> &str {
        "markdown-shortcuts"
    }

    fn transform(&self, txn: &mut Transaction, dirty: &[NodeKey]) -> EditorResult<bool> {
        let Some(caret) = Self::caret(txn, dirty) else {
            return Ok(false);
        };
        if self.try_block(txn, &caret)? {
            return Ok(true);
        }
        self.try_inline(txn, &caret)
    }
}
