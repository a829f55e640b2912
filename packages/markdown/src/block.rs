//! Block shortcuts: a marker typed at the start of a paragraph, followed by
//! a space, turns the paragraph into another block type.

use outline_core::{replace_block, Attributes, EditorResult, NodeKey, NodeMap, Transaction};
use outline_nodes::{heading_attributes, list_attributes, ListType};
use regex::Regex;
use tracing::debug;

/// Spaces of leading whitespace per list nesting level
const INDENT_WIDTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockShortcut {
    Heading(u8),
    Quote,
    List { list_type: ListType, start: u64, depth: usize },
    HorizontalRule,
}

impl BlockShortcut {
    pub fn node_type(&self) -> &'static str {
        match self {
            BlockShortcut::Heading(_) => "heading",
            BlockShortcut::Quote => "quote",
            BlockShortcut::List { .. } => "list",
            BlockShortcut::HorizontalRule => "horizontalrule",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockRules {
    heading: Regex,
    quote: Regex,
    bullet: Regex,
    number: Regex,
    rule: Regex,
}

impl BlockRules {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            heading: Regex::new(r"^(#{1,6}) $")?,
            quote: Regex::new(r"^> $")?,
            bullet: Regex::new(r"^( *)[-*+] $")?,
            number: Regex::new(r"^( *)(\d{1,9})\. $")?,
            rule: Regex::new(r"^(?:---|\*\*\*|___) $")?,
        })
    }

    /// Match the text typed before the caret
    pub fn match_marker(&self, before: &str) -> Option<BlockShortcut> {
        if self.rule.is_match(before) {
            return Some(BlockShortcut::HorizontalRule);
        }
        if let Some(caps) = self.heading.captures(before) {
            return Some(BlockShortcut::Heading(caps[1].len() as u8));
        }
        if self.quote.is_match(before) {
            return Some(BlockShortcut::Quote);
        }
        if let Some(caps) = self.bullet.captures(before) {
            return Some(BlockShortcut::List {
                list_type: ListType::Bullet,
                start: 1,
                depth: caps[1].len() / INDENT_WIDTH,
            });
        }
        if let Some(caps) = self.number.captures(before) {
            return Some(BlockShortcut::List {
                list_type: ListType::Number,
                start: caps[2].parse().unwrap_or(1),
                depth: caps[1].len() / INDENT_WIDTH,
            });
        }
        None
    }
}

/// Replace the marker at the start of `paragraph` (held by text `key`, `len`
/// characters long) with the block `shortcut` describes
pub(crate) fn apply(
    txn: &mut Transaction,
    paragraph: &NodeKey,
    key: &NodeKey,
    len: usize,
    shortcut: &BlockShortcut,
) -> EditorResult<()> {
    txn.splice_text(key, 0, len, "")?;
    if txn.get(key)?.content_len() == 0 {
        txn.remove(key)?;
    }

    let target = match shortcut {
        BlockShortcut::Heading(level) => replace_block(txn, paragraph, "heading", heading_attributes(*level))?,
        BlockShortcut::Quote => replace_block(txn, paragraph, "quote", Attributes::new())?,
        BlockShortcut::List { list_type, start, depth } => wrap_in_list(txn, paragraph, *list_type, *start, *depth)?,
        BlockShortcut::HorizontalRule => {
            let rule = txn.create_node("horizontalrule", Attributes::new())?;
            txn.insert_before(paragraph, &rule)?;
            paragraph.clone()
        }
    };
    txn.select_start(&target)?;
    debug!(shortcut = shortcut.node_type(), block = %target, "Applied block shortcut");
    Ok(())
}

/// Turn `paragraph` into a list item nested `depth` levels deep
///
/// A top-level item joins the list right before it when that list has the
/// same type.
fn wrap_in_list(
    txn: &mut Transaction,
    paragraph: &NodeKey,
    list_type: ListType,
    start: u64,
    depth: usize,
) -> EditorResult<NodeKey> {
    let previous = txn
        .previous_sibling(paragraph)
        .filter(|node| node.node_type() == "list" && node.attribute_str("listType") == Some(list_type.as_str()))
        .map(|node| node.key().clone());

    let item = replace_block(txn, paragraph, "listitem", Attributes::new())?;
    if let (Some(list), 0) = (previous, depth) {
        txn.append(&list, &item)?;
        return Ok(item);
    }

    let mut node = item.clone();
    for level in 0..=depth {
        let list = txn.create_node("list", list_attributes(list_type, start))?;
        txn.insert_before(&node, &list)?;
        txn.append(&list, &node)?;
        node = list;
        if level < depth {
            let wrapper = txn.create_element("listitem")?;
            txn.insert_before(&node, &wrapper)?;
            txn.append(&wrapper, &node)?;
            node = wrapper;
        }
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_markers() {
        let rules = BlockRules::new().unwrap();
        assert_eq!(rules.match_marker("## "), Some(BlockShortcut::Heading(2)));
        assert_eq!(rules.match_marker("> "), Some(BlockShortcut::Quote));
        assert_eq!(rules.match_marker("--- "), Some(BlockShortcut::HorizontalRule));
        assert_eq!(rules.match_marker("*** "), Some(BlockShortcut::HorizontalRule));
        assert_eq!(
            rules.match_marker("12. "),
            Some(BlockShortcut::List { list_type: ListType::Number, start: 12, depth: 0 })
        );
        assert_eq!(
            rules.match_marker("        - "),
            Some(BlockShortcut::List { list_type: ListType::Bullet, start: 1, depth: 2 })
        );
    }

    #[test]
    fn test_non_markers() {
        let rules = BlockRules::new().unwrap();
        assert_eq!(rules.match_marker("#"), None);
        assert_eq!(rules.match_marker("####### "), None);
        assert_eq!(rules.match_marker("#hash "), None);
        assert_eq!(rules.match_marker("a - "), None);
        assert_eq!(rules.match_marker("1.5 "), None);
    }
}
