//! Inline shortcuts: typing the closing marker of `*text*`, `**text**` and
//! friends formats the enclosed text and drops both markers.

use outline_core::{EditorResult, NodeKey, NodeMap, Selection, TextFormat, Transaction};
use regex::{escape, Regex};
use tracing::debug;

/// Markers in match order; longer markers sharing a character come first
const MARKERS: &[(&str, TextFormat)] = &[
    ("***", TextFormat::BOLD.union(TextFormat::ITALIC)),
    ("**", TextFormat::BOLD),
    ("__", TextFormat::BOLD),
    ("~~", TextFormat::STRIKETHROUGH),
    ("*", TextFormat::ITALIC),
    ("_", TextFormat::ITALIC),
    ("`", TextFormat::CODE),
];

#[derive(Debug, Clone)]
struct InlineRule {
    marker: &'static str,
    format: TextFormat,
    pattern: Regex,
}

/// Text split around a matched inline marker pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineMatch {
    pub prefix: String,
    pub content: String,
    pub format: TextFormat,
}

#[derive(Debug, Clone)]
pub struct InlineRules {
    rules: Vec<InlineRule>,
}

impl InlineRules {
    pub fn new() -> Result<Self, regex::Error> {
        let rules = MARKERS
            .iter()
            .map(|&(marker, format)| {
                let m = escape(marker);
                let c = escape(&marker[..1]);
                // Underscore markers only open at a word start so that
                // snake_case_names stay plain
                let lead = if marker.starts_with('_') {
                    r"(?:^|\s)".to_string()
                } else {
                    format!("(?:^|[^{c}])")
                };
                let pattern = format!(r"{lead}({m})([^{c}\s](?:[^{c}]*[^{c}\s])?){m}$");
                Regex::new(&pattern).map(|pattern| InlineRule { marker, format, pattern })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Match the text typed before the caret against every marker
    pub fn match_closing(&self, before: &str) -> Option<InlineMatch> {
        self.rules.iter().find_map(|rule| {
            let caps = rule.pattern.captures(before)?;
            let open = caps.get(1)?;
            let content = caps.get(2)?;
            debug!(marker = rule.marker, "Matched inline marker");
            Some(InlineMatch {
                prefix: before[..open.start()].to_string(),
                content: content.as_str().to_string(),
                format: rule.format,
            })
        })
    }
}

/// Rewrite text `key` so the matched content becomes its own formatted run,
/// with `after` (the text past the caret) kept in a run of the original format
pub(crate) fn apply(txn: &mut Transaction, key: &NodeKey, found: &InlineMatch, after: &str) -> EditorResult<()> {
    let base = txn.get(key)?.format();
    txn.set_text(key, &found.prefix)?;

    let formatted = txn.create_formatted_text(&found.content, base | found.format)?;
    txn.insert_after(key, &formatted)?;
    if !after.is_empty() {
        let tail = txn.create_formatted_text(after, base)?;
        txn.insert_after(&formatted, &tail)?;
    }

    let end = found.content.chars().count();
    txn.set_selection(Some(Selection::caret(formatted, end).with_format(base)));
    Ok(())
}
