//! # Selection Model
//!
//! Anchor/focus points addressed by node key and offset.
//!
//! A text point's offset counts characters of the text node; an element
//! point's offset is a child index (`0..=children.len()`, "before child n").
//! Points are rewritten by the transaction whenever the node they reference
//! is removed, split or merged, and are revalidated against the committed
//! tree before every reconciliation pass.

use crate::errors::SelectionWarning;
use crate::key::NodeKey;
use crate::node::{NodeKind, TextFormat};
use crate::tree::NodeMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointType {
    Text,
    Element,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
    #[serde(rename = "type")]
    pub point_type: PointType,
}

impl Point {
    pub fn text(key: NodeKey, offset: usize) -> Self {
        Self {
            key,
            offset,
            point_type: PointType::Text,
        }
    }

    pub fn element(key: NodeKey, offset: usize) -> Self {
        Self {
            key,
            offset,
            point_type: PointType::Element,
        }
    }

    /// Whether the point addresses an existing node of the right kind with
    /// an in-range offset
    pub fn is_valid(&self, map: &impl NodeMap) -> bool {
        let Some(node) = map.node(&self.key) else {
            return false;
        };
        let kind_matches = match self.point_type {
            PointType::Text => node.kind() == NodeKind::Text,
            PointType::Element => node.kind() == NodeKind::Element,
        };
        kind_matches && self.offset <= node.content_len()
    }

    /// Child-index path from the root, used for document-order comparison
    fn path(&self, map: &impl NodeMap) -> Option<Vec<usize>> {
        let mut path = vec![self.offset];
        let mut current = self.key.clone();
        while &current != map.root_key() {
            let index = map.index_in_parent(&current)?;
            path.push(index);
            current = map.node(&current)?.parent()?.clone();
        }
        path.reverse();
        Some(path)
    }

    /// Document-order comparison; unresolvable points sort last
    pub fn compare(&self, other: &Point, map: &impl NodeMap) -> Ordering {
        match (self.path(map), other.path(map)) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
    /// Format applied to text typed at a collapsed selection
    #[serde(default)]
    pub format: TextFormat,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self {
            anchor,
            focus,
            format: TextFormat::empty(),
        }
    }

    pub fn collapsed(point: Point) -> Self {
        Self::new(point.clone(), point)
    }

    pub fn caret(key: NodeKey, offset: usize) -> Self {
        Self::collapsed(Point::text(key, offset))
    }

    pub fn with_format(mut self, format: TextFormat) -> Self {
        self.format = format;
        self
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn is_backward(&self, map: &impl NodeMap) -> bool {
        self.anchor.compare(&self.focus, map) == Ordering::Greater
    }

    /// Points ordered start-first
    pub fn start_end(&self, map: &impl NodeMap) -> (Point, Point) {
        if self.is_backward(map) {
            (self.focus.clone(), self.anchor.clone())
        } else {
            (self.anchor.clone(), self.focus.clone())
        }
    }

    pub fn touches(&self, key: &NodeKey) -> bool {
        &self.anchor.key == key || &self.focus.key == key
    }

    pub(crate) fn points_mut(&mut self) -> [&mut Point; 2] {
        [&mut self.anchor, &mut self.focus]
    }
}

/// First caret position inside the subtree at `key`
pub fn start_point_of(map: &impl NodeMap, key: &NodeKey) -> Option<Point> {
    let node = map.node(key)?;
    match node.kind() {
        NodeKind::Text => Some(Point::text(key.clone(), 0)),
        NodeKind::Element => match node.children().first() {
            Some(first) => start_point_of(map, first),
            None => Some(Point::element(key.clone(), 0)),
        },
        NodeKind::Decorator | NodeKind::LineBreak => {
            let parent = node.parent()?.clone();
            let index = map.index_in_parent(key)?;
            Some(Point::element(parent, index))
        }
    }
}

/// Last caret position inside the subtree at `key`
pub fn end_point_of(map: &impl NodeMap, key: &NodeKey) -> Option<Point> {
    let node = map.node(key)?;
    match node.kind() {
        NodeKind::Text => Some(Point::text(key.clone(), node.content_len())),
        NodeKind::Element => match node.children().last() {
            Some(last) => end_point_of(map, last),
            None => Some(Point::element(key.clone(), 0)),
        },
        NodeKind::Decorator | NodeKind::LineBreak => {
            let parent = node.parent()?.clone();
            let index = map.index_in_parent(key)?;
            Some(Point::element(parent, index + 1))
        }
    }
}

/// Caret at the very start of the document
pub fn document_start(map: &impl NodeMap) -> Point {
    start_point_of(map, map.root_key()).unwrap_or_else(|| Point::element(map.root_key().clone(), 0))
}

/// Revalidate a selection against a tree
///
/// Out-of-range offsets are clamped; points on missing nodes or nodes of
/// the wrong kind collapse the selection to the document start. Neither
/// case is an error: the problems are returned as warnings.
pub fn resolve_selection(
    map: &impl NodeMap,
    selection: Option<Selection>,
) -> (Option<Selection>, Vec<SelectionWarning>) {
    let Some(mut selection) = selection else {
        return (None, Vec::new());
    };
    let mut warnings = Vec::new();
    let collapsed = selection.is_collapsed();

    let points = if collapsed { 1 } else { 2 };

    for point in selection.points_mut().into_iter().take(points) {
        let Some(node) = map.node(&point.key) else {
            warnings.push(SelectionWarning::UnresolvableSelection {
                key: point.key.clone(),
                offset: point.offset,
            });
            continue;
        };
        let kind_matches = match point.point_type {
            PointType::Text => node.kind() == NodeKind::Text,
            PointType::Element => node.kind() == NodeKind::Element,
        };
        if !kind_matches {
            warnings.push(SelectionWarning::UnresolvableSelection {
                key: point.key.clone(),
                offset: point.offset,
            });
            continue;
        }
        let len = node.content_len();
        if point.offset > len {
            warnings.push(SelectionWarning::OffsetClamped {
                key: point.key.clone(),
                from: point.offset,
                to: len,
            });
            point.offset = len;
        }
    }
    if collapsed {
        let anchor = selection.anchor.clone();
        selection.focus = anchor;
    }

    let unresolvable = warnings
        .iter()
        .any(|w| matches!(w, SelectionWarning::UnresolvableSelection { .. }));
    if unresolvable {
        let start = document_start(map);
        return (Some(Selection::collapsed(start)), warnings);
    }

    (Some(selection), warnings)
}
