//! # Render Operations
//!
//! The reconciler never touches a concrete surface. It describes the
//! difference between two snapshots as a [`RenderBatch`] of keyed
//! operations, and a [`RenderSurface`] applies the batch in order.
//!
//! ## Operation order inside a batch
//!
//! 1. `Remove` for every node present before and absent after
//! 2. `Create` for every node absent before, in pre-order
//! 3. `Update` for surviving nodes whose rendered form changed
//! 4. `Reorder` for parents whose child list changed, in pre-order
//! 5. `SetSelection`, last, once the element tree is final
//!
//! `Create` only builds a detached element; its position comes from the
//! `Reorder` of its parent. This keeps every operation keyed and lets a
//! surface apply a batch without path arithmetic.

use crate::errors::SurfaceError;
use crate::key::NodeKey;
use crate::registry::NodeRegistry;
use crate::selection::Selection;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;

/// Rendered form of a single node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementSpec {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Own text content (text nodes only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            text: None,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "camelCase")]
pub enum PatchChange {
    SetTag { tag: String },
    SetAttribute { name: String, value: String },
    RemoveAttribute { name: String },
    SetText { text: Option<String> },
}

/// Minimal set of changes turning one [`ElementSpec`] into another
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Patch {
    pub changes: Vec<PatchChange>,
}

impl Patch {
    /// `None` when both specs render identically
    pub fn between(old: &ElementSpec, new: &ElementSpec) -> Option<Patch> {
        let mut changes = Vec::new();

        if old.tag != new.tag {
            changes.push(PatchChange::SetTag { tag: new.tag.clone() });
        }

        for (name, value) in &new.attributes {
            if old.attributes.get(name) != Some(value) {
                changes.push(PatchChange::SetAttribute {
                    name: name.clone(),
                    value: value.clone(),
                });
            }
        }
        for name in old.attributes.keys() {
            if !new.attributes.contains_key(name) {
                changes.push(PatchChange::RemoveAttribute { name: name.clone() });
            }
        }

        if old.text != new.text {
            changes.push(PatchChange::SetText { text: new.text.clone() });
        }

        if changes.is_empty() {
            None
        } else {
            Some(Patch { changes })
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn apply_to(&self, spec: &mut ElementSpec) {
        for change in &self.changes {
            match change {
                PatchChange::SetTag { tag } => spec.tag = tag.clone(),
                PatchChange::SetAttribute { name, value } => {
                    spec.attributes.insert(name.clone(), value.clone());
                }
                PatchChange::RemoveAttribute { name } => {
                    spec.attributes.remove(name);
                }
                PatchChange::SetText { text } => spec.text = text.clone(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum RenderOp {
    Create {
        key: NodeKey,
        node_type: String,
        element: ElementSpec,
    },
    Update {
        key: NodeKey,
        node_type: String,
        patch: Patch,
    },
    Remove {
        key: NodeKey,
    },
    /// Full child order of `parent`; `moved` lists the children that had
    /// to be (re)inserted, the rest kept their relative order
    Reorder {
        parent: NodeKey,
        children: Vec<NodeKey>,
        moved: Vec<NodeKey>,
    },
    SetSelection {
        selection: Option<Selection>,
    },
}

impl RenderOp {
    pub fn name(&self) -> &'static str {
        match self {
            RenderOp::Create { .. } => "create",
            RenderOp::Update { .. } => "update",
            RenderOp::Remove { .. } => "remove",
            RenderOp::Reorder { .. } => "reorder",
            RenderOp::SetSelection { .. } => "setSelection",
        }
    }

    pub fn is_structural(&self) -> bool {
        !matches!(self, RenderOp::SetSelection { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Nodes the reconciler looked at
    pub visited: usize,
    /// Subtrees skipped because they were shared with the previous snapshot
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderBatch {
    pub ops: Vec<RenderOp>,
    pub stats: ReconcileStats,
}

impl RenderBatch {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Number of operations that change the element tree
    pub fn structural_ops(&self) -> usize {
        self.ops.iter().filter(|op| op.is_structural()).count()
    }

    pub fn count(&self, name: &str) -> usize {
        self.ops.iter().filter(|op| op.name() == name).count()
    }
}

/// Target of reconciliation (a DOM, a terminal buffer, a test double)
pub trait RenderSurface {
    /// Apply every operation of `batch` in order
    fn apply(&mut self, batch: &RenderBatch, registry: &NodeRegistry) -> Result<(), SurfaceError>;

    /// Drop all rendered elements before a full re-render
    fn reset(&mut self);

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_specs_have_no_patch() {
        let spec = ElementSpec::new("p").with_attribute("dir", "ltr");
        assert_eq!(Patch::between(&spec, &spec.clone()), None);
    }

    #[test]
    fn test_patch_transforms_old_into_new() {
        let old = ElementSpec::new("span")
            .with_attribute("style", "text-decoration: underline")
            .with_attribute("data-outline-text", "true")
            .with_text("hi");
        let new = ElementSpec::new("strong")
            .with_attribute("data-outline-text", "true")
            .with_text("hi there");

        let patch = Patch::between(&old, &new).unwrap();
        assert_eq!(patch.changes.len(), 3);

        let mut applied = old.clone();
        patch.apply_to(&mut applied);
        assert_eq!(applied, new);
    }

    #[test]
    fn test_render_op_serializes_with_tag() {
        let op = RenderOp::Remove { key: NodeKey::new("7") };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "remove");
        assert_eq!(json["key"], "7");
    }
}
