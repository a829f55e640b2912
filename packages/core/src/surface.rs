//! In-memory render surface
//!
//! [`VirtualSurface`] keeps a keyed element tree built only from render
//! operations. It is what tests compare against the snapshot and what the
//! CLI prints as HTML.

use crate::errors::SurfaceError;
use crate::key::NodeKey;
use crate::registry::NodeRegistry;
use crate::render::{ElementSpec, RenderBatch, RenderOp, RenderSurface};
use crate::selection::Selection;
use std::any::Any;
use std::collections::HashMap;

const VOID_TAGS: &[&str] = &["br", "hr", "img"];

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceElement {
    pub node_type: String,
    pub spec: ElementSpec,
    pub parent: Option<NodeKey>,
    pub children: Vec<NodeKey>,
}

#[derive(Debug, Default)]
pub struct VirtualSurface {
    elements: HashMap<NodeKey, SurfaceElement>,
    root: Option<NodeKey>,
    selection: Option<Selection>,
    batches_applied: usize,
    ops_applied: usize,
    moves_applied: usize,
}

impl VirtualSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self, key: &NodeKey) -> Option<&SurfaceElement> {
        self.elements.get(key)
    }

    pub fn node_count(&self) -> usize {
        self.elements.len()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn batches_applied(&self) -> usize {
        self.batches_applied
    }

    pub fn ops_applied(&self) -> usize {
        self.ops_applied
    }

    /// Total number of keys re-inserted by reorder operations
    pub fn moves_applied(&self) -> usize {
        self.moves_applied
    }

    /// Element keys in pre-order from the root
    pub fn traversal(&self) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeKey> = self.root.iter().cloned().collect();
        while let Some(key) = stack.pop() {
            if let Some(element) = self.elements.get(&key) {
                stack.extend(element.children.iter().rev().cloned());
                out.push(key);
            }
        }
        out
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        if let Some(root) = &self.root {
            self.write_html(root, &mut out);
        }
        out
    }

    fn write_html(&self, key: &NodeKey, out: &mut String) {
        let Some(element) = self.elements.get(key) else {
            return;
        };
        let spec = &element.spec;
        out.push('<');
        out.push_str(&spec.tag);
        for (name, value) in &spec.attributes {
            out.push_str(&format!(" {}=\"{}\"", name, escape(value)));
        }
        out.push('>');
        if VOID_TAGS.contains(&spec.tag.as_str()) {
            return;
        }
        if let Some(text) = &spec.text {
            out.push_str(&escape(text));
        }
        for child in &element.children {
            self.write_html(child, out);
        }
        out.push_str("</");
        out.push_str(&spec.tag);
        out.push('>');
    }

    fn element_mut(&mut self, key: &NodeKey) -> Result<&mut SurfaceElement, SurfaceError> {
        self.elements
            .get_mut(key)
            .ok_or_else(|| SurfaceError::UnknownElement(key.clone()))
    }

    fn detach_from_parent(&mut self, key: &NodeKey) {
        let parent = self.elements.get(key).and_then(|e| e.parent.clone());
        if let Some(parent) = parent.and_then(|p| self.elements.get_mut(&p)) {
            parent.children.retain(|c| c != key);
        }
        if let Some(element) = self.elements.get_mut(key) {
            element.parent = None;
        }
    }

    fn apply_op(&mut self, op: &RenderOp, registry: &NodeRegistry) -> Result<(), SurfaceError> {
        match op {
            RenderOp::Remove { key } => {
                if !self.elements.contains_key(key) {
                    return Err(SurfaceError::UnknownElement(key.clone()));
                }
                self.detach_from_parent(key);
                if let Some(element) = self.elements.remove(key) {
                    for child in &element.children {
                        if let Some(child) = self.elements.get_mut(child) {
                            child.parent = None;
                        }
                    }
                }
                if self.root.as_ref() == Some(key) {
                    self.root = None;
                }
            }
            RenderOp::Create { key, node_type, element } => {
                if self.elements.contains_key(key) {
                    return Err(SurfaceError::DuplicateElement(key.clone()));
                }
                self.elements.insert(
                    key.clone(),
                    SurfaceElement {
                        node_type: node_type.clone(),
                        spec: element.clone(),
                        parent: None,
                        children: Vec::new(),
                    },
                );
                if key.is_root() {
                    self.root = Some(key.clone());
                }
            }
            RenderOp::Update { key, node_type, patch } => {
                let element = self.element_mut(key)?;
                match registry.get(node_type) {
                    Ok(behavior) => behavior.apply_patch(&mut element.spec, patch),
                    Err(_) => patch.apply_to(&mut element.spec),
                }
            }
            RenderOp::Reorder { parent, children, moved } => {
                if !self.elements.contains_key(parent) {
                    return Err(SurfaceError::UnknownElement(parent.clone()));
                }
                if let Some(missing) = children.iter().find(|c| !self.elements.contains_key(*c)) {
                    return Err(SurfaceError::UnknownElement(missing.clone()));
                }
                for child in children {
                    let current = self.elements.get(child).and_then(|e| e.parent.clone());
                    if current.as_ref() != Some(parent) {
                        self.detach_from_parent(child);
                    }
                }
                let previous = std::mem::replace(&mut self.element_mut(parent)?.children, children.clone());
                for child in previous {
                    if !children.contains(&child) {
                        if let Some(element) = self.elements.get_mut(&child) {
                            element.parent = None;
                        }
                    }
                }
                for child in children {
                    self.element_mut(child)?.parent = Some(parent.clone());
                }
                self.moves_applied += moved.len();
            }
            RenderOp::SetSelection { selection } => {
                self.selection = selection.clone();
            }
        }
        self.ops_applied += 1;
        Ok(())
    }
}

impl RenderSurface for VirtualSurface {
    fn apply(&mut self, batch: &RenderBatch, registry: &NodeRegistry) -> Result<(), SurfaceError> {
        for op in &batch.ops {
            self.apply_op(op, registry)?;
        }
        self.batches_applied += 1;
        Ok(())
    }

    fn reset(&mut self) {
        self.elements.clear();
        self.root = None;
        self.selection = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
