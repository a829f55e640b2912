//! # Reconciler
//!
//! Computes the [`RenderBatch`] that turns the rendering of one snapshot
//! into the rendering of the next.
//!
//! ## Algorithm
//!
//! The walk follows the *next* tree from the root:
//!
//! 1. A node whose `Arc` is shared with the previous snapshot is skipped
//!    together with its whole subtree. Copy-on-write guarantees that no
//!    descendant of a shared node changed, so the cost of a pass is
//!    proportional to the number of modified nodes.
//! 2. A surviving node of the same type gets an `Update` when its type's
//!    `compute_delta` reports a patch, then its children are diffed.
//! 3. A node whose type changed is removed and created again under the
//!    same key; its parent is re-ordered so the new element is attached.
//! 4. A new key is created through its type's `create_element`.
//! 5. Previous children that exist nowhere in the next snapshot are removed
//!    with every descendant that is gone as well.
//!
//! A parent whose child list changed gets one `Reorder` carrying the full
//! order plus the keys that actually move, chosen as the complement of the
//! longest run of children that kept their relative order.

use crate::errors::EditorResult;
use crate::key::NodeKey;
use crate::registry::NodeRegistry;
use crate::render::{ReconcileStats, RenderBatch, RenderOp};
use crate::state::EditorState;
use crate::tree::NodeMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Diff `prev` against `next`
#[instrument(skip_all, fields(prev = prev.version(), next = next.version()))]
pub fn reconcile(prev: &EditorState, next: &EditorState, registry: &NodeRegistry) -> EditorResult<RenderBatch> {
    let mut pass = Pass {
        prev,
        next,
        registry,
        removes: Vec::new(),
        creates: Vec::new(),
        updates: Vec::new(),
        reorders: Vec::new(),
        forced: HashSet::new(),
        stats: ReconcileStats::default(),
    };
    pass.visit(next.root_key())?;

    debug!(
        removes = pass.removes.len(),
        creates = pass.creates.len(),
        updates = pass.updates.len(),
        reorders = pass.reorders.len(),
        visited = pass.stats.visited,
        skipped = pass.stats.skipped,
        "Reconciled snapshots"
    );

    let mut ops = pass.removes;
    ops.append(&mut pass.creates);
    ops.append(&mut pass.updates);
    ops.append(&mut pass.reorders);

    let structural = !ops.is_empty();
    let selection_changed = prev.selection() != next.selection();
    if selection_changed || (structural && next.selection().is_some()) {
        ops.push(RenderOp::SetSelection {
            selection: next.selection().cloned(),
        });
    }

    Ok(RenderBatch { ops, stats: pass.stats })
}

/// Render operations for mounting `state` on an empty surface
pub fn full_render(state: &EditorState, registry: &NodeRegistry) -> EditorResult<RenderBatch> {
    reconcile(&EditorState::blank(), state, registry)
}

struct Pass<'a> {
    prev: &'a EditorState,
    next: &'a EditorState,
    registry: &'a NodeRegistry,
    removes: Vec<RenderOp>,
    creates: Vec<RenderOp>,
    updates: Vec<RenderOp>,
    reorders: Vec<RenderOp>,
    /// Parents that must re-attach their children even if the key list
    /// is unchanged
    forced: HashSet<NodeKey>,
    stats: ReconcileStats,
}

impl Pass<'_> {
    fn visit(&mut self, key: &NodeKey) -> EditorResult<()> {
        self.stats.visited += 1;
        let (prev, next) = (self.prev, self.next);
        let next_node = next.get(key)?;

        let Some(prev_arc) = prev.node_arc(key) else {
            return self.create(key);
        };
        if next.node_arc(key).map(|n| Arc::ptr_eq(n, prev_arc)).unwrap_or(false) {
            self.stats.skipped += 1;
            return Ok(());
        }

        let prev_node = prev_arc.as_ref();
        if prev_node.node_type() != next_node.node_type() {
            self.removes.push(RenderOp::Remove { key: key.clone() });
            self.push_create(key)?;
            if let Some(parent) = next_node.parent() {
                self.forced.insert(parent.clone());
            }
            return self.diff_children(key, prev_node.children(), next_node.children(), true);
        }

        let behavior = self.registry.get(next_node.node_type())?;
        if let Some(patch) = behavior.compute_delta(prev_node, next_node) {
            self.updates.push(RenderOp::Update {
                key: key.clone(),
                node_type: next_node.node_type().to_string(),
                patch,
            });
        }
        self.diff_children(key, prev_node.children(), next_node.children(), false)
    }

    fn push_create(&mut self, key: &NodeKey) -> EditorResult<()> {
        let next = self.next;
        let node = next.get(key)?;
        let behavior = self.registry.get(node.node_type())?;
        self.creates.push(RenderOp::Create {
            key: key.clone(),
            node_type: node.node_type().to_string(),
            element: behavior.create_element(node),
        });
        Ok(())
    }

    fn create(&mut self, key: &NodeKey) -> EditorResult<()> {
        self.push_create(key)?;
        let children = self.next.children_of(key).to_vec();
        if !children.is_empty() {
            self.reorders.push(RenderOp::Reorder {
                parent: key.clone(),
                children: children.clone(),
                moved: children.clone(),
            });
        }
        for child in &children {
            self.visit(child)?;
        }
        Ok(())
    }

    fn diff_children(
        &mut self,
        parent: &NodeKey,
        prev_children: &[NodeKey],
        next_children: &[NodeKey],
        forced: bool,
    ) -> EditorResult<()> {
        for child in prev_children {
            if !self.next.contains(child) {
                self.remove_subtree(child);
            }
        }

        let forced = forced || self.forced.remove(parent);
        if forced || prev_children != next_children {
            let moved = if forced {
                next_children.to_vec()
            } else {
                plan_moves(prev_children, next_children)
            };
            self.reorders.push(RenderOp::Reorder {
                parent: parent.clone(),
                children: next_children.to_vec(),
                moved,
            });
        }

        let reorder_index = self.reorders.len();
        for child in next_children {
            self.visit(child)?;
        }

        // A child re-created under a new type forces this parent after the
        // fact; upgrade the reorder emitted above or add one
        if self.forced.remove(parent) {
            let full = RenderOp::Reorder {
                parent: parent.clone(),
                children: next_children.to_vec(),
                moved: next_children.to_vec(),
            };
            let existing = self.reorders[..reorder_index]
                .iter()
                .rposition(|op| matches!(op, RenderOp::Reorder { parent: p, .. } if p == parent));
            match existing {
                Some(index) => self.reorders[index] = full,
                None => self.reorders.insert(reorder_index, full),
            }
        }
        Ok(())
    }

    /// Remove a previous subtree, stopping at nodes that still exist
    /// elsewhere in the next snapshot
    fn remove_subtree(&mut self, key: &NodeKey) {
        let mut stack = vec![key.clone()];
        while let Some(current) = stack.pop() {
            if self.next.contains(&current) {
                continue;
            }
            self.removes.push(RenderOp::Remove { key: current.clone() });
            stack.extend(self.prev.children_of(&current).iter().rev().cloned());
        }
    }
}

/// Children of `next` that must be (re)inserted to turn `prev` into `next`
///
/// Children present in both lists that form the longest increasing run of
/// previous positions stay put; everything else moves.
pub fn plan_moves(prev: &[NodeKey], next: &[NodeKey]) -> Vec<NodeKey> {
    let prev_index: HashMap<&NodeKey, usize> = prev.iter().enumerate().map(|(i, k)| (k, i)).collect();

    let kept: Vec<(usize, usize)> = next
        .iter()
        .enumerate()
        .filter_map(|(i, k)| prev_index.get(k).map(|p| (i, *p)))
        .collect();
    let sequence: Vec<usize> = kept.iter().map(|(_, p)| *p).collect();
    let stable: HashSet<usize> = longest_increasing_subsequence(&sequence)
        .into_iter()
        .map(|i| kept[i].0)
        .collect();

    next.iter()
        .enumerate()
        .filter(|(i, _)| !stable.contains(i))
        .map(|(_, k)| k.clone())
        .collect()
}

/// Positions in `sequence` of one longest strictly increasing subsequence
pub fn longest_increasing_subsequence(sequence: &[usize]) -> Vec<usize> {
    // tails[l] = position of the smallest tail of an increasing run of length l + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessor: Vec<Option<usize>> = vec![None; sequence.len()];

    for (i, value) in sequence.iter().enumerate() {
        let length = tails.partition_point(|&t| sequence[t] < *value);
        if length > 0 {
            predecessor[i] = Some(tails[length - 1]);
        }
        if length == tails.len() {
            tails.push(i);
        } else {
            tails[length] = i;
        }
    }

    let mut out = Vec::with_capacity(tails.len());
    let mut current = tails.last().copied();
    while let Some(i) = current {
        out.push(i);
        current = predecessor[i];
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyGenerator;
    use crate::node::{Node, NodeKind, TextFormat};
    use crate::registry::NodeBehavior;
    use crate::render::{ElementSpec, PatchChange, RenderSurface};
    use crate::surface::VirtualSurface;
    use crate::transaction::{Transaction, UpdateOptions};

    struct Banner;

    impl NodeBehavior for Banner {
        fn node_type(&self) -> &str {
            "banner"
        }

        fn kind(&self) -> NodeKind {
            NodeKind::Element
        }

        fn create_element(&self, _node: &Node) -> ElementSpec {
            ElementSpec::new("section")
        }
    }

    fn keys(names: &[&str]) -> Vec<NodeKey> {
        names.iter().map(|n| NodeKey::new(*n)).collect()
    }

    fn commit(state: &Arc<EditorState>, f: impl FnOnce(&mut Transaction)) -> EditorState {
        let mut txn = Transaction::new(
            state.clone(),
            Arc::new(NodeRegistry::with_builtins()),
            KeyGenerator::new(),
            UpdateOptions::new(),
        );
        f(&mut txn);
        txn.finish(true).unwrap().state
    }

    fn sample() -> Arc<EditorState> {
        Arc::new(
            EditorState::builder()
                .paragraph(&["hello"])
                .paragraph(&["world"])
                .paragraph(&["again"])
                .build(),
        )
    }

    #[test]
    fn test_lis_picks_longest_run() {
        assert_eq!(longest_increasing_subsequence(&[]), Vec::<usize>::new());
        assert_eq!(longest_increasing_subsequence(&[0, 1, 2]), vec![0, 1, 2]);
        let lis = longest_increasing_subsequence(&[3, 0, 1, 4, 2]);
        assert_eq!(lis.len(), 3);
        assert_eq!(lis, vec![1, 2, 4]);
    }

    #[test]
    fn test_plan_moves_is_minimal() {
        // moving the last child to the front moves exactly one key
        assert_eq!(plan_moves(&keys(&["a", "b", "c"]), &keys(&["c", "a", "b"])), keys(&["c"]));
        // a new key always moves
        assert_eq!(plan_moves(&keys(&["a", "b"]), &keys(&["a", "x", "b"])), keys(&["x"]));
        assert!(plan_moves(&keys(&["a", "b"]), &keys(&["a", "b"])).is_empty());
    }

    #[test]
    fn test_identical_snapshots_produce_nothing() {
        let state = sample();
        let batch = reconcile(&state, &state, &NodeRegistry::with_builtins()).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.stats.skipped, 1);
    }

    #[test]
    fn test_text_edit_is_single_update() {
        let prev = sample();
        let next = commit(&prev, |txn| txn.set_text(&NodeKey::new("4"), "WORLD").unwrap());
        let batch = reconcile(&prev, &next, &NodeRegistry::with_builtins()).unwrap();

        assert_eq!(batch.len(), 1);
        match &batch.ops[0] {
            RenderOp::Update { key, patch, .. } => {
                assert_eq!(key, &NodeKey::new("4"));
                assert_eq!(patch.changes, vec![PatchChange::SetText { text: Some("WORLD".to_string()) }]);
            }
            other => panic!("unexpected op {other:?}"),
        }
        // root and paragraph "3" are walked, the two other paragraphs skipped
        assert_eq!(batch.stats.skipped, 2);
    }

    #[test]
    fn test_new_block_is_created_and_attached() {
        let prev = sample();
        let next = commit(&prev, |txn| {
            let paragraph = txn.create_element("paragraph").unwrap();
            let text = txn.create_text("new").unwrap();
            txn.append(&paragraph, &text).unwrap();
            txn.insert_after(&NodeKey::new("1"), &paragraph).unwrap();
        });
        let batch = reconcile(&prev, &next, &NodeRegistry::with_builtins()).unwrap();

        assert_eq!(batch.count("create"), 2);
        assert_eq!(batch.count("reorder"), 2);
        assert_eq!(batch.count("update"), 0);
        assert!(matches!(&batch.ops[0], RenderOp::Create { node_type, .. } if node_type == "paragraph"));
        let root_reorder = batch
            .ops
            .iter()
            .find(|op| matches!(op, RenderOp::Reorder { parent, .. } if parent.is_root()))
            .unwrap();
        if let RenderOp::Reorder { children, moved, .. } = root_reorder {
            assert_eq!(children.len(), 4);
            assert_eq!(moved.len(), 1);
        }
    }

    #[test]
    fn test_removed_block_removes_subtree() {
        let prev = sample();
        let next = commit(&prev, |txn| txn.remove(&NodeKey::new("3")).unwrap());
        let batch = reconcile(&prev, &next, &NodeRegistry::with_builtins()).unwrap();

        assert_eq!(
            &batch.ops[..2],
            &[
                RenderOp::Remove { key: NodeKey::new("3") },
                RenderOp::Remove { key: NodeKey::new("4") },
            ]
        );
        assert_eq!(batch.count("reorder"), 1);
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_type_change_recreates_element_and_reattaches_children() {
        let mut registry = NodeRegistry::with_builtins();
        registry.register(Banner).unwrap();
        let prev = EditorState::builder().paragraph(&["hello"]).paragraph(&["world"]).build();
        let next = EditorState::builder()
            .block("banner", &[("hello", TextFormat::empty())])
            .paragraph(&["world"])
            .build();

        let mut surface = VirtualSurface::new();
        surface.apply(&full_render(&prev, &registry).unwrap(), &registry).unwrap();
        let batch = reconcile(&prev, &next, &registry).unwrap();

        assert_eq!(batch.ops[0], RenderOp::Remove { key: NodeKey::new("1") });
        assert!(matches!(&batch.ops[1], RenderOp::Create { key, node_type, .. }
            if key == &NodeKey::new("1") && node_type == "banner"));
        assert_eq!(batch.count("create"), 1);
        assert_eq!(batch.count("update"), 0);
        assert!(batch.ops.contains(&RenderOp::Reorder {
            parent: NodeKey::new("1"),
            children: keys(&["2"]),
            moved: keys(&["2"]),
        }));
        assert!(batch.ops.contains(&RenderOp::Reorder {
            parent: NodeKey::root(),
            children: keys(&["1", "3"]),
            moved: keys(&["1", "3"]),
        }));

        surface.apply(&batch, &registry).unwrap();
        assert_eq!(surface.traversal(), next.traverse());
        assert_eq!(
            surface.to_html(),
            "<div contenteditable=\"true\" data-outline-editor=\"true\">\
             <section><span data-outline-text=\"true\">hello</span></section>\
             <p><span data-outline-text=\"true\">world</span></p></div>"
        );
    }

    #[test]
    fn test_swapped_blocks_move_one_key() {
        let prev = sample();
        let next = commit(&prev, |txn| txn.insert_at(&NodeKey::root(), &NodeKey::new("5"), 0).unwrap());
        let batch = reconcile(&prev, &next, &NodeRegistry::with_builtins()).unwrap();

        assert_eq!(
            batch.ops,
            vec![RenderOp::Reorder {
                parent: NodeKey::root(),
                children: keys(&["5", "1", "3"]),
                moved: keys(&["5"]),
            }]
        );
    }

    #[test]
    fn test_selection_change_alone_emits_set_selection() {
        let prev = sample();
        let next = commit(&prev, |txn| txn.select_text(&NodeKey::new("2"), 1).unwrap());
        let batch = reconcile(&prev, &next, &NodeRegistry::with_builtins()).unwrap();

        assert_eq!(batch.structural_ops(), 0);
        assert_eq!(batch.len(), 1);
        assert!(matches!(batch.ops[0], RenderOp::SetSelection { selection: Some(_) }));
    }

    #[test]
    fn test_full_render_creates_every_node() {
        let state = sample();
        let batch = full_render(&state, &NodeRegistry::with_builtins()).unwrap();
        assert_eq!(batch.count("create"), state.len());
        assert_eq!(batch.count("remove"), 0);
    }
}
