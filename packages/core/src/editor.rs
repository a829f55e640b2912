//! # Editor
//!
//! Coordinates the full commit lifecycle: Mutate → Validate → Reconcile →
//! Apply → Record → Notify.
//!
//! The editor owns everything one document needs: the committed snapshot,
//! the open transaction (at most one), history, the extension registry,
//! listeners, transforms and the mounted render surface. There is no
//! process-wide state; two editors never share anything but `Arc`ed
//! snapshots handed out by [`Editor::state`].

use crate::config::EditorConfig;
use crate::errors::{EditorError, EditorResult, SelectionWarning};
use crate::history::{HistoryAction, HistoryManager};
use crate::key::{KeyGenerator, NodeKey};
use crate::listeners::{Listeners, UpdateEvent};
use crate::reconciler::{full_render, reconcile};
use crate::registry::{NodeBehavior, NodeRegistry};
use crate::render::{RenderBatch, RenderSurface};
use crate::serialization::{deserialize_state, SerializedEditorState};
use crate::state::EditorState;
use crate::transaction::{ChangeKind, Transaction, UpdateOptions, HISTORIC_TAG, INIT_TAG, TRANSFORM_TAG};
use crate::transform::Transform;
use crate::tree::NodeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Transaction state machine
///
/// `Idle -> Open -> Committing -> Idle` on commit and
/// `Idle -> Open -> Discarded` on discard. `Discarded` is an idle phase:
/// it only records that the last transaction was dropped, and the next
/// `begin` moves on to `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Open,
    Committing,
    Discarded,
}

/// Result of a successful commit
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// Version of the new snapshot
    pub version: u64,

    /// Operations applied to the surface
    pub batch: RenderBatch,

    pub history: HistoryAction,

    /// Selection problems recovered while committing
    pub warnings: Vec<SelectionWarning>,

    /// Nodes written by the transaction
    pub dirty: Vec<NodeKey>,

    pub tags: Vec<String>,

    /// Number of transform commits that followed this one
    pub transforms: usize,

    /// Transforms that failed after this commit was installed, as
    /// `name: error`. The commit itself stands.
    pub transform_errors: Vec<String>,
}

impl CommitOutcome {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

pub struct Editor {
    config: EditorConfig,
    registry: Arc<NodeRegistry>,
    state: Arc<EditorState>,
    keys: KeyGenerator,
    pending: Option<Transaction>,
    phase: Phase,
    history: HistoryManager,
    listeners: Listeners,
    surface: Option<Box<dyn RenderSurface>>,
    transforms: Vec<Box<dyn Transform>>,
    reconcile_count: u64,
}

impl Editor {
    pub fn builder() -> EditorBuilder {
        EditorBuilder::new()
    }

    // --- transaction lifecycle -------------------------------------------

    pub fn begin(&mut self) -> EditorResult<()> {
        self.begin_with(UpdateOptions::new())
    }

    pub fn begin_with(&mut self, options: UpdateOptions) -> EditorResult<()> {
        if self.pending.is_some() {
            return Err(EditorError::InvalidContext(
                "a transaction is already open".to_string(),
            ));
        }
        let keys = std::mem::take(&mut self.keys);
        self.pending = Some(Transaction::new(
            Arc::clone(&self.state),
            Arc::clone(&self.registry),
            keys,
            options,
        ));
        self.phase = Phase::Open;
        Ok(())
    }

    /// The open transaction; mutations are only reachable through it
    pub fn transaction(&mut self) -> EditorResult<&mut Transaction> {
        self.pending.as_mut().ok_or_else(EditorError::no_transaction)
    }

    pub fn is_open(&self) -> bool {
        self.pending.is_some()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Drop the open transaction without any external effect
    pub fn discard(&mut self) -> EditorResult<()> {
        let txn = self.pending.take().ok_or_else(EditorError::no_transaction)?;
        self.keys = txn.keys;
        self.phase = Phase::Discarded;
        debug!(version = self.state.version(), "Transaction discarded");
        Ok(())
    }

    /// Validate and commit the open transaction, then run transforms
    #[instrument(skip_all, fields(namespace = %self.config.namespace))]
    pub fn commit(&mut self) -> EditorResult<CommitOutcome> {
        let mut outcome = match self.commit_pending() {
            Ok(outcome) => outcome,
            Err(err) => {
                self.report(&err);
                return Err(err);
            }
        };

        let runs_transforms = !outcome.dirty.is_empty()
            && !outcome.has_tag(HISTORIC_TAG)
            && !outcome.has_tag(TRANSFORM_TAG)
            && !self.transforms.is_empty();
        if runs_transforms {
            let (applied, failures) = self.run_transforms(outcome.dirty.clone());
            outcome.transforms = applied;
            outcome.transform_errors = failures;
        }
        Ok(outcome)
    }

    fn commit_pending(&mut self) -> EditorResult<CommitOutcome> {
        let mut txn = self.pending.take().ok_or_else(EditorError::no_transaction)?;
        self.keys = std::mem::take(&mut txn.keys);
        self.phase = Phase::Committing;

        let result = txn.finish(self.config.normalize_text).and_then(|prepared| {
            self.install(
                Arc::new(prepared.state),
                prepared.change,
                prepared.options,
                prepared.dirty,
                prepared.warnings,
            )
        });

        self.phase = Phase::Idle;
        result
    }

    /// Reconcile `next` against the current snapshot, apply it to the
    /// surface and make it current
    fn install(
        &mut self,
        next: Arc<EditorState>,
        change: ChangeKind,
        options: UpdateOptions,
        dirty: Vec<NodeKey>,
        warnings: Vec<SelectionWarning>,
    ) -> EditorResult<CommitOutcome> {
        let batch = reconcile(&self.state, &next, &self.registry)?;
        self.reconcile_count += 1;

        if let Some(surface) = self.surface.as_mut() {
            if let Err(err) = surface.apply(&batch, &self.registry) {
                warn!(error = %err, "Render surface rejected batch, resyncing");
                self.resync_surface();
                return Err(err.into());
            }
        }

        let prev = std::mem::replace(&mut self.state, Arc::clone(&next));
        let history = if options.skip_history {
            HistoryAction::Skipped
        } else {
            self.history.record(&prev, &next, &change, Instant::now())
        };

        for warning in &warnings {
            warn!(%warning, "Selection recovered");
        }
        debug!(
            version = next.version(),
            dirty = dirty.len(),
            ops = batch.len(),
            history = history.as_str(),
            "Committed"
        );

        self.listeners.emit_update(&UpdateEvent {
            prev_state: &prev,
            state: &next,
            batch: &batch,
            dirty: &dirty,
            tags: &options.tags,
        });
        if prev.selection() != next.selection() {
            self.listeners.emit_selection_change(next.selection());
        }

        Ok(CommitOutcome {
            version: next.version(),
            batch,
            history,
            warnings,
            dirty,
            tags: options.tags,
            transforms: 0,
            transform_errors: Vec::new(),
        })
    }

    /// Put the surface back in sync with the committed snapshot
    fn resync_surface(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        surface.reset();
        let rendered = full_render(&self.state, &self.registry)
            .and_then(|batch| surface.apply(&batch, &self.registry).map_err(EditorError::from));
        if let Err(err) = rendered {
            error!(error = %err, "Render surface could not be resynced");
        }
    }

    /// Offer the committed state to every transform, pass after pass
    ///
    /// Failures are reported and collected; they never undo the commit that
    /// triggered the run.
    fn run_transforms(&mut self, mut dirty: Vec<NodeKey>) -> (usize, Vec<String>) {
        let mut applied = 0;
        let mut failures = Vec::new();
        for pass in 0..self.config.max_transform_passes {
            let mut changed = false;
            for index in 0..self.transforms.len() {
                match self.run_transform(index, &dirty) {
                    Ok(Some(outcome)) => {
                        debug!(pass, version = outcome.version, "Transform committed");
                        if !outcome.dirty.is_empty() {
                            dirty = outcome.dirty;
                            changed = true;
                        }
                        applied += 1;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        let name = self.transforms.get(index).map(|t| t.name().to_string()).unwrap_or_default();
                        warn!(transform = %name, error = %err, "Transform failed");
                        self.report(&err);
                        failures.push(format!("{}: {}", name, err));
                    }
                }
            }
            if !changed {
                break;
            }
        }
        (applied, failures)
    }

    fn run_transform(&mut self, index: usize, dirty: &[NodeKey]) -> EditorResult<Option<CommitOutcome>> {
        self.begin_with(UpdateOptions::new().tag(TRANSFORM_TAG))?;
        let result = match (self.pending.as_mut(), self.transforms.get(index)) {
            (Some(txn), Some(transform)) => transform.transform(txn, dirty),
            _ => Ok(false),
        };
        match result {
            Ok(true) => {
                if let Some(txn) = self.pending.as_mut() {
                    if txn.change() != &ChangeKind::None {
                        txn.set_change(ChangeKind::Other);
                    }
                }
                self.commit_pending().map(Some)
            }
            Ok(false) => {
                self.discard()?;
                self.phase = Phase::Idle;
                Ok(None)
            }
            Err(err) => {
                self.discard()?;
                self.phase = Phase::Idle;
                Err(err)
            }
        }
    }

    /// Run `f` in a fresh transaction and commit it
    ///
    /// An error from `f` discards the transaction; the previous snapshot
    /// stays current and the error goes to the error listeners as well as
    /// to the caller.
    pub fn update<F>(&mut self, f: F) -> EditorResult<CommitOutcome>
    where
        F: FnOnce(&mut Transaction) -> EditorResult<()>,
    {
        self.update_with(UpdateOptions::new(), f)
    }

    pub fn update_with<F>(&mut self, options: UpdateOptions, f: F) -> EditorResult<CommitOutcome>
    where
        F: FnOnce(&mut Transaction) -> EditorResult<()>,
    {
        if let Err(err) = self.begin_with(options) {
            self.report(&err);
            return Err(err);
        }
        let result = self.transaction().and_then(f);
        if let Err(err) = result {
            // only fails when nothing is open, which begin_with ruled out
            let _ = self.discard();
            self.report(&err);
            return Err(err);
        }
        self.commit()
    }

    pub fn read<R>(&self, f: impl FnOnce(&EditorState) -> R) -> R {
        f(&self.state)
    }

    // --- history ---------------------------------------------------------

    /// Restore the previous snapshot; `Ok(false)` when there is nothing to undo
    pub fn undo(&mut self) -> EditorResult<bool> {
        self.ensure_idle("undo")?;
        let Some(target) = self.history.undo(&self.state, Instant::now()) else {
            debug!("Nothing to undo");
            return Ok(false);
        };
        self.restore(target).inspect_err(|err| self.report(err))?;
        Ok(true)
    }

    pub fn redo(&mut self) -> EditorResult<bool> {
        self.ensure_idle("redo")?;
        let Some(target) = self.history.redo(&self.state, Instant::now()) else {
            debug!("Nothing to redo");
            return Ok(false);
        };
        self.restore(target).inspect_err(|err| self.report(err))?;
        Ok(true)
    }

    fn restore(&mut self, target: Arc<EditorState>) -> EditorResult<CommitOutcome> {
        let version = self.state.version() + 1;
        let next = Arc::new(EditorState::clone(&target).with_version(version));
        self.install(
            next,
            ChangeKind::Other,
            UpdateOptions::new().skip_history().tag(HISTORIC_TAG),
            Vec::new(),
            Vec::new(),
        )
    }

    fn ensure_idle(&mut self, action: &str) -> EditorResult<()> {
        if self.pending.is_none() {
            return Ok(());
        }
        let err = EditorError::InvalidContext(format!("cannot {} while a transaction is open", action));
        self.report(&err);
        Err(err)
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // --- whole-state operations ------------------------------------------

    /// Install `state` as a regular, history-eligible commit
    pub fn set_state(&mut self, state: EditorState) -> EditorResult<CommitOutcome> {
        self.ensure_idle("replace the state")?;
        let result = state.validate().map_err(EditorError::from).and_then(|_| {
            let version = self.state.version() + 1;
            let dirty: Vec<NodeKey> = state.traverse();
            self.install(
                Arc::new(state.with_version(version)),
                ChangeKind::Other,
                UpdateOptions::new(),
                dirty,
                Vec::new(),
            )
        });
        result.inspect_err(|err| self.report(err))
    }

    /// Build a snapshot from its JSON form; nodes get fresh keys
    pub fn parse_state(&mut self, json: &str) -> EditorResult<EditorState> {
        let serialized = SerializedEditorState::from_json(json)?;
        let keys = match self.pending.as_mut() {
            Some(txn) => &mut txn.keys,
            None => &mut self.keys,
        };
        deserialize_state(&serialized, &self.registry, keys)
    }

    pub fn to_json(&self) -> EditorResult<String> {
        self.state.to_json(&self.registry)
    }

    // --- surface ---------------------------------------------------------

    /// Attach a surface and render the current snapshot onto it
    pub fn mount<S: RenderSurface + 'static>(&mut self, mut surface: S) -> EditorResult<()> {
        surface.reset();
        let batch = full_render(&self.state, &self.registry)?;
        surface.apply(&batch, &self.registry)?;
        info!(
            namespace = %self.config.namespace,
            ops = batch.len(),
            "Render surface mounted"
        );
        self.surface = Some(Box::new(surface));
        Ok(())
    }

    pub fn unmount(&mut self) -> Option<Box<dyn RenderSurface>> {
        self.surface.take()
    }

    /// The mounted surface, if it is an `S`
    pub fn surface<S: RenderSurface + 'static>(&self) -> Option<&S> {
        self.surface.as_ref()?.as_any().downcast_ref::<S>()
    }

    // --- accessors -------------------------------------------------------

    pub fn state(&self) -> Arc<EditorState> {
        Arc::clone(&self.state)
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn listeners_mut(&mut self) -> &mut Listeners {
        &mut self.listeners
    }

    pub fn add_transform(&mut self, transform: impl Transform + 'static) {
        self.transforms.push(Box::new(transform));
    }

    /// Number of reconciliation passes run for commits so far
    pub fn reconciliation_count(&self) -> u64 {
        self.reconcile_count
    }

    /// Forward an error to the error listeners, or log it when nobody listens
    pub fn report(&mut self, err: &EditorError) {
        if !self.listeners.emit_error(err) {
            error!(error = %err, "Unhandled editor error");
        }
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("namespace", &self.config.namespace)
            .field("version", &self.state.version())
            .field("phase", &self.phase)
            .field("nodes", &self.state.len())
            .field("transforms", &self.transforms.len())
            .field("mounted", &self.surface.is_some())
            .finish()
    }
}

pub struct EditorBuilder {
    config: EditorConfig,
    registry: NodeRegistry,
    transforms: Vec<Box<dyn Transform>>,
    surface: Option<Box<dyn FnOnce(&mut Editor) -> EditorResult<()>>>,
    init: bool,
}

impl EditorBuilder {
    /// Builder with the built-in node types registered
    pub fn new() -> Self {
        Self {
            config: EditorConfig::default(),
            registry: NodeRegistry::with_builtins(),
            transforms: Vec::new(),
            surface: None,
            init: true,
        }
    }

    pub fn config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a node type; fails on a duplicate type tag
    pub fn register<B: NodeBehavior + 'static>(mut self, behavior: B) -> EditorResult<Self> {
        self.registry.register(behavior)?;
        Ok(self)
    }

    pub fn registry_mut(&mut self) -> &mut NodeRegistry {
        &mut self.registry
    }

    pub fn transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn surface<S: RenderSurface + 'static>(mut self, surface: S) -> Self {
        self.surface = Some(Box::new(move |editor: &mut Editor| editor.mount(surface)));
        self
    }

    /// Start from a bare root instead of one empty paragraph
    pub fn skip_init(mut self) -> Self {
        self.init = false;
        self
    }

    pub fn build(self) -> EditorResult<Editor> {
        let history = HistoryManager::new(self.config.history.max_depth, self.config.history.merge_interval());
        let mut editor = Editor {
            config: self.config,
            registry: Arc::new(self.registry),
            state: Arc::new(EditorState::empty()),
            keys: KeyGenerator::new(),
            pending: None,
            phase: Phase::Idle,
            history,
            listeners: Listeners::new(),
            surface: None,
            transforms: self.transforms,
            reconcile_count: 0,
        };

        if let Some(mount) = self.surface {
            mount(&mut editor)?;
        }

        if self.init {
            let options = UpdateOptions::new().skip_history().tag(INIT_TAG);
            editor.update_with(options, |txn| {
                let paragraph = txn.create_element("paragraph")?;
                let root = txn.root_key().clone();
                txn.append(&root, &paragraph)?;
                txn.select_start(&paragraph)
            })?;
        }

        info!(
            namespace = %editor.config.namespace,
            node_types = editor.registry.len(),
            transforms = editor.transforms.len(),
            "Editor built"
        );
        Ok(editor)
    }
}

impl Default for EditorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Selection;
    use crate::surface::VirtualSurface;

    fn editor() -> Editor {
        Editor::builder().surface(VirtualSurface::new()).build().unwrap()
    }

    #[test]
    fn test_builder_creates_empty_paragraph() {
        let editor = editor();
        let state = editor.state();
        assert_eq!(state.len(), 2);
        assert_eq!(state.version(), 1);
        assert!(!editor.history().can_undo());
        assert_eq!(editor.reconciliation_count(), 1);

        let surface = editor.surface::<VirtualSurface>().unwrap();
        assert_eq!(surface.traversal(), state.traverse());
    }

    #[test]
    fn test_begin_twice_is_invalid_context() {
        let mut editor = editor();
        editor.begin().unwrap();
        assert_eq!(editor.phase(), Phase::Open);
        assert!(matches!(editor.begin(), Err(EditorError::InvalidContext(_))));
        editor.discard().unwrap();
        assert_eq!(editor.phase(), Phase::Discarded);
    }

    #[test]
    fn test_discarded_phase_ends_at_next_commit() {
        let mut editor = editor();
        editor.begin().unwrap();
        editor.discard().unwrap();
        assert_eq!(editor.phase(), Phase::Discarded);
        assert!(!editor.is_open());

        editor.begin().unwrap();
        assert_eq!(editor.phase(), Phase::Open);
        editor.transaction().unwrap().insert_text("kept").unwrap();
        editor.commit().unwrap();
        assert_eq!(editor.phase(), Phase::Idle);
    }

    #[test]
    fn test_commit_without_transaction_is_invalid_context() {
        let mut editor = editor();
        assert!(matches!(editor.commit(), Err(EditorError::InvalidContext(_))));
        assert!(matches!(editor.transaction(), Err(EditorError::InvalidContext(_))));
    }

    #[test]
    fn test_failed_closure_keeps_previous_state() {
        let mut editor = editor();
        let before = editor.state();
        let result = editor.update(|txn| {
            txn.insert_text("lost")?;
            Err(EditorError::InvalidOperation("stop".into()))
        });

        assert!(result.is_err());
        assert!(Arc::ptr_eq(&before, &editor.state()));
        assert!(!editor.is_open());
    }

    #[test]
    fn test_undo_while_open_is_rejected() {
        let mut editor = editor();
        editor.begin().unwrap();
        assert!(matches!(editor.undo(), Err(EditorError::InvalidContext(_))));
    }

    #[test]
    fn test_undo_on_empty_history_is_a_no_op() {
        let mut editor = editor();
        let version = editor.state().version();
        assert!(!editor.undo().unwrap());
        assert!(!editor.redo().unwrap());
        assert_eq!(editor.state().version(), version);
    }

    #[test]
    fn test_set_state_rejects_invalid_snapshot() {
        let mut editor = editor();
        let bad = EditorState::blank();
        assert!(matches!(editor.set_state(bad), Err(EditorError::Validation(_))));
    }

    #[test]
    fn test_parse_and_set_state() {
        let mut editor = editor();
        let json = r#"{ "root": { "type": "root", "children": [
            { "type": "paragraph", "children": [ { "type": "text", "text": "loaded" } ] }
        ] } }"#;
        let parsed = editor.parse_state(json).unwrap();
        editor.set_state(parsed).unwrap();

        let state = editor.state();
        assert_eq!(state.text_content(state.root_key()), "loaded");
        assert!(matches!(state.selection(), Some(Selection { .. })));
        assert!(editor.history().can_undo());

        let surface = editor.surface::<VirtualSurface>().unwrap();
        assert_eq!(surface.traversal(), state.traverse());
    }
}
