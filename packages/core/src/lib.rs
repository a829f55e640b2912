//! # Outline Core
//!
//! Document-state transaction engine for the Outline rich-text editor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Transaction: copy-on-write working tree     │
//! │  - node mutators + editing commands         │
//! │  - selection fixups on every mutation       │
//! └─────────────────────────────────────────────┘
//!                     ↓ finish (normalize, validate)
//! ┌─────────────────────────────────────────────┐
//! │ EditorState: immutable, structurally shared │
//! └─────────────────────────────────────────────┘
//!                     ↓ reconcile(prev, next)
//! ┌─────────────────────────────────────────────┐
//! │ RenderBatch → RenderSurface::apply          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//!        history, listeners, transforms
//! ```
//!
//! ## Core Principles
//!
//! 1. **Snapshots are the source of truth**: the surface is a derived view
//! 2. **Keys, not pointers**: relations are keys resolved against a snapshot
//! 3. **Identity means unchanged**: an `Arc` shared by two snapshots is a
//!    subtree the reconciler never visits
//! 4. **Behavior by type tag**: the engine only talks to [`NodeBehavior`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use outline_core::{Editor, VirtualSurface};
//!
//! let mut editor = Editor::builder().surface(VirtualSurface::new()).build()?;
//!
//! editor.update(|txn| txn.insert_text("Hello"))?;
//! editor.update(|txn| txn.insert_paragraph())?;
//!
//! let surface = editor.surface::<VirtualSurface>().unwrap();
//! println!("{}", surface.to_html());
//!
//! editor.undo()?;
//! ```

mod builtin;
mod commands;
mod config;
mod editor;
mod errors;
mod history;
mod key;
mod listeners;
mod node;
mod reconciler;
mod registry;
mod render;
mod selection;
mod serialization;
mod state;
mod surface;
mod transaction;
mod transform;
mod tree;

pub use builtin::{
    block_element, insert_paragraph_after, replace_block, LineBreakNode, ParagraphNode, RootNode, TextNode,
};
pub use config::{EditorConfig, HistoryConfig, DEFAULT_CONFIG_NAME};
pub use editor::{CommitOutcome, Editor, EditorBuilder, Phase};
pub use errors::{EditorError, EditorResult, RegistryError, SelectionWarning, SurfaceError, ValidationError};
pub use history::{HistoryAction, HistoryEntry, HistoryManager};
pub use key::{KeyGenerator, NodeKey};
pub use listeners::{ListenerChannel, ListenerId, Listeners, UpdateEvent};
pub use node::{Attributes, Direction, Node, NodeBody, NodeKind, TextFormat};
pub use reconciler::{full_render, longest_increasing_subsequence, plan_moves, reconcile};
pub use registry::{NodeBehavior, NodeRegistry};
pub use render::{ElementSpec, Patch, PatchChange, ReconcileStats, RenderBatch, RenderOp, RenderSurface};
pub use selection::{document_start, end_point_of, resolve_selection, start_point_of, Point, PointType, Selection};
pub use serialization::{SerializedEditorState, SerializedNode, SERIALIZED_VERSION};
pub use state::{EditorState, StateBuilder};
pub use surface::{SurfaceElement, VirtualSurface};
pub use transaction::{ChangeKind, Transaction, UpdateOptions, HISTORIC_TAG, INIT_TAG, TRANSFORM_TAG};
pub use transform::Transform;
pub use tree::NodeMap;
