//! Error types for the editor

use crate::key::NodeKey;
use thiserror::Error;

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Invalid context: {0}")]
    InvalidContext(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistryError),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeKey),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Render surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EditorError {
    pub(crate) fn no_transaction() -> Self {
        EditorError::InvalidContext("no transaction is open".to_string())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        EditorError::InvalidOperation(message.into())
    }
}

/// Tree invariant violated at commit time
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Root node is missing")]
    RootMissing,

    #[error("Root node has a parent: {0}")]
    RootHasParent(NodeKey),

    #[error("Cycle detected at node {0}")]
    CycleDetected(NodeKey),

    #[error("Parent {parent} lists missing child {child}")]
    DanglingChild { parent: NodeKey, child: NodeKey },

    #[error("Node {key} points at parent {expected:?} but is listed by {actual}")]
    ParentMismatch {
        key: NodeKey,
        expected: Option<NodeKey>,
        actual: NodeKey,
    },

    #[error("Parent {parent} lists child {child} more than once")]
    DuplicateChild { parent: NodeKey, child: NodeKey },

    #[error("Node {0} is not reachable from the root")]
    Orphaned(NodeKey),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Node type already registered: {0}")]
    Conflict(String),

    #[error("Unknown node type: {0}")]
    UnknownType(String),

    #[error("Invalid attributes for {node_type}: {message}")]
    InvalidAttributes { node_type: String, message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("Render element not found: {0}")]
    UnknownElement(NodeKey),

    #[error("Render element already exists: {0}")]
    DuplicateElement(NodeKey),
}

/// Recovered selection problems reported alongside a successful commit
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionWarning {
    #[error("Selection point {key}:{offset} could not be resolved, collapsed to document start")]
    UnresolvableSelection { key: NodeKey, offset: usize },

    #[error("Selection offset on {key} clamped from {from} to {to}")]
    OffsetClamped { key: NodeKey, from: usize, to: usize },
}
