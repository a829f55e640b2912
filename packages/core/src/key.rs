//! Node keys and per-editor key allocation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a node across snapshots
///
/// Two references to "the same" node in different snapshots are equal when
/// their keys are equal, regardless of content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    /// Key reserved for the root container
    pub const ROOT: &'static str = "root";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Monotonic key allocator owned by one editor instance
///
/// Keys are never reused, including keys handed out by transactions that
/// were later discarded.
#[derive(Debug, Clone, Default)]
pub struct KeyGenerator {
    last: u64,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key(&mut self) -> NodeKey {
        self.last += 1;
        NodeKey(self.last.to_string())
    }

    /// Number of keys allocated so far
    pub fn allocated(&self) -> u64 {
        self.last
    }
}
