//! Input transforms
//!
//! A transform inspects a freshly committed state and may rewrite it inside
//! its own transaction, exactly like any other caller.

use crate::errors::EditorResult;
use crate::key::NodeKey;
use crate::transaction::Transaction;

pub trait Transform {
    fn name(&self) -> &str;

    /// Rewrite the committed state; `dirty` lists the nodes the triggering
    /// commit wrote. Return `Ok(false)` when nothing changed.
    fn transform(&self, txn: &mut Transaction, dirty: &[NodeKey]) -> EditorResult<bool>;
}
