//! Delete strategy and result types for note removal.
//!
//! Used by [`NoteRepository::delete_note_with`](super::repository::NoteRepository::delete_note_with),
//! which always detaches the deleted note from its parent's child list and
//! then handles the note's own children according to the strategy:
//!
//! - [`DeleteStrategy::DeleteAll`] removes the note and all its descendants.
//! - [`DeleteStrategy::PromoteChildren`] removes only the note; its children
//!   take its slot in the parent's child list (or become root notes).
//! - [`DeleteStrategy::RefuseIfChildren`] fails when the note still has children.
//!
//! ## Serialization
//!
//! `DeleteStrategy` variants serialize as PascalCase strings; `DeleteResult`
//! fields serialize in camelCase.
//!
//! ```rust
//! use notegrove_core::{DeleteStrategy, DeleteResult};
//!
//! let json = serde_json::to_string(&DeleteStrategy::PromoteChildren).unwrap();
//! assert_eq!(json, r#""PromoteChildren""#);
//!
//! let result = DeleteResult {
//!     deleted_count: 1,
//!     affected_ids: vec!["a".to_string()],
//! };
//! assert!(serde_json::to_string(&result).unwrap().contains("affectedIds"));
//! ```

use serde::{Deserialize, Serialize};

/// Determines how children are handled when a note is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DeleteStrategy {
    /// Delete the target note and all of its descendants recursively.
    DeleteAll,

    /// Delete only the target note and re-parent its children to its former parent.
    PromoteChildren,

    /// Delete the target note only if its child list is empty.
    RefuseIfChildren,
}

/// The outcome of a delete operation.
///
/// `affected_ids` lists every note that was deleted or re-parented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// The total number of notes that were permanently removed.
    pub deleted_count: usize,

    /// IDs of all notes that were deleted or structurally affected by the operation.
    pub affected_ids: Vec<String>,
}
