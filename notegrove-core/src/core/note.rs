use serde::{Deserialize, Serialize};

/// A persisted note document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub owner: String,
    pub parent_note: Option<String>,
    /// Ordered child ids. `None` only for documents written without a child list.
    pub child_notes: Option<Vec<String>>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Note {
    /// Returns `true` if the note has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_note.is_none()
    }

    /// Child ids, treating a missing list as empty.
    pub fn child_ids(&self) -> &[String] {
        self.child_notes.as_deref().unwrap_or(&[])
    }
}

/// Input for [`NoteRepository::create_note`](super::repository::NoteRepository::create_note).
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub title: String,
    pub content: Option<String>,
    pub parent: Option<String>,
    pub child_notes: Option<Vec<String>>,
}

impl NewNote {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn under(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Partial update applied by [`NoteRepository::update_note`](super::repository::NoteRepository::update_note).
///
/// `None` leaves a field untouched. For the optional fields the inner
/// `Option` is the new value, so `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub content: Option<String>,
    pub parent_note: Option<Option<String>>,
    pub child_notes: Option<Option<Vec<String>>>,
}

/// Children of a [`NoteNode`]: either unexpanded ids or embedded nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildNotes {
    Ids(Vec<String>),
    Nested(Vec<NoteNode>),
}

impl Default for ChildNotes {
    fn default() -> Self {
        Self::Nested(Vec::new())
    }
}

impl ChildNotes {
    pub fn len(&self) -> usize {
        match self {
            Self::Ids(ids) => ids.len(),
            Self::Nested(nodes) => nodes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of the children in order, whichever form they are held in.
    pub fn ids(&self) -> Vec<String> {
        match self {
            Self::Ids(ids) => ids.clone(),
            Self::Nested(nodes) => nodes.iter().map(|n| n.id.clone()).collect(),
        }
    }

    /// Embedded children, or `None` when the list is not expanded.
    ///
    /// An empty list counts as expanded in either form; both serialize to `[]`.
    pub fn nested(&self) -> Option<&[NoteNode]> {
        match self {
            Self::Ids(ids) if ids.is_empty() => Some(&[]),
            Self::Ids(_) => None,
            Self::Nested(nodes) => Some(nodes),
        }
    }
}

/// A note in the nested tree representation. Content is fetched separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteNode {
    pub id: String,
    pub title: String,
    pub owner: String,
    pub parent_note: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub child_notes: ChildNotes,
}

impl NoteNode {
    /// Builds an unexpanded node from a stored note.
    pub fn from_note(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            title: note.title.clone(),
            owner: note.owner.clone(),
            parent_note: note.parent_note.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
            child_notes: ChildNotes::Ids(note.child_ids().to_vec()),
        }
    }

    /// Builds a leaf node with an empty, expanded child list.
    pub fn leaf(id: impl Into<String>, title: impl Into<String>, owner: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: id.into(),
            title: title.into(),
            owner: owner.into(),
            parent_note: None,
            created_at: now,
            updated_at: now,
            child_notes: ChildNotes::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_note() -> Note {
        Note {
            id: "n1".to_string(),
            title: "Todo".to_string(),
            content: String::new(),
            owner: "u1".to_string(),
            parent_note: None,
            child_notes: Some(vec!["c1".to_string(), "c2".to_string()]),
            created_at: 1,
            updated_at: 1,
        }
    }

    #[test]
    fn test_from_note_keeps_ids_unexpanded() {
        let node = NoteNode::from_note(&sample_note());
        assert_eq!(node.child_notes, ChildNotes::Ids(vec!["c1".into(), "c2".into()]));
        assert!(node.child_notes.nested().is_none());
    }

    #[test]
    fn test_missing_child_list_reads_as_empty() {
        let mut note = sample_note();
        note.child_notes = None;
        assert!(note.child_ids().is_empty());
        assert!(NoteNode::from_note(&note).child_notes.is_empty());
    }

    #[test]
    fn test_leaf_stays_expanded_through_json() {
        let leaf = NoteNode::leaf("a", "A", "u1");
        let json = serde_json::to_string(&leaf).unwrap();
        let back: NoteNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back.child_notes.nested(), Some(&[] as &[NoteNode]));
        assert!(back.child_notes.is_empty());
    }

    #[test]
    fn test_node_serializes_camel_case() {
        let node = NoteNode::leaf("a", "A", "u1");
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("childNotes"));
        assert!(json.contains("parentNote"));
    }
}
