//! In-memory tree held by an editing session.
//!
//! The cache keeps one nested tree rooted at a top-level note together with
//! the id of the selected note. Every mutation clones the tree, edits the
//! clone, and installs it as a new [`Arc`] snapshot, so snapshots handed out
//! earlier are never modified and `Arc::ptr_eq` tells whether anything
//! changed. Lookups are a depth-first pre-order walk with no index; trees are
//! expected to be personal-sized.

use crate::{ChildNotes, NoteNode};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TreeCache {
    tree: Arc<NoteNode>,
    selected: String,
}

impl TreeCache {
    /// Wraps `root`, selecting it.
    pub fn new(root: NoteNode) -> Self {
        let selected = root.id.clone();
        Self {
            tree: Arc::new(root),
            selected,
        }
    }

    /// The current snapshot.
    pub fn tree(&self) -> Arc<NoteNode> {
        Arc::clone(&self.tree)
    }

    pub fn root_id(&self) -> &str {
        &self.tree.id
    }

    pub fn selected_id(&self) -> &str {
        &self.selected
    }

    /// The selected note as it appears in the current snapshot.
    pub fn selected(&self) -> Option<&NoteNode> {
        find_note(&self.tree, &self.selected)
    }

    pub fn find(&self, note_id: &str) -> Option<&NoteNode> {
        find_note(&self.tree, note_id)
    }

    /// Selects `note_id`. Returns `false` if it is not in the tree.
    pub fn select(&mut self, note_id: &str) -> bool {
        if self.find(note_id).is_none() {
            return false;
        }
        self.selected = note_id.to_string();
        true
    }

    /// Appends `child` under `parent_id` and selects it.
    ///
    /// No-op returning `false` if the parent is not in the tree or its
    /// children are still unexpanded ids.
    pub fn add_child(&mut self, parent_id: &str, mut child: NoteNode) -> bool {
        let mut updated = (*self.tree).clone();
        let Some(parent) = find_note_mut(&mut updated, parent_id) else {
            log::debug!("add_child: parent {parent_id} not in tree");
            return false;
        };

        if parent.child_notes.is_empty() {
            parent.child_notes = ChildNotes::Nested(Vec::new());
        }
        let ChildNotes::Nested(children) = &mut parent.child_notes else {
            log::debug!("add_child: children of {parent_id} are not expanded");
            return false;
        };

        child.parent_note = Some(parent_id.to_string());
        let child_id = child.id.clone();
        children.push(child);

        self.tree = Arc::new(updated);
        self.selected = child_id;
        true
    }

    /// Sets the title of `note_id`. No-op if the note is not in the tree.
    pub fn rename_note(&mut self, note_id: &str, title: &str) {
        let mut updated = (*self.tree).clone();
        let Some(note) = find_note_mut(&mut updated, note_id) else {
            log::debug!("rename_note: {note_id} not in tree");
            return;
        };
        note.title = title.to_string();
        note.updated_at = chrono::Utc::now().timestamp_millis();
        self.tree = Arc::new(updated);
    }

    /// Removes `note_id` and its subtree from its parent's child list.
    ///
    /// The tree root is never removed. If the selection was inside the
    /// removed subtree it falls back to the parent. Returns `true` if the
    /// tree changed.
    pub fn delete_note(&mut self, note_id: &str) -> bool {
        if note_id == self.tree.id {
            log::debug!("delete_note: refusing to delete tree root {note_id}");
            return false;
        }

        let selection_removed = self
            .find(note_id)
            .is_some_and(|removed| find_note(removed, &self.selected).is_some());

        let mut updated = (*self.tree).clone();
        let Some(parent) = find_parent_mut(&mut updated, note_id) else {
            return false;
        };
        let parent_id = parent.id.clone();
        match &mut parent.child_notes {
            ChildNotes::Nested(children) => children.retain(|c| c.id != note_id),
            ChildNotes::Ids(ids) => ids.retain(|id| id != note_id),
        }

        self.tree = Arc::new(updated);
        if selection_removed {
            self.selected = parent_id;
        }
        true
    }
}

/// Depth-first, pre-order search for `note_id` under (and including) `node`.
pub fn find_note<'a>(node: &'a NoteNode, note_id: &str) -> Option<&'a NoteNode> {
    if node.id == note_id {
        return Some(node);
    }
    node.child_notes
        .nested()?
        .iter()
        .find_map(|child| find_note(child, note_id))
}

/// Finds the node whose child list contains `child_id`.
pub fn find_parent<'a>(node: &'a NoteNode, child_id: &str) -> Option<&'a NoteNode> {
    match &node.child_notes {
        ChildNotes::Ids(ids) => ids.iter().any(|id| id == child_id).then_some(node),
        ChildNotes::Nested(children) => {
            if children.iter().any(|c| c.id == child_id) {
                return Some(node);
            }
            children.iter().find_map(|c| find_parent(c, child_id))
        }
    }
}

fn find_note_mut<'a>(node: &'a mut NoteNode, note_id: &str) -> Option<&'a mut NoteNode> {
    if node.id == note_id {
        return Some(node);
    }
    match &mut node.child_notes {
        ChildNotes::Nested(children) => children
            .iter_mut()
            .find_map(|child| find_note_mut(child, note_id)),
        ChildNotes::Ids(_) => None,
    }
}

fn find_parent_mut<'a>(node: &'a mut NoteNode, child_id: &str) -> Option<&'a mut NoteNode> {
    let is_parent = match &node.child_notes {
        ChildNotes::Ids(ids) => ids.iter().any(|id| id == child_id),
        ChildNotes::Nested(children) => children.iter().any(|c| c.id == child_id),
    };
    if is_parent {
        return Some(node);
    }
    match &mut node.child_notes {
        ChildNotes::Nested(children) => children
            .iter_mut()
            .find_map(|child| find_parent_mut(child, child_id)),
        ChildNotes::Ids(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, children: Vec<NoteNode>) -> NoteNode {
        let mut n = NoteNode::leaf(id, id.to_uppercase(), "u1");
        n.child_notes = ChildNotes::Nested(
            children
                .into_iter()
                .map(|mut c| {
                    c.parent_note = Some(id.to_string());
                    c
                })
                .collect(),
        );
        n
    }

    /// root -> a -> a1
    ///      -> b
    fn sample() -> TreeCache {
        TreeCache::new(node("root", vec![node("a", vec![node("a1", vec![])]), node("b", vec![])]))
    }

    fn child_ids(cache: &TreeCache, id: &str) -> Vec<String> {
        cache.find(id).unwrap().child_notes.ids()
    }

    #[test]
    fn test_add_child_appends_and_selects() {
        let mut cache = sample();
        assert!(cache.add_child("a", NoteNode::leaf("a2", "A2", "u1")));

        assert_eq!(child_ids(&cache, "a"), vec!["a1", "a2"]);
        assert_eq!(cache.selected_id(), "a2");
        assert_eq!(cache.find("a2").unwrap().parent_note.as_deref(), Some("a"));
    }

    #[test]
    fn test_add_child_missing_parent_is_noop() {
        let mut cache = sample();
        let before = cache.tree();
        assert!(!cache.add_child("ghost", NoteNode::leaf("x", "X", "u1")));

        assert!(Arc::ptr_eq(&before, &cache.tree()));
        assert_eq!(cache.selected_id(), "root");
    }

    #[test]
    fn test_add_child_under_unexpanded_parent_is_refused() {
        let mut a = NoteNode::leaf("a", "A", "u1");
        a.parent_note = Some("root".to_string());
        a.child_notes = ChildNotes::Ids(vec!["deep".to_string()]);
        let mut root = NoteNode::leaf("root", "ROOT", "u1");
        root.child_notes = ChildNotes::Nested(vec![a]);
        let mut cache = TreeCache::new(root);
        cache.select("a");
        let before = cache.tree();

        assert!(!cache.add_child("a", NoteNode::leaf("new", "New", "u1")));
        cache.rename_note("new", "Renamed");

        assert!(Arc::ptr_eq(&before, &cache.tree()));
        assert_eq!(cache.selected_id(), "a");
        assert!(cache.find("new").is_none());
        assert_eq!(
            cache.find("a").unwrap().child_notes,
            ChildNotes::Ids(vec!["deep".to_string()])
        );
    }

    #[test]
    fn test_add_child_expands_empty_id_list() {
        let mut root = NoteNode::leaf("root", "ROOT", "u1");
        root.child_notes = ChildNotes::Ids(Vec::new());
        let mut cache = TreeCache::new(root);

        assert!(cache.add_child("root", NoteNode::leaf("c", "C", "u1")));
        cache.rename_note("c", "Renamed");
        assert_eq!(cache.selected().unwrap().title, "Renamed");
    }

    #[test]
    fn test_rename_after_add_preserves_position() {
        let mut cache = sample();
        cache.add_child("root", NoteNode::leaf("c", "C", "u1"));
        cache.rename_note("c", "Renamed");

        assert_eq!(child_ids(&cache, "root"), vec!["a", "b", "c"]);
        assert_eq!(cache.find("c").unwrap().title, "Renamed");
        assert_eq!(cache.selected().unwrap().title, "Renamed");
    }

    #[test]
    fn test_delete_root_is_noop() {
        let mut cache = sample();
        let before = cache.tree();
        assert!(!cache.delete_note("root"));
        assert!(Arc::ptr_eq(&before, &cache.tree()));
    }

    #[test]
    fn test_delete_selected_falls_back_to_parent() {
        let mut cache = sample();
        assert!(cache.select("a1"));
        assert!(cache.delete_note("a1"));

        assert!(cache.find("a1").is_none());
        assert_eq!(cache.selected_id(), "a");
    }

    #[test]
    fn test_delete_ancestor_of_selection_falls_back_to_parent() {
        let mut cache = sample();
        cache.select("a1");
        cache.delete_note("a");
        assert_eq!(cache.selected_id(), "root");
        assert_eq!(child_ids(&cache, "root"), vec!["b"]);
    }

    #[test]
    fn test_delete_unselected_keeps_selection() {
        let mut cache = sample();
        cache.select("b");
        cache.delete_note("a1");
        assert_eq!(cache.selected_id(), "b");
    }

    #[test]
    fn test_mutations_never_touch_previous_snapshot() {
        let mut cache = sample();
        let original = cache.tree();
        let pristine = (*original).clone();

        cache.add_child("a", NoteNode::leaf("a2", "A2", "u1"));
        cache.rename_note("b", "Bee");
        cache.delete_note("a1");

        assert_eq!(*original, pristine);
        assert!(!Arc::ptr_eq(&original, &cache.tree()));
        assert_eq!(find_note(&original, "b").unwrap().title, "B");
        assert!(find_note(&original, "a1").is_some());
    }

    #[test]
    fn test_find_parent() {
        let cache = sample();
        let tree = cache.tree();
        assert_eq!(find_parent(&tree, "a1").unwrap().id, "a");
        assert!(find_parent(&tree, "root").is_none());
    }

    #[test]
    fn test_select_unknown_note() {
        let mut cache = sample();
        assert!(!cache.select("ghost"));
        assert_eq!(cache.selected_id(), "root");
    }
}
