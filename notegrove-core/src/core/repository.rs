//! Tree queries and mutations over a Notegrove SQLite database.

use crate::{
    ChildNotes, DeleteResult, DeleteStrategy, IdentityProvider, NewNote, Note, NoteGroveError,
    NoteNode, NotePatch, Result, Settings, Storage, User,
};
use rusqlite::{Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use uuid::Uuid;

/// An open note store: the entry point for every tree query and mutation.
///
/// All multi-document writes (create under a parent, move, strategy deletes)
/// run inside a single SQLite transaction, so a failure leaves the tree as it
/// was. The repository assumes a single writer; share it behind a `Mutex`.
pub struct NoteRepository {
    storage: Storage,
    settings: Settings,
}

impl NoteRepository {
    /// Creates a new database at `path` and initialises the schema.
    ///
    /// # Errors
    ///
    /// Returns [`NoteGroveError::Database`] for any SQLite failure.
    pub fn create<P: AsRef<Path>>(path: P, settings: Settings) -> Result<Self> {
        Ok(Self {
            storage: Storage::create(path)?,
            settings,
        })
    }

    /// Opens an existing database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`NoteGroveError::InvalidStore`] if the file is not a Notegrove
    /// database, or [`NoteGroveError::Database`] for any SQLite failure.
    pub fn open<P: AsRef<Path>>(path: P, settings: Settings) -> Result<Self> {
        Ok(Self {
            storage: Storage::open(path)?,
            settings,
        })
    }

    /// Opens a repository backed by an in-memory database.
    pub fn in_memory(settings: Settings) -> Result<Self> {
        Ok(Self {
            storage: Storage::open_in_memory()?,
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// Returns the underlying SQLite connection.
    pub fn connection(&self) -> &Connection {
        self.storage.connection()
    }

    // ── Owners ──────────────────────────────────────────────────────

    /// Registers the user behind `token_identifier`, or refreshes the profile
    /// of an already registered one.
    pub fn register_user(
        &mut self,
        token_identifier: &str,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<User> {
        if let Some(existing) = self.find_user_by_token(token_identifier)? {
            self.connection().execute(
                "UPDATE users SET name = ?1, email = ?2 WHERE id = ?3",
                rusqlite::params![name, email, existing.id],
            )?;
            return self.get_user(&existing.id);
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            token_identifier: token_identifier.to_string(),
            name: name.map(str::to_string),
            email: email.map(str::to_string),
            created_at: now_ms(),
        };
        self.connection().execute(
            "INSERT INTO users (id, token_identifier, name, email, created_at)
             VALUES (?, ?, ?, ?, ?)",
            rusqlite::params![
                user.id,
                user.token_identifier,
                user.name,
                user.email,
                user.created_at,
            ],
        )?;
        log::info!("registered user {}", user.id);
        Ok(user)
    }

    /// Fetches a user by id.
    ///
    /// # Errors
    ///
    /// Returns [`NoteGroveError::NotFound`] if no such user exists.
    pub fn get_user(&self, user_id: &str) -> Result<User> {
        self.connection()
            .query_row(
                "SELECT id, token_identifier, name, email, created_at FROM users WHERE id = ?",
                [user_id],
                map_user_row,
            )
            .optional()?
            .ok_or_else(|| NoteGroveError::NotFound(format!("user {user_id}")))
    }

    pub fn find_user_by_token(&self, token_identifier: &str) -> Result<Option<User>> {
        Ok(self
            .connection()
            .query_row(
                "SELECT id, token_identifier, name, email, created_at
                 FROM users WHERE token_identifier = ?",
                [token_identifier],
                map_user_row,
            )
            .optional()?)
    }

    /// Resolves the current caller to a registered user.
    ///
    /// # Errors
    ///
    /// Returns [`NoteGroveError::Unauthenticated`] if the provider has no
    /// verified identity or the identity is not registered.
    pub fn resolve_owner(&self, identity: &dyn IdentityProvider) -> Result<User> {
        let Some(token) = identity.token_identifier() else {
            log::warn!("caller is not authenticated");
            return Err(NoteGroveError::Unauthenticated);
        };
        match self.find_user_by_token(&token)? {
            Some(user) => Ok(user),
            None => {
                log::warn!("no user registered for the caller's identity");
                Err(NoteGroveError::Unauthenticated)
            }
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Fetches a single note by ID.
    ///
    /// # Errors
    ///
    /// Returns [`NoteGroveError::NotFound`] if the note does not exist, or
    /// [`NoteGroveError::Json`] if its stored child list is corrupt.
    pub fn get_note(&self, note_id: &str) -> Result<Note> {
        load_note(self.connection(), note_id)
    }

    /// Returns the owner's top-level notes, oldest first.
    pub fn list_root_notes_for_owner(&self, owner_id: &str) -> Result<Vec<Note>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, title, content, owner, parent_note, child_notes_json, created_at, updated_at
             FROM notes
             WHERE owner = ?1 AND parent_note IS NULL
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map([owner_id], map_note_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(note_from_row_tuple).collect()
    }

    /// Returns every note of the owner, newest first.
    pub fn list_notes_for_owner(&self, owner_id: &str) -> Result<Vec<Note>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, title, content, owner, parent_note, child_notes_json, created_at, updated_at
             FROM notes
             WHERE owner = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map([owner_id], map_note_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(note_from_row_tuple).collect()
    }

    /// Returns the direct children of `note_id` in child-list order.
    ///
    /// Ids in the list whose documents no longer exist are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`NoteGroveError::NotFound`] if `note_id` does not exist.
    pub fn get_children(&self, note_id: &str) -> Result<Vec<Note>> {
        let note = self.get_note(note_id)?;
        let ids = note.child_ids();
        let mut by_id = self.notes_by_ids(ids)?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                let child = by_id.remove(id);
                if child.is_none() {
                    log::warn!("note {note_id} lists missing child {id}");
                }
                child
            })
            .collect())
    }

    /// Returns the owner's root notes with `depth` levels of descendants
    /// embedded as nested nodes.
    ///
    /// Each level is fetched with one query. Expansion stops early once a
    /// level has no children. Nodes on the last fetched level keep their
    /// children as plain ids; `depth == 0` returns the roots unexpanded.
    pub fn materialize_tree(&self, owner_id: &str, depth: usize) -> Result<Vec<NoteNode>> {
        let mut roots: Vec<NoteNode> = self
            .list_root_notes_for_owner(owner_id)?
            .iter()
            .map(NoteNode::from_note)
            .collect();

        let mut level: Vec<&mut NoteNode> = roots.iter_mut().collect();
        for current in 0..depth {
            let wanted: Vec<String> = level.iter().flat_map(|n| n.child_notes.ids()).collect();
            let mut fetched = self.notes_by_ids(&wanted)?;
            log::debug!("tree level {current}: {} children", fetched.len());

            for node in level.iter_mut() {
                let children = node
                    .child_notes
                    .ids()
                    .iter()
                    .filter_map(|id| {
                        let child = fetched.remove(id);
                        if child.is_none() {
                            log::warn!("note {} lists missing child {id}", node.id);
                        }
                        child.map(|c| NoteNode::from_note(&c))
                    })
                    .collect();
                node.child_notes = ChildNotes::Nested(children);
            }

            if wanted.is_empty() {
                break;
            }

            level = level
                .into_iter()
                .flat_map(|node| match &mut node.child_notes {
                    ChildNotes::Nested(children) => children.iter_mut().collect::<Vec<_>>(),
                    ChildNotes::Ids(_) => Vec::new(),
                })
                .collect();
        }

        Ok(roots)
    }

    /// [`Self::materialize_tree`] to the configured default depth.
    pub fn materialize_tree_default(&self, owner_id: &str) -> Result<Vec<NoteNode>> {
        self.materialize_tree(owner_id, self.settings.default_tree_depth)
    }

    /// Returns the stored rich-text content of a note.
    ///
    /// # Errors
    ///
    /// Returns [`NoteGroveError::NotFound`] if the note does not exist.
    pub fn get_note_content(&self, note_id: &str) -> Result<String> {
        self.connection()
            .query_row("SELECT content FROM notes WHERE id = ?", [note_id], |row| {
                row.get::<_, String>(0)
            })
            .optional()?
            .ok_or_else(|| NoteGroveError::NotFound(note_id.to_string()))
    }

    /// Root notes of the calling user.
    pub fn list_my_root_notes(&self, identity: &dyn IdentityProvider) -> Result<Vec<Note>> {
        let owner = self.resolve_owner(identity)?;
        self.list_root_notes_for_owner(&owner.id)
    }

    /// The calling user's trees, expanded to `depth` levels.
    pub fn materialize_my_tree(
        &self,
        identity: &dyn IdentityProvider,
        depth: usize,
    ) -> Result<Vec<NoteNode>> {
        let owner = self.resolve_owner(identity)?;
        self.materialize_tree(&owner.id, depth)
    }

    fn notes_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Note>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT id, title, content, owner, parent_note, child_notes_json, created_at, updated_at
             FROM notes WHERE id IN ({placeholders})"
        );
        let mut stmt = self.connection().prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let rows = stmt
            .query_map(params.as_slice(), map_note_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|row| note_from_row_tuple(row).map(|note| (note.id.clone(), note)))
            .collect()
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Creates a note for `owner_id`, appending it to the parent's child list
    /// when a parent is given.
    ///
    /// # Errors
    ///
    /// Returns [`NoteGroveError::Validation`] for an empty or over-long title,
    /// [`NoteGroveError::Conflict`] if the owner already has a note with that
    /// title under the configured [`TitlePolicy`](crate::TitlePolicy), and
    /// [`NoteGroveError::NotFound`] if the owner, parent, or an adopted child
    /// does not exist, and [`NoteGroveError::InvalidMove`] if an adopted child
    /// is the parent or one of its ancestors.
    ///
    /// Ids in `NewNote::child_notes` are adopted: each child is removed from
    /// its previous parent's list and its `parent_note` set to the new note.
    pub fn create_note(&mut self, owner_id: &str, new_note: NewNote) -> Result<Note> {
        let title = self.settings.validate_title(&new_note.title)?;
        self.get_user(owner_id)?;

        let policy = self.settings.title_policy;
        let existing_titles: Vec<String> = {
            let mut stmt = self
                .connection()
                .prepare("SELECT title FROM notes WHERE owner = ?1")?;
            let titles = stmt
                .query_map([owner_id], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            titles
        };
        if existing_titles.iter().any(|t| policy.same_title(t, &title)) {
            return Err(NoteGroveError::Conflict(format!(
                "a note titled '{title}' already exists"
            )));
        }

        let parent = match &new_note.parent {
            Some(pid) => {
                let parent = self.get_note(pid)?;
                if parent.owner != owner_id {
                    return Err(NoteGroveError::NotFound(pid.clone()));
                }
                Some(parent)
            }
            None => None,
        };

        let mut adopted: Vec<String> = Vec::new();
        for id in new_note.child_notes.unwrap_or_default() {
            if !adopted.contains(&id) {
                adopted.push(id);
            }
        }
        if let Some(parent) = &parent {
            let mut ancestor = Some(parent.id.clone());
            let mut visited = HashSet::new();
            while let Some(id) = ancestor {
                if adopted.contains(&id) {
                    return Err(NoteGroveError::InvalidMove(
                        "Adopting an ancestor would create a cycle".to_string(),
                    ));
                }
                if !visited.insert(id.clone()) {
                    break;
                }
                ancestor = self.get_note(&id)?.parent_note;
            }
        }

        let now = now_ms();
        let note = Note {
            id: Uuid::new_v4().to_string(),
            title,
            content: new_note.content.unwrap_or_default(),
            owner: owner_id.to_string(),
            parent_note: new_note.parent,
            child_notes: Some(adopted),
            created_at: now,
            updated_at: now,
        };

        let tx = self.storage.connection_mut().transaction()?;
        tx.execute(
            "INSERT INTO notes (id, title, content, owner, parent_note, child_notes_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                note.id,
                note.title,
                note.content,
                note.owner,
                note.parent_note,
                child_notes_to_json(&note.child_notes)?,
                note.created_at,
                note.updated_at,
            ],
        )?;

        // Adopted children leave their previous parent's list.
        for child_id in note.child_ids() {
            let child = load_note(&tx, child_id)?;
            if child.owner != owner_id {
                return Err(NoteGroveError::NotFound(child_id.clone()));
            }
            if let Some(old_parent_id) = &child.parent_note {
                match load_note(&tx, old_parent_id) {
                    Ok(old_parent) => {
                        let remaining: Vec<String> = old_parent
                            .child_ids()
                            .iter()
                            .filter(|id| *id != child_id)
                            .cloned()
                            .collect();
                        write_child_notes(&tx, old_parent_id, &Some(remaining), now)?;
                    }
                    Err(NoteGroveError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
            tx.execute(
                "UPDATE notes SET parent_note = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![note.id, now, child_id],
            )?;
        }

        if let Some(parent) = &parent {
            // Re-read: an adopted child may have just left this list.
            let mut siblings = load_note(&tx, &parent.id)?.child_notes.unwrap_or_default();
            siblings.push(note.id.clone());
            write_child_notes(&tx, &parent.id, &Some(siblings), now)?;
        }

        tx.commit()?;
        log::info!("created note {} for owner {owner_id}", note.id);
        Ok(note)
    }

    /// Creates a note owned by the calling user.
    pub fn create_my_note(
        &mut self,
        identity: &dyn IdentityProvider,
        new_note: NewNote,
    ) -> Result<Note> {
        let owner = self.resolve_owner(identity)?;
        self.create_note(&owner.id, new_note)
    }

    /// Replaces the content of `note_id`, refreshing `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`NoteGroveError::NotFound`] if the note does not exist.
    pub fn update_note_content(&mut self, note_id: &str, content: &str) -> Result<()> {
        let changed = self.connection().execute(
            "UPDATE notes SET content = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![content, now_ms(), note_id],
        )?;
        if changed == 0 {
            return Err(NoteGroveError::NotFound(note_id.to_string()));
        }
        log::debug!("saved content of note {note_id} ({} bytes)", content.len());
        Ok(())
    }

    /// Renames `note_id`. Titles are validated but not checked for uniqueness.
    pub fn update_note_title(&mut self, note_id: &str, title: &str) -> Result<()> {
        let title = self.settings.validate_title(title)?;
        let changed = self.connection().execute(
            "UPDATE notes SET title = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![title, now_ms(), note_id],
        )?;
        if changed == 0 {
            return Err(NoteGroveError::NotFound(note_id.to_string()));
        }
        Ok(())
    }

    /// Applies a partial update and returns the stored note.
    ///
    /// Only one side of a parent/child relationship is written; keeping both
    /// sides consistent is the caller's job (see [`Self::move_note`]).
    pub fn update_note(&mut self, note_id: &str, patch: NotePatch) -> Result<Note> {
        let mut note = self.get_note(note_id)?;
        if let Some(content) = patch.content {
            note.content = content;
        }
        if let Some(parent_note) = patch.parent_note {
            note.parent_note = parent_note;
        }
        if let Some(child_notes) = patch.child_notes {
            note.child_notes = child_notes;
        }
        note.updated_at = now_ms();

        self.connection().execute(
            "UPDATE notes SET content = ?1, parent_note = ?2, child_notes_json = ?3, updated_at = ?4
             WHERE id = ?5",
            rusqlite::params![
                note.content,
                note.parent_note,
                child_notes_to_json(&note.child_notes)?,
                note.updated_at,
                note.id,
            ],
        )?;
        Ok(note)
    }

    pub fn set_parent_note(&mut self, note_id: &str, parent: Option<&str>) -> Result<Note> {
        self.update_note(
            note_id,
            NotePatch {
                parent_note: Some(parent.map(str::to_string)),
                ..NotePatch::default()
            },
        )
    }

    pub fn set_child_notes(&mut self, note_id: &str, child_notes: Option<Vec<String>>) -> Result<Note> {
        self.update_note(
            note_id,
            NotePatch {
                child_notes: Some(child_notes),
                ..NotePatch::default()
            },
        )
    }

    /// Deletes the single document `note_id`.
    ///
    /// The note is not detached from its parent and its children are left in
    /// place; use [`Self::delete_note_with`] for a consistent delete.
    ///
    /// # Errors
    ///
    /// Returns [`NoteGroveError::NotFound`] if the note does not exist.
    pub fn delete_note(&mut self, note_id: &str) -> Result<()> {
        let changed = self
            .connection()
            .execute("DELETE FROM notes WHERE id = ?1", [note_id])?;
        if changed == 0 {
            return Err(NoteGroveError::NotFound(note_id.to_string()));
        }
        log::info!("deleted note {note_id}");
        Ok(())
    }

    /// Deletes `note_id` using the configured default strategy.
    pub fn delete_note_default(&mut self, note_id: &str) -> Result<DeleteResult> {
        let strategy = self.settings.delete_strategy;
        self.delete_note_with(note_id, strategy)
    }

    /// Detaches `note_id` from its parent and deletes it, handling its
    /// children according to `strategy`. Runs in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`NoteGroveError::NotFound`] if the note does not exist, or
    /// [`NoteGroveError::InvalidDelete`] if `strategy` is
    /// [`DeleteStrategy::RefuseIfChildren`] and the note has children.
    pub fn delete_note_with(&mut self, note_id: &str, strategy: DeleteStrategy) -> Result<DeleteResult> {
        let now = now_ms();
        let tx = self.storage.connection_mut().transaction()?;
        let note = load_note(&tx, note_id)?;
        let children = note.child_ids().to_vec();

        if strategy == DeleteStrategy::RefuseIfChildren && !children.is_empty() {
            return Err(NoteGroveError::InvalidDelete(format!(
                "note has {} children",
                children.len()
            )));
        }

        // Detach from the parent, splicing promoted children into the vacated slot.
        if let Some(parent_id) = &note.parent_note {
            match load_note(&tx, parent_id) {
                Ok(parent) => {
                    let mut siblings = Vec::new();
                    for id in parent.child_ids() {
                        if id != note_id {
                            siblings.push(id.clone());
                        } else if strategy == DeleteStrategy::PromoteChildren {
                            siblings.extend(children.iter().cloned());
                        }
                    }
                    write_child_notes(&tx, parent_id, &Some(siblings), now)?;
                }
                Err(NoteGroveError::NotFound(_)) => {
                    log::warn!("note {note_id} has missing parent {parent_id}");
                }
                Err(e) => return Err(e),
            }
        }

        let result = match strategy {
            DeleteStrategy::DeleteAll => {
                let mut visited = HashSet::new();
                let affected_ids = delete_subtree(&tx, note_id, &mut visited)?;
                DeleteResult {
                    deleted_count: affected_ids.len(),
                    affected_ids,
                }
            }
            DeleteStrategy::PromoteChildren | DeleteStrategy::RefuseIfChildren => {
                for child_id in &children {
                    tx.execute(
                        "UPDATE notes SET parent_note = ?1, updated_at = ?2 WHERE id = ?3",
                        rusqlite::params![note.parent_note, now, child_id],
                    )?;
                }
                tx.execute("DELETE FROM notes WHERE id = ?1", [note_id])?;
                let mut affected_ids = vec![note_id.to_string()];
                affected_ids.extend(children);
                DeleteResult {
                    deleted_count: 1,
                    affected_ids,
                }
            }
        };

        tx.commit()?;
        log::info!(
            "deleted note {note_id} with {strategy:?} ({} removed)",
            result.deleted_count
        );
        Ok(result)
    }

    /// Moves `note_id` from `from`'s child list to the end of `to`'s child
    /// list and points its parent at `to`, all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`NoteGroveError::NotFound`] if `note_id`, `from`, or `to` does
    /// not exist, or if `from` has no child list. Returns
    /// [`NoteGroveError::InvalidMove`] if `to` is the note itself or one of
    /// its descendants.
    pub fn move_note(&mut self, note_id: &str, from: &str, to: &str) -> Result<()> {
        if to == note_id {
            return Err(NoteGroveError::InvalidMove(
                "A note cannot be its own parent".to_string(),
            ));
        }

        let now = now_ms();
        let tx = self.storage.connection_mut().transaction()?;

        load_note(&tx, note_id)?;
        let note_from = load_note(&tx, from)?;
        let note_to = load_note(&tx, to)?;

        let Some(from_children) = note_from.child_notes else {
            return Err(NoteGroveError::NotFound(format!("{from} has no child list")));
        };

        // Walk the ancestor chain of the target; finding the moved note means a cycle.
        let mut visited = HashSet::new();
        let mut current = note_to.parent_note.clone();
        while let Some(ancestor) = current {
            if ancestor == note_id {
                return Err(NoteGroveError::InvalidMove(
                    "Move would create a cycle".to_string(),
                ));
            }
            if !visited.insert(ancestor.clone()) {
                break;
            }
            current = tx
                .query_row(
                    "SELECT parent_note FROM notes WHERE id = ?",
                    [&ancestor],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?
                .flatten();
        }

        let remaining: Vec<String> = from_children.into_iter().filter(|id| id != note_id).collect();
        if from == to {
            let mut reordered = remaining;
            reordered.push(note_id.to_string());
            write_child_notes(&tx, to, &Some(reordered), now)?;
        } else {
            write_child_notes(&tx, from, &Some(remaining), now)?;
            let mut to_children: Vec<String> = note_to
                .child_notes
                .unwrap_or_default()
                .into_iter()
                .filter(|id| id != note_id)
                .collect();
            to_children.push(note_id.to_string());
            write_child_notes(&tx, to, &Some(to_children), now)?;
        }

        tx.execute(
            "UPDATE notes SET parent_note = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![to, now, note_id],
        )?;

        tx.commit()?;
        log::info!("moved note {note_id} from {from} to {to}");
        Ok(())
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Raw column tuple for a `notes` row, before JSON decoding.
type NoteRow = (String, String, String, String, Option<String>, Option<String>, i64, i64);

fn map_note_row(row: &rusqlite::Row) -> rusqlite::Result<NoteRow> {
    Ok((
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
        row.get::<_, Option<String>>(4)?,
        row.get::<_, Option<String>>(5)?,
        row.get::<_, i64>(6)?,
        row.get::<_, i64>(7)?,
    ))
}

fn note_from_row_tuple(
    (id, title, content, owner, parent_note, child_notes_json, created_at, updated_at): NoteRow,
) -> Result<Note> {
    let child_notes = match child_notes_json {
        Some(json) => Some(serde_json::from_str(&json)?),
        None => None,
    };
    Ok(Note {
        id,
        title,
        content,
        owner,
        parent_note,
        child_notes,
        created_at,
        updated_at,
    })
}

fn map_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        token_identifier: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn load_note(conn: &Connection, note_id: &str) -> Result<Note> {
    let row = conn
        .query_row(
            "SELECT id, title, content, owner, parent_note, child_notes_json, created_at, updated_at
             FROM notes WHERE id = ?",
            [note_id],
            map_note_row,
        )
        .optional()?
        .ok_or_else(|| NoteGroveError::NotFound(note_id.to_string()))?;
    note_from_row_tuple(row)
}

fn child_notes_to_json(child_notes: &Option<Vec<String>>) -> Result<Option<String>> {
    Ok(match child_notes {
        Some(ids) => Some(serde_json::to_string(ids)?),
        None => None,
    })
}

fn write_child_notes(
    conn: &Connection,
    note_id: &str,
    child_notes: &Option<Vec<String>>,
    now: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE notes SET child_notes_json = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![child_notes_to_json(child_notes)?, now, note_id],
    )?;
    Ok(())
}

/// Deletes `note_id` and every descendant, leaves first.
///
/// Descendants are found through both the child list and the `parent_note`
/// back-reference so half-detached notes are not orphaned.
fn delete_subtree(
    conn: &Connection,
    note_id: &str,
    visited: &mut HashSet<String>,
) -> Result<Vec<String>> {
    if !visited.insert(note_id.to_string()) {
        return Ok(Vec::new());
    }
    let mut child_ids = match load_note(conn, note_id) {
        Ok(note) => note.child_notes.unwrap_or_default(),
        Err(NoteGroveError::NotFound(_)) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    {
        let mut stmt = conn.prepare("SELECT id FROM notes WHERE parent_note = ?1")?;
        let back_refs = stmt
            .query_map([note_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for id in back_refs {
            if !child_ids.contains(&id) {
                child_ids.push(id);
            }
        }
    }

    let mut affected_ids = vec![note_id.to_string()];
    for child_id in child_ids {
        affected_ids.extend(delete_subtree(conn, &child_id, visited)?);
    }
    conn.execute("DELETE FROM notes WHERE id = ?1", [note_id])?;
    Ok(affected_ids)
}
