//! Core library for Notegrove, a personal hierarchical note-taking store.
//!
//! The primary entry point is [`NoteRepository`], which represents an open
//! SQLite database of users and notes. Every tree query and mutation goes
//! through its methods. [`TreeCache`] holds the tree an editing session shows,
//! and [`EditorSession`] saves note content through a debounced
//! [`AutosaveMachine`].
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    autosave::{
        AutosaveMachine, AutosavePhase, ContentStore, EditorSession, EditorStatus, SaveRequest,
        SaveStatus, SaveToken,
    },
    delete::{DeleteResult, DeleteStrategy},
    error::{NoteGroveError, Result},
    note::{ChildNotes, NewNote, Note, NoteNode, NotePatch},
    repository::NoteRepository,
    settings::{
        load_settings, load_settings_from, save_settings_to, settings_file_path, Settings,
        TitlePolicy,
    },
    storage::Storage,
    tree_cache::{find_note, find_parent, TreeCache},
    user::{IdentityProvider, StaticIdentity, User},
};
