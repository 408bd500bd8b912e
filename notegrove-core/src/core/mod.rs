//! Internal domain modules for the Notegrove core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod autosave;
pub mod delete;
pub mod error;
pub mod note;
pub mod repository;
pub mod settings;
pub mod storage;
pub mod tree_cache;
pub mod user;

#[doc(inline)]
pub use autosave::{
    AutosaveMachine, AutosavePhase, ContentStore, EditorSession, EditorStatus, SaveRequest,
    SaveStatus, SaveToken,
};
#[doc(inline)]
pub use delete::{DeleteResult, DeleteStrategy};
#[doc(inline)]
pub use error::{NoteGroveError, Result};
#[doc(inline)]
pub use note::{ChildNotes, NewNote, Note, NoteNode, NotePatch};
#[doc(inline)]
pub use repository::NoteRepository;
#[doc(inline)]
pub use settings::{Settings, TitlePolicy};
#[doc(inline)]
pub use storage::Storage;
#[doc(inline)]
pub use tree_cache::TreeCache;
#[doc(inline)]
pub use user::{IdentityProvider, StaticIdentity, User};
