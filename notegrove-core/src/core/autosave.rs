//! Debounced autosave for the note editor.
//!
//! [`AutosaveMachine`] is the state machine on its own: it performs no I/O and
//! reads no clock, every transition takes the current [`Instant`]. The
//! embedding event loop feeds it edits and polls it; when the debounce window
//! has closed it hands out a [`SaveRequest`], and the result of that save is
//! reported back with [`AutosaveMachine::save_finished`].
//!
//! [`EditorSession`] couples the machine with a [`ContentStore`] for callers
//! that can save synchronously.
//!
//! ```text
//! idle --edit--> dirty --debounce--> saving --ok--> success --timeout--> idle
//!                                           \--err--> error --edit/retry--> dirty
//! ```

use crate::{NoteGroveError, NoteRepository, Result, Settings};
use std::time::{Duration, Instant};

/// The save indicator shown next to the note title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Success,
    Error,
}

/// Coarse state of the machine, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosavePhase {
    Idle,
    Dirty,
    Saving,
    Success,
    Error,
}

/// Flags the editor view renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorStatus {
    pub is_loading: bool,
    pub is_saving: bool,
    pub save_status: SaveStatus,
    pub has_unsaved_changes: bool,
}

/// Identifies one save request: the note generation it was issued in and
/// its sequence number within the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveToken {
    pub generation: u64,
    pub sequence: u64,
}

/// A save the caller must perform, then report with its `token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub note_id: String,
    pub content: String,
    pub token: SaveToken,
}

#[derive(Debug)]
struct InFlight {
    token: SaveToken,
    content: String,
}

#[derive(Debug)]
pub struct AutosaveMachine {
    debounce: Duration,
    success_display: Duration,
    note_id: Option<String>,
    /// Bumped on every note switch; a token from an older generation is stale.
    generation: u64,
    next_sequence: u64,
    pending: Option<String>,
    deadline: Option<Instant>,
    in_flight: Option<InFlight>,
    save_status: SaveStatus,
    success_until: Option<Instant>,
    has_unsaved_changes: bool,
    is_loading: bool,
}

impl AutosaveMachine {
    pub fn new(debounce: Duration, success_display: Duration) -> Self {
        Self {
            debounce,
            success_display,
            note_id: None,
            generation: 0,
            next_sequence: 0,
            pending: None,
            deadline: None,
            in_flight: None,
            save_status: SaveStatus::Idle,
            success_until: None,
            has_unsaved_changes: false,
            is_loading: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.autosave_debounce(), settings.success_display())
    }

    pub fn note_id(&self) -> Option<&str> {
        self.note_id.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Switches to `note_id`, dropping all state that belonged to the previous note.
    ///
    /// A save already handed out for the previous note may still complete;
    /// its report is ignored.
    pub fn load_note(&mut self, note_id: &str) {
        self.reset();
        self.note_id = Some(note_id.to_string());
        self.is_loading = true;
    }

    /// Marks the end of the content fetch started by [`Self::load_note`].
    pub fn finish_loading(&mut self, succeeded: bool) {
        self.is_loading = false;
        if !succeeded {
            self.save_status = SaveStatus::Error;
        }
    }

    /// Records an edit and restarts the debounce window.
    ///
    /// Returns `false` (and does nothing) when no note is loaded.
    pub fn content_changed(&mut self, content: impl Into<String>, now: Instant) -> bool {
        if self.note_id.is_none() {
            log::debug!("ignoring edit with no note loaded");
            return false;
        }
        self.pending = Some(content.into());
        self.has_unsaved_changes = true;
        self.deadline = Some(now + self.debounce);
        self.save_status = SaveStatus::Idle;
        self.success_until = None;
        true
    }

    /// Advances timers. Returns a save request once the debounce window has
    /// closed and no other save is in flight.
    pub fn poll(&mut self, now: Instant) -> Option<SaveRequest> {
        if self.success_until.is_some_and(|until| now >= until) {
            self.success_until = None;
            if self.save_status == SaveStatus::Success {
                self.save_status = SaveStatus::Idle;
            }
        }

        if self.in_flight.is_some() || !self.has_unsaved_changes {
            return None;
        }
        if !self.deadline.is_some_and(|deadline| now >= deadline) {
            return None;
        }
        let note_id = self.note_id.clone()?;
        let content = self.pending.take()?;

        self.deadline = None;
        self.next_sequence += 1;
        let token = SaveToken {
            generation: self.generation,
            sequence: self.next_sequence,
        };
        self.in_flight = Some(InFlight {
            token,
            content: content.clone(),
        });
        log::debug!("autosave: saving note {note_id} (sequence {})", token.sequence);
        Some(SaveRequest {
            note_id,
            content,
            token,
        })
    }

    /// Reports the outcome of the save identified by `token`.
    ///
    /// Returns `false` if the report is stale (the note was switched or the
    /// session closed since the request was issued) and was discarded.
    pub fn save_finished(&mut self, token: SaveToken, succeeded: bool, now: Instant) -> bool {
        if token.generation != self.generation {
            log::warn!(
                "autosave: discarding save report from generation {} (now {})",
                token.generation,
                self.generation
            );
            return false;
        }
        if self.in_flight.as_ref().map(|f| f.token) != Some(token) {
            log::warn!(
                "autosave: discarding save report for sequence {} not in flight",
                token.sequence
            );
            return false;
        }
        let Some(in_flight) = self.in_flight.take() else {
            return false;
        };

        if succeeded {
            // Edits that arrived while saving keep the machine dirty with
            // their own debounce deadline.
            if self.pending.is_none() {
                self.has_unsaved_changes = false;
                self.save_status = SaveStatus::Success;
                self.success_until = Some(now + self.success_display);
            }
        } else {
            self.save_status = SaveStatus::Error;
            self.success_until = None;
            if self.pending.is_none() {
                self.pending = Some(in_flight.content);
                self.deadline = None;
            }
        }
        true
    }

    /// Re-arms a failed save so the next [`Self::poll`] issues it.
    ///
    /// Returns `false` if there is nothing to retry.
    pub fn retry(&mut self, now: Instant) -> bool {
        if self.save_status != SaveStatus::Error || self.pending.is_none() {
            return false;
        }
        self.save_status = SaveStatus::Idle;
        self.deadline = Some(now);
        true
    }

    /// Cancels the pending debounce and forgets the note (view unmount).
    pub fn close(&mut self) {
        if self.has_unsaved_changes {
            log::info!("autosave: closing with unsaved changes discarded");
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.note_id = None;
        self.pending = None;
        self.deadline = None;
        self.in_flight = None;
        self.save_status = SaveStatus::Idle;
        self.success_until = None;
        self.has_unsaved_changes = false;
        self.is_loading = false;
    }

    /// The earliest instant at which [`Self::poll`] could change something.
    pub fn next_wakeup(&self) -> Option<Instant> {
        let deadline = self.deadline.filter(|_| self.in_flight.is_none());
        match (deadline, self.success_until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn status(&self) -> EditorStatus {
        EditorStatus {
            is_loading: self.is_loading,
            is_saving: self.in_flight.is_some(),
            save_status: self.save_status,
            has_unsaved_changes: self.has_unsaved_changes,
        }
    }

    pub fn phase(&self) -> AutosavePhase {
        if self.in_flight.is_some() {
            AutosavePhase::Saving
        } else if self.save_status == SaveStatus::Error {
            AutosavePhase::Error
        } else if self.save_status == SaveStatus::Success {
            AutosavePhase::Success
        } else if self.has_unsaved_changes {
            AutosavePhase::Dirty
        } else {
            AutosavePhase::Idle
        }
    }
}

/// Fetch/save pair for editor content, keyed by note id.
pub trait ContentStore {
    fn fetch_content(&self, note_id: &str) -> Result<String>;
    fn save_content(&mut self, note_id: &str, content: &str) -> Result<()>;
}

impl ContentStore for NoteRepository {
    fn fetch_content(&self, note_id: &str) -> Result<String> {
        self.get_note_content(note_id)
    }

    fn save_content(&mut self, note_id: &str, content: &str) -> Result<()> {
        self.update_note_content(note_id, content)
    }
}

/// An editor bound to a content store, saving through the autosave machine.
pub struct EditorSession<S> {
    store: S,
    machine: AutosaveMachine,
    content: String,
}

impl<S: ContentStore> EditorSession<S> {
    pub fn new(store: S, settings: &Settings) -> Self {
        Self {
            store,
            machine: AutosaveMachine::from_settings(settings),
            content: String::new(),
        }
    }

    /// Switches the editor to `note_id` and loads its content.
    ///
    /// On failure the editor is left empty with an error status and the
    /// error is returned.
    pub fn load_note_content(&mut self, note_id: &str) -> Result<()> {
        self.machine.load_note(note_id);
        match self.store.fetch_content(note_id) {
            Ok(content) => {
                self.content = content;
                self.machine.finish_loading(true);
                Ok(())
            }
            Err(e) => {
                log::error!("failed to load content of note {note_id}: {e}");
                self.content.clear();
                self.machine.finish_loading(false);
                Err(e)
            }
        }
    }

    pub fn edit(&mut self, content: impl Into<String>, now: Instant) {
        let content = content.into();
        if self.machine.content_changed(content.clone(), now) {
            self.content = content;
        }
    }

    /// Performs a due save, if any. Returns the outcome of the save performed.
    pub fn tick(&mut self, now: Instant) -> Option<Result<()>> {
        let request = self.machine.poll(now)?;
        let result = self
            .store
            .save_content(&request.note_id, &request.content)
            .map_err(|e| {
                log::error!("failed to save note {}: {e}", request.note_id);
                NoteGroveError::SaveFailure(e.to_string())
            });
        self.machine.save_finished(request.token, result.is_ok(), now);
        Some(result)
    }

    pub fn retry(&mut self, now: Instant) -> bool {
        self.machine.retry(now)
    }

    pub fn close(&mut self) {
        self.machine.close();
        self.content.clear();
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn status(&self) -> EditorStatus {
        self.machine.status()
    }

    pub fn phase(&self) -> AutosavePhase {
        self.machine.phase()
    }

    pub fn machine(&self) -> &AutosaveMachine {
        &self.machine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewNote;
    use std::collections::HashMap;

    const SECOND: Duration = Duration::from_secs(1);

    fn machine() -> AutosaveMachine {
        AutosaveMachine::new(SECOND, 3 * SECOND)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[derive(Default)]
    struct FakeStore {
        contents: HashMap<String, String>,
        saves: Vec<(String, String)>,
        fail_saves: bool,
    }

    impl ContentStore for FakeStore {
        fn fetch_content(&self, note_id: &str) -> Result<String> {
            self.contents
                .get(note_id)
                .cloned()
                .ok_or_else(|| NoteGroveError::NotFound(note_id.to_string()))
        }

        fn save_content(&mut self, note_id: &str, content: &str) -> Result<()> {
            if self.fail_saves {
                return Err(NoteGroveError::Io(std::io::Error::other("offline")));
            }
            self.saves.push((note_id.to_string(), content.to_string()));
            self.contents.insert(note_id.to_string(), content.to_string());
            Ok(())
        }
    }

    fn session() -> EditorSession<FakeStore> {
        let mut store = FakeStore::default();
        store.contents.insert("a".to_string(), "A".to_string());
        store.contents.insert("b".to_string(), "B".to_string());
        EditorSession::new(store, &Settings::default())
    }

    #[test]
    fn test_rapid_edits_coalesce_into_one_save() {
        let t0 = Instant::now();
        let mut s = session();
        s.load_note_content("a").unwrap();

        for i in 0..5u64 {
            s.edit(format!("draft {i}"), t0 + ms(i * 100));
            assert!(s.tick(t0 + ms(i * 100 + 50)).is_none());
        }
        assert_eq!(s.phase(), AutosavePhase::Dirty);

        // Last edit at 400ms, so the window closes at 1400ms.
        assert!(s.tick(t0 + ms(1399)).is_none());
        assert!(s.tick(t0 + ms(1400)).unwrap().is_ok());
        assert!(s.tick(t0 + ms(5000)).is_none());

        assert_eq!(s.store().saves, vec![("a".to_string(), "draft 4".to_string())]);
    }

    #[test]
    fn test_success_decays_to_idle() {
        let t0 = Instant::now();
        let mut s = session();
        s.load_note_content("a").unwrap();
        s.edit("x", t0);
        s.tick(t0 + SECOND);

        let status = s.status();
        assert_eq!(status.save_status, SaveStatus::Success);
        assert!(!status.has_unsaved_changes);

        s.tick(t0 + SECOND + ms(2999));
        assert_eq!(s.phase(), AutosavePhase::Success);
        s.tick(t0 + 4 * SECOND);
        assert_eq!(s.phase(), AutosavePhase::Idle);
    }

    #[test]
    fn test_failure_persists_until_next_edit() {
        let t0 = Instant::now();
        let mut s = session();
        s.load_note_content("a").unwrap();
        s.store_mut().fail_saves = true;
        s.edit("x", t0);

        let result = s.tick(t0 + SECOND).unwrap();
        assert!(matches!(result, Err(NoteGroveError::SaveFailure(_))));
        assert_eq!(s.phase(), AutosavePhase::Error);

        // No automatic retry.
        assert!(s.tick(t0 + 60 * SECOND).is_none());
        assert_eq!(s.status().save_status, SaveStatus::Error);
        assert!(s.status().has_unsaved_changes);

        s.store_mut().fail_saves = false;
        s.edit("y", t0 + 61 * SECOND);
        assert_eq!(s.phase(), AutosavePhase::Dirty);
        assert!(s.tick(t0 + 62 * SECOND).unwrap().is_ok());
        assert_eq!(s.store().saves, vec![("a".to_string(), "y".to_string())]);
    }

    #[test]
    fn test_retry_resends_failed_content() {
        let t0 = Instant::now();
        let mut s = session();
        s.load_note_content("a").unwrap();
        s.store_mut().fail_saves = true;
        s.edit("x", t0);
        s.tick(t0 + SECOND);

        s.store_mut().fail_saves = false;
        assert!(s.retry(t0 + 2 * SECOND));
        assert!(s.tick(t0 + 2 * SECOND).unwrap().is_ok());
        assert_eq!(s.store().saves, vec![("a".to_string(), "x".to_string())]);
        assert!(!s.retry(t0 + 3 * SECOND));
    }

    #[test]
    fn test_stale_save_report_is_discarded_after_switch() {
        let t0 = Instant::now();
        let mut m = machine();
        m.load_note("a");
        m.finish_loading(true);
        m.content_changed("x", t0);
        let request = m.poll(t0 + SECOND).unwrap();
        assert_eq!(request.note_id, "a");
        assert_eq!(m.phase(), AutosavePhase::Saving);

        m.load_note("b");
        m.finish_loading(true);
        assert!(!m.save_finished(request.token, false, t0 + 2 * SECOND));

        let status = m.status();
        assert_eq!(status.save_status, SaveStatus::Idle);
        assert!(!status.is_saving);
        assert_eq!(m.note_id(), Some("b"));
    }

    #[test]
    fn test_save_report_from_previous_generation_is_rejected() {
        let t0 = Instant::now();
        let mut m = machine();
        m.load_note("a");
        m.content_changed("x", t0);
        let old = m.poll(t0 + SECOND).unwrap();
        assert_eq!(old.token.generation, m.generation());

        // Same note reloaded: the request is from an older generation.
        m.load_note("a");
        m.content_changed("y", t0 + ms(1500));
        let current = m.poll(t0 + ms(2500)).unwrap();
        assert_ne!(old.token.generation, current.token.generation);

        assert!(!m.save_finished(old.token, true, t0 + ms(2600)));
        assert_eq!(m.phase(), AutosavePhase::Saving);
        assert!(m.save_finished(current.token, true, t0 + ms(2700)));
        assert_eq!(m.phase(), AutosavePhase::Success);
    }

    #[test]
    fn test_edits_during_save_schedule_another_save() {
        let t0 = Instant::now();
        let mut m = machine();
        m.load_note("a");
        m.finish_loading(true);
        m.content_changed("first", t0);
        let first = m.poll(t0 + SECOND).unwrap();

        // Only one save in flight at a time.
        m.content_changed("second", t0 + ms(1100));
        assert!(m.poll(t0 + ms(2200)).is_none());

        assert!(m.save_finished(first.token, true, t0 + ms(2300)));
        assert_eq!(m.phase(), AutosavePhase::Dirty);

        let second = m.poll(t0 + ms(2300)).unwrap();
        assert_eq!(second.content, "second");
        m.save_finished(second.token, true, t0 + ms(2400));
        assert_eq!(m.phase(), AutosavePhase::Success);
    }

    #[test]
    fn test_close_cancels_pending_save() {
        let t0 = Instant::now();
        let mut s = session();
        s.load_note_content("a").unwrap();
        s.edit("x", t0);
        s.close();

        assert!(s.tick(t0 + 10 * SECOND).is_none());
        assert!(s.store().saves.is_empty());
    }

    #[test]
    fn test_switching_notes_cancels_pending_save() {
        let t0 = Instant::now();
        let mut s = session();
        s.load_note_content("a").unwrap();
        s.edit("x", t0);
        s.load_note_content("b").unwrap();

        assert_eq!(s.content(), "B");
        assert!(!s.status().has_unsaved_changes);
        assert!(s.tick(t0 + 10 * SECOND).is_none());
        assert!(s.store().saves.is_empty());
    }

    #[test]
    fn test_edit_without_note_is_ignored() {
        let mut m = machine();
        assert!(!m.content_changed("x", Instant::now()));
        assert_eq!(m.phase(), AutosavePhase::Idle);
        assert!(m.next_wakeup().is_none());
    }

    #[test]
    fn test_load_failure_empties_editor() {
        let mut s = session();
        s.load_note_content("a").unwrap();
        assert!(s.load_note_content("missing").is_err());
        assert_eq!(s.content(), "");
        assert_eq!(s.status().save_status, SaveStatus::Error);
        assert!(!s.status().is_loading);
    }

    #[test]
    fn test_next_wakeup_tracks_deadline() {
        let t0 = Instant::now();
        let mut m = machine();
        m.load_note("a");
        m.content_changed("x", t0);
        assert_eq!(m.next_wakeup(), Some(t0 + SECOND));
    }

    #[test]
    fn test_session_saves_through_repository() {
        let t0 = Instant::now();
        let mut repo = NoteRepository::in_memory(Settings::default()).unwrap();
        let user = repo.register_user("tok", None, None).unwrap();
        let note = repo.create_note(&user.id, NewNote::titled("Journal")).unwrap();

        let mut s = EditorSession::new(repo, &Settings::default());
        s.load_note_content(&note.id).unwrap();
        assert_eq!(s.content(), "");

        s.edit(r#"{"type":"doc","content":[]}"#, t0);
        s.tick(t0 + SECOND).unwrap().unwrap();
        assert_eq!(
            s.store().get_note_content(&note.id).unwrap(),
            r#"{"type":"doc","content":[]}"#
        );
    }
}
