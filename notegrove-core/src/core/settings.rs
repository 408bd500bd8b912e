//! Repository and editor settings persistence.
//!
//! Settings live in a JSON file at an OS-appropriate location. A missing or
//! corrupt file yields the defaults.

use crate::{DeleteStrategy, NoteGroveError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How titles are compared when checking per-owner uniqueness at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TitlePolicy {
    /// `"Todo"` and `"todo"` are different titles.
    CaseSensitive,
    /// `"Todo"` and `"todo"` collide.
    CaseInsensitive,
}

impl TitlePolicy {
    /// Returns `true` if `a` and `b` count as the same title under this policy.
    pub fn same_title(self, a: &str, b: &str) -> bool {
        match self {
            Self::CaseSensitive => a == b,
            Self::CaseInsensitive => a.to_lowercase() == b.to_lowercase(),
        }
    }
}

/// Persisted settings for the note repository and the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub title_policy: TitlePolicy,
    pub min_title_length: usize,
    pub max_title_length: usize,
    /// Strategy used by [`NoteRepository::delete_note_default`](crate::NoteRepository::delete_note_default).
    pub delete_strategy: DeleteStrategy,
    pub autosave_debounce_ms: u64,
    /// How long a successful save stays visible before the status returns to idle.
    pub success_display_ms: u64,
    pub default_tree_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title_policy: TitlePolicy::CaseInsensitive,
            min_title_length: 1,
            max_title_length: 50,
            delete_strategy: DeleteStrategy::PromoteChildren,
            autosave_debounce_ms: 1000,
            success_display_ms: 3000,
            default_tree_depth: 1,
        }
    }
}

impl Settings {
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn success_display(&self) -> Duration {
        Duration::from_millis(self.success_display_ms)
    }

    /// Trims `title` and checks it against the configured length bounds.
    ///
    /// # Errors
    ///
    /// Returns [`NoteGroveError::Validation`] if the title is empty or out of bounds.
    pub fn validate_title(&self, title: &str) -> Result<String> {
        let trimmed = title.trim();
        let len = trimmed.chars().count();
        if len == 0 {
            return Err(NoteGroveError::Validation("Title is required".to_string()));
        }
        if len < self.min_title_length {
            return Err(NoteGroveError::Validation("Title is too short".to_string()));
        }
        if len > self.max_title_length {
            return Err(NoteGroveError::Validation("Title is too long".to_string()));
        }
        Ok(trimmed.to_string())
    }
}

/// Returns the path to the settings JSON file.
///
/// - macOS / Linux: `~/.config/notegrove/settings.json`
/// - Windows: `%APPDATA%/Notegrove/settings.json`
pub fn settings_file_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("Notegrove").join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("notegrove").join("settings.json")
    }
}

/// Loads settings from the default location.
pub fn load_settings() -> Settings {
    load_settings_from(settings_file_path())
}

/// Loads settings from `path`; returns defaults if the file is missing or corrupt.
pub fn load_settings_from<P: AsRef<Path>>(path: P) -> Settings {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring corrupt settings file {}: {e}", path.display());
            Settings::default()
        }),
        Err(_) => Settings::default(),
    }
}

/// Saves settings to `path`, creating parent directories as needed.
pub fn save_settings_to<P: AsRef<Path>>(path: P, settings: &Settings) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}
