//! Domain types for Bible versions and the per-user selection rows.
//!
//! Audio and text versions live in separate id spaces: an audio id and a
//! text id are never compared with each other. `language_name` is a
//! denormalized display cache; a dangling `language_entity_id` yields an
//! empty string rather than an error.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, SelectionError};

/// Whether a version is a playable (audio) or readable (text) rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionKind {
    Audio,
    Text,
}

impl VersionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionKind::Audio => "audio",
            VersionKind::Text => "text",
        }
    }

    /// Table holding per-user saved rows for this kind.
    pub(crate) fn saved_table(&self) -> &'static str {
        match self {
            VersionKind::Audio => "user_saved_audio_versions",
            VersionKind::Text => "user_saved_text_versions",
        }
    }
}

/// Provenance of a text version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    OfficialTranslation,
    AiTranscription,
    UserSubmitted,
}

impl TextSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextSource::OfficialTranslation => "official_translation",
            TextSource::AiTranscription => "ai_transcription",
            TextSource::UserSubmitted => "user_submitted",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "official_translation" => Ok(TextSource::OfficialTranslation),
            "ai_transcription" => Ok(TextSource::AiTranscription),
            "user_submitted" => Ok(TextSource::UserSubmitted),
            other => Err(SelectionError::Validation(format!(
                "unknown text source: {other}"
            ))),
        }
    }
}

/// A playable audio rendering of scripture for one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioVersion {
    pub id: String,
    pub name: String,
    pub language_entity_id: String,
    /// Denormalized display cache; empty when the language entity is unknown.
    pub language_name: String,
    pub media_file_count: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A readable text rendering of scripture for one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextVersion {
    pub id: String,
    pub name: String,
    pub language_entity_id: String,
    pub language_name: String,
    pub verse_count: u32,
    pub source: TextSource,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Either kind of version, for operations that accept both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Version {
    Audio(AudioVersion),
    Text(TextVersion),
}

impl Version {
    pub fn id(&self) -> &str {
        match self {
            Version::Audio(v) => &v.id,
            Version::Text(v) => &v.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Version::Audio(v) => &v.name,
            Version::Text(v) => &v.name,
        }
    }

    pub fn kind(&self) -> VersionKind {
        match self {
            Version::Audio(_) => VersionKind::Audio,
            Version::Text(_) => VersionKind::Text,
        }
    }
}

impl From<AudioVersion> for Version {
    fn from(v: AudioVersion) -> Self {
        Version::Audio(v)
    }
}

impl From<TextVersion> for Version {
    fn from(v: TextVersion) -> Self {
        Version::Text(v)
    }
}

/// The saved-version lists for one user, split by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedVersions {
    pub audio: Vec<AudioVersion>,
    pub text: Vec<TextVersion>,
}

impl SavedVersions {
    pub fn is_empty(&self) -> bool {
        self.audio.is_empty() && self.text.is_empty()
    }
}

/// The single current-selection row for one user.
///
/// At most one row exists per user; fields are nulled on sign-out but the
/// row is never deleted during normal operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSelection {
    pub user_id: String,
    pub selected_audio_version: Option<String>,
    pub selected_text_version: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Reject versions with an empty id or name before they are accepted as
/// saved or current.
pub fn validate_version(id: &str, name: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(SelectionError::Validation(
            "version id cannot be empty".to_string(),
        ));
    }
    if name.trim().is_empty() {
        return Err(SelectionError::Validation(
            "version name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Current Unix timestamp in seconds.
pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
