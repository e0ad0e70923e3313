//! The version repository: maps domain version objects to and from the
//! mirror's saved-version and current-selection tables, scoped to the
//! active session.
//!
//! Every write is idempotent by construction. Concurrent callers (UI
//! double-tap, sync replay) are expected: saves are existence-checked and
//! inserted with `OR IGNORE` over a UNIQUE key, and the current-selection
//! upsert recovers from losing an insert race by retrying as an update.

use sqlx::sqlite::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, SelectionError};
use crate::mirror::SqliteMirror;
use crate::model::{
    now_unix, validate_version, AudioVersion, CurrentSelection, SavedVersions, TextSource,
    TextVersion, Version, VersionKind,
};
use crate::session::SessionProvider;
use crate::watch::{RowSetWatch, Table};

/// Per-field intent for the current-selection upsert.
#[derive(Debug, Clone)]
pub(crate) enum Field {
    /// Leave the column as it is.
    Keep,
    /// Overwrite the column, possibly with NULL.
    Set(Option<String>),
}

/// User-scoped access to saved versions and the current selection.
pub struct VersionRepository {
    mirror: SqliteMirror,
    sessions: SessionProvider,
}

impl VersionRepository {
    pub fn new(mirror: SqliteMirror, sessions: SessionProvider) -> Self {
        Self { mirror, sessions }
    }

    pub fn mirror(&self) -> &SqliteMirror {
        &self.mirror
    }

    pub fn sessions(&self) -> &SessionProvider {
        &self.sessions
    }

    fn require_user(&self) -> Result<String> {
        self.sessions
            .user_id()
            .ok_or(SelectionError::AuthenticationRequired)
    }

    fn saved_change(kind: VersionKind) -> Table {
        match kind {
            VersionKind::Audio => Table::SavedAudioVersions,
            VersionKind::Text => Table::SavedTextVersions,
        }
    }

    /// Bookmark a version for the current user.
    ///
    /// Silently idempotent: saving an already-saved version is a no-op. The
    /// catalog detail row is upserted alongside so the saved list renders
    /// even before the sync engine delivers the catalog.
    pub async fn add_saved_version(&self, version: &Version) -> Result<()> {
        validate_version(version.id(), version.name())?;
        let user = self.require_user()?;
        let kind = version.kind();

        if self.saved_row_exists(&user, version.id(), kind).await? {
            debug!(version_id = %version.id(), kind = kind.as_str(), "already saved");
            return Ok(());
        }

        match version {
            Version::Audio(v) => self.mirror.upsert_audio_version(v).await?,
            Version::Text(v) => self.mirror.upsert_text_version(v).await?,
        }

        let now = now_unix();
        sqlx::query(&format!(
            "INSERT OR IGNORE INTO {} (id, user_id, version_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            kind.saved_table()
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&user)
        .bind(version.id())
        .bind(now)
        .bind(now)
        .execute(self.mirror.pool())
        .await?;

        debug!(version_id = %version.id(), kind = kind.as_str(), "version saved");
        self.mirror.notify(Self::saved_change(kind));
        Ok(())
    }

    /// Remove a bookmark. No-op if the version was not saved.
    pub async fn remove_saved_version(&self, version_id: &str, kind: VersionKind) -> Result<()> {
        let user = self.require_user()?;

        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = ? AND version_id = ?",
            kind.saved_table()
        ))
        .bind(&user)
        .bind(version_id)
        .execute(self.mirror.pool())
        .await?;

        if result.rows_affected() > 0 {
            debug!(version_id, kind = kind.as_str(), "version unsaved");
            self.mirror.notify(Self::saved_change(kind));
        }
        Ok(())
    }

    /// Whether the current user has saved this version. False without a
    /// session.
    pub async fn is_version_saved(&self, version_id: &str, kind: VersionKind) -> Result<bool> {
        let Some(user) = self.sessions.user_id() else {
            return Ok(false);
        };
        self.saved_row_exists(&user, version_id, kind).await
    }

    async fn saved_row_exists(
        &self,
        user: &str,
        version_id: &str,
        kind: VersionKind,
    ) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(&format!(
            "SELECT 1 FROM {} WHERE user_id = ? AND version_id = ?",
            kind.saved_table()
        ))
        .bind(user)
        .bind(version_id)
        .fetch_optional(self.mirror.pool())
        .await?;
        Ok(row.is_some())
    }

    /// The saved-version lists, joined with catalog detail and the
    /// denormalized language name. Empty lists (not an error) without a
    /// session.
    pub async fn saved_versions(&self) -> Result<SavedVersions> {
        let Some(user) = self.sessions.user_id() else {
            return Ok(SavedVersions::default());
        };
        fetch_saved(self.mirror.pool(), &user).await
    }

    /// The current-selection row, if any. `None` without a session.
    pub async fn current_selection(&self) -> Result<Option<CurrentSelection>> {
        let Some(user) = self.sessions.user_id() else {
            return Ok(None);
        };
        fetch_current(self.mirror.pool(), &user).await
    }

    /// Make this audio version (or none) current. Selecting an unsaved
    /// version saves it first.
    pub async fn set_current_audio_version(&self, version: Option<&AudioVersion>) -> Result<()> {
        let user = self.require_user()?;
        if let Some(v) = version {
            self.add_saved_version(&Version::Audio(v.clone())).await?;
        }
        self.upsert_selection(
            &user,
            Field::Set(version.map(|v| v.id.clone())),
            Field::Keep,
        )
        .await
    }

    /// Make this text version (or none) current. Selecting an unsaved
    /// version saves it first.
    pub async fn set_current_text_version(&self, version: Option<&TextVersion>) -> Result<()> {
        let user = self.require_user()?;
        if let Some(v) = version {
            self.add_saved_version(&Version::Text(v.clone())).await?;
        }
        self.upsert_selection(
            &user,
            Field::Keep,
            Field::Set(version.map(|v| v.id.clone())),
        )
        .await
    }

    /// Overwrite both selection fields at once.
    pub async fn update_current_selections(
        &self,
        audio_id: Option<&str>,
        text_id: Option<&str>,
    ) -> Result<()> {
        let user = self.require_user()?;
        self.upsert_selection(
            &user,
            Field::Set(audio_id.map(str::to_string)),
            Field::Set(text_id.map(str::to_string)),
        )
        .await
    }

    /// Null both selection fields, keeping the row (sign-out path). No-op if
    /// the user never selected anything.
    pub async fn clear_current_selections(&self) -> Result<()> {
        let user = self.require_user()?;

        let result = sqlx::query(
            "UPDATE user_current_selections
             SET selected_audio_version = NULL, selected_text_version = NULL, updated_at = ?
             WHERE user_id = ?",
        )
        .bind(now_unix())
        .bind(&user)
        .execute(self.mirror.pool())
        .await?;

        if result.rows_affected() > 0 {
            self.mirror.notify(Table::CurrentSelections);
        }
        Ok(())
    }

    /// Update-or-insert the single current-selection row.
    ///
    /// UPDATE first; if no row exists, INSERT; if the insert loses a
    /// uniqueness race against a concurrent upsert, retry the UPDATE and
    /// treat success as recovery. Only the `Set` columns are ever written,
    /// so concurrent audio and text writers cannot clobber each other's
    /// field.
    async fn upsert_selection(&self, user: &str, audio: Field, text: Field) -> Result<()> {
        let now = now_unix();

        let updated = self.update_selection_row(user, &audio, &text, now).await?;
        if updated {
            self.mirror.notify(Table::CurrentSelections);
            return Ok(());
        }

        // No row yet: a `Keep` field inserts as NULL.
        let insert_audio = match &audio {
            Field::Keep => &None,
            Field::Set(value) => value,
        };
        let insert_text = match &text {
            Field::Keep => &None,
            Field::Set(value) => value,
        };

        let insert = sqlx::query(
            "INSERT INTO user_current_selections
                 (user_id, selected_audio_version, selected_text_version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user)
        .bind(insert_audio)
        .bind(insert_text)
        .bind(now)
        .bind(now)
        .execute(self.mirror.pool())
        .await;

        match insert {
            Ok(_) => {
                self.mirror.notify(Table::CurrentSelections);
                Ok(())
            }
            Err(err) if is_unique_violation(&err) => {
                // Lost the insert race; the row exists now.
                debug!(user_id = user, "selection upsert raced, recovering via update");
                let recovered = self.update_selection_row(user, &audio, &text, now).await?;
                if recovered {
                    self.mirror.notify(Table::CurrentSelections);
                    Ok(())
                } else {
                    Err(SelectionError::Persistence(
                        "selection row vanished during upsert recovery".to_string(),
                    ))
                }
            }
            Err(err) => Err(SelectionError::Persistence(err.to_string())),
        }
    }

    /// UPDATE the targeted columns only. Returns whether a row was hit.
    async fn update_selection_row(
        &self,
        user: &str,
        audio: &Field,
        text: &Field,
        now: i64,
    ) -> Result<bool> {
        let mut assignments = Vec::with_capacity(3);
        if matches!(audio, Field::Set(_)) {
            assignments.push("selected_audio_version = ?");
        }
        if matches!(text, Field::Set(_)) {
            assignments.push("selected_text_version = ?");
        }
        assignments.push("updated_at = ?");

        let sql = format!(
            "UPDATE user_current_selections SET {} WHERE user_id = ?",
            assignments.join(", ")
        );
        let mut query = sqlx::query(&sql);
        if let Field::Set(value) = audio {
            query = query.bind(value);
        }
        if let Field::Set(value) = text {
            query = query.bind(value);
        }
        let result = query
            .bind(now)
            .bind(user)
            .execute(self.mirror.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Live subscription re-delivering the full saved lists on every change.
    /// Silent (never yields) without a session.
    pub fn watch_saved_versions(&self) -> RowSetWatch<SavedVersions> {
        let Some(user) = self.sessions.user_id() else {
            return RowSetWatch::silent();
        };
        let pool = self.mirror.pool().clone();
        RowSetWatch::live(
            vec![
                Table::SavedAudioVersions,
                Table::SavedTextVersions,
                Table::AudioVersions,
                Table::TextVersions,
                Table::LanguageEntities,
            ],
            self.mirror.subscribe(),
            move || {
                let pool = pool.clone();
                let user = user.clone();
                async move { fetch_saved(&pool, &user).await }
            },
        )
    }

    /// Live subscription re-delivering the current-selection row on every
    /// change. Silent without a session.
    pub fn watch_current_selection(&self) -> RowSetWatch<Option<CurrentSelection>> {
        let Some(user) = self.sessions.user_id() else {
            return RowSetWatch::silent();
        };
        let pool = self.mirror.pool().clone();
        RowSetWatch::live(
            vec![Table::CurrentSelections],
            self.mirror.subscribe(),
            move || {
                let pool = pool.clone();
                let user = user.clone();
                async move { fetch_current(&pool, &user).await }
            },
        )
    }

    /// Catalog versions available for one language entity. Not user-scoped.
    pub async fn available_versions(
        &self,
        language_entity_id: &str,
    ) -> Result<(Vec<AudioVersion>, Vec<TextVersion>)> {
        let pool = self.mirror.pool();

        let audio_rows: Vec<AudioRow> = sqlx::query_as(
            "SELECT v.id, v.name, v.language_entity_id, l.name, v.media_file_count,
                    v.created_at, v.updated_at
             FROM audio_versions v
             LEFT JOIN language_entities l ON l.id = v.language_entity_id
             WHERE v.language_entity_id = ?
             ORDER BY v.name",
        )
        .bind(language_entity_id)
        .fetch_all(pool)
        .await?;

        let text_rows: Vec<TextRow> = sqlx::query_as(
            "SELECT v.id, v.name, v.language_entity_id, l.name, v.verse_count, v.source,
                    v.created_at, v.updated_at
             FROM text_versions v
             LEFT JOIN language_entities l ON l.id = v.language_entity_id
             WHERE v.language_entity_id = ?
             ORDER BY v.name",
        )
        .bind(language_entity_id)
        .fetch_all(pool)
        .await?;

        Ok((
            audio_rows.into_iter().map(audio_from_row).collect(),
            text_rows
                .into_iter()
                .map(text_from_row)
                .collect::<Result<_>>()?,
        ))
    }
}

type AudioRow = (String, String, String, Option<String>, i64, i64, i64);
type TextRow = (String, String, String, Option<String>, i64, String, i64, i64);

fn audio_from_row(row: AudioRow) -> AudioVersion {
    let (id, name, language_entity_id, language_name, media_file_count, created_at, updated_at) =
        row;
    AudioVersion {
        id,
        name,
        language_entity_id,
        language_name: language_name.unwrap_or_default(),
        media_file_count: media_file_count as u32,
        created_at,
        updated_at,
    }
}

fn text_from_row(row: TextRow) -> Result<TextVersion> {
    let (id, name, language_entity_id, language_name, verse_count, source, created_at, updated_at) =
        row;
    Ok(TextVersion {
        id,
        name,
        language_entity_id,
        language_name: language_name.unwrap_or_default(),
        verse_count: verse_count as u32,
        source: TextSource::parse(&source)?,
        created_at,
        updated_at,
    })
}

async fn fetch_saved(pool: &SqlitePool, user: &str) -> Result<SavedVersions> {
    let audio_rows: Vec<AudioRow> = sqlx::query_as(
        "SELECT v.id, v.name, v.language_entity_id, l.name, v.media_file_count,
                v.created_at, v.updated_at
         FROM user_saved_audio_versions s
         JOIN audio_versions v ON v.id = s.version_id
         LEFT JOIN language_entities l ON l.id = v.language_entity_id
         WHERE s.user_id = ?
         ORDER BY s.created_at, v.name",
    )
    .bind(user)
    .fetch_all(pool)
    .await?;

    let text_rows: Vec<TextRow> = sqlx::query_as(
        "SELECT v.id, v.name, v.language_entity_id, l.name, v.verse_count, v.source,
                v.created_at, v.updated_at
         FROM user_saved_text_versions s
         JOIN text_versions v ON v.id = s.version_id
         LEFT JOIN language_entities l ON l.id = v.language_entity_id
         WHERE s.user_id = ?
         ORDER BY s.created_at, v.name",
    )
    .bind(user)
    .fetch_all(pool)
    .await?;

    Ok(SavedVersions {
        audio: audio_rows.into_iter().map(audio_from_row).collect(),
        text: text_rows
            .into_iter()
            .map(text_from_row)
            .collect::<Result<_>>()?,
    })
}

async fn fetch_current(pool: &SqlitePool, user: &str) -> Result<Option<CurrentSelection>> {
    let row: Option<(String, Option<String>, Option<String>, i64, i64)> = sqlx::query_as(
        "SELECT user_id, selected_audio_version, selected_text_version, created_at, updated_at
         FROM user_current_selections
         WHERE user_id = ?",
    )
    .bind(user)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(user_id, selected_audio_version, selected_text_version, created_at, updated_at)| {
            CurrentSelection {
                user_id,
                selected_audio_version,
                selected_text_version,
                created_at,
                updated_at,
            }
        },
    ))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.to_string().contains("UNIQUE constraint")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;
    use crate::session::Session;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    async fn repo_with_session() -> VersionRepository {
        let mirror = SqliteMirror::in_memory().await.unwrap();
        let sessions = SessionProvider::with_session(Session::anonymous());
        VersionRepository::new(mirror, sessions)
    }

    async fn saved_count(repo: &VersionRepository, kind: VersionKind) -> i64 {
        let (count,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", kind.saved_table()))
                .fetch_one(repo.mirror().pool())
                .await
                .unwrap();
        count
    }

    #[tokio::test]
    async fn test_add_saved_version_is_idempotent() {
        let repo = repo_with_session().await;
        let version: Version = fixtures::audio("a1", "KJV Audio").into();

        repo.add_saved_version(&version).await.unwrap();
        repo.add_saved_version(&version).await.unwrap();

        assert_eq!(saved_count(&repo, VersionKind::Audio).await, 1);
        assert!(repo
            .is_version_saved("a1", VersionKind::Audio)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_add_then_remove_round_trip() {
        let repo = repo_with_session().await;
        repo.add_saved_version(&fixtures::audio("a1", "KJV Audio").into())
            .await
            .unwrap();

        let saved = repo.saved_versions().await.unwrap();
        assert_eq!(saved.audio.len(), 1);
        assert_eq!(saved.audio[0].id, "a1");
        assert!(saved.text.is_empty());

        repo.remove_saved_version("a1", VersionKind::Audio)
            .await
            .unwrap();
        assert!(repo.saved_versions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_absent_version_is_noop() {
        let repo = repo_with_session().await;
        repo.remove_saved_version("missing", VersionKind::Text)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_version() {
        let repo = repo_with_session().await;
        let err = repo
            .add_saved_version(&fixtures::audio("", "KJV Audio").into())
            .await
            .unwrap_err();
        assert!(matches!(err, SelectionError::Validation(_)));
    }

    #[tokio::test]
    async fn test_no_session_reads_empty_writes_fail() {
        let mirror = SqliteMirror::in_memory().await.unwrap();
        let repo = VersionRepository::new(mirror, SessionProvider::new());

        let saved = repo.saved_versions().await.unwrap();
        assert!(saved.is_empty());
        assert!(repo.current_selection().await.unwrap().is_none());
        assert!(!repo
            .is_version_saved("a1", VersionKind::Audio)
            .await
            .unwrap());

        let err = repo
            .add_saved_version(&fixtures::audio("a1", "KJV Audio").into())
            .await
            .unwrap_err();
        assert!(matches!(err, SelectionError::AuthenticationRequired));

        let err = repo
            .remove_saved_version("a1", VersionKind::Audio)
            .await
            .unwrap_err();
        assert!(matches!(err, SelectionError::AuthenticationRequired));
    }

    #[tokio::test]
    async fn test_select_implies_save() {
        let repo = repo_with_session().await;
        let version = fixtures::audio("a1", "KJV Audio");

        repo.set_current_audio_version(Some(&version)).await.unwrap();

        assert!(repo
            .is_version_saved("a1", VersionKind::Audio)
            .await
            .unwrap());
        let selection = repo.current_selection().await.unwrap().unwrap();
        assert_eq!(selection.selected_audio_version.as_deref(), Some("a1"));
        assert!(selection.selected_text_version.is_none());
    }

    #[tokio::test]
    async fn test_unset_clears_field_without_deleting_row() {
        let repo = repo_with_session().await;
        repo.set_current_audio_version(Some(&fixtures::audio("a1", "KJV Audio")))
            .await
            .unwrap();
        repo.set_current_text_version(Some(&fixtures::text("t1", "WEB")))
            .await
            .unwrap();

        repo.set_current_audio_version(None).await.unwrap();

        let selection = repo.current_selection().await.unwrap().unwrap();
        assert!(selection.selected_audio_version.is_none());
        assert_eq!(selection.selected_text_version.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_concurrent_selection_upserts_produce_one_row() {
        let repo = repo_with_session().await;
        let version = fixtures::audio("a1", "KJV Audio");

        let (first, second) = tokio::join!(
            repo.set_current_audio_version(Some(&version)),
            repo.set_current_audio_version(Some(&version)),
        );
        first.unwrap();
        second.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_current_selections")
            .fetch_one(repo.mirror().pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_audio_and_text_writes_keep_both_fields() {
        let repo = repo_with_session().await;
        let audio = fixtures::audio("a1", "KJV Audio");
        let text = fixtures::text("t1", "WEB");

        // Each writer touches only its own column, so neither erases the
        // other regardless of interleaving.
        let (first, second) = tokio::join!(
            repo.set_current_audio_version(Some(&audio)),
            repo.set_current_text_version(Some(&text)),
        );
        first.unwrap();
        second.unwrap();

        let selection = repo.current_selection().await.unwrap().unwrap();
        assert_eq!(selection.selected_audio_version.as_deref(), Some("a1"));
        assert_eq!(selection.selected_text_version.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_update_current_selections_sets_both_fields() {
        let repo = repo_with_session().await;
        repo.add_saved_version(&fixtures::audio("a1", "KJV Audio").into())
            .await
            .unwrap();
        repo.add_saved_version(&fixtures::text("t1", "WEB").into())
            .await
            .unwrap();

        repo.update_current_selections(Some("a1"), Some("t1"))
            .await
            .unwrap();

        let selection = repo.current_selection().await.unwrap().unwrap();
        assert_eq!(selection.selected_audio_version.as_deref(), Some("a1"));
        assert_eq!(selection.selected_text_version.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_clear_current_selections_keeps_row() {
        let repo = repo_with_session().await;
        repo.set_current_audio_version(Some(&fixtures::audio("a1", "KJV Audio")))
            .await
            .unwrap();

        repo.clear_current_selections().await.unwrap();

        let selection = repo.current_selection().await.unwrap().unwrap();
        assert!(selection.selected_audio_version.is_none());
        assert!(selection.selected_text_version.is_none());
    }

    #[tokio::test]
    async fn test_dangling_language_reference_yields_empty_name() {
        let repo = repo_with_session().await;
        let mut version = fixtures::audio("a1", "KJV Audio");
        version.language_entity_id = "never-synced".to_string();
        repo.add_saved_version(&version.into()).await.unwrap();

        let saved = repo.saved_versions().await.unwrap();
        assert_eq!(saved.audio[0].language_name, "");
    }

    #[tokio::test]
    async fn test_saved_versions_join_language_name() {
        let repo = repo_with_session().await;
        repo.mirror()
            .upsert_language_entity("lg-en", "English", "language", None)
            .await
            .unwrap();
        let mut version = fixtures::audio("a1", "KJV Audio");
        version.language_entity_id = "lg-en".to_string();
        version.language_name = String::new(); // caller-provided cache is ignored
        repo.add_saved_version(&version.into()).await.unwrap();

        let saved = repo.saved_versions().await.unwrap();
        assert_eq!(saved.audio[0].language_name, "English");
    }

    #[tokio::test]
    async fn test_watch_saved_versions_redelivers_full_set() {
        let repo = repo_with_session().await;
        let mut watch = repo.watch_saved_versions();

        let initial = tokio::time::timeout(Duration::from_secs(2), watch.next())
            .await
            .unwrap()
            .unwrap();
        assert!(initial.is_empty());

        repo.add_saved_version(&fixtures::audio("a1", "KJV Audio").into())
            .await
            .unwrap();

        // The catalog upsert and the saved insert each notify, so an
        // intermediate empty set may arrive before the final one.
        let after_add = loop {
            let rows = tokio::time::timeout(Duration::from_secs(2), watch.next())
                .await
                .unwrap()
                .unwrap();
            if !rows.is_empty() {
                break rows;
            }
        };
        assert_eq!(after_add.audio.len(), 1);
        assert_eq!(after_add.audio[0].id, "a1");
    }

    #[tokio::test]
    async fn test_watch_without_session_is_silent() {
        let mirror = SqliteMirror::in_memory().await.unwrap();
        let repo = VersionRepository::new(mirror, SessionProvider::new());

        let mut watch = repo.watch_current_selection();
        let result = tokio::time::timeout(Duration::from_millis(50), watch.next()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_available_versions_by_language() {
        let repo = repo_with_session().await;
        repo.mirror().seed_audio("a1", "KJV Audio", "lg-en").await.unwrap();
        repo.mirror().seed_audio("a2", "WEB Audio", "lg-en").await.unwrap();
        repo.mirror().seed_audio("a3", "LSG Audio", "lg-fr").await.unwrap();

        let (audio, text) = repo.available_versions("lg-en").await.unwrap();
        assert_eq!(audio.len(), 2);
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_remote_selection_push_reaches_watchers() {
        let repo = repo_with_session().await;
        let user = repo.sessions().user_id().unwrap();
        let mut watch = repo.watch_current_selection();

        // Initial emission: no row yet.
        let initial = tokio::time::timeout(Duration::from_secs(2), watch.next())
            .await
            .unwrap()
            .unwrap();
        assert!(initial.is_none());

        repo.mirror()
            .apply_remote_selection(&CurrentSelection {
                user_id: user,
                selected_audio_version: Some("a9".to_string()),
                selected_text_version: None,
                created_at: now_unix(),
                updated_at: now_unix(),
            })
            .await
            .unwrap();

        let pushed = tokio::time::timeout(Duration::from_secs(2), watch.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(pushed.selected_audio_version.as_deref(), Some("a9"));
    }
}
