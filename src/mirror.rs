//! The local cache mirror: an embedded SQLite database kept consistent with
//! the remote store by a managed sync engine (external collaborator).
//!
//! The mirror is a shared, externally synchronized resource: rows may change
//! underneath the client at any time. Every write path, local or remote,
//! funnels through [`SqliteMirror::notify`] so watch subscriptions converge
//! on whatever is in the tables now.
//!
//! Features:
//! - WAL mode for concurrent readers
//! - `in_memory()` variant for tests
//! - table-level change notifications (per-process)

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{Result, SelectionError};
use crate::model::{AudioVersion, CurrentSelection, TextVersion};
use crate::watch::{ChangeEvent, ChangeSender, Table};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS audio_versions (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        language_entity_id TEXT NOT NULL,
        media_file_count INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS text_versions (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        language_entity_id TEXT NOT NULL,
        verse_count INTEGER NOT NULL DEFAULT 0,
        source TEXT NOT NULL DEFAULT 'official_translation',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS language_entities (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        level TEXT NOT NULL,
        parent_id TEXT
    )",
    "CREATE TABLE IF NOT EXISTS user_saved_audio_versions (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        version_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE(user_id, version_id)
    )",
    "CREATE TABLE IF NOT EXISTS user_saved_text_versions (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        version_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE(user_id, version_id)
    )",
    "CREATE TABLE IF NOT EXISTS user_current_selections (
        user_id TEXT PRIMARY KEY NOT NULL,
        selected_audio_version TEXT,
        selected_text_version TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_saved_audio_user ON user_saved_audio_versions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_saved_text_user ON user_saved_text_versions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_audio_versions_language ON audio_versions(language_entity_id)",
    "CREATE INDEX IF NOT EXISTS idx_text_versions_language ON text_versions(language_entity_id)",
];

/// Handle to the local SQLite mirror.
///
/// Cloning is cheap; clones share the pool and the change channel.
#[derive(Clone)]
pub struct SqliteMirror {
    pool: SqlitePool,
    changes: ChangeSender,
}

impl SqliteMirror {
    /// Open or create the mirror database at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_capacity(path, ChangeSender::DEFAULT_CAPACITY).await
    }

    /// Open with a custom change-channel capacity
    /// (`SelectionConfig::watch_capacity`).
    pub async fn open_with_capacity(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref();
        info!("opening local mirror at {:?}", path);

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| SelectionError::Connection(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| SelectionError::Connection(e.to_string()))?;

        Self::with_pool(pool, capacity).await
    }

    /// Create an in-memory mirror (for testing).
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| SelectionError::Connection(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| SelectionError::Connection(e.to_string()))?;

        Self::with_pool(pool, ChangeSender::DEFAULT_CAPACITY).await
    }

    async fn with_pool(pool: SqlitePool, capacity: usize) -> Result<Self> {
        let mirror = Self {
            pool,
            changes: ChangeSender::new(capacity),
        };
        mirror.init_schema().await?;
        Ok(mirror)
    }

    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("mirror schema initialized");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Announce that a table changed. Watchers requery on receipt.
    pub fn notify(&self, table: Table) {
        self.changes.send(table);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    /// Land an audio catalog row, as the sync engine does when the remote
    /// store pushes one.
    pub async fn upsert_audio_version(&self, version: &AudioVersion) -> Result<()> {
        sqlx::query(
            "INSERT INTO audio_versions
                 (id, name, language_entity_id, media_file_count, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 language_entity_id = excluded.language_entity_id,
                 media_file_count = excluded.media_file_count,
                 updated_at = excluded.updated_at",
        )
        .bind(&version.id)
        .bind(&version.name)
        .bind(&version.language_entity_id)
        .bind(version.media_file_count as i64)
        .bind(version.created_at)
        .bind(version.updated_at)
        .execute(&self.pool)
        .await?;

        self.notify(Table::AudioVersions);
        Ok(())
    }

    /// Land a text catalog row.
    pub async fn upsert_text_version(&self, version: &TextVersion) -> Result<()> {
        sqlx::query(
            "INSERT INTO text_versions
                 (id, name, language_entity_id, verse_count, source, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 language_entity_id = excluded.language_entity_id,
                 verse_count = excluded.verse_count,
                 source = excluded.source,
                 updated_at = excluded.updated_at",
        )
        .bind(&version.id)
        .bind(&version.name)
        .bind(&version.language_entity_id)
        .bind(version.verse_count as i64)
        .bind(version.source.as_str())
        .bind(version.created_at)
        .bind(version.updated_at)
        .execute(&self.pool)
        .await?;

        self.notify(Table::TextVersions);
        Ok(())
    }

    /// Land a language entity row.
    pub async fn upsert_language_entity(
        &self,
        id: &str,
        name: &str,
        level: &str,
        parent_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO language_entities (id, name, level, parent_id)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 level = excluded.level,
                 parent_id = excluded.parent_id",
        )
        .bind(id)
        .bind(name)
        .bind(level)
        .bind(parent_id)
        .execute(&self.pool)
        .await?;

        self.notify(Table::LanguageEntities);
        Ok(())
    }

    /// Land an authoritative current-selection row, as the sync engine does
    /// when the remote confirms or overrides a selection.
    pub async fn apply_remote_selection(&self, row: &CurrentSelection) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_current_selections
                 (user_id, selected_audio_version, selected_text_version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 selected_audio_version = excluded.selected_audio_version,
                 selected_text_version = excluded.selected_text_version,
                 updated_at = excluded.updated_at",
        )
        .bind(&row.user_id)
        .bind(&row.selected_audio_version)
        .bind(&row.selected_text_version)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        self.notify(Table::CurrentSelections);
        Ok(())
    }

    /// Fetch a text version's source column, parsed.
    #[cfg(test)]
    pub(crate) async fn text_source_of(
        &self,
        version_id: &str,
    ) -> Result<Option<crate::model::TextSource>> {
        use crate::model::TextSource;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT source FROM text_versions WHERE id = ?")
                .bind(version_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(s,)| TextSource::parse(&s)).transpose()
    }

    /// Seed helper used by tests: insert a catalog version with a fresh
    /// timestamp.
    #[cfg(test)]
    pub(crate) async fn seed_audio(&self, id: &str, name: &str, language: &str) -> Result<()> {
        use crate::model::now_unix;

        self.upsert_audio_version(&AudioVersion {
            id: id.to_string(),
            name: name.to_string(),
            language_entity_id: language.to_string(),
            language_name: String::new(),
            media_file_count: 0,
            created_at: now_unix(),
            updated_at: now_unix(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{fixtures, now_unix, TextSource};

    #[tokio::test]
    async fn test_open_with_capacity_bounds_change_channel() {
        let path =
            std::env::temp_dir().join(format!("verselect-mirror-{}.db", uuid::Uuid::new_v4()));
        let mirror = SqliteMirror::open_with_capacity(&path, 1).await.unwrap();

        let mut changes = mirror.subscribe();
        mirror.notify(Table::AudioVersions);
        mirror.notify(Table::TextVersions);

        // Capacity 1: the second send evicts the first.
        assert!(matches!(
            changes.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(1))
        ));
        assert_eq!(changes.try_recv().unwrap().table, Table::TextVersions);

        drop(changes);
        drop(mirror);
        for suffix in ["", "-wal", "-shm"] {
            let _ = tokio::fs::remove_file(format!("{}{}", path.display(), suffix)).await;
        }
    }

    #[tokio::test]
    async fn test_in_memory_schema_init_is_idempotent() {
        let mirror = SqliteMirror::in_memory().await.unwrap();
        mirror.init_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_audio_version_notifies() {
        let mirror = SqliteMirror::in_memory().await.unwrap();
        let mut changes = mirror.subscribe();

        mirror
            .upsert_audio_version(&fixtures::audio("a1", "KJV Audio"))
            .await
            .unwrap();

        let event = changes.try_recv().unwrap();
        assert_eq!(event.table, Table::AudioVersions);
    }

    #[tokio::test]
    async fn test_upsert_audio_version_overwrites() {
        let mirror = SqliteMirror::in_memory().await.unwrap();
        mirror
            .upsert_audio_version(&fixtures::audio("a1", "KJV Audio"))
            .await
            .unwrap();

        let mut renamed = fixtures::audio("a1", "KJV Audio (Dramatized)");
        renamed.media_file_count = 66;
        mirror.upsert_audio_version(&renamed).await.unwrap();

        let row: (String, i64) =
            sqlx::query_as("SELECT name, media_file_count FROM audio_versions WHERE id = ?")
                .bind("a1")
                .fetch_one(mirror.pool())
                .await
                .unwrap();
        assert_eq!(row.0, "KJV Audio (Dramatized)");
        assert_eq!(row.1, 66);
    }

    #[tokio::test]
    async fn test_text_source_round_trip_through_mirror() {
        let mirror = SqliteMirror::in_memory().await.unwrap();
        let mut version = fixtures::text("t1", "WEB");
        version.source = TextSource::AiTranscription;
        mirror.upsert_text_version(&version).await.unwrap();

        let source = mirror.text_source_of("t1").await.unwrap().unwrap();
        assert_eq!(source, TextSource::AiTranscription);
        assert!(mirror.text_source_of("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_remote_selection_upserts() {
        let mirror = SqliteMirror::in_memory().await.unwrap();
        let row = CurrentSelection {
            user_id: "u-1".to_string(),
            selected_audio_version: Some("a1".to_string()),
            selected_text_version: None,
            created_at: now_unix(),
            updated_at: now_unix(),
        };
        mirror.apply_remote_selection(&row).await.unwrap();
        mirror.apply_remote_selection(&row).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_current_selections")
            .fetch_one(mirror.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }
}
