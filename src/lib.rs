//! # verselect
//!
//! Offline-first saved-version and current-selection state for a scripture
//! audio/text reader.
//!
//! The crate tracks which audio and text Bible versions a user has
//! bookmarked and which pair is currently active, with:
//!
//! - **Optimistic updates**: in-memory state changes immediately, durable
//!   persistence follows; slots carry a pending/confirmed flag.
//! - **A local SQLite mirror**: all persistence is local-first; a managed
//!   sync engine converges it with the hosted backend out of band.
//! - **Watch subscriptions**: full row sets are re-delivered on every change,
//!   which is how authoritative server state reconciles local writes.
//! - **Debounced language search**: fuzzy alias search against the remote,
//!   rate-limited and cached.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use verselect::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> verselect::Result<()> {
//!     let config = SelectionConfig::default();
//!     let mirror =
//!         SqliteMirror::open_with_capacity("selection.db", config.watch_capacity).await?;
//!     let sessions = SessionProvider::with_session(Session::anonymous());
//!     let repository = Arc::new(VersionRepository::new(mirror, sessions));
//!
//!     let store = Arc::new(SelectionStore::new(
//!         repository,
//!         Arc::new(StaticRemote::new()),
//!         Arc::new(MemorySnapshots::new()),
//!         config,
//!     ));
//!
//!     store.initialize().await;
//!     store.spawn_watchers();
//!
//!     let saved = store.saved();
//!     println!("{} audio / {} text versions saved", saved.audio.len(), saved.text.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod hierarchy;
pub mod hooks;
pub mod mirror;
pub mod model;
pub mod remote;
pub mod repository;
pub mod search;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod watch;

// Re-export main types
pub use config::SelectionConfig;
pub use error::{Result, SelectionError};
pub use hierarchy::{LanguageEntity, LanguageLevel, LanguageNode};
pub use hooks::{CurrentVersionsHandle, LanguageBrowserHandle, SavedVersionsHandle, SyncHandle};
pub use mirror::SqliteMirror;
pub use model::{
    AudioVersion, CurrentSelection, SavedVersions, TextSource, TextVersion, Version, VersionKind,
};
pub use remote::{LanguageMatch, RemoteStore, SearchParams, StaticRemote};
pub use repository::VersionRepository;
pub use search::SearchDebouncer;
pub use session::{Session, SessionKind, SessionProvider};
pub use snapshot::{FileSnapshots, MemorySnapshots, PersistedState, SnapshotStorage};
pub use store::{Confirmation, HydrationReport, Phase, Selected, SelectionStore};
pub use watch::{ChangeEvent, ChangeSender, RowSetWatch, Table};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::SelectionConfig;
    pub use crate::error::{Result, SelectionError};
    pub use crate::hooks::{
        CurrentVersionsHandle, LanguageBrowserHandle, SavedVersionsHandle, SyncHandle,
    };
    pub use crate::mirror::SqliteMirror;
    pub use crate::model::{
        AudioVersion, CurrentSelection, SavedVersions, TextSource, TextVersion, Version,
        VersionKind,
    };
    pub use crate::remote::{LanguageMatch, RemoteStore, SearchParams, StaticRemote};
    pub use crate::repository::VersionRepository;
    pub use crate::session::{Session, SessionKind, SessionProvider};
    pub use crate::snapshot::{FileSnapshots, MemorySnapshots, SnapshotStorage};
    pub use crate::store::{Confirmation, Phase, Selected, SelectionStore};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_end_to_end_select_and_list() {
        let mirror = SqliteMirror::in_memory().await.unwrap();
        let sessions = SessionProvider::with_session(Session::anonymous());
        let store = Arc::new(SelectionStore::new(
            Arc::new(VersionRepository::new(mirror, sessions)),
            Arc::new(StaticRemote::new()),
            Arc::new(MemorySnapshots::new()),
            SelectionConfig::default(),
        ));
        store.initialize().await;

        store
            .set_current_audio_version(Some(AudioVersion {
                id: "a1".to_string(),
                name: "KJV Audio".to_string(),
                language_entity_id: "lg-en".to_string(),
                language_name: String::new(),
                media_file_count: 1189,
                created_at: 0,
                updated_at: 0,
            }))
            .await
            .unwrap();

        assert_eq!(store.current_audio().unwrap().version.id, "a1");
        assert_eq!(store.saved().audio.len(), 1);
    }

    #[tokio::test]
    async fn test_shared_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}

        assert_send_sync::<SelectionStore>();
        assert_send_sync::<VersionRepository>();
        assert_send_sync::<SqliteMirror>();
        assert_send_sync::<SessionProvider>();
    }
}
