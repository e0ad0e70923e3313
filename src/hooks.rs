//! Narrow UI-facing handles over the selection store.
//!
//! Each handle exposes one slice of the store as plain data plus async
//! callbacks; no database or remote types cross this boundary. The UI layer
//! holds whichever handles its screens need instead of the whole store.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::hierarchy::LanguageNode;
use crate::model::{AudioVersion, SavedVersions, TextVersion, Version, VersionKind};
use crate::remote::LanguageMatch;
use crate::store::{LoadingFlags, Selected, SelectionStore};

/// The current audio/text selection slice.
#[derive(Clone)]
pub struct CurrentVersionsHandle {
    store: Arc<SelectionStore>,
}

impl CurrentVersionsHandle {
    pub fn new(store: Arc<SelectionStore>) -> Self {
        Self { store }
    }

    pub fn audio(&self) -> Option<Selected<AudioVersion>> {
        self.store.current_audio()
    }

    pub fn text(&self) -> Option<Selected<TextVersion>> {
        self.store.current_text()
    }

    pub async fn set_audio(&self, version: Option<AudioVersion>) -> Result<()> {
        self.store.set_current_audio_version(version).await
    }

    pub async fn set_text(&self, version: Option<TextVersion>) -> Result<()> {
        self.store.set_current_text_version(version).await
    }
}

/// The saved-versions slice.
#[derive(Clone)]
pub struct SavedVersionsHandle {
    store: Arc<SelectionStore>,
}

impl SavedVersionsHandle {
    pub fn new(store: Arc<SelectionStore>) -> Self {
        Self { store }
    }

    pub fn saved(&self) -> SavedVersions {
        self.store.saved()
    }

    pub fn is_loading(&self) -> bool {
        self.store.loading().saved
    }

    /// Propagates errors (including "already saved") so modal submit
    /// handlers can show a blocking alert.
    pub async fn add(&self, version: Version) -> Result<()> {
        self.store.add_saved_version(version).await
    }

    pub async fn remove(&self, version_id: &str, kind: VersionKind) -> Result<()> {
        self.store.remove_saved_version(version_id, kind).await
    }

    pub async fn reload(&self) -> Result<()> {
        self.store.load_saved_versions().await
    }
}

/// The hierarchy-browse and search slice.
#[derive(Clone)]
pub struct LanguageBrowserHandle {
    store: Arc<SelectionStore>,
}

impl LanguageBrowserHandle {
    pub fn new(store: Arc<SelectionStore>) -> Self {
        Self { store }
    }

    pub fn hierarchy(&self) -> Vec<LanguageNode> {
        self.store.hierarchy()
    }

    pub fn expanded(&self) -> HashSet<String> {
        self.store.expanded_nodes()
    }

    pub fn expand(&self, id: impl Into<String>) {
        self.store.expand_language_node(id);
    }

    pub fn collapse(&self, id: &str) {
        self.store.collapse_language_node(id);
    }

    pub async fn load_hierarchy(&self) -> Result<()> {
        self.store.load_language_hierarchy().await
    }

    pub fn search(&self, query: impl Into<String>) -> JoinHandle<()> {
        self.store.search_languages(query)
    }

    pub fn query(&self) -> String {
        self.store.search_query()
    }

    pub fn results(&self) -> Vec<LanguageMatch> {
        self.store.search_results()
    }

    pub fn search_error(&self) -> Option<String> {
        self.store.search_error()
    }

    pub async fn load_versions(&self, language_entity_id: &str) -> Result<()> {
        self.store.load_available_versions(language_entity_id).await
    }

    pub fn available(&self) -> (Vec<AudioVersion>, Vec<TextVersion>) {
        self.store.available()
    }

    pub fn loading(&self) -> LoadingFlags {
        self.store.loading()
    }
}

/// The cloud-sync slice.
#[derive(Clone)]
pub struct SyncHandle {
    store: Arc<SelectionStore>,
}

impl SyncHandle {
    pub fn new(store: Arc<SelectionStore>) -> Self {
        Self { store }
    }

    pub fn is_syncing(&self) -> bool {
        self.store.loading().sync
    }

    pub async fn sync(&self) -> Result<()> {
        self.store.sync_with_cloud().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectionConfig;
    use crate::mirror::SqliteMirror;
    use crate::model::fixtures;
    use crate::remote::StaticRemote;
    use crate::repository::VersionRepository;
    use crate::session::{Session, SessionProvider};
    use crate::snapshot::MemorySnapshots;
    use crate::store::Confirmation;

    async fn store() -> Arc<SelectionStore> {
        let mirror = SqliteMirror::in_memory().await.unwrap();
        let sessions = SessionProvider::with_session(Session::anonymous());
        Arc::new(SelectionStore::new(
            Arc::new(VersionRepository::new(mirror, sessions)),
            Arc::new(StaticRemote::new()),
            Arc::new(MemorySnapshots::new()),
            SelectionConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_current_versions_handle_round_trip() {
        let handle = CurrentVersionsHandle::new(store().await);
        assert!(handle.audio().is_none());

        handle
            .set_audio(Some(fixtures::audio("a1", "KJV Audio")))
            .await
            .unwrap();

        let slot = handle.audio().unwrap();
        assert_eq!(slot.version.id, "a1");
        assert_eq!(slot.confirmation, Confirmation::Confirmed);
    }

    #[tokio::test]
    async fn test_saved_handle_propagates_duplicate_error() {
        let handle = SavedVersionsHandle::new(store().await);
        handle
            .add(fixtures::text("t1", "WEB").into())
            .await
            .unwrap();

        assert!(handle.add(fixtures::text("t1", "WEB").into()).await.is_err());
        assert_eq!(handle.saved().text.len(), 1);

        handle.remove("t1", VersionKind::Text).await.unwrap();
        assert!(handle.saved().is_empty());
    }

    #[tokio::test]
    async fn test_browser_handle_expansion() {
        let handle = LanguageBrowserHandle::new(store().await);
        handle.expand("fam");
        assert!(handle.expanded().contains("fam"));
        handle.collapse("fam");
        assert!(handle.expanded().is_empty());
    }
}
