//! The selection state store: the single in-memory source of truth for what
//! the UI renders.
//!
//! Mutations are optimistic: the in-memory value changes synchronously, then
//! persistence runs. A failed persist does not roll the value back; instead
//! the slot stays marked [`Confirmation::Pending`] until a watch push (or the
//! next successful write) reconciles it. Each action returns its own
//! `Result`; there is no shared error field for concurrent actions to
//! clobber.
//!
//! There is one logical writer (the UI task), so a plain RwLock guards the
//! aggregate. Guards are never held across await points.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::config::SelectionConfig;
use crate::error::{Result, SelectionError};
use crate::hierarchy::{self, LanguageNode};
use crate::model::{
    validate_version, AudioVersion, CurrentSelection, SavedVersions, TextVersion, Version,
    VersionKind,
};
use crate::remote::{LanguageMatch, RemoteStore, SearchParams};
use crate::repository::VersionRepository;
use crate::search::SearchDebouncer;
use crate::snapshot::{PersistedState, SnapshotStorage};

/// Store lifecycle, per session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Uninitialized,
    Hydrating,
    Ready,
}

/// Whether a locally selected value has been confirmed by persistence or a
/// watch push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Pending,
    Confirmed,
}

/// A current selection slot with its confirmation status.
#[derive(Debug, Clone, PartialEq)]
pub struct Selected<T> {
    pub version: T,
    pub confirmation: Confirmation,
}

/// Per-domain loading flags; rebuilt each session, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadingFlags {
    pub saved: bool,
    pub hierarchy: bool,
    pub search: bool,
    pub versions: bool,
    pub sync: bool,
}

/// Outcome of the hydration steps. Initialization is best-effort: a failed
/// step is recorded here and the store still becomes `Ready`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydrationReport {
    pub snapshot_error: Option<String>,
    pub saved_error: Option<String>,
    pub hierarchy_error: Option<String>,
}

impl HydrationReport {
    pub fn is_clean(&self) -> bool {
        self.snapshot_error.is_none()
            && self.saved_error.is_none()
            && self.hierarchy_error.is_none()
    }
}

#[derive(Default)]
struct State {
    phase: Phase,
    current_audio: Option<Selected<AudioVersion>>,
    current_text: Option<Selected<TextVersion>>,
    saved: SavedVersions,
    hierarchy: Vec<LanguageNode>,
    expanded_nodes: HashSet<String>,
    search_query: String,
    search_results: Vec<LanguageMatch>,
    search_error: Option<String>,
    available_audio: Vec<AudioVersion>,
    available_text: Vec<TextVersion>,
    loading: LoadingFlags,
    hydration: HydrationReport,
}

/// In-memory reactive store coordinating optimistic updates with the
/// repository and reconciling against watch pushes.
///
/// All collaborators are injected; construct one per app (or per test) and
/// share it behind an `Arc`.
pub struct SelectionStore {
    repository: Arc<VersionRepository>,
    remote: Arc<dyn RemoteStore>,
    snapshots: Arc<dyn SnapshotStorage>,
    config: SelectionConfig,
    debouncer: SearchDebouncer,
    state: RwLock<State>,
}

impl SelectionStore {
    pub fn new(
        repository: Arc<VersionRepository>,
        remote: Arc<dyn RemoteStore>,
        snapshots: Arc<dyn SnapshotStorage>,
        config: SelectionConfig,
    ) -> Self {
        let debouncer = SearchDebouncer::new(Arc::clone(&remote), config.search_debounce());
        Self {
            repository,
            remote,
            snapshots,
            config,
            debouncer,
            state: RwLock::new(State::default()),
        }
    }

    pub fn repository(&self) -> &Arc<VersionRepository> {
        &self.repository
    }

    // --- read slice -------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.state.read().phase
    }

    pub fn current_audio(&self) -> Option<Selected<AudioVersion>> {
        self.state.read().current_audio.clone()
    }

    pub fn current_text(&self) -> Option<Selected<TextVersion>> {
        self.state.read().current_text.clone()
    }

    pub fn saved(&self) -> SavedVersions {
        self.state.read().saved.clone()
    }

    pub fn hierarchy(&self) -> Vec<LanguageNode> {
        self.state.read().hierarchy.clone()
    }

    pub fn expanded_nodes(&self) -> HashSet<String> {
        self.state.read().expanded_nodes.clone()
    }

    pub fn search_query(&self) -> String {
        self.state.read().search_query.clone()
    }

    pub fn search_results(&self) -> Vec<LanguageMatch> {
        self.state.read().search_results.clone()
    }

    pub fn search_error(&self) -> Option<String> {
        self.state.read().search_error.clone()
    }

    pub fn available(&self) -> (Vec<AudioVersion>, Vec<TextVersion>) {
        let state = self.state.read();
        (state.available_audio.clone(), state.available_text.clone())
    }

    pub fn loading(&self) -> LoadingFlags {
        self.state.read().loading
    }

    pub fn hydration(&self) -> HydrationReport {
        self.state.read().hydration.clone()
    }

    // --- hydration --------------------------------------------------------

    /// Hydrate the store: restore the durable subset, load saved versions,
    /// load the hierarchy. Each step is best-effort; the store always ends
    /// `Ready` and the report carries whatever failed.
    pub async fn initialize(&self) -> HydrationReport {
        self.state.write().phase = Phase::Hydrating;
        info!("selection store hydrating");

        if let Err(err) = self.restore_snapshot().await {
            warn!(error = %err, "snapshot restore failed");
            self.state.write().hydration.snapshot_error = Some(err.user_message());
        }

        if let Err(err) = self.load_saved_versions().await {
            warn!(error = %err, "saved versions load failed");
            self.state.write().hydration.saved_error = Some(err.user_message());
        }

        let hierarchy_empty = self.state.read().hierarchy.is_empty();
        if hierarchy_empty {
            if let Err(err) = self.load_language_hierarchy().await {
                warn!(error = %err, "hierarchy load failed");
                self.state.write().hydration.hierarchy_error = Some(err.user_message());
            }
        }

        let mut state = self.state.write();
        state.phase = Phase::Ready;
        state.hydration.clone()
    }

    /// Restore the persisted subset from durable client storage.
    pub async fn restore_snapshot(&self) -> Result<()> {
        let Some(raw) = self.snapshots.get(&self.config.snapshot_key).await? else {
            return Ok(());
        };
        let persisted: PersistedState = serde_json::from_str(&raw)?;

        let mut state = self.state.write();
        state.current_audio = persisted.current_audio.clone().map(|version| Selected {
            version,
            confirmation: Confirmation::Confirmed,
        });
        state.current_text = persisted.current_text.clone().map(|version| Selected {
            version,
            confirmation: Confirmation::Confirmed,
        });
        state.expanded_nodes = persisted.expanded_set();
        state.search_query = persisted.search_query;
        debug!("snapshot restored");
        Ok(())
    }

    /// Write the persisted subset to durable client storage.
    pub async fn persist_snapshot(&self) -> Result<()> {
        let persisted = {
            let state = self.state.read();
            let mut persisted = PersistedState {
                current_audio: state.current_audio.as_ref().map(|s| s.version.clone()),
                current_text: state.current_text.as_ref().map(|s| s.version.clone()),
                expanded_nodes: Vec::new(),
                search_query: state.search_query.clone(),
            };
            persisted.set_expanded(&state.expanded_nodes);
            persisted
        };
        let raw = serde_json::to_string(&persisted)?;
        self.snapshots.set(&self.config.snapshot_key, raw).await
    }

    // --- current selection ------------------------------------------------

    /// Make this audio version (or none) current.
    ///
    /// The in-memory value changes immediately and stays even if persistence
    /// fails; the returned error tells the caller, and the slot remains
    /// `Pending` until reconciled.
    pub async fn set_current_audio_version(&self, version: Option<AudioVersion>) -> Result<()> {
        if let Some(v) = &version {
            validate_version(&v.id, &v.name)?;
        }

        self.state.write().current_audio = version.clone().map(|v| Selected {
            version: v,
            confirmation: Confirmation::Pending,
        });

        let outcome = self
            .repository
            .set_current_audio_version(version.as_ref())
            .await;

        match outcome {
            Ok(()) => {
                self.confirm_audio(version.as_ref().map(|v| v.id.as_str()));
                self.refresh_saved_best_effort().await;
                self.snapshot_best_effort().await;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "audio selection persist failed, keeping optimistic value");
                self.snapshot_best_effort().await;
                Err(err)
            }
        }
    }

    /// Make this text version (or none) current. Same semantics as the audio
    /// variant.
    pub async fn set_current_text_version(&self, version: Option<TextVersion>) -> Result<()> {
        if let Some(v) = &version {
            validate_version(&v.id, &v.name)?;
        }

        self.state.write().current_text = version.clone().map(|v| Selected {
            version: v,
            confirmation: Confirmation::Pending,
        });

        let outcome = self
            .repository
            .set_current_text_version(version.as_ref())
            .await;

        match outcome {
            Ok(()) => {
                self.confirm_text(version.as_ref().map(|v| v.id.as_str()));
                self.refresh_saved_best_effort().await;
                self.snapshot_best_effort().await;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "text selection persist failed, keeping optimistic value");
                self.snapshot_best_effort().await;
                Err(err)
            }
        }
    }

    /// Mark the audio slot confirmed if it still holds `id`. A completion
    /// landing after a newer optimistic write must not clobber it.
    fn confirm_audio(&self, id: Option<&str>) {
        let mut state = self.state.write();
        match (id, state.current_audio.as_mut()) {
            (Some(id), Some(slot)) if slot.version.id == id => {
                slot.confirmation = Confirmation::Confirmed;
            }
            _ => {}
        }
    }

    fn confirm_text(&self, id: Option<&str>) {
        let mut state = self.state.write();
        match (id, state.current_text.as_mut()) {
            (Some(id), Some(slot)) if slot.version.id == id => {
                slot.confirmation = Confirmation::Confirmed;
            }
            _ => {}
        }
    }

    /// Reconcile against an authoritative current-selection row from a watch
    /// push. The server row wins: matching ids flip to `Confirmed`,
    /// different ids overwrite the slot when the version detail is known
    /// locally, and absent ids clear the slot.
    pub fn apply_selection_row(&self, row: Option<&CurrentSelection>) {
        let mut state = self.state.write();

        let audio_id = row.and_then(|r| r.selected_audio_version.as_deref());
        match audio_id {
            None => state.current_audio = None,
            Some(id) => {
                let matches = state
                    .current_audio
                    .as_ref()
                    .is_some_and(|slot| slot.version.id == id);
                if matches {
                    if let Some(slot) = state.current_audio.as_mut() {
                        slot.confirmation = Confirmation::Confirmed;
                    }
                } else if let Some(version) = state
                    .saved
                    .audio
                    .iter()
                    .chain(state.available_audio.iter())
                    .find(|v| v.id == id)
                    .cloned()
                {
                    state.current_audio = Some(Selected {
                        version,
                        confirmation: Confirmation::Confirmed,
                    });
                } else {
                    debug!(id, "authoritative audio selection has no local detail yet");
                }
            }
        }

        let text_id = row.and_then(|r| r.selected_text_version.as_deref());
        match text_id {
            None => state.current_text = None,
            Some(id) => {
                let matches = state
                    .current_text
                    .as_ref()
                    .is_some_and(|slot| slot.version.id == id);
                if matches {
                    if let Some(slot) = state.current_text.as_mut() {
                        slot.confirmation = Confirmation::Confirmed;
                    }
                } else if let Some(version) = state
                    .saved
                    .text
                    .iter()
                    .chain(state.available_text.iter())
                    .find(|v| v.id == id)
                    .cloned()
                {
                    state.current_text = Some(Selected {
                        version,
                        confirmation: Confirmation::Confirmed,
                    });
                } else {
                    debug!(id, "authoritative text selection has no local detail yet");
                }
            }
        }
    }

    /// Replace the saved lists with an authoritative row set.
    pub fn apply_saved_rows(&self, rows: SavedVersions) {
        self.state.write().saved = rows;
    }

    // --- saved versions ---------------------------------------------------

    /// Bookmark a version. Unlike the repository, the store surfaces a
    /// duplicate save as an error so the UI can tell the user.
    pub async fn add_saved_version(&self, version: Version) -> Result<()> {
        validate_version(version.id(), version.name())?;

        if self
            .repository
            .is_version_saved(version.id(), version.kind())
            .await?
        {
            return Err(SelectionError::Validation(format!(
                "{} is already in your saved versions",
                version.name()
            )));
        }

        self.repository.add_saved_version(&version).await?;
        self.load_saved_versions().await
    }

    pub async fn remove_saved_version(&self, version_id: &str, kind: VersionKind) -> Result<()> {
        self.repository
            .remove_saved_version(version_id, kind)
            .await?;
        self.load_saved_versions().await
    }

    pub async fn load_saved_versions(&self) -> Result<()> {
        self.state.write().loading.saved = true;
        let outcome = self.repository.saved_versions().await;
        let mut state = self.state.write();
        state.loading.saved = false;
        state.saved = outcome?;
        Ok(())
    }

    // --- hierarchy and catalog browsing ------------------------------------

    pub async fn load_language_hierarchy(&self) -> Result<()> {
        self.state.write().loading.hierarchy = true;
        let outcome = hierarchy::load_hierarchy(self.repository.mirror()).await;
        let mut state = self.state.write();
        state.loading.hierarchy = false;
        state.hierarchy = outcome?;
        Ok(())
    }

    pub async fn load_available_versions(&self, language_entity_id: &str) -> Result<()> {
        self.state.write().loading.versions = true;
        let outcome = self.repository.available_versions(language_entity_id).await;
        let mut state = self.state.write();
        state.loading.versions = false;
        let (audio, text) = outcome?;
        state.available_audio = audio;
        state.available_text = text;
        Ok(())
    }

    /// Pure in-memory expansion state; persisted lazily with the snapshot
    /// subset, no round-trip of its own.
    pub fn expand_language_node(&self, id: impl Into<String>) {
        self.state.write().expanded_nodes.insert(id.into());
    }

    pub fn collapse_language_node(&self, id: &str) {
        self.state.write().expanded_nodes.remove(id);
    }

    // --- search -----------------------------------------------------------

    /// Debounced language search. Results land asynchronously through the
    /// store; the returned handle resolves when this query is either applied
    /// or superseded.
    pub fn search_languages(self: &Arc<Self>, query: impl Into<String>) -> JoinHandle<()> {
        let query = query.into();

        if query.trim().is_empty() {
            self.debouncer.cancel();
            let mut state = self.state.write();
            state.search_query = query;
            state.search_results.clear();
            state.search_error = None;
            state.loading.search = false;
            return tokio::spawn(async {});
        }

        {
            let mut state = self.state.write();
            state.search_query = query.clone();
            state.loading.search = true;
            state.search_error = None;
        }

        let params = SearchParams {
            search_query: query,
            max_results: self.config.max_results,
            min_similarity: self.config.min_similarity,
            include_regions: self.config.include_regions,
            filter_kind: None,
        };

        let store = Arc::clone(self);
        self.debouncer.submit(params, move |result| {
            store.apply_search_results(result);
        })
    }

    fn apply_search_results(&self, result: Result<Vec<LanguageMatch>>) {
        let mut state = self.state.write();
        state.loading.search = false;
        match result {
            Ok(matches) => {
                debug!(count = matches.len(), "search results applied");
                state.search_results = matches;
            }
            Err(err) => {
                warn!(error = %err, "language search failed");
                state.search_error = Some(err.user_message());
            }
        }
    }

    // --- sync and teardown --------------------------------------------------

    /// Ask the managed sync engine to converge now.
    pub async fn sync_with_cloud(&self) -> Result<()> {
        self.state.write().loading.sync = true;
        let outcome = self.remote.sync().await;
        self.state.write().loading.sync = false;
        outcome
    }

    /// Tear down the session: cancel pending work, null the selection row
    /// (kept, not deleted), drop the durable snapshot, clear the session and
    /// reset in-memory state.
    pub async fn sign_out(&self) -> Result<()> {
        self.debouncer.cancel();
        self.debouncer.clear_cache();

        if let Err(err) = self.repository.clear_current_selections().await {
            warn!(error = %err, "clearing selections on sign-out failed");
        }
        if let Err(err) = self.remote.sign_out().await {
            warn!(error = %err, "remote sign-out failed");
        }
        if let Err(err) = self.snapshots.remove(&self.config.snapshot_key).await {
            warn!(error = %err, "snapshot removal failed");
        }

        self.repository.sessions().sign_out();
        *self.state.write() = State::default();
        info!("selection store signed out");
        Ok(())
    }

    // --- watch wiring -------------------------------------------------------

    /// Spawn the two reconciler tasks feeding watch pushes back into the
    /// store. Tasks hold only a weak reference and exit once the store is
    /// dropped or the watches close.
    pub fn spawn_watchers(self: &Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let mut saved_watch = self.repository.watch_saved_versions();
        let saved_task = tokio::spawn({
            let weak = weak.clone();
            async move {
                while let Some(rows) = saved_watch.next().await {
                    let Some(store) = weak.upgrade() else { break };
                    store.apply_saved_rows(rows);
                }
            }
        });

        let mut selection_watch = self.repository.watch_current_selection();
        let selection_task = tokio::spawn(async move {
            while let Some(row) = selection_watch.next().await {
                let Some(store) = weak.upgrade() else { break };
                store.apply_selection_row(row.as_ref());
            }
        });

        (saved_task, selection_task)
    }

    async fn refresh_saved_best_effort(&self) {
        match self.repository.saved_versions().await {
            Ok(saved) => self.state.write().saved = saved,
            Err(err) => warn!(error = %err, "saved list refresh failed"),
        }
    }

    async fn snapshot_best_effort(&self) {
        if let Err(err) = self.persist_snapshot().await {
            warn!(error = %err, "snapshot persist failed");
        }
    }
}
