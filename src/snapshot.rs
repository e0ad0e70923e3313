//! Durable client storage for the persisted state subset.
//!
//! Only the current selections, expanded hierarchy nodes, and the last search
//! query survive a process restart; everything else is rebuilt on cold start.
//! The subset is serialized as JSON under a single namespaced key; the
//! expanded-node set becomes a sorted array on write and a set again on read.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::model::{AudioVersion, TextVersion};

/// Key-value durable storage, as exposed by the host platform.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// The durable subset of the selection state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub current_audio: Option<AudioVersion>,
    pub current_text: Option<TextVersion>,
    /// Sorted for stable serialization; rebuilt into a set on restore.
    pub expanded_nodes: Vec<String>,
    pub search_query: String,
}

impl PersistedState {
    pub fn expanded_set(&self) -> HashSet<String> {
        self.expanded_nodes.iter().cloned().collect()
    }

    pub fn set_expanded(&mut self, nodes: &HashSet<String>) {
        let mut sorted: Vec<String> = nodes.iter().cloned().collect();
        sorted.sort();
        self.expanded_nodes = sorted;
    }
}

/// In-memory storage (testing and development).
#[derive(Clone, Default)]
pub struct MemorySnapshots {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySnapshots {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStorage for MemorySnapshots {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.data.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.data.write().remove(key);
        Ok(())
    }
}

/// File-backed storage: one JSON object mapping keys to serialized values.
pub struct FileSnapshots {
    path: PathBuf,
}

impl FileSnapshots {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn read_map(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string(map)?;
        tokio::fs::write(&self.path, contents).await?;
        debug!(path = %self.path.display(), "snapshot file written");
        Ok(())
    }
}

#[async_trait]
impl SnapshotStorage for FileSnapshots {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map().await?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value);
        self.write_map(&map).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read_map().await?;
        if map.remove(key).is_some() {
            self.write_map(&map).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;

    #[tokio::test]
    async fn test_memory_snapshots_round_trip() {
        let storage = MemorySnapshots::new();
        assert!(storage.get("k").await.unwrap().is_none());

        storage.set("k", "v".to_string()).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("v"));

        storage.remove("k").await.unwrap();
        assert!(storage.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_snapshots_round_trip() {
        let path = std::env::temp_dir().join(format!("verselect-test-{}.json", uuid::Uuid::new_v4()));
        let storage = FileSnapshots::new(&path);

        assert!(storage.get("k").await.unwrap().is_none());
        storage.set("k", "v1".to_string()).await.unwrap();
        storage.set("k2", "v2".to_string()).await.unwrap();

        // A fresh handle reads what the first one wrote.
        let reopened = FileSnapshots::new(&path);
        assert_eq!(reopened.get("k").await.unwrap().as_deref(), Some("v1"));
        assert_eq!(reopened.get("k2").await.unwrap().as_deref(), Some("v2"));

        reopened.remove("k").await.unwrap();
        assert!(reopened.get("k").await.unwrap().is_none());

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[test]
    fn test_persisted_state_expanded_set_conversion() {
        let mut state = PersistedState::default();
        let expanded: HashSet<String> =
            ["en".to_string(), "de".to_string(), "fam".to_string()].into();
        state.set_expanded(&expanded);

        // Sorted on write, equal as a set on read.
        assert_eq!(state.expanded_nodes, vec!["de", "en", "fam"]);
        assert_eq!(state.expanded_set(), expanded);
    }

    #[test]
    fn test_persisted_state_json_shape() {
        let state = PersistedState {
            current_audio: Some(fixtures::audio("a1", "KJV Audio")),
            current_text: None,
            expanded_nodes: vec!["fam".to_string()],
            search_query: "eng".to_string(),
        };
        let json = serde_json::to_string(&state).unwrap();
        let loaded: PersistedState = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.current_audio.unwrap().id, "a1");
    }
}
