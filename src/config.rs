//! Tuning knobs for the selection core.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the selection store and its collaborators.
///
/// Constructed once at app start and passed by value; there is no global
/// configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Debounce window applied to language search queries, in milliseconds.
    pub search_debounce_ms: u64,
    /// Capacity of the change-notification broadcast channel; threaded into
    /// `SqliteMirror::open_with_capacity`.
    pub watch_capacity: usize,
    /// Namespaced key under which the durable state subset is stored.
    pub snapshot_key: String,
    /// Maximum number of search results requested from the remote.
    pub max_results: u32,
    /// Minimum similarity for fuzzy language-alias matches.
    pub min_similarity: f32,
    /// Whether regional dialect aliases are included in search results.
    pub include_regions: bool,
}

impl SelectionConfig {
    /// The search debounce window as a `Duration`.
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: 400,
            watch_capacity: 1024,
            snapshot_key: "verselect/selection".to_string(),
            max_results: 20,
            min_similarity: 0.3,
            include_regions: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SelectionConfig::default();
        assert_eq!(config.search_debounce(), Duration::from_millis(400));
        assert_eq!(config.max_results, 20);
        assert!(config.include_regions);
    }

    #[test]
    fn test_config_round_trips_as_json() {
        let config = SelectionConfig {
            search_debounce_ms: 250,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let loaded: SelectionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.search_debounce_ms, 250);
        assert_eq!(loaded.snapshot_key, "verselect/selection");
    }
}
