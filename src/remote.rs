//! The remote store contract.
//!
//! The hosted backend exposes auth calls and RPC-style fuzzy search over
//! language aliases. Code depends on the [`RemoteStore`] trait, not a
//! concrete client; the real client lives with the app shell. The table
//! traffic itself flows through the managed sync engine into the mirror and
//! is not part of this trait.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hierarchy::LanguageLevel;
use crate::model::{AudioVersion, TextVersion, VersionKind};
use crate::session::Session;

/// Parameters for the `search_language_aliases*` RPCs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub search_query: String,
    pub max_results: u32,
    pub min_similarity: f32,
    pub include_regions: bool,
    /// Restrict results to languages carrying this kind of version.
    pub filter_kind: Option<VersionKind>,
}

impl SearchParams {
    /// Cache key covering every parameter that affects the result set.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.search_query.trim().to_lowercase(),
            self.max_results,
            self.min_similarity,
            self.include_regions,
            self.filter_kind.map(|k| k.as_str()).unwrap_or("any"),
        )
    }
}

/// A ranked language-alias match, annotated with version counts and,
/// for the `_with_versions` RPC, nested version details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageMatch {
    pub entity_id: String,
    pub alias_name: String,
    pub canonical_name: String,
    pub level: LanguageLevel,
    pub similarity: f32,
    pub audio_version_count: u32,
    pub text_version_count: u32,
    #[serde(default)]
    pub audio_versions: Vec<AudioVersion>,
    #[serde(default)]
    pub text_versions: Vec<TextVersion>,
}

/// Authenticated request/response surface of the hosted backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Establish an anonymous session with the auth provider.
    async fn sign_in_anonymous(&self) -> Result<Session>;

    /// Tear down the current session server-side.
    async fn sign_out(&self) -> Result<()>;

    /// Ranked fuzzy search over language aliases.
    async fn search_language_aliases(&self, params: &SearchParams) -> Result<Vec<LanguageMatch>>;

    /// Same, with version details nested into each match.
    async fn search_language_aliases_with_versions(
        &self,
        params: &SearchParams,
    ) -> Result<Vec<LanguageMatch>>;

    /// Ask the managed sync engine to push/pull now rather than waiting for
    /// its own schedule.
    async fn sync(&self) -> Result<()>;
}

/// Canned-response remote (testing and development).
///
/// Serves matches from a fixed list by case-insensitive substring, records
/// every executed search query, and counts sync calls.
#[derive(Default)]
pub struct StaticRemote {
    matches: RwLock<Vec<LanguageMatch>>,
    queries: RwLock<Vec<String>>,
    syncs: RwLock<u32>,
}

impl StaticRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matches(matches: Vec<LanguageMatch>) -> Self {
        Self {
            matches: RwLock::new(matches),
            ..Default::default()
        }
    }

    /// Queries that actually reached this remote, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.read().clone()
    }

    pub fn search_count(&self) -> usize {
        self.queries.read().len()
    }

    pub fn sync_count(&self) -> u32 {
        *self.syncs.read()
    }

    fn execute(&self, params: &SearchParams) -> Vec<LanguageMatch> {
        self.queries.write().push(params.search_query.clone());

        let needle = params.search_query.trim().to_lowercase();
        self.matches
            .read()
            .iter()
            .filter(|m| {
                m.alias_name.to_lowercase().contains(&needle)
                    || m.canonical_name.to_lowercase().contains(&needle)
            })
            .filter(|m| m.similarity >= params.min_similarity)
            .filter(|m| match params.filter_kind {
                Some(VersionKind::Audio) => m.audio_version_count > 0,
                Some(VersionKind::Text) => m.text_version_count > 0,
                None => true,
            })
            .filter(|m| params.include_regions || m.level != LanguageLevel::Dialect)
            .take(params.max_results as usize)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RemoteStore for StaticRemote {
    async fn sign_in_anonymous(&self) -> Result<Session> {
        Ok(Session::anonymous())
    }

    async fn sign_out(&self) -> Result<()> {
        Ok(())
    }

    async fn search_language_aliases(&self, params: &SearchParams) -> Result<Vec<LanguageMatch>> {
        let mut matches = self.execute(params);
        for m in &mut matches {
            m.audio_versions.clear();
            m.text_versions.clear();
        }
        Ok(matches)
    }

    async fn search_language_aliases_with_versions(
        &self,
        params: &SearchParams,
    ) -> Result<Vec<LanguageMatch>> {
        Ok(self.execute(params))
    }

    async fn sync(&self) -> Result<()> {
        *self.syncs.write() += 1;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod doubles {
    use super::*;

    pub fn language_match(entity_id: &str, name: &str, audio: u32, text: u32) -> LanguageMatch {
        LanguageMatch {
            entity_id: entity_id.to_string(),
            alias_name: name.to_string(),
            canonical_name: name.to_string(),
            level: LanguageLevel::Language,
            similarity: 0.9,
            audio_version_count: audio,
            text_version_count: text,
            audio_versions: Vec::new(),
            text_versions: Vec::new(),
        }
    }
}
