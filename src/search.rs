//! Debounced language search.
//!
//! Rapid keystrokes collapse into one remote call: each submitted query
//! aborts the previously pending one, and only the query still standing when
//! the window elapses reaches the remote. A search-key cache short-circuits
//! repeated identical queries without network traffic. Results land through
//! a caller-supplied apply callback because the winning query resolves after
//! the submitting call has already returned.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

use crate::error::Result;
use crate::remote::{LanguageMatch, RemoteStore, SearchParams};

/// Coarse rate limiter for language-alias search.
pub struct SearchDebouncer {
    remote: Arc<dyn RemoteStore>,
    window: Duration,
    pending: Mutex<Option<AbortHandle>>,
    cache: Arc<RwLock<HashMap<String, Vec<LanguageMatch>>>>,
}

impl SearchDebouncer {
    pub fn new(remote: Arc<dyn RemoteStore>, window: Duration) -> Self {
        Self {
            remote,
            window,
            pending: Mutex::new(None),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Schedule a search. Any previously pending query is aborted; `apply`
    /// runs only if this query survives the debounce window.
    pub fn submit(
        &self,
        params: SearchParams,
        apply: impl FnOnce(Result<Vec<LanguageMatch>>) + Send + 'static,
    ) -> JoinHandle<()> {
        let remote = Arc::clone(&self.remote);
        let cache = Arc::clone(&self.cache);
        let window = self.window;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;

            let key = params.cache_key();
            if let Some(hit) = cache.read().get(&key).cloned() {
                debug!(query = %params.search_query, "search served from cache");
                apply(Ok(hit));
                return;
            }

            let result = remote.search_language_aliases_with_versions(&params).await;
            if let Ok(matches) = &result {
                cache.write().insert(key, matches.clone());
            }
            apply(result);
        });

        let mut pending = self.pending.lock();
        if let Some(previous) = pending.replace(handle.abort_handle()) {
            previous.abort();
        }

        handle
    }

    /// Abort any pending query (navigation away, sign-out).
    pub fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }

    /// Drop cached result sets (sign-out, forced refresh).
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }
}
