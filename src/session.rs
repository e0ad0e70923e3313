//! Session resolution for user-scoped rows.
//!
//! The actual auth provider is an external collaborator; this module only
//! tracks the currently resolved session. Anonymous sessions carry a locally
//! generated user id and are first-class: they can save and remove versions
//! like any other session. Only a fully absent session is refused by write
//! paths.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Whether the session was issued by the auth provider or generated locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Anonymous,
    Authenticated,
}

/// A resolved user session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub kind: SessionKind,
}

impl Session {
    /// A locally generated anonymous session.
    pub fn anonymous() -> Self {
        Self {
            user_id: format!("anon-{}", Uuid::new_v4()),
            kind: SessionKind::Anonymous,
        }
    }

    /// A session backed by the auth provider.
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            kind: SessionKind::Authenticated,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.kind == SessionKind::Anonymous
    }
}

/// Shared holder for the current session.
///
/// Cloned handles observe the same slot. There is exactly one logical writer
/// (the auth flow), so a plain RwLock suffices.
#[derive(Clone, Default)]
pub struct SessionProvider {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider pre-populated with a session (handy for tests).
    pub fn with_session(session: Session) -> Self {
        let provider = Self::new();
        provider.sign_in(session);
        provider
    }

    pub fn current(&self) -> Option<Session> {
        self.inner.read().clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.read().as_ref().map(|s| s.user_id.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.inner.read().is_some()
    }

    pub fn sign_in(&self, session: Session) {
        debug!(user_id = %session.user_id, kind = ?session.kind, "session established");
        *self.inner.write() = Some(session);
    }

    pub fn sign_out(&self) {
        debug!("session cleared");
        *self.inner.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_ids_are_unique() {
        let a = Session::anonymous();
        let b = Session::anonymous();
        assert_ne!(a.user_id, b.user_id);
        assert!(a.user_id.starts_with("anon-"));
        assert!(a.is_anonymous());
    }

    #[test]
    fn test_provider_sign_in_out() {
        let provider = SessionProvider::new();
        assert!(!provider.is_signed_in());
        assert!(provider.user_id().is_none());

        provider.sign_in(Session::authenticated("u-1"));
        assert_eq!(provider.user_id().as_deref(), Some("u-1"));
        assert!(!provider.current().unwrap().is_anonymous());

        provider.sign_out();
        assert!(!provider.is_signed_in());
    }

    #[test]
    fn test_cloned_handles_share_slot() {
        let provider = SessionProvider::new();
        let handle = provider.clone();
        provider.sign_in(Session::anonymous());
        assert!(handle.is_signed_in());
    }
}
