use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, warn};

use crate::session::store::{Session, SessionStore, SessionStoreError};

/// In-memory implementation of SessionStore; the cookie carries only the session id
#[derive(Debug)]
pub struct InMemorySessionStore {
    /// Thread-safe storage of sessions
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    /// Create a new InMemorySessionStore
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Delete expired sessions, returning how many were removed
    pub fn cleanup_expired_sessions(&self) -> Result<usize, SessionStoreError> {
        let mut sessions = self.sessions.write().map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to acquire write lock: {}", e))
        })?;

        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, session| match session.expires_at {
            Some(expires_at) => expires_at >= now,
            None => true,
        });

        let count = before - sessions.len();
        if count > 0 {
            warn!("Cleaned up {} expired sessions", count);
        }

        Ok(count)
    }

    /// Number of sessions currently held, expired or not
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, cookie: Option<&str>) -> Result<Session, SessionStoreError> {
        let Some(id) = cookie else {
            return Ok(Session::fresh());
        };

        let sessions = self.sessions.read().map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to acquire read lock: {}", e))
        })?;

        match sessions.get(id) {
            Some(session) if !session.is_expired() => Ok(session.clone()),
            Some(_) => {
                debug!("Session expired: {}", id);
                Ok(Session::fresh())
            }
            None => Ok(Session::fresh()),
        }
    }

    async fn put(&self, mut session: Session) -> Result<String, SessionStoreError> {
        session.extend_expiry(self.ttl);

        let mut sessions = self.sessions.write().map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to acquire write lock: {}", e))
        })?;

        let id = session.id.clone();
        sessions.insert(id.clone(), session);
        Ok(id)
    }

    async fn clear(&self, mut session: Session) -> Result<String, SessionStoreError> {
        session.clear_data();
        debug!("Cleared session: {}", session.id);
        self.put(session).await
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::test;

    #[test]
    async fn test_unknown_cookie_yields_fresh_session() {
        let store = InMemorySessionStore::new(Duration::minutes(5));

        let a = store.get(None).await.unwrap();
        let b = store.get(Some("missing")).await.unwrap();
        assert!(a.data.is_empty());
        assert!(b.data.is_empty());
        assert_ne!(b.id, "missing");
    }

    #[test]
    async fn test_put_then_get() {
        let store = InMemorySessionStore::new(Duration::minutes(5));

        let mut session = store.get(None).await.unwrap();
        session.set("key1".to_string(), json!("value1"));
        let cookie = store.put(session.clone()).await.unwrap();
        assert_eq!(cookie, session.id);

        let retrieved = store.get(Some(cookie.as_str())).await.unwrap();
        assert_eq!(retrieved.id, session.id);
        assert_eq!(retrieved.get("key1"), Some(&json!("value1")));
        assert!(retrieved.expires_at.is_some());
    }

    #[test]
    async fn test_clear_keeps_identity() {
        let store = InMemorySessionStore::new(Duration::minutes(5));

        let mut session = store.get(None).await.unwrap();
        session.set("history".to_string(), json!([1]));
        let cookie = store.put(session).await.unwrap();

        let loaded = store.get(Some(cookie.as_str())).await.unwrap();
        let cleared_cookie = store.clear(loaded).await.unwrap();
        assert_eq!(cleared_cookie, cookie);

        let reloaded = store.get(Some(cookie.as_str())).await.unwrap();
        assert!(reloaded.data.is_empty());
    }

    #[test]
    async fn test_session_expiry_and_cleanup() {
        let store = InMemorySessionStore::new(Duration::seconds(-1));

        let mut session = store.get(None).await.unwrap();
        session.set("key".to_string(), json!("value"));
        let cookie = store.put(session).await.unwrap();
        assert_eq!(store.len(), 1);

        let result = store.get(Some(cookie.as_str())).await.unwrap();
        assert_ne!(result.id, cookie);
        assert!(result.data.is_empty());

        let cleaned = store.cleanup_expired_sessions().unwrap();
        assert_eq!(cleaned, 1);
        assert!(store.is_empty());
    }
}
