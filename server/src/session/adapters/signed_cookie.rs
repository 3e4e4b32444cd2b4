use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::session::store::{Session, SessionStore, SessionStoreError};

type HmacSha256 = Hmac<Sha256>;

/// Largest cookie browsers reliably store; bigger ones are silently dropped
pub const MAX_COOKIE_BYTES: usize = 4096;

/// Keeps the whole session client-side as `<payload>.<signature>`, where the
/// payload is base64url JSON and the signature is HMAC-SHA256 over the payload.
/// Nothing is stored on the server.
pub struct SignedCookieSessionStore {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for SignedCookieSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedCookieSessionStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SignedCookieSessionStore {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl,
        }
    }

    fn mac(&self) -> Result<HmacSha256, SessionStoreError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SessionStoreError::EncodingError(format!("Invalid secret key: {}", e)))
    }

    fn encode(&self, session: &Session) -> Result<String, SessionStoreError> {
        let json = serde_json::to_vec(session).map_err(|e| {
            SessionStoreError::EncodingError(format!("Failed to serialize session: {}", e))
        })?;
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        let cookie = format!("{}.{}", payload, signature);
        if cookie.len() > MAX_COOKIE_BYTES {
            warn!(
                session = %session.id,
                bytes = cookie.len(),
                limit = MAX_COOKIE_BYTES,
                "Session cookie exceeds browser limit and will likely be dropped; consider the memory backend"
            );
        }
        Ok(cookie)
    }

    /// None for anything malformed, unsigned, tampered with or expired
    fn decode(&self, cookie: &str) -> Option<Session> {
        let (payload, signature) = cookie.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = self.mac().ok()?;
        mac.update(payload.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            debug!("Rejected session cookie with bad signature");
            return None;
        }

        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let session: Session = serde_json::from_slice(&json).ok()?;
        if session.is_expired() {
            debug!("Session expired: {}", session.id);
            return None;
        }
        Some(session)
    }
}

#[async_trait]
impl SessionStore for SignedCookieSessionStore {
    async fn get(&self, cookie: Option<&str>) -> Result<Session, SessionStoreError> {
        Ok(cookie
            .and_then(|value| self.decode(value))
            .unwrap_or_else(Session::fresh))
    }

    async fn put(&self, mut session: Session) -> Result<String, SessionStoreError> {
        session.extend_expiry(self.ttl);
        self.encode(&session)
    }

    async fn clear(&self, mut session: Session) -> Result<String, SessionStoreError> {
        session.clear_data();
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

    fn store() -> SignedCookieSessionStore {
        SignedCookieSessionStore::new("test-secret", Duration::minutes(30))
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = store();
        let mut session = store.get(None).await.unwrap();
        session.set("history".to_string(), json!([{"role": "user", "text": "hi"}]));

        let cookie = store.put(session.clone()).await.unwrap();
        let loaded = store.get(Some(cookie.as_str())).await.unwrap();

        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.get("history"), session.get("history"));
    }

    #[tokio::test]
    async fn test_cookie_is_header_safe() {
        let store = store();
        let mut session = Session::fresh();
        session.set("history".to_string(), json!("quotes \" and ; semicolons"));

        let cookie = store.put(session).await.unwrap();
        assert!(cookie
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
    }

    #[tokio::test]
    async fn test_full_history_of_short_turns_fits_in_one_cookie() {
        let store = store();
        let turns: Vec<_> = (0..20)
            .map(|i| json!({"role": if i % 2 == 0 { "user" } else { "model" }, "text": format!("{:0>60}", i)}))
            .collect();
        let mut session = Session::fresh();
        session.set("history".to_string(), json!(turns));

        let cookie = store.put(session).await.unwrap();
        assert!(cookie.len() < MAX_COOKIE_BYTES, "cookie is {} bytes", cookie.len());

        let (payload, _) = cookie.split_once('.').unwrap();
        let raw = String::from_utf8(URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        assert!(!raw.contains("\\\""), "history should not be escaped twice");
    }

    #[tokio::test]
    async fn test_tampered_payload_is_rejected() {
        let store = store();
        let mut session = Session::fresh();
        session.set("history".to_string(), json!([]));
        let cookie = store.put(session.clone()).await.unwrap();

        let (_, signature) = cookie.split_once('.').unwrap();
        let mut forged = session.clone();
        forged.set("history".to_string(), json!("forged"));
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let forged_cookie = format!("{}.{}", forged_payload, signature);

        let loaded = store.get(Some(forged_cookie.as_str())).await.unwrap();
        assert_ne!(loaded.id, session.id);
        assert!(loaded.data.is_empty());
    }

    #[tokio::test]
    async fn test_other_secret_is_rejected() {
        let cookie = store().put(Session::fresh()).await.unwrap();
        let other = SignedCookieSessionStore::new("different", Duration::minutes(30));

        let loaded = other.get(Some(cookie.as_str())).await.unwrap();
        assert!(loaded.data.is_empty());
        assert!(loaded.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_garbage_yields_fresh_session() {
        let store = store();
        for junk in ["", "nodot", "a.b", "!!!.???"] {
            let session = store.get(Some(junk)).await.unwrap();
            assert!(session.data.is_empty());
        }
    }

    #[tokio::test]
    async fn test_expired_cookie_yields_fresh_session() {
        let store = SignedCookieSessionStore::new("test-secret", Duration::seconds(-5));
        let mut session = Session::fresh();
        session.set("k".to_string(), json!("v"));
        let cookie = store.put(session.clone()).await.unwrap();

        let loaded = store.get(Some(cookie.as_str())).await.unwrap();
        assert_ne!(loaded.id, session.id);
    }

    #[tokio::test]
    async fn test_clear_drops_data_keeps_id() {
        let store = store();
        let mut session = Session::fresh();
        session.set("history".to_string(), json!(["..."]));

        let cookie = store.clear(session.clone()).await.unwrap();
        let loaded = store.get(Some(cookie.as_str())).await.unwrap();
        assert_eq!(loaded.id, session.id);
        assert!(loaded.data.is_empty());
    }
}
