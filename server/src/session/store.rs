use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Debug, Display};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error type for session store operations
#[derive(Debug)]
pub enum SessionStoreError {
    /// Session could not be encoded for the client
    EncodingError(String),
    /// Error occurred during a store operation
    StorageError(String),
}

impl Display for SessionStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStoreError::EncodingError(msg) => write!(f, "Session encoding error: {}", msg),
            SessionStoreError::StorageError(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl Error for SessionStoreError {}

/// Session data structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub id: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Last time the session was accessed or modified
    pub updated_at: DateTime<Utc>,
    /// Optional time when the session expires
    pub expires_at: Option<DateTime<Utc>>,
    /// Custom session data; values are kept as JSON so nested data is not re-escaped
    pub data: HashMap<String, Value>,
}

impl Session {
    /// Create a new session with the given ID
    pub fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            expires_at: None,
            data: HashMap::new(),
        }
    }

    /// Create a new session with a random ID
    pub fn fresh() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// Set a key-value pair in the session data
    pub fn set(&mut self, key: String, value: Value) {
        self.data.insert(key, value);
        self.updated_at = Utc::now();
    }

    /// Get a value from the session data by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Drop every stored value, keeping the session identity
    pub fn clear_data(&mut self) {
        self.data.clear();
        self.updated_at = Utc::now();
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            Utc::now() > expires_at
        } else {
            false
        }
    }

    /// Set the expiration time for this session
    pub fn set_expiry(&mut self, expires_at: DateTime<Utc>) {
        self.expires_at = Some(expires_at);
        self.updated_at = Utc::now();
    }

    /// Push the expiry `ttl` into the future from now
    pub fn extend_expiry(&mut self, ttl: Duration) {
        self.set_expiry(Utc::now() + ttl);
    }
}

/// Capability interface over per-client session state.
///
/// The cookie value is opaque to callers: it may carry the whole session
/// (signed cookie) or only a key into server-side storage.
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Load the session named by the cookie value; absent, invalid or expired
    /// cookies yield a fresh empty session
    async fn get(&self, cookie: Option<&str>) -> Result<Session, SessionStoreError>;

    /// Persist the session and return the cookie value the client must hold
    async fn put(&self, session: Session) -> Result<String, SessionStoreError>;

    /// Drop all data held by the session, persist it, and return the cookie value
    async fn clear(&self, session: Session) -> Result<String, SessionStoreError>;

    /// Lifetime granted to a session on every `put`
    fn ttl(&self) -> Duration;
}

/// Type alias for Arc-wrapped SessionStore trait objects
pub type SessionStoreRef = Arc<dyn SessionStore>;
