//! Bearer tokens for the Vertex AI endpoint.
//!
//! Tokens come from a service-account key via the OAuth2 JWT-bearer grant and
//! are fetched fresh for every call; nothing is cached between requests.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{RelayError, RelayResult};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Source of bearer tokens for outbound API calls
#[async_trait]
pub trait TokenProvider: Send + Sync + Debug {
    /// Returns a token valid for at least the duration of one request
    async fn access_token(&self) -> RelayResult<String>;
}

/// Type alias for Arc-wrapped TokenProvider trait objects
pub type TokenProviderRef = Arc<dyn TokenProvider>;

/// Fields of a service-account key file used for the token exchange
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn load(path: &Path) -> RelayResult<Self> {
        if !path.exists() {
            return Err(RelayError::CredentialError(format!(
                "Service account file not found: {}",
                path.display()
            )));
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            RelayError::CredentialError(format!(
                "Failed to read service account file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&raw).map_err(|e| {
            RelayError::CredentialError(format!("Invalid service account file: {}", e))
        })
    }

    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges a signed JWT assertion for an access token on every call.
/// The key file is re-read each time, so a missing file fails only the request at hand.
#[derive(Debug, Clone)]
pub struct ServiceAccountTokenProvider {
    key_path: PathBuf,
    scope: String,
    client: reqwest::Client,
}

impl ServiceAccountTokenProvider {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
            scope: CLOUD_PLATFORM_SCOPE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    fn sign_assertion(&self, key: &ServiceAccountKey) -> RelayResult<String> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &key.client_email,
            scope: &self.scope,
            aud: key.token_uri(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| {
                RelayError::CredentialError(format!(
                    "Failed to parse service account private key: {}",
                    e
                ))
            })?;

        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        jsonwebtoken::encode(&header, &claims, &encoding_key)
            .map_err(|e| RelayError::CredentialError(format!("Failed to sign JWT: {}", e)))
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn access_token(&self) -> RelayResult<String> {
        let key = ServiceAccountKey::load(&self.key_path)?;
        let assertion = self.sign_assertion(&key)?;

        debug!(token_uri = key.token_uri(), "Exchanging service account assertion");

        let response = self
            .client
            .post(key.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .timeout(TOKEN_EXCHANGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                RelayError::CredentialError(format!("Token exchange request failed: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RelayError::CredentialError(format!("Failed to read token response: {}", e))
        })?;

        if !status.is_success() {
            return Err(RelayError::CredentialError(format!(
                "Token exchange failed ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            RelayError::CredentialError(format!("Invalid token response: {}", e))
        })?;

        info!(account = %key.client_email, "Obtained access token");
        Ok(token.access_token)
    }
}

/// Fixed token, for local proxies that inject their own auth and for tests
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> RelayResult<String> {
        Ok(self.token.clone())
    }
}
