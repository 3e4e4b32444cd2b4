use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

use crate::auth::TokenProviderRef;
use crate::config::RelayConfig;
use crate::errors::{RelayError, RelayResult};
use crate::extractor::extract_reply;
use crate::types::{Content, GenerateContentRequest};

/// Client for the Vertex AI `generateContent` endpoint
#[derive(Debug, Clone)]
pub struct VertexClient {
    client: Client,
    config: Arc<RelayConfig>,
    tokens: TokenProviderRef,
}

impl VertexClient {
    /// Create a new client; every call is bounded by the configured timeout
    pub fn new(config: Arc<RelayConfig>, tokens: TokenProviderRef) -> RelayResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| RelayError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            tokens,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Sends `contents` and returns the decoded response body as-is
    pub async fn generate_content(&self, contents: Vec<Content>) -> RelayResult<Value> {
        let token = self.tokens.access_token().await?;
        let url = self.config.endpoint_url();
        let request = GenerateContentRequest {
            contents,
            generation_config: self.config.generation_config(),
        };

        debug!(url = %url, blocks = request.contents.len(), "Calling generateContent");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error("Failed to send request", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .map_err(|e| self.transport_error("Failed to read error response", e))?;

            error!(status = status.as_u16(), "generateContent returned an error status");
            return Err(RelayError::HttpError {
                status_code: status.as_u16(),
                message: format!("API request failed: {}", error_body),
            });
        }

        // The timeout also covers the body, so read it before decoding.
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error("Failed to read response", e))?;

        serde_json::from_slice(&body)
            .map_err(|e| RelayError::ParsingError(format!("Failed to parse response: {}", e)))
    }

    fn transport_error(&self, context: &str, e: reqwest::Error) -> RelayError {
        if e.is_timeout() {
            RelayError::Timeout(format!(
                "No response within {}s",
                self.config.request_timeout_secs
            ))
        } else {
            RelayError::RequestError(format!("{}: {}", context, e))
        }
    }

    /// Sends `contents` and returns the reply text (or the raw body on an unexpected shape)
    pub async fn generate_reply(&self, contents: Vec<Content>) -> RelayResult<String> {
        let body = self.generate_content(contents).await?;
        Ok(extract_reply(&body))
    }
}
