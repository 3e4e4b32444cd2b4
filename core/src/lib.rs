// Core relay functionality:
// - Vertex AI client and wire types
// - Service-account credentials
// - Conversation history, formatting and reply extraction
// - Configuration loading
// - Shared error types

pub mod auth;
pub use auth::{ServiceAccountTokenProvider, StaticTokenProvider, TokenProvider, TokenProviderRef};

pub mod client;
pub use client::VertexClient;

pub mod config;
pub use config::{ConfigOverrides, RelayConfig, SessionBackend};

pub mod errors;
pub use errors::{RelayError, RelayResult};

pub mod extractor;
pub use extractor::extract_reply;

pub mod formatter;
pub use formatter::format_contents;

pub mod history;
pub use history::{ConversationHistory, MAX_HISTORY_TURNS};

pub mod types;
pub use types::*;
