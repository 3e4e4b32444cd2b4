use crate::coordinator::{self, ChatReply, ResetReply};
use crate::history::ensure_history;
use crate::page::render_page;
use crate::session::cookie::{read_session_cookie, session_cookie_header};
use crate::session::{Session, SessionStore, SessionStoreError, SessionStoreRef};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chat_relay_core::{RelayConfig, RelayError, VertexClient};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    config: Arc<RelayConfig>,
    client: Arc<VertexClient>,
    sessions: SessionStoreRef,
}

impl AppState {
    pub fn new(config: Arc<RelayConfig>, client: VertexClient, sessions: SessionStoreRef) -> Self {
        Self {
            config,
            client: Arc::new(client),
            sessions,
        }
    }

    async fn load_session(&self, headers: &HeaderMap) -> Result<Session, ApiError> {
        let cookie = read_session_cookie(headers);
        Ok(self.sessions.get(cookie.as_deref()).await?)
    }

    async fn save_session(&self, session: Session) -> Result<HeaderMap, ApiError> {
        let cookie = self.sessions.put(session).await?;
        self.cookie_headers(&cookie)
    }

    fn cookie_headers(&self, cookie: &str) -> Result<HeaderMap, ApiError> {
        let (name, value) = session_cookie_header(cookie, self.sessions.ttl())?;
        let mut headers = HeaderMap::new();
        headers.insert(name, value);
        Ok(headers)
    }
}

/// Error body returned by every failing route
#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
}

/// Error type for HTTP server
#[derive(Debug)]
pub enum ApiError {
    Relay(RelayError),
    Session(SessionStoreError),
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self::Relay(e)
    }
}

impl From<SessionStoreError> for ApiError {
    fn from(e: SessionStoreError) -> Self {
        Self::Session(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Relay(RelayError::ValidationError(_)) => StatusCode::BAD_REQUEST,
            Self::Relay(RelayError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Relay(e) if e.is_upstream() => StatusCode::BAD_GATEWAY,
            Self::Relay(_) | Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Relay(e) => e.to_string(),
            Self::Session(e) => e.to_string(),
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %message, "Request rejected");
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Build the router with all routes and layers
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/chat", post(chat))
        .route("/reset", post(reset))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn run_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;

    axum::serve(listener, router(state))
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server failed: {}", e))
}

/// Chat page showing the current conversation
async fn index(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let mut session = state.load_session(&headers).await?;
    let history = ensure_history(&mut session);
    let cookie_headers = state.save_session(session).await?;

    Ok((cookie_headers, Html(render_page(&history))).into_response())
}

/// Handler for chat messages
async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(HeaderMap, Json<ChatReply>), ApiError> {
    let mut session = state.load_session(&headers).await?;
    let reply = coordinator::handle_chat(&state.config, &state.client, &mut session, &body).await?;
    let cookie_headers = state.save_session(session).await?;

    Ok((cookie_headers, Json(reply)))
}

/// Handler for clearing the conversation
async fn reset(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<ResetReply>), ApiError> {
    let session = state.load_session(&headers).await?;
    let (cookie, reply) = coordinator::handle_reset(state.sessions.as_ref(), session).await?;

    Ok((state.cookie_headers(&cookie)?, Json(reply)))
}
