use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use chrono::Duration;

use crate::session::store::SessionStoreError;

pub const SESSION_COOKIE_NAME: &str = "chat_session";

/// Value of the session cookie from the request headers, if any
pub fn read_session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` header carrying the session cookie value
pub fn session_cookie_header(
    value: &str,
    ttl: Duration,
) -> Result<(axum::http::HeaderName, HeaderValue), SessionStoreError> {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE_NAME,
        value,
        ttl.num_seconds().max(0)
    );
    let header = HeaderValue::from_str(&cookie).map_err(|e| {
        SessionStoreError::EncodingError(format!("Cookie is not a valid header value: {}", e))
    })?;
    Ok((SET_COOKIE, header))
}
