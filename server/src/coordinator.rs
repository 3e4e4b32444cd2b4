use chat_relay_core::{format_contents, RelayConfig, RelayError, RelayResult, Turn, VertexClient};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::history::{append_history, get_history};
use crate::session::{Session, SessionStore, SessionStoreError};

/// Successful `/chat` body
#[derive(Debug, Serialize, PartialEq)]
pub struct ChatReply {
    pub reply: String,
}

/// Successful `/reset` body
#[derive(Debug, Serialize, PartialEq)]
pub struct ResetReply {
    pub ok: bool,
}

/// Pull the trimmed `message` field out of a raw request body.
/// The body is parsed as JSON whatever its content type; a missing, null or
/// non-string message counts as empty.
pub fn parse_message(body: &[u8]) -> RelayResult<String> {
    let data: Value = serde_json::from_slice(body)
        .map_err(|_| RelayError::ValidationError("Invalid JSON body".to_string()))?;

    let message = data
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim();

    if message.is_empty() {
        return Err(RelayError::ValidationError("Empty message".to_string()));
    }
    Ok(message.to_string())
}

/// Run one chat exchange against the session's conversation.
///
/// The session is only modified once a reply has been obtained; every error
/// path leaves it exactly as it was.
pub async fn handle_chat(
    config: &RelayConfig,
    client: &VertexClient,
    session: &mut Session,
    body: &[u8],
) -> RelayResult<ChatReply> {
    let message = parse_message(body)?;

    let history = get_history(session);
    let contents = format_contents(&config.system_prompt, &history, &message);
    debug!(
        session = %session.id,
        history_len = history.len(),
        "Constructed request contents"
    );

    let reply = match client.generate_reply(contents).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(session = %session.id, error = %e, "Failed to get reply from model");
            return Err(e);
        }
    };

    append_history(session, [Turn::user(message), Turn::model(reply.clone())]);
    info!(session = %session.id, reply_len = reply.len(), "Chat exchange completed");

    Ok(ChatReply { reply })
}

/// Forget the session's conversation; returns the cookie value to hand back
pub async fn handle_reset(
    sessions: &dyn SessionStore,
    session: Session,
) -> Result<(String, ResetReply), SessionStoreError> {
    info!(session = %session.id, "Resetting conversation");
    let cookie = sessions.clear(session).await?;
    Ok((cookie, ResetReply { ok: true }))
}
