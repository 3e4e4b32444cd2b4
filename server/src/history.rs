use chat_relay_core::{ConversationHistory, Turn};
use serde::Deserialize;
use tracing::warn;

use crate::session::Session;

/// Session data key holding the serialized conversation
pub const HISTORY_KEY: &str = "history";

/// Conversation stored in the session; empty when absent or unreadable
pub fn get_history(session: &Session) -> ConversationHistory {
    let stored = match session.get(HISTORY_KEY) {
        Some(stored) => stored,
        None => return ConversationHistory::new(),
    };

    Vec::<Turn>::deserialize(stored)
        .map(ConversationHistory::from)
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to parse conversation history from session, returning empty history");
            ConversationHistory::new()
        })
}

/// Append turns to the stored conversation, keeping only the most recent entries
pub fn append_history<I>(session: &mut Session, turns: I)
where
    I: IntoIterator<Item = Turn>,
{
    let mut history = get_history(session);
    history.append(turns);
    store_history(session, &history);
}

/// Make sure the session holds a (possibly empty) conversation and return it
pub fn ensure_history(session: &mut Session) -> ConversationHistory {
    let history = get_history(session);
    if session.get(HISTORY_KEY).is_none() {
        store_history(session, &history);
    }
    history
}

fn store_history(session: &mut Session, history: &ConversationHistory) {
    match serde_json::to_value(history) {
        Ok(value) => session.set(HISTORY_KEY.to_string(), value),
        Err(e) => warn!(error = %e, "Failed to serialize conversation history"),
    }
}
