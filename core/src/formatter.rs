use crate::history::ConversationHistory;
use crate::types::{Content, Role};

/// Prefix marking the leading block as instructions rather than user input.
/// The endpoint has no system slot in this usage, so instructions travel as a user turn.
pub const SYSTEM_MARKER: &str = "[SYSTEM INSTRUCTIONS]";

/// Builds the `contents` array for one call: instructions, history, then the new message.
pub fn format_contents(
    system_prompt: &str,
    history: &ConversationHistory,
    user_message: &str,
) -> Vec<Content> {
    let mut contents = Vec::with_capacity(history.len() + 2);

    contents.push(Content::text(
        Role::User.as_str(),
        format!("{}\n{}", SYSTEM_MARKER, system_prompt),
    ));

    // Role already collapses every non-user speaker to `model`.
    for turn in history.turns() {
        contents.push(Content::text(turn.role.as_str(), turn.text.clone()));
    }

    contents.push(Content::text(Role::User.as_str(), user_message));
    contents
}
