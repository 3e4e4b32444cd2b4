use serde::{Deserialize, Serialize};

use crate::types::Turn;

/// Maximum number of turns kept per session (ten user/model pairs)
pub const MAX_HISTORY_TURNS: usize = 20;

/// Chronological, capped list of turns belonging to one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `turns` and drops the oldest entries beyond the cap
    pub fn append<I>(&mut self, turns: I)
    where
        I: IntoIterator<Item = Turn>,
    {
        self.turns.extend(turns);
        if self.turns.len() > MAX_HISTORY_TURNS {
            let excess = self.turns.len() - MAX_HISTORY_TURNS;
            self.turns.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

// Stored histories may predate the cap, so loading truncates too.
impl From<Vec<Turn>> for ConversationHistory {
    fn from(turns: Vec<Turn>) -> Self {
        let mut history = Self::new();
        history.append(turns);
        history
    }
}
