use crate::llm::{ChatTurn, Role};
use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 5;

/// Rolling window over the most recent user and assistant turns.
///
/// Whether the window is consulted at all is decided by the caller; this type
/// only keeps the bound.
#[derive(Debug)]
pub struct ConversationMemory {
    capacity: usize,
    turns: VecDeque<ChatTurn>,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl ConversationMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            turns: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append a turn and evict the oldest entries beyond the window.
    /// System turns are never remembered.
    pub fn append(&mut self, turn: ChatTurn) {
        if turn.role == Role::System {
            return;
        }
        self.turns.push_back(turn);
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
    }

    /// Remembered turns, oldest first.
    pub fn window(&self) -> Vec<ChatTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn reset(&mut self) {
        self.turns.clear();
    }
}
