//! Conversation history shared across topics.
//!
//! Keeps a sliding window of plain-text turns. Tool-use rounds are not
//! stored; only the text each side ended up saying.

use claude::{Message, Role};
use serde::{Deserialize, Serialize};

/// Default number of messages kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 40;

/// A stored turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: Role,
    pub content: String,
}

/// Ordered history of the creation conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMemory {
    messages: Vec<StoredMessage>,
    limit: usize,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Keep at most `limit` messages (minimum 2, one exchange).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            messages: Vec::new(),
            limit: limit.max(2),
        }
    }

    pub fn add_user_message(&mut self, content: &str) {
        self.push(Role::User, content);
    }

    pub fn add_assistant_message(&mut self, content: &str) {
        self.push(Role::Assistant, content);
    }

    /// Messages for an API call.
    pub fn get_messages(&self) -> Vec<Message> {
        self.messages
            .iter()
            .map(|m| match m.role {
                Role::User => Message::user(&m.content),
                Role::Assistant => Message::assistant(&m.content),
            })
            .collect()
    }

    pub fn messages(&self) -> &[StoredMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Consecutive turns from the same side are merged so roles alternate.
    fn push(&mut self, role: Role, content: &str) {
        match self.messages.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(content);
            }
            _ => self.messages.push(StoredMessage {
                role,
                content: content.to_string(),
            }),
        }
        self.trim_history();
    }

    /// Drop the oldest turns; the window always opens on a user turn.
    fn trim_history(&mut self) {
        let mut excess = self.messages.len().saturating_sub(self.limit);
        while excess < self.messages.len()
            && self.messages.get(excess).map(|m| m.role) == Some(Role::Assistant)
        {
            excess += 1;
        }
        if excess > 0 {
            self.messages.drain(..excess);
        }
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_in_order() {
        let mut memory = ConversationMemory::new();
        memory.add_user_message("I want to be an elf");
        memory.add_assistant_message("High elf or wood elf?");

        let messages = memory.get_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].text(), "High elf or wood elf?");
    }

    #[test]
    fn test_same_role_turns_merge() {
        let mut memory = ConversationMemory::new();
        memory.add_user_message("one");
        memory.add_user_message("two");

        assert_eq!(memory.len(), 1);
        assert_eq!(memory.messages()[0].content, "one\n\ntwo");
    }

    #[test]
    fn test_window_starts_with_user() {
        let mut memory = ConversationMemory::with_limit(3);
        for i in 0..4 {
            memory.add_user_message(&format!("q{i}"));
            memory.add_assistant_message(&format!("a{i}"));
        }

        assert!(memory.len() <= 3);
        assert_eq!(memory.messages()[0].role, Role::User);
        assert_eq!(memory.messages().last().unwrap().content, "a3");
    }

    #[test]
    fn test_minimum_limit() {
        let mut memory = ConversationMemory::with_limit(0);
        memory.add_user_message("q");
        memory.add_assistant_message("a");
        assert_eq!(memory.len(), 2);
    }
}
