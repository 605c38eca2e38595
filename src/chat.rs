//! Quick-notes chat: a per-user message log with canned assistant replies.

use rand::seq::SliceRandom;

use crate::models::{ChatMessage, ChatRole};
use crate::store::{KeyValueStore, StoreError};
use crate::utils;

pub const CHAT_KEY: &str = "chat-messages";

pub const ASSISTANT_RESPONSES: [&str; 10] = [
    "I understand. Tell me more about that.",
    "That's interesting. What else?",
    "I see. How do you feel about that?",
    "That's a good point. Would you like to elaborate?",
    "I appreciate you sharing that. What's on your mind?",
    "That's fascinating. Can you explain further?",
    "I hear you. What are your thoughts?",
    "That's a valid perspective. How did you come to that conclusion?",
    "I understand. What's the most important aspect of this for you?",
    "That's insightful. How does this relate to your goals?",
];

pub struct ChatLog<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> ChatLog<S> {
    pub fn new(store: S, email: &str) -> Self {
        Self {
            store,
            key: utils::namespaced_key(email, CHAT_KEY),
        }
    }

    /// Messages oldest first.
    pub fn history(&self) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self.store.get_json(&self.key)?.unwrap_or_default())
    }

    /// Append a user message. Blank input is ignored and yields `None`.
    pub fn post(&self, content: &str) -> Result<Option<ChatMessage>, StoreError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }
        self.append(ChatMessage::new(ChatRole::User, content.to_string()))
            .map(Some)
    }

    /// Append a randomly chosen assistant response.
    pub fn reply(&self) -> Result<ChatMessage, StoreError> {
        let text = ASSISTANT_RESPONSES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(ASSISTANT_RESPONSES[0]);
        self.append(ChatMessage::new(ChatRole::Assistant, text.to_string()))
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(&self.key)
    }

    fn append(&self, message: ChatMessage) -> Result<ChatMessage, StoreError> {
        let mut messages = self.history()?;
        messages.push(message.clone());
        self.store.set_json(&self.key, &messages)?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_post_and_reply_append_in_order() {
        let chat = ChatLog::new(MemoryStore::new(), "alice@example.com");

        let posted = chat.post("  remember the milk ").unwrap().unwrap();
        assert_eq!(posted.content, "remember the milk");
        assert_eq!(posted.role, ChatRole::User);

        let reply = chat.reply().unwrap();
        assert_eq!(reply.role, ChatRole::Assistant);
        assert!(ASSISTANT_RESPONSES.contains(&reply.content.as_str()));

        let history = chat.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, posted.id);
        assert_eq!(history[1].id, reply.id);
    }

    #[test]
    fn test_blank_post_is_ignored() {
        let chat = ChatLog::new(MemoryStore::new(), "alice@example.com");
        assert!(chat.post("   ").unwrap().is_none());
        assert!(chat.history().unwrap().is_empty());
    }

    #[test]
    fn test_clear_removes_history() {
        let store = MemoryStore::new();
        let chat = ChatLog::new(store.clone(), "alice@example.com");
        chat.post("hello").unwrap();
        chat.clear().unwrap();
        assert!(chat.history().unwrap().is_empty());
        assert!(store.get("alice@example.com_chat-messages").unwrap().is_none());
    }

    #[test]
    fn test_messages_serialize_lowercase_roles() {
        let store = MemoryStore::new();
        let chat = ChatLog::new(store.clone(), "alice@example.com");
        chat.post("hello").unwrap();

        let raw = store.get("alice@example.com_chat-messages").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json[0]["role"], "user");
        assert_eq!(json[0]["content"], "hello");
    }
}
