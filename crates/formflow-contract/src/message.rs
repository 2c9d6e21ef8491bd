//! Conversation history messages.

use serde::{Deserialize, Serialize};

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Generate a time-ordered UUID v7 message identifier.
fn gen_message_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// A message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Stable message identifier (UUID v7, auto-generated).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    pub content: String,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Some(gen_message_id()),
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Same role and content, ignoring ids.
    pub fn same_turn(&self, other: &Message) -> bool {
        self.role == other.role && self.content == other.content
    }
}

/// Append messages to a history, skipping any message that repeats the
/// immediately preceding one (same role and content).
pub fn append_history(history: &mut Vec<Message>, messages: impl IntoIterator<Item = Message>) {
    for msg in messages {
        if history.last().is_some_and(|last| last.same_turn(&msg)) {
            continue;
        }
        history.push(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_are_unique() {
        let a = Message::user("hi");
        let b = Message::user("hi");
        assert_ne!(a.id, b.id);
        assert!(a.same_turn(&b));
    }

    #[test]
    fn test_role_serde_lowercase() {
        let v = serde_json::to_value(Message::assistant("ok")).unwrap();
        assert_eq!(v["role"], "assistant");
    }

    #[test]
    fn test_append_skips_consecutive_duplicates() {
        let mut history = vec![Message::user("hello")];
        append_history(
            &mut history,
            [
                Message::user("hello"),
                Message::assistant("hi"),
                Message::assistant("hi"),
                Message::user("hello"),
            ],
        );
        let contents: Vec<_> = history.iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(
            contents,
            [
                (Role::User, "hello"),
                (Role::Assistant, "hi"),
                (Role::User, "hello"),
            ]
        );
    }
}
