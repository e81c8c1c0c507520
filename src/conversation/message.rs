use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique, strictly increasing message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
        }
    }
}

/// Hands out ids based on the wall clock in milliseconds, bumped past the
/// previous id whenever the clock stalls or goes backwards.
#[derive(Debug, Default)]
pub struct MessageIdGenerator {
    last: Option<i64>,
}

impl MessageIdGenerator {
    /// Continue after the highest id already in `messages`.
    pub fn resume_after(messages: &[Message]) -> Self {
        Self {
            last: messages.iter().map(|m| m.id.0).max(),
        }
    }

    pub fn next_id(&mut self) -> MessageId {
        self.next_at(chrono::Utc::now().timestamp_millis())
    }

    fn next_at(&mut self, now_ms: i64) -> MessageId {
        let id = match self.last {
            Some(last) if now_ms <= last => last + 1,
            _ => now_ms,
        };
        self.last = Some(id);
        MessageId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase_within_same_millisecond() {
        let mut ids = MessageIdGenerator::default();
        let first = ids.next_at(1_000);
        let second = ids.next_at(1_000);
        let third = ids.next_at(999);

        assert_eq!(first, MessageId(1_000));
        assert_eq!(second, MessageId(1_001));
        assert_eq!(third, MessageId(1_002));
    }

    #[test]
    fn test_resume_after_persisted_ids() {
        let messages = vec![
            Message::new(MessageId(5_000), Role::User, "a"),
            Message::new(MessageId(5_001), Role::Ai, "b"),
        ];
        let mut ids = MessageIdGenerator::resume_after(&messages);

        assert_eq!(ids.next_at(10), MessageId(5_002));
        assert_eq!(ids.next_at(9_000), MessageId(9_000));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let message = Message::new(MessageId(7), Role::Ai, "hi");
        assert_eq!(
            serde_json::to_string(&message).unwrap(),
            r#"{"id":7,"role":"ai","content":"hi"}"#
        );
    }
}
