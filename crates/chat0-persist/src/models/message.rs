use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl From<MessageRole> for chat0_llm::Role {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => chat0_llm::Role::User,
            MessageRole::Assistant => chat0_llm::Role::Assistant,
            MessageRole::System => chat0_llm::Role::System,
        }
    }
}

/// One turn of a thread; immutable once stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub content: String,
    pub role: MessageRole,
    pub user_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

// Conversion: stored Message → provider transcript entry
impl From<&Message> for chat0_llm::Message {
    fn from(msg: &Message) -> Self {
        chat0_llm::Message::from_role(msg.role.into(), msg.content.clone())
    }
}

/// Input for creating a message
///
/// `id` and `created_at` are filled in by the repository when absent.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Option<String>,
    pub thread_id: String,
    pub content: String,
    pub role: MessageRole,
    pub user_id: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl NewMessage {
    pub fn new(
        thread_id: impl Into<String>,
        user_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            thread_id: thread_id.into(),
            content: content.into(),
            role,
            user_id: user_id.into(),
            created_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }
}
