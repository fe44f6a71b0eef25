use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::UserCredentials;
use crate::models::{Message, MessageRole, MessageSummary, Thread, User};

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// MongoDB-specific documents: string `_id`, epoch-millisecond timestamps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoThread {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub user_id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_message_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub thread_id: String,
    pub content: String,
    pub role: MessageRole,
    pub user_id: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub thread_id: String,
    pub message_id: String,
    pub content: String,
    pub user_id: String,
    pub created_at: i64,
}

/// Password hash keyed by normalized email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCredentials {
    #[serde(rename = "_id")]
    pub email: String,
    pub user_id: String,
    pub password_hash: String,
}

impl From<User> for MongoUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: user.created_at.timestamp_millis(),
            updated_at: user.updated_at.timestamp_millis(),
        }
    }
}

impl From<MongoUser> for User {
    fn from(user: MongoUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: from_millis(user.created_at),
            updated_at: from_millis(user.updated_at),
        }
    }
}

impl From<Thread> for MongoThread {
    fn from(thread: Thread) -> Self {
        Self {
            id: thread.id,
            title: thread.title,
            user_id: thread.user_id,
            created_at: thread.created_at.timestamp_millis(),
            updated_at: thread.updated_at.timestamp_millis(),
            last_message_at: thread.last_message_at.timestamp_millis(),
        }
    }
}

impl From<MongoThread> for Thread {
    fn from(thread: MongoThread) -> Self {
        Self {
            id: thread.id,
            title: thread.title,
            user_id: thread.user_id,
            created_at: from_millis(thread.created_at),
            updated_at: from_millis(thread.updated_at),
            last_message_at: from_millis(thread.last_message_at),
        }
    }
}

impl From<Message> for MongoMessage {
    fn from(msg: Message) -> Self {
        Self {
            id: msg.id,
            thread_id: msg.thread_id,
            content: msg.content,
            role: msg.role,
            user_id: msg.user_id,
            created_at: msg.created_at.timestamp_millis(),
        }
    }
}

impl From<MongoMessage> for Message {
    fn from(msg: MongoMessage) -> Self {
        Self {
            id: msg.id,
            thread_id: msg.thread_id,
            content: msg.content,
            role: msg.role,
            user_id: msg.user_id,
            created_at: from_millis(msg.created_at),
        }
    }
}

impl From<MessageSummary> for MongoSummary {
    fn from(summary: MessageSummary) -> Self {
        Self {
            id: summary.id,
            thread_id: summary.thread_id,
            message_id: summary.message_id,
            content: summary.content,
            user_id: summary.user_id,
            created_at: summary.created_at.timestamp_millis(),
        }
    }
}

impl From<MongoSummary> for MessageSummary {
    fn from(summary: MongoSummary) -> Self {
        Self {
            id: summary.id,
            thread_id: summary.thread_id,
            message_id: summary.message_id,
            content: summary.content,
            user_id: summary.user_id,
            created_at: from_millis(summary.created_at),
        }
    }
}

impl From<UserCredentials> for MongoCredentials {
    fn from(c: UserCredentials) -> Self {
        Self {
            email: c.email,
            user_id: c.user_id,
            password_hash: c.password_hash,
        }
    }
}

impl From<MongoCredentials> for UserCredentials {
    fn from(c: MongoCredentials) -> Self {
        Self {
            email: c.email,
            user_id: c.user_id,
            password_hash: c.password_hash,
        }
    }
}
