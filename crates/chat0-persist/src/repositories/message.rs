use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{require_id, PersistError, Result};
use crate::models::{new_id, Message, NewMessage, ThreadUpdate};
use crate::trait_client::PersistenceClient;

#[derive(Clone)]
pub struct MessageRepository {
    client: Arc<dyn PersistenceClient>,
    clock: Arc<dyn Clock>,
}

impl MessageRepository {
    pub fn new(client: Arc<dyn PersistenceClient>, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock }
    }

    /// Store a message and move its thread's `last_message_at` forward
    ///
    /// The thread must exist. The thread bump is best-effort: a failure there
    /// is logged and the stored message is still returned.
    pub async fn create(&self, new: NewMessage) -> Result<Message> {
        require_id("thread_id", &new.thread_id)?;
        require_id("user_id", &new.user_id)?;

        let thread = self
            .client
            .get_thread(&new.thread_id)
            .await?
            .ok_or_else(|| PersistError::ThreadNotFound(new.thread_id.clone()))?;

        let message = Message {
            id: new.id.unwrap_or_else(new_id),
            thread_id: new.thread_id,
            content: new.content,
            role: new.role,
            user_id: new.user_id,
            created_at: new.created_at.unwrap_or_else(|| self.clock.now_millis()),
        };
        let message = self.client.insert_message(message).await?;

        let bump = ThreadUpdate {
            title: None,
            updated_at: Some(self.clock.now_millis()),
            last_message_at: Some(thread.last_message_at.max(message.created_at)),
        };
        if let Err(e) = self.client.update_thread(&thread.id, bump).await {
            tracing::warn!(thread_id = %thread.id, error = %e, "failed to bump last_message_at");
        }

        tracing::debug!(message_id = %message.id, thread_id = %message.thread_id, role = ?message.role, "message stored");
        Ok(message)
    }

    pub async fn get(&self, message_id: &str) -> Result<Option<Message>> {
        require_id("message_id", message_id)?;
        self.client.get_message(message_id).await
    }

    /// Get all messages for a thread, oldest first
    pub async fn list(&self, thread_id: &str) -> Result<Vec<Message>> {
        require_id("thread_id", thread_id)?;
        self.client.list_messages(thread_id).await
    }

    /// Delete one message and the summaries pointing at it
    pub async fn delete(&self, message_id: &str) -> Result<bool> {
        require_id("message_id", message_id)?;

        if let Err(e) = self.client.delete_summaries_for_message(message_id).await {
            tracing::warn!(message_id, error = %e, "failed to delete message summaries");
        }
        self.client.delete_message(message_id).await
    }
}
