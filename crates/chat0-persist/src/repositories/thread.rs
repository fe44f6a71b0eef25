use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{require_id, PersistError, Result};
use crate::models::{new_id, Thread, ThreadUpdate};
use crate::trait_client::PersistenceClient;

/// Result of deleting a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing to delete; repeated deletes land here
    NotFound,
}

#[derive(Clone)]
pub struct ThreadRepository {
    client: Arc<dyn PersistenceClient>,
    clock: Arc<dyn Clock>,
}

impl ThreadRepository {
    pub fn new(client: Arc<dyn PersistenceClient>, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock }
    }

    /// Create a new thread
    pub async fn create(&self, title: impl Into<String>, user_id: &str) -> Result<Thread> {
        require_id("user_id", user_id)?;

        let now = self.clock.now_millis();
        let thread = Thread {
            id: new_id(),
            title: title.into(),
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
            last_message_at: now,
        };

        let thread = self.client.insert_thread(thread).await?;
        tracing::info!(thread_id = %thread.id, user_id = %thread.user_id, "thread created");
        Ok(thread)
    }

    /// Get thread by ID
    pub async fn get(&self, thread_id: &str) -> Result<Option<Thread>> {
        require_id("thread_id", thread_id)?;
        self.client.get_thread(thread_id).await
    }

    /// List threads for a user, most recently active first
    pub async fn list(&self, user_id: &str) -> Result<Vec<Thread>> {
        require_id("user_id", user_id)?;
        self.client.list_threads(user_id).await
    }

    /// Apply a partial update; `updated_at` is always bumped
    pub async fn update(&self, thread_id: &str, mut update: ThreadUpdate) -> Result<Thread> {
        require_id("thread_id", thread_id)?;
        update.updated_at = Some(self.clock.now_millis());

        self.client
            .update_thread(thread_id, update)
            .await?
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))
    }

    pub async fn rename(&self, thread_id: &str, title: impl Into<String>) -> Result<Thread> {
        self.update(thread_id, ThreadUpdate::title(title)).await
    }

    /// Delete a thread together with its messages and summaries
    ///
    /// Children go first. Their failures are logged and do not stop the
    /// thread itself from being removed.
    pub async fn delete(&self, thread_id: &str) -> Result<DeleteOutcome> {
        require_id("thread_id", thread_id)?;

        if self.client.get_thread(thread_id).await?.is_none() {
            tracing::debug!(thread_id, "delete skipped, thread not found");
            return Ok(DeleteOutcome::NotFound);
        }

        match self.client.delete_messages_for_thread(thread_id).await {
            Ok(count) => tracing::debug!(thread_id, count, "deleted thread messages"),
            Err(e) => tracing::warn!(thread_id, error = %e, "failed to delete thread messages"),
        }

        match self.client.delete_summaries_for_thread(thread_id).await {
            Ok(count) => tracing::debug!(thread_id, count, "deleted thread summaries"),
            Err(e) => tracing::warn!(thread_id, error = %e, "failed to delete thread summaries"),
        }

        // A concurrent delete may have won the race; the thread is gone either way.
        self.client.delete_thread(thread_id).await?;
        tracing::info!(thread_id, "thread deleted");
        Ok(DeleteOutcome::Deleted)
    }
}
