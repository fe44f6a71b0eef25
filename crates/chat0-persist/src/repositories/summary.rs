use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{require_id, Result};
use crate::models::{new_id, MessageSummary};
use crate::trait_client::PersistenceClient;

#[derive(Clone)]
pub struct SummaryRepository {
    client: Arc<dyn PersistenceClient>,
    clock: Arc<dyn Clock>,
}

impl SummaryRepository {
    pub fn new(client: Arc<dyn PersistenceClient>, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock }
    }

    pub async fn create(
        &self,
        thread_id: &str,
        message_id: &str,
        content: impl Into<String>,
        user_id: &str,
    ) -> Result<MessageSummary> {
        require_id("thread_id", thread_id)?;
        require_id("message_id", message_id)?;
        require_id("user_id", user_id)?;

        let summary = MessageSummary {
            id: new_id(),
            thread_id: thread_id.to_string(),
            message_id: message_id.to_string(),
            content: content.into(),
            user_id: user_id.to_string(),
            created_at: self.clock.now_millis(),
        };
        self.client.insert_summary(summary).await
    }

    /// Summaries for a thread, oldest first
    pub async fn list(&self, thread_id: &str) -> Result<Vec<MessageSummary>> {
        require_id("thread_id", thread_id)?;
        self.client.list_summaries(thread_id).await
    }

    /// Remove all but the earliest summary of each message
    ///
    /// Returns how many rows were deleted.
    pub async fn dedupe(&self, thread_id: &str) -> Result<usize> {
        let summaries = self.list(thread_id).await?;

        let mut seen = HashSet::new();
        let mut removed = 0;
        for summary in summaries {
            if seen.insert(summary.message_id.clone()) {
                continue;
            }
            if self.client.delete_summary(&summary.id).await? {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(thread_id, removed, "removed duplicate summaries");
        }
        Ok(removed)
    }
}
