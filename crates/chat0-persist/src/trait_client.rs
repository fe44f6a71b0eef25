use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Message, MessageSummary, Thread, ThreadUpdate, User};

/// Trait for backend persistence operations
///
/// Each method is a single backend call. Ordering, cascade and validation
/// rules live in the repositories, so every backend behaves the same.
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    // Users

    async fn insert_user(&self, user: User) -> Result<User>;

    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn update_user_name(&self, user_id: &str, name: Option<String>, updated_at: chrono::DateTime<chrono::Utc>) -> Result<Option<User>>;

    // Threads

    async fn insert_thread(&self, thread: Thread) -> Result<Thread>;

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>>;

    /// Threads owned by a user, most recent activity first
    async fn list_threads(&self, user_id: &str) -> Result<Vec<Thread>>;

    /// Returns the updated row, or `None` when the thread does not exist
    async fn update_thread(&self, thread_id: &str, update: ThreadUpdate) -> Result<Option<Thread>>;

    /// Returns whether a row was removed
    async fn delete_thread(&self, thread_id: &str) -> Result<bool>;

    // Messages

    async fn insert_message(&self, message: Message) -> Result<Message>;

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>>;

    /// Messages of a thread, oldest first
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>>;

    async fn delete_message(&self, message_id: &str) -> Result<bool>;

    async fn delete_messages_for_thread(&self, thread_id: &str) -> Result<u64>;

    // Summaries

    async fn insert_summary(&self, summary: MessageSummary) -> Result<MessageSummary>;

    /// Summaries of a thread, oldest first
    async fn list_summaries(&self, thread_id: &str) -> Result<Vec<MessageSummary>>;

    async fn delete_summary(&self, summary_id: &str) -> Result<bool>;

    async fn delete_summaries_for_thread(&self, thread_id: &str) -> Result<u64>;

    async fn delete_summaries_for_message(&self, message_id: &str) -> Result<u64>;
}
