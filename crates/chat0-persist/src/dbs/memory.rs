use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::auth::{CredentialStore, UserCredentials};
use crate::error::{PersistError, Result};
use crate::models::{Message, MessageSummary, Thread, ThreadUpdate, User};
use crate::realtime::{ChangeFeed, ChangeKind, FeedRegistry, Subscription};
use crate::trait_client::PersistenceClient;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    threads: Vec<Thread>,
    messages: Vec<Message>,
    summaries: Vec<MessageSummary>,
    credentials: HashMap<String, UserCredentials>,
}

/// Process-local backend with push change feeds
///
/// Rows live in insertion order, so equal timestamps keep a stable order.
/// Events are published after the table lock is released.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    thread_feed: FeedRegistry<Thread>,
    message_feed: FeedRegistry<Message>,
    summary_feed: FeedRegistry<MessageSummary>,
    failing: Mutex<HashSet<&'static str>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to the named operation fail until cleared
    pub fn fail_operation(&self, operation: &'static str) {
        self.failing.lock().unwrap_or_else(|e| e.into_inner()).insert(operation);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        if self.failing.lock().unwrap_or_else(|e| e.into_inner()).contains(operation) {
            return Err(PersistError::backend("injected", format!("{} failed", operation)));
        }
        Ok(())
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn by_created<T>(rows: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    rows.sort_by_key(|row| created_at(row));
}

#[async_trait]
impl PersistenceClient for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert_user(&self, user: User) -> Result<User> {
        self.check("insert_user")?;
        let mut tables = self.tables();
        if tables.users.iter().any(|u| u.id == user.id || u.email == user.email) {
            return Err(PersistError::backend("23505", "duplicate key value violates unique constraint"));
        }
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.check("get_user")?;
        Ok(self.tables().users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.check("find_user_by_email")?;
        Ok(self.tables().users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_user_name(
        &self,
        user_id: &str,
        name: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<User>> {
        self.check("update_user_name")?;
        let mut tables = self.tables();
        Ok(tables.users.iter_mut().find(|u| u.id == user_id).map(|user| {
            user.name = name;
            user.updated_at = updated_at;
            user.clone()
        }))
    }

    async fn insert_thread(&self, thread: Thread) -> Result<Thread> {
        self.check("insert_thread")?;
        {
            let mut tables = self.tables();
            if tables.threads.iter().any(|t| t.id == thread.id) {
                return Err(PersistError::backend("23505", "duplicate thread id"));
            }
            tables.threads.push(thread.clone());
        }
        self.thread_feed.publish(ChangeKind::Insert, &thread);
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        self.check("get_thread")?;
        Ok(self.tables().threads.iter().find(|t| t.id == thread_id).cloned())
    }

    async fn list_threads(&self, user_id: &str) -> Result<Vec<Thread>> {
        self.check("list_threads")?;
        let mut threads: Vec<Thread> = self
            .tables()
            .threads
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        threads.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(threads)
    }

    async fn update_thread(&self, thread_id: &str, update: ThreadUpdate) -> Result<Option<Thread>> {
        self.check("update_thread")?;
        let updated = {
            let mut tables = self.tables();
            tables.threads.iter_mut().find(|t| t.id == thread_id).map(|thread| {
                update.apply_to(thread);
                thread.clone()
            })
        };
        if let Some(thread) = &updated {
            self.thread_feed.publish(ChangeKind::Update, thread);
        }
        Ok(updated)
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<bool> {
        self.check("delete_thread")?;
        let removed = {
            let mut tables = self.tables();
            let index = tables.threads.iter().position(|t| t.id == thread_id);
            index.map(|i| tables.threads.remove(i))
        };
        match removed {
            Some(thread) => {
                self.thread_feed.publish(ChangeKind::Delete, &thread);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_message(&self, message: Message) -> Result<Message> {
        self.check("insert_message")?;
        {
            let mut tables = self.tables();
            if tables.messages.iter().any(|m| m.id == message.id) {
                return Err(PersistError::backend("23505", "duplicate message id"));
            }
            tables.messages.push(message.clone());
        }
        self.message_feed.publish(ChangeKind::Insert, &message);
        Ok(message)
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>> {
        self.check("get_message")?;
        Ok(self.tables().messages.iter().find(|m| m.id == message_id).cloned())
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        self.check("list_messages")?;
        let mut messages: Vec<Message> = self
            .tables()
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect();
        by_created(&mut messages, |m| m.created_at);
        Ok(messages)
    }

    async fn delete_message(&self, message_id: &str) -> Result<bool> {
        self.check("delete_message")?;
        let removed = {
            let mut tables = self.tables();
            let index = tables.messages.iter().position(|m| m.id == message_id);
            index.map(|i| tables.messages.remove(i))
        };
        match removed {
            Some(message) => {
                self.message_feed.publish(ChangeKind::Delete, &message);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_messages_for_thread(&self, thread_id: &str) -> Result<u64> {
        self.check("delete_messages_for_thread")?;
        let removed: Vec<Message> = {
            let mut tables = self.tables();
            let (gone, kept) = std::mem::take(&mut tables.messages)
                .into_iter()
                .partition(|m| m.thread_id == thread_id);
            tables.messages = kept;
            gone
        };
        for message in &removed {
            self.message_feed.publish(ChangeKind::Delete, message);
        }
        Ok(removed.len() as u64)
    }

    async fn insert_summary(&self, summary: MessageSummary) -> Result<MessageSummary> {
        self.check("insert_summary")?;
        self.tables().summaries.push(summary.clone());
        self.summary_feed.publish(ChangeKind::Insert, &summary);
        Ok(summary)
    }

    async fn list_summaries(&self, thread_id: &str) -> Result<Vec<MessageSummary>> {
        self.check("list_summaries")?;
        let mut summaries: Vec<MessageSummary> = self
            .tables()
            .summaries
            .iter()
            .filter(|s| s.thread_id == thread_id)
            .cloned()
            .collect();
        by_created(&mut summaries, |s| s.created_at);
        Ok(summaries)
    }

    async fn delete_summary(&self, summary_id: &str) -> Result<bool> {
        self.check("delete_summary")?;
        let removed = {
            let mut tables = self.tables();
            let index = tables.summaries.iter().position(|s| s.id == summary_id);
            index.map(|i| tables.summaries.remove(i))
        };
        match removed {
            Some(summary) => {
                self.summary_feed.publish(ChangeKind::Delete, &summary);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_summaries_for_thread(&self, thread_id: &str) -> Result<u64> {
        self.check("delete_summaries_for_thread")?;
        self.remove_summaries(|s| s.thread_id == thread_id)
    }

    async fn delete_summaries_for_message(&self, message_id: &str) -> Result<u64> {
        self.check("delete_summaries_for_message")?;
        self.remove_summaries(|s| s.message_id == message_id)
    }
}

impl MemoryStore {
    fn remove_summaries(&self, matches: impl Fn(&MessageSummary) -> bool) -> Result<u64> {
        let removed: Vec<MessageSummary> = {
            let mut tables = self.tables();
            let (gone, kept) = std::mem::take(&mut tables.summaries)
                .into_iter()
                .partition(|s| matches(s));
            tables.summaries = kept;
            gone
        };
        for summary in &removed {
            self.summary_feed.publish(ChangeKind::Delete, summary);
        }
        Ok(removed.len() as u64)
    }
}

#[async_trait]
impl ChangeFeed for MemoryStore {
    async fn watch_threads(&self, channel: &str, user_id: &str) -> Result<Subscription<Thread>> {
        let user_id = user_id.to_string();
        self.thread_feed
            .subscribe(channel, move |t: &Thread| t.user_id == user_id)
    }

    async fn watch_messages(&self, channel: &str, thread_id: &str) -> Result<Subscription<Message>> {
        let thread_id = thread_id.to_string();
        self.message_feed
            .subscribe(channel, move |m: &Message| m.thread_id == thread_id)
    }

    async fn watch_summaries(
        &self,
        channel: &str,
        thread_id: &str,
    ) -> Result<Subscription<MessageSummary>> {
        let thread_id = thread_id.to_string();
        self.summary_feed
            .subscribe(channel, move |s: &MessageSummary| s.thread_id == thread_id)
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn save_credentials(&self, credentials: UserCredentials) -> Result<()> {
        self.check("save_credentials")?;
        self.tables()
            .credentials
            .insert(credentials.email.clone(), credentials);
        Ok(())
    }

    async fn credentials_for(&self, email: &str) -> Result<Option<UserCredentials>> {
        self.check("credentials_for")?;
        Ok(self.tables().credentials.get(email).cloned())
    }
}
