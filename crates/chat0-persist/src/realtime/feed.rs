use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

use crate::error::{PersistError, Result};
use crate::models::{Message, MessageSummary, Record, Thread};

/// Row-level change delivered by a feed
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<T> {
    Insert(T),
    Update(T),
    Delete { id: String },
}

impl<T: Record> ChangeEvent<T> {
    pub fn id(&self) -> &str {
        match self {
            Self::Insert(row) | Self::Update(row) => row.id(),
            Self::Delete { id } => id,
        }
    }
}

/// Kind of change, used when publishing a row to many listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn event_for<T: Record>(self, row: &T) -> ChangeEvent<T> {
        match self {
            Self::Insert => ChangeEvent::Insert(row.clone()),
            Self::Update => ChangeEvent::Update(row.clone()),
            Self::Delete => ChangeEvent::Delete { id: row.id().to_string() },
        }
    }
}

type Closer = Box<dyn FnOnce() + Send + Sync>;

/// Open change-feed channel
///
/// Dropping the subscription closes the channel and frees its name.
pub struct Subscription<T> {
    channel: String,
    rx: mpsc::UnboundedReceiver<ChangeEvent<T>>,
    closer: Option<Closer>,
}

impl<T> Subscription<T> {
    pub fn new(
        channel: impl Into<String>,
        rx: mpsc::UnboundedReceiver<ChangeEvent<T>>,
        closer: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            channel: channel.into(),
            rx,
            closer: Some(Box::new(closer)),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next event; `None` once the feed side is gone
    pub async fn recv(&mut self) -> Option<ChangeEvent<T>> {
        self.rx.recv().await
    }

    /// Next already-delivered event, without waiting
    pub fn try_recv(&mut self) -> Option<ChangeEvent<T>> {
        self.rx.try_recv().ok()
    }

    pub fn close(self) {}
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
        tracing::debug!(channel = %self.channel, "change feed channel closed");
    }
}

/// Source of change events per entity
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Threads owned by `user_id`
    async fn watch_threads(&self, channel: &str, user_id: &str) -> Result<Subscription<Thread>>;

    /// Messages of one thread
    async fn watch_messages(&self, channel: &str, thread_id: &str) -> Result<Subscription<Message>>;

    /// Summaries of one thread
    async fn watch_summaries(
        &self,
        channel: &str,
        thread_id: &str,
    ) -> Result<Subscription<MessageSummary>>;
}

/// Distinct channel name for one view instance, e.g. `messages-<thread>-<suffix>`
pub fn channel_name(entity: &str, key: &str) -> String {
    let instance = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", entity, key, &instance[..8])
}

struct Listener<T> {
    filter: Box<dyn Fn(&T) -> bool + Send + Sync>,
    tx: mpsc::UnboundedSender<ChangeEvent<T>>,
}

/// Named listeners for one entity type, fed synchronously by a store
pub struct FeedRegistry<T> {
    listeners: Arc<Mutex<HashMap<String, Listener<T>>>>,
}

impl<T: Record> FeedRegistry<T> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a named listener for rows matching `filter`
    pub fn subscribe(
        &self,
        channel: &str,
        filter: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Result<Subscription<T>> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            if listeners.contains_key(channel) {
                return Err(PersistError::ChannelInUse(channel.to_string()));
            }
            listeners.insert(
                channel.to_string(),
                Listener {
                    filter: Box::new(filter),
                    tx,
                },
            );
        }

        let registry: Weak<Mutex<HashMap<String, Listener<T>>>> = Arc::downgrade(&self.listeners);
        let name = channel.to_string();
        tracing::debug!(channel, "change feed channel opened");

        Ok(Subscription::new(channel, rx, move || {
            if let Some(listeners) = registry.upgrade() {
                listeners.lock().unwrap_or_else(|e| e.into_inner()).remove(&name);
            }
        }))
    }

    /// Deliver a change to every listener whose filter accepts the row
    pub fn publish(&self, kind: ChangeKind, row: &T) {
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        for (channel, listener) in listeners.iter() {
            if (listener.filter)(row) && listener.tx.send(kind.event_for(row)).is_err() {
                tracing::debug!(channel = %channel, "listener gone, event dropped");
            }
        }
    }

    pub fn channel_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl<T: Record> Default for FeedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
