use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::cache::{QueryCache, QueryHandle};
use crate::client::PersistClient;
use crate::error::Result;
use crate::models::{Message, MessageSummary, Record, Thread};
use crate::realtime::feed::{channel_name, ChangeEvent, ChangeFeed, Subscription};

type Loader<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<T>>> + Send + Sync>;

/// Ordered in-memory collection kept current by a change feed
///
/// Once open, feed events are authoritative: inserts append (or replace a
/// row with the same id), updates replace in place, deletes filter out.
/// [`LiveView::refetch`] swaps in the backend's state on demand.
pub struct LiveView<T> {
    items: Vec<T>,
    subscription: Subscription<T>,
    handle: QueryHandle,
    loader: Loader<T>,
}

impl<T> LiveView<T>
where
    T: Record + PartialEq + Serialize + DeserializeOwned,
{
    /// Load the initial rows through `handle` and start following `subscription`
    ///
    /// The subscription must already be open so no change falls between the
    /// load and the first event. The load always reaches the backend; its
    /// result refreshes the cache entry for other readers.
    pub async fn open(handle: QueryHandle, subscription: Subscription<T>, loader: Loader<T>) -> Result<Self> {
        let handle = handle.bypass_throttle();
        let load = Arc::clone(&loader);
        let items = handle.refetch(move || load()).await?;

        tracing::debug!(channel = subscription.channel(), rows = items.len(), "live view opened");
        Ok(Self {
            items,
            subscription,
            handle,
            loader,
        })
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|row| row.id() == id)
    }

    pub fn channel(&self) -> &str {
        self.subscription.channel()
    }

    /// Fold one event into the collection; returns whether anything changed
    pub fn apply(&mut self, event: ChangeEvent<T>) -> bool {
        match event {
            ChangeEvent::Insert(row) => {
                self.upsert(row);
                true
            }
            ChangeEvent::Update(row) => match self.items.iter_mut().find(|r| r.id() == row.id()) {
                Some(existing) if *existing != row => {
                    *existing = row;
                    true
                }
                _ => false,
            },
            ChangeEvent::Delete { id } => self.remove_local(&id),
        }
    }

    /// Optimistic insert ahead of the feed; the later feed insert replaces it
    pub fn insert_local(&mut self, row: T) {
        self.upsert(row);
    }

    pub fn remove_local(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|row| row.id() != id);
        self.items.len() != before
    }

    /// Drop every row after the one with `id`; `inclusive` drops it too
    ///
    /// Returns the removed rows in order.
    pub fn truncate_after(&mut self, id: &str, inclusive: bool) -> Vec<T> {
        match self.items.iter().position(|row| row.id() == id) {
            Some(index) => {
                let cut = if inclusive { index } else { index + 1 };
                self.items.split_off(cut)
            }
            None => Vec::new(),
        }
    }

    /// Apply every event already delivered, without waiting
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.subscription.try_recv() {
            if self.apply(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next event, apply it and hand it back
    pub async fn next_change(&mut self) -> Option<ChangeEvent<T>> {
        let event = self.subscription.recv().await?;
        self.apply(event.clone());
        Some(event)
    }

    /// Replace the collection with the backend's current rows
    pub async fn refetch(&mut self) -> Result<()> {
        let load = Arc::clone(&self.loader);
        self.items = self.handle.refetch(move || load()).await?;
        Ok(())
    }

    pub fn replace_all(&mut self, items: Vec<T>) {
        self.items = items;
    }

    fn upsert(&mut self, row: T) {
        match self.items.iter_mut().find(|r| r.id() == row.id()) {
            Some(existing) => *existing = row,
            None => self.items.push(row),
        }
    }
}

impl LiveView<Message> {
    /// Messages of a thread, oldest first
    pub async fn messages(
        persist: &PersistClient,
        feed: &dyn ChangeFeed,
        cache: &Arc<QueryCache>,
        thread_id: &str,
    ) -> Result<Self> {
        let subscription = feed
            .watch_messages(&channel_name("messages", thread_id), thread_id)
            .await?;
        let handle = cache.handle("messages", &thread_id)?;

        let repo = persist.messages().clone();
        let thread_id = thread_id.to_string();
        let loader: Loader<Message> = Arc::new(move || -> BoxFuture<'static, Result<Vec<Message>>> {
            let repo = repo.clone();
            let thread_id = thread_id.clone();
            Box::pin(async move { repo.list(&thread_id).await })
        });

        Self::open(handle, subscription, loader).await
    }
}

impl LiveView<Thread> {
    /// Threads of a user, most recently active first at load time
    pub async fn threads(
        persist: &PersistClient,
        feed: &dyn ChangeFeed,
        cache: &Arc<QueryCache>,
        user_id: &str,
    ) -> Result<Self> {
        let subscription = feed
            .watch_threads(&channel_name("threads", user_id), user_id)
            .await?;
        let handle = cache.handle("threads", &user_id)?;

        let repo = persist.threads().clone();
        let user_id = user_id.to_string();
        let loader: Loader<Thread> = Arc::new(move || -> BoxFuture<'static, Result<Vec<Thread>>> {
            let repo = repo.clone();
            let user_id = user_id.clone();
            Box::pin(async move { repo.list(&user_id).await })
        });

        Self::open(handle, subscription, loader).await
    }
}

impl LiveView<MessageSummary> {
    pub async fn summaries(
        persist: &PersistClient,
        feed: &dyn ChangeFeed,
        cache: &Arc<QueryCache>,
        thread_id: &str,
    ) -> Result<Self> {
        let subscription = feed
            .watch_summaries(&channel_name("summaries", thread_id), thread_id)
            .await?;
        let handle = cache.handle("summaries", &thread_id)?;

        let repo = persist.summaries().clone();
        let thread_id = thread_id.to_string();
        let loader: Loader<MessageSummary> =
            Arc::new(move || -> BoxFuture<'static, Result<Vec<MessageSummary>>> {
                let repo = repo.clone();
                let thread_id = thread_id.clone();
                Box::pin(async move { repo.list(&thread_id).await })
            });

        Self::open(handle, subscription, loader).await
    }
}
