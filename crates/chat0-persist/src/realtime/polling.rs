use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::error::{PersistError, Result};
use crate::models::{Message, MessageSummary, Record, Thread};
use crate::realtime::feed::{ChangeEvent, ChangeFeed, Subscription};
use crate::trait_client::PersistenceClient;

/// Events that turn `previous` into `current`
///
/// Inserts and updates follow `current` order; deletes follow, in
/// `previous` order. Unchanged rows produce nothing.
pub fn diff_snapshots<T: Record + PartialEq>(previous: &[T], current: &[T]) -> Vec<ChangeEvent<T>> {
    let before: HashMap<&str, &T> = previous.iter().map(|row| (row.id(), row)).collect();
    let after: HashSet<&str> = current.iter().map(|row| row.id()).collect();

    let mut events = Vec::new();
    for row in current {
        match before.get(row.id()) {
            None => events.push(ChangeEvent::Insert(row.clone())),
            Some(old) if *old != row => events.push(ChangeEvent::Update(row.clone())),
            Some(_) => {}
        }
    }
    for row in previous {
        if !after.contains(row.id()) {
            events.push(ChangeEvent::Delete { id: row.id().to_string() });
        }
    }
    events
}

type Snapshot<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<T>>> + Send + Sync>;

/// Change feed for backends without push notifications
///
/// Each subscription polls its query on a fixed interval and emits the
/// difference against the previous result, so events lag the store by at
/// most one interval. Poll errors are logged and the next tick retries.
#[derive(Clone)]
pub struct PollingFeed {
    backend: Arc<dyn PersistenceClient>,
    interval: Duration,
    channels: Arc<Mutex<HashSet<String>>>,
}

impl PollingFeed {
    pub fn new(backend: Arc<dyn PersistenceClient>, interval: Duration) -> Self {
        Self {
            backend,
            interval,
            channels: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    async fn watch<T>(&self, channel: &str, snapshot: Snapshot<T>) -> Result<Subscription<T>>
    where
        T: Record + PartialEq,
    {
        {
            let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
            if !channels.insert(channel.to_string()) {
                return Err(PersistError::ChannelInUse(channel.to_string()));
            }
        }

        // Rows present at subscribe time are the baseline, not inserts.
        let baseline = match snapshot().await {
            Ok(rows) => rows,
            Err(e) => {
                self.release(channel);
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let interval = self.interval;
        let name = channel.to_string();

        let task = tokio::spawn(async move {
            let mut previous = baseline;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }
                match snapshot().await {
                    Ok(current) => {
                        for event in diff_snapshots(&previous, &current) {
                            if tx.send(event).is_err() {
                                return;
                            }
                        }
                        previous = current;
                    }
                    Err(e) => {
                        tracing::warn!(channel = %name, error = %e, "change feed poll failed");
                    }
                }
            }
        });

        let abort = task.abort_handle();
        let channels = Arc::clone(&self.channels);
        let name = channel.to_string();
        tracing::debug!(channel, interval_ms = interval.as_millis() as u64, "polling channel opened");

        Ok(Subscription::new(channel, rx, move || {
            abort.abort();
            channels.lock().unwrap_or_else(|e| e.into_inner()).remove(&name);
        }))
    }

    fn release(&self, channel: &str) {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).remove(channel);
    }
}

#[async_trait]
impl ChangeFeed for PollingFeed {
    async fn watch_threads(&self, channel: &str, user_id: &str) -> Result<Subscription<Thread>> {
        let backend = Arc::clone(&self.backend);
        let user_id = user_id.to_string();
        let snapshot: Snapshot<Thread> = Arc::new(move || -> BoxFuture<'static, Result<Vec<Thread>>> {
            let backend = Arc::clone(&backend);
            let user_id = user_id.clone();
            Box::pin(async move { backend.list_threads(&user_id).await })
        });
        self.watch(channel, snapshot).await
    }

    async fn watch_messages(&self, channel: &str, thread_id: &str) -> Result<Subscription<Message>> {
        let backend = Arc::clone(&self.backend);
        let thread_id = thread_id.to_string();
        let snapshot: Snapshot<Message> = Arc::new(move || -> BoxFuture<'static, Result<Vec<Message>>> {
            let backend = Arc::clone(&backend);
            let thread_id = thread_id.clone();
            Box::pin(async move { backend.list_messages(&thread_id).await })
        });
        self.watch(channel, snapshot).await
    }

    async fn watch_summaries(
        &self,
        channel: &str,
        thread_id: &str,
    ) -> Result<Subscription<MessageSummary>> {
        let backend = Arc::clone(&self.backend);
        let thread_id = thread_id.to_string();
        let snapshot: Snapshot<MessageSummary> = Arc::new(move || -> BoxFuture<'static, Result<Vec<MessageSummary>>> {
            let backend = Arc::clone(&backend);
            let thread_id = thread_id.clone();
            Box::pin(async move { backend.list_summaries(&thread_id).await })
        });
        self.watch(channel, snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn created() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    fn summary(id: &str, content: &str) -> MessageSummary {
        MessageSummary {
            id: id.to_string(),
            thread_id: "t1".to_string(),
            message_id: format!("m-{}", id),
            content: content.to_string(),
            user_id: "u1".to_string(),
            created_at: created(),
        }
    }

    #[test]
    fn test_diff_detects_every_kind() {
        let previous = vec![summary("a", "one"), summary("b", "two"), summary("c", "three")];
        let current = vec![summary("a", "one"), summary("b", "TWO"), summary("d", "four")];

        let events = diff_snapshots(&previous, &current);

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], ChangeEvent::Update(s) if s.id == "b" && s.content == "TWO"));
        assert!(matches!(&events[1], ChangeEvent::Insert(s) if s.id == "d"));
        assert_eq!(events[2], ChangeEvent::Delete { id: "c".to_string() });
    }

    #[test]
    fn test_diff_of_identical_snapshots_is_empty() {
        let rows = vec![summary("a", "one")];
        assert!(diff_snapshots(&rows, &rows.clone()).is_empty());
    }
}
