use chat0_persist::{
    Backend, CacheConfig, ChangeFeed, LiveView, PersistClient, PersistError, QueryCache,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::client_factory::{ClientResolver, FactoryResolver};
use crate::error::{ChatError, Result};
use crate::session::{ChatSession, SessionParts};
use crate::settings::{ApiKeyStore, ModelStore};

/// Title given to a thread before its first message
pub const NEW_THREAD_TITLE: &str = "New Chat";

/// Assembles a [`ChatSession`] from a backend and the client-side settings
#[derive(Default)]
pub struct ChatSessionBuilder {
    persist: Option<PersistClient>,
    feed: Option<Arc<dyn ChangeFeed>>,
    cache: Option<Arc<QueryCache>>,
    resolver: Option<Arc<dyn ClientResolver>>,
    models: Option<ModelStore>,
    keys: Option<ApiKeyStore>,
    user_id: Option<String>,
    thread_id: Option<String>,
}

impl ChatSessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persistence and change feed from one built backend
    pub fn backend(mut self, backend: &Backend) -> Self {
        self.persist = Some(backend.persist.clone());
        self.feed = Some(backend.feed.clone());
        self
    }

    pub fn persist(mut self, persist: PersistClient) -> Self {
        self.persist = Some(persist);
        self
    }

    pub fn feed(mut self, feed: Arc<dyn ChangeFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn ClientResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn models(mut self, models: ModelStore) -> Self {
        self.models = Some(models);
        self
    }

    pub fn keys(mut self, keys: ApiKeyStore) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Open the session for an existing thread owned by the user
    ///
    /// A thread owned by someone else is reported as not found.
    pub async fn open(mut self) -> Result<ChatSession> {
        let thread_id = self
            .thread_id
            .take()
            .ok_or_else(|| ChatError::Internal("thread_id is required".to_string()))?;
        let user_id = self
            .user_id
            .clone()
            .ok_or_else(|| ChatError::Internal("user_id is required".to_string()))?;
        let persist = self.require_persist()?;

        match persist.threads().get(&thread_id).await? {
            Some(thread) if thread.user_id == user_id => self.assemble(thread_id).await,
            Some(thread) => {
                tracing::warn!(
                    thread_id = %thread.id,
                    user_id = %user_id,
                    "refusing to open a thread owned by another user"
                );
                Err(PersistError::ThreadNotFound(thread_id).into())
            }
            None => Err(PersistError::ThreadNotFound(thread_id).into()),
        }
    }

    /// Create a fresh "New Chat" thread for the user and open it
    pub async fn new_thread(mut self) -> Result<ChatSession> {
        let persist = self.require_persist()?;
        let user_id = self
            .user_id
            .clone()
            .ok_or_else(|| ChatError::Internal("user_id is required".to_string()))?;

        let thread = persist.threads().create(NEW_THREAD_TITLE, &user_id).await?;
        if let Some(cache) = &self.cache {
            cache.invalidate_operation("threads");
        }
        self.thread_id = None;
        self.assemble(thread.id).await
    }

    fn require_persist(&self) -> Result<PersistClient> {
        self.persist
            .clone()
            .ok_or_else(|| ChatError::Internal("backend is required".to_string()))
    }

    async fn assemble(self, thread_id: String) -> Result<ChatSession> {
        let persist = self.require_persist()?;
        let feed = self
            .feed
            .ok_or_else(|| ChatError::Internal("change feed is required".to_string()))?;
        let user_id = self
            .user_id
            .ok_or_else(|| ChatError::Internal("user_id is required".to_string()))?;
        let models = self
            .models
            .ok_or_else(|| ChatError::Internal("model store is required".to_string()))?;
        let keys = self
            .keys
            .ok_or_else(|| ChatError::Internal("API key store is required".to_string()))?;
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(QueryCache::new(CacheConfig::default(), persist.clock().clone()))
        });
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(FactoryResolver::default()));

        if let Err(e) = persist.summaries().dedupe(&thread_id).await {
            tracing::warn!(thread_id = %thread_id, error = %e, "summary dedupe failed");
        }
        let summarized: HashSet<String> = match persist.summaries().list(&thread_id).await {
            Ok(summaries) => summaries.into_iter().map(|s| s.message_id).collect(),
            Err(e) => {
                tracing::warn!(thread_id = %thread_id, error = %e, "could not load existing summaries");
                HashSet::new()
            }
        };

        let transcript = LiveView::messages(&persist, feed.as_ref(), &cache, &thread_id).await?;

        Ok(ChatSession::from_parts(SessionParts {
            persist,
            cache,
            resolver,
            models,
            keys,
            user_id,
            thread_id,
            transcript,
            summarized,
        }))
    }
}
