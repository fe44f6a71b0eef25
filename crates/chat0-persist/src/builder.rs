use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthProvider, GoTrueAuth, StoreAuth};
use crate::client::PersistClient;
use crate::clock::{Clock, SystemClock};
use crate::dbs::{MemoryStore, PostgrestStore};
use crate::error::{PersistError, Result};
use crate::realtime::{ChangeFeed, PollingFeed};

#[derive(Debug, Clone)]
enum BackendKind {
    Memory,
    Postgrest { url: String, anon_key: String },
    #[cfg(feature = "mongodb")]
    MongoDb { uri: String, database: String },
}

/// Everything a client needs from one backend
#[derive(Clone)]
pub struct Backend {
    pub persist: PersistClient,
    pub feed: Arc<dyn ChangeFeed>,
    pub auth: Arc<dyn AuthProvider>,
}

pub struct PersistClientBuilder {
    kind: Option<BackendKind>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl PersistClientBuilder {
    pub fn new() -> Self {
        Self {
            kind: None,
            clock: Arc::new(SystemClock),
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn memory(mut self) -> Self {
        self.kind = Some(BackendKind::Memory);
        self
    }

    pub fn postgrest(mut self, url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        self.kind = Some(BackendKind::Postgrest {
            url: url.into(),
            anon_key: anon_key.into(),
        });
        self
    }

    #[cfg(feature = "mongodb")]
    pub fn mongodb(mut self, uri: impl Into<String>, database: impl Into<String>) -> Self {
        self.kind = Some(BackendKind::MongoDb {
            uri: uri.into(),
            database: database.into(),
        });
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// How often polled change feeds re-query the backend
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub async fn build(self) -> Result<Backend> {
        let kind = self
            .kind
            .ok_or_else(|| PersistError::Internal("backend is required".to_string()))?;

        let backend = match kind {
            BackendKind::Memory => {
                let store = Arc::new(MemoryStore::new());
                let persist = PersistClient::with_clock(store.clone(), self.clock);
                let auth = StoreAuth::new(persist.clone(), store.clone());
                Backend {
                    persist,
                    feed: store,
                    auth: Arc::new(auth),
                }
            }
            BackendKind::Postgrest { url, anon_key } => {
                if url.trim().is_empty() {
                    return Err(PersistError::Internal("url is required".to_string()));
                }
                if anon_key.trim().is_empty() {
                    return Err(PersistError::Internal("anon_key is required".to_string()));
                }
                let store = Arc::new(PostgrestStore::new(url.as_str(), anon_key.as_str()));
                let persist = PersistClient::with_clock(store.clone(), self.clock);
                let auth = GoTrueAuth::new(url, anon_key, persist.clone(), store.clone());
                Backend {
                    feed: Arc::new(PollingFeed::new(store, self.poll_interval)),
                    persist,
                    auth: Arc::new(auth),
                }
            }
            #[cfg(feature = "mongodb")]
            BackendKind::MongoDb { uri, database } => {
                let store = Arc::new(crate::dbs::MongoStore::connect(&uri, &database).await?);
                let persist = PersistClient::with_clock(store.clone(), self.clock);
                let auth = StoreAuth::new(persist.clone(), store.clone());
                Backend {
                    feed: Arc::new(PollingFeed::new(store, self.poll_interval)),
                    persist,
                    auth: Arc::new(auth),
                }
            }
        };

        tracing::info!(backend = backend.persist.backend().backend_name(), "persistence ready");
        Ok(backend)
    }
}

impl Default for PersistClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
