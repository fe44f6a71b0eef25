use chat0_chat::{
    ApiKeyStore, ChatSessionBuilder, ClientResolver, FactoryResolver, LocalStorage, ModelStore,
    SessionStore,
};
use chat0_persist::{Backend, CacheConfig, PersistClient, QueryCache};
use std::sync::Arc;

use crate::config::{BackendKind, Config};
use crate::error::Result;

/// Everything the REPL shares across commands
///
/// All resources are wrapped in Arc (or are cheap handles over one) so
/// background tasks can hold their own copy.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Backend,
    pub cache: Arc<QueryCache>,
    pub resolver: Arc<dyn ClientResolver>,
    pub models: ModelStore,
    pub keys: ApiKeyStore,
    pub sessions: SessionStore,
}

impl AppState {
    pub async fn build(config: Config) -> Result<Self> {
        let backend = connect(&config).await?;

        let storage = match &config.chat.storage_path {
            Some(path) => LocalStorage::with_path(path),
            None => LocalStorage::open_default()?,
        };
        tracing::info!(path = %storage.path().display(), "settings storage");
        let storage = Arc::new(storage);

        let cache = Arc::new(QueryCache::new(
            CacheConfig::from(&config.cache),
            backend.persist.clock().clone(),
        ));
        let resolver = FactoryResolver::new(config.chat.app_url.as_str(), config.chat.app_title.as_str());

        Ok(Self {
            backend,
            cache,
            resolver: Arc::new(resolver),
            models: ModelStore::load(storage.clone()),
            keys: ApiKeyStore::load(storage.clone()),
            sessions: SessionStore::new(storage),
            config: Arc::new(config),
        })
    }

    pub fn persist(&self) -> &PersistClient {
        &self.backend.persist
    }

    /// Session builder with everything but the user and thread filled in
    pub fn session_builder(&self) -> ChatSessionBuilder {
        ChatSessionBuilder::new()
            .backend(&self.backend)
            .cache(self.cache.clone())
            .resolver(self.resolver.clone())
            .models(self.models.clone())
            .keys(self.keys.clone())
    }
}

async fn connect(config: &Config) -> Result<Backend> {
    let builder = PersistClient::builder().poll_interval(config.poll_interval());

    let builder = match config.backend.kind {
        BackendKind::Memory => {
            tracing::warn!("using the in-memory backend; nothing survives a restart");
            builder.memory()
        }
        BackendKind::Postgrest => builder.postgrest(
            config.backend_url.as_str(),
            config.backend_anon_key.as_str(),
        ),
        #[cfg(feature = "mongodb")]
        BackendKind::Mongodb => builder.mongodb(config.backend_url.as_str(), config.backend.database.as_str()),
        #[cfg(not(feature = "mongodb"))]
        BackendKind::Mongodb => return Err(crate::error::CliError::MongoUnavailable),
    };

    Ok(builder.build().await?)
}
