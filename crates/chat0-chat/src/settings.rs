// Client-side settings kept in one JSON file shared by every running client

use chat0_llm::{default_model, model_config, ModelConfig, ProviderType};
use chat0_persist::Session;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::watch;

use crate::error::SettingsError;

pub const SESSION_KEY: &str = "chat0-session";
pub const SELECTED_MODEL_KEY: &str = "selected-model";
pub const API_KEYS_KEY: &str = "api-keys";

type SettingsResult<T> = std::result::Result<T, SettingsError>;

/// Key/value document on disk, one JSON object per file
///
/// Every call re-reads the file so writes from other processes are seen.
#[derive(Debug)]
pub struct LocalStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalStorage {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// `<config dir>/chat0/storage.json`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("chat0").join("storage.json"))
            .ok_or(SettingsError::ConfigDirNotFound)
    }

    pub fn open_default() -> SettingsResult<Self> {
        Ok(Self::with_path(Self::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> SettingsResult<Option<T>> {
        match self.read_all()?.remove(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> SettingsResult<()> {
        let value = serde_json::to_value(value)?;
        self.update(|items| {
            items.insert(key.to_string(), value);
        })
    }

    pub fn remove(&self, key: &str) -> SettingsResult<()> {
        self.update(|items| {
            items.remove(key);
        })
    }

    fn read_all(&self) -> SettingsResult<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn update(&self, change: impl FnOnce(&mut Map<String, Value>)) -> SettingsResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut items = self.read_all()?;
        change(&mut items);

        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&items)?;
        fs::write(&self.path, json).map_err(io_err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectedModel {
    selected_model: String,
}

/// The model used for the next send, shared by every handle in the process
#[derive(Clone)]
pub struct ModelStore {
    storage: Arc<LocalStorage>,
    tx: Arc<watch::Sender<&'static ModelConfig>>,
}

impl ModelStore {
    /// Load the saved choice; unknown or missing names fall back to the default
    pub fn load(storage: Arc<LocalStorage>) -> Self {
        let selected = match storage.get::<SelectedModel>(SELECTED_MODEL_KEY) {
            Ok(Some(saved)) => model_config(&saved.selected_model).unwrap_or_else(|| {
                tracing::warn!(model = %saved.selected_model, "saved model not in catalog, using default");
                default_model()
            }),
            Ok(None) => default_model(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read selected model, using default");
                default_model()
            }
        };
        let (tx, _rx) = watch::channel(selected);
        Self {
            storage,
            tx: Arc::new(tx),
        }
    }

    pub fn selected(&self) -> &'static ModelConfig {
        *self.tx.borrow()
    }

    pub fn set_model(&self, name: &str) -> SettingsResult<&'static ModelConfig> {
        let config = model_config(name).ok_or_else(|| SettingsError::UnknownModel(name.to_string()))?;
        self.storage.set(
            SELECTED_MODEL_KEY,
            &SelectedModel {
                selected_model: config.name.to_string(),
            },
        )?;
        self.tx.send_replace(config);
        tracing::info!(model = config.name, provider = %config.provider, "model selected");
        Ok(config)
    }

    pub fn subscribe(&self) -> watch::Receiver<&'static ModelConfig> {
        self.tx.subscribe()
    }

    /// Take a change written by another client without writing it back
    ///
    /// Returns whether the selection changed. Events for other keys and
    /// values naming unknown models are ignored.
    pub fn apply_storage_event(&self, key: &str, new_value: Option<&str>) -> bool {
        if key != SELECTED_MODEL_KEY {
            return false;
        }
        let Some(raw) = new_value else {
            return false;
        };
        let config = match serde_json::from_str::<SelectedModel>(raw) {
            Ok(saved) => match model_config(&saved.selected_model) {
                Some(config) => config,
                None => return false,
            },
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed model sync event");
                return false;
            }
        };
        self.tx.send_if_modified(|current| {
            if current.name == config.name {
                false
            } else {
                *current = config;
                true
            }
        })
    }
}

/// Per-provider API keys entered by the user
#[derive(Clone)]
pub struct ApiKeyStore {
    storage: Arc<LocalStorage>,
    keys: Arc<RwLock<HashMap<ProviderType, String>>>,
}

impl ApiKeyStore {
    pub fn load(storage: Arc<LocalStorage>) -> Self {
        let keys = match storage.get::<HashMap<ProviderType, String>>(API_KEYS_KEY) {
            Ok(keys) => keys.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read API keys");
                HashMap::new()
            }
        };
        Self {
            storage,
            keys: Arc::new(RwLock::new(keys)),
        }
    }

    pub fn get_key(&self, provider: ProviderType) -> Option<String> {
        self.keys
            .read()
            .ok()?
            .get(&provider)
            .filter(|key| !key.trim().is_empty())
            .cloned()
    }

    /// Save a key; an empty key removes it
    pub fn set_key(&self, provider: ProviderType, key: &str) -> SettingsResult<()> {
        let snapshot = {
            let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
            let key = key.trim();
            if key.is_empty() {
                keys.remove(&provider);
            } else {
                keys.insert(provider, key.to_string());
            }
            keys.clone()
        };
        self.storage.set(API_KEYS_KEY, &snapshot)?;
        tracing::info!(%provider, "API key updated");
        Ok(())
    }

    /// Google is the default provider, so its key is the one that must exist
    pub fn has_required_keys(&self) -> bool {
        self.get_key(ProviderType::Google).is_some()
    }
}

/// Signed-in session remembered between runs
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<LocalStorage>,
}

impl SessionStore {
    pub fn new(storage: Arc<LocalStorage>) -> Self {
        Self { storage }
    }

    pub fn save(&self, session: &Session) -> SettingsResult<()> {
        self.storage.set(SESSION_KEY, session)
    }

    pub fn load(&self) -> SettingsResult<Option<Session>> {
        self.storage.get(SESSION_KEY)
    }

    pub fn clear(&self) -> SettingsResult<()> {
        self.storage.remove(SESSION_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> Arc<LocalStorage> {
        Arc::new(LocalStorage::with_path(dir.path().join("storage.json")))
    }

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = storage(&dir);
        assert_eq!(store.get::<String>("anything").unwrap(), None);
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let store = storage(&dir);
        fs::write(store.path(), "{ nope").unwrap();
        assert!(matches!(store.get::<String>("k"), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn test_model_selection_is_persisted_in_camel_case() {
        let dir = TempDir::new().unwrap();
        let store = storage(&dir);
        let models = ModelStore::load(store.clone());
        assert_eq!(models.selected().name, "Gemini 2.0 Flash");

        models.set_model("GPT-4o").unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw[SELECTED_MODEL_KEY]["selectedModel"], "GPT-4o");
        assert_eq!(ModelStore::load(store).selected().model_id, "gpt-4o");
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let dir = TempDir::new().unwrap();
        let models = ModelStore::load(storage(&dir));
        assert!(matches!(
            models.set_model("GPT-9"),
            Err(SettingsError::UnknownModel(_))
        ));
        assert_eq!(models.selected().name, "Gemini 2.0 Flash");
    }

    #[test]
    fn test_storage_event_updates_without_saving() {
        let dir = TempDir::new().unwrap();
        let store = storage(&dir);
        let models = ModelStore::load(store.clone());
        let mut rx = models.subscribe();

        assert!(models.apply_storage_event(SELECTED_MODEL_KEY, Some(r#"{"selectedModel":"Deepseek V3"}"#)));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().provider, ProviderType::OpenRouter);
        assert!(!store.path().exists());

        assert!(!models.apply_storage_event(SELECTED_MODEL_KEY, Some(r#"{"selectedModel":"Deepseek V3"}"#)));
        assert!(!models.apply_storage_event("api-keys", Some("{}")));
        assert!(!models.apply_storage_event(SELECTED_MODEL_KEY, Some("garbage")));
    }

    #[test]
    fn test_api_keys_roundtrip_and_required() {
        let dir = TempDir::new().unwrap();
        let store = storage(&dir);
        let keys = ApiKeyStore::load(store.clone());
        assert!(!keys.has_required_keys());

        keys.set_key(ProviderType::OpenAI, "sk-1").unwrap();
        assert!(!keys.has_required_keys());
        keys.set_key(ProviderType::Google, " g-1 ").unwrap();
        assert!(keys.has_required_keys());

        let reloaded = ApiKeyStore::load(store);
        assert_eq!(reloaded.get_key(ProviderType::Google).as_deref(), Some("g-1"));
        assert_eq!(reloaded.get_key(ProviderType::OpenAI).as_deref(), Some("sk-1"));

        reloaded.set_key(ProviderType::OpenAI, "").unwrap();
        assert_eq!(reloaded.get_key(ProviderType::OpenAI), None);
    }

    #[test]
    fn test_session_store() {
        let dir = TempDir::new().unwrap();
        let sessions = SessionStore::new(storage(&dir));
        let session = Session {
            user_id: "u1".to_string(),
            email: "ada@example.com".to_string(),
            name: None,
            access_token: Some("jwt".to_string()),
        };

        sessions.save(&session).unwrap();
        assert_eq!(sessions.load().unwrap(), Some(session));
        sessions.clear().unwrap();
        assert_eq!(sessions.load().unwrap(), None);
    }
}
