use chat0_llm::ProviderType;
use chat0_persist::PersistError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("API key missing for {provider}. Please add your API key in the settings.")]
    MissingApiKey { provider: ProviderType },

    #[error("A response is already being generated")]
    Busy,

    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Provider call failed; the message is what the user sees
    #[error("{0}")]
    Provider(String),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Could not determine config directory")]
    ConfigDirNotFound,
}
