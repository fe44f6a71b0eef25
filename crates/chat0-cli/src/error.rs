use chat0_chat::{ChatError, SettingsError};
use chat0_persist::{AuthError, PersistError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Not signed in. Use /login or /register first.")]
    NotSignedIn,

    #[error("No chat open. Use /new or /open <thread-id>.")]
    NoSession,

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Unknown command: /{0}. Type /help for the list.")]
    UnknownCommand(String),

    #[error("Unknown provider: {0} (expected google, openai or openrouter)")]
    UnknownProvider(String),

    #[error("This build has no MongoDB support; rebuild with --features mongodb")]
    MongoUnavailable,

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
