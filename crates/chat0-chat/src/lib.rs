pub mod builder;
pub mod client_factory;
pub mod error;
pub mod session;
pub mod settings;
pub mod summary;
pub mod types;

pub use builder::ChatSessionBuilder;
pub use client_factory::{ClientResolver, FactoryResolver};
pub use error::{ChatError, SettingsError};
pub use session::ChatSession;
pub use settings::{ApiKeyStore, LocalStorage, ModelStore, SessionStore};
pub use summary::{derive_title, strip_markdown, summarize};
pub use types::{ChatEvent, ChatStatus};
