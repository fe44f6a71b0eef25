pub mod auth;
pub mod builder;
pub mod cache;
pub mod client;
pub mod clock;
pub mod dbs;
pub mod error;
pub mod models;
pub mod realtime;
pub mod repositories;
pub mod trait_client;

pub use auth::{AuthError, AuthProvider, CredentialStore, GoTrueAuth, Session, StoreAuth, UserCredentials};
pub use builder::{Backend, PersistClientBuilder};
pub use cache::{CacheConfig, CacheStats, FetchOutcome, Mutation, QueryCache, QueryHandle, QueryKey};
pub use client::PersistClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use dbs::{MemoryStore, PostgrestStore};
#[cfg(feature = "mongodb")]
pub use dbs::MongoStore;
pub use error::PersistError;
pub use models::{Message, MessageRole, MessageSummary, NewMessage, Record, Thread, ThreadUpdate, User};
pub use realtime::{channel_name, ChangeEvent, ChangeFeed, ChangeKind, LiveView, PollingFeed, Subscription};
pub use repositories::DeleteOutcome;
pub use trait_client::PersistenceClient;
