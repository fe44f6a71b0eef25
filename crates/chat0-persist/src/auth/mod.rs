mod gotrue;
mod store;

pub use gotrue::GoTrueAuth;
pub use store::StoreAuth;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::PersistError;

/// Signed-in identity kept by the client between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Bearer token for backends with row-level security
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already in use")]
    EmailInUse,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        Self::Persist(PersistError::Http(e))
    }
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Login/register pair against whichever identity service the backend uses
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn register(&self, email: &str, password: &str, name: Option<String>) -> AuthResult<Session>;

    async fn login(&self, email: &str, password: &str) -> AuthResult<Session>;

    /// Forget any server-side credentials tied to the session
    async fn logout(&self, session: &Session) -> AuthResult<()>;

    /// Re-establish backend credentials for a session restored from disk
    async fn resume(&self, session: &Session) -> AuthResult<()>;
}

/// Stored password hash for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub email: String,
    pub user_id: String,
    pub password_hash: String,
}

/// Backends that keep password hashes themselves
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn save_credentials(&self, credentials: UserCredentials) -> crate::error::Result<()>;

    async fn credentials_for(&self, email: &str) -> crate::error::Result<Option<UserCredentials>>;
}

pub(crate) fn normalize_email(email: &str) -> AuthResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::Validation("a valid email is required".to_string()));
    }
    Ok(email)
}
