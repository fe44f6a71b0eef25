use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use std::sync::Arc;

use super::{normalize_email, AuthError, AuthProvider, AuthResult, CredentialStore, Session, UserCredentials};
use crate::client::PersistClient;
use crate::models::new_id;

/// Password auth against hashes kept in the backend itself
pub struct StoreAuth {
    persist: PersistClient,
    credentials: Arc<dyn CredentialStore>,
}

impl StoreAuth {
    pub fn new(persist: PersistClient, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { persist, credentials }
    }
}

fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

#[async_trait]
impl AuthProvider for StoreAuth {
    async fn register(&self, email: &str, password: &str, name: Option<String>) -> AuthResult<Session> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(AuthError::Validation("password is required".to_string()));
        }

        if self.credentials.credentials_for(&email).await?.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let user_id = new_id();
        let password_hash = hash_password(password)?;
        let user = self.persist.users().ensure(&user_id, &email, name).await?;
        self.credentials
            .save_credentials(UserCredentials {
                email: email.clone(),
                user_id: user.id.clone(),
                password_hash,
            })
            .await?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(Session {
            user_id: user.id,
            email: user.email,
            name: user.name,
            access_token: None,
        })
    }

    async fn login(&self, email: &str, password: &str) -> AuthResult<Session> {
        let email = normalize_email(email)?;

        let credentials = self
            .credentials
            .credentials_for(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, &credentials.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let user = self
            .persist
            .users()
            .get(&credentials.user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(Session {
            user_id: user.id,
            email: user.email,
            name: user.name,
            access_token: None,
        })
    }

    async fn logout(&self, session: &Session) -> AuthResult<()> {
        tracing::info!(user_id = %session.user_id, "user logged out");
        Ok(())
    }

    async fn resume(&self, _session: &Session) -> AuthResult<()> {
        Ok(())
    }
}
