use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{require_id, PersistError, Result};
use crate::models::User;
use crate::trait_client::PersistenceClient;

#[derive(Clone)]
pub struct UserRepository {
    client: Arc<dyn PersistenceClient>,
    clock: Arc<dyn Clock>,
}

impl UserRepository {
    pub fn new(client: Arc<dyn PersistenceClient>, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock }
    }

    /// Return the user row, creating it on first sight of this identity
    pub async fn ensure(
        &self,
        user_id: &str,
        email: &str,
        name: Option<String>,
    ) -> Result<User> {
        require_id("user_id", user_id)?;
        require_id("email", email)?;

        if let Some(existing) = self.client.get_user(user_id).await? {
            return Ok(existing);
        }

        let now = self.clock.now_millis();
        let user = User {
            id: user_id.to_string(),
            email: email.to_string(),
            name,
            created_at: now,
            updated_at: now,
        };
        let user = self.client.insert_user(user).await?;
        tracing::info!(user_id = %user.id, "created user row");
        Ok(user)
    }

    /// Get user by ID
    pub async fn get(&self, user_id: &str) -> Result<Option<User>> {
        require_id("user_id", user_id)?;
        self.client.get_user(user_id).await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        require_id("email", email)?;
        self.client.find_user_by_email(email).await
    }

    pub async fn update_name(&self, user_id: &str, name: Option<String>) -> Result<User> {
        require_id("user_id", user_id)?;
        self.client
            .update_user_name(user_id, name, self.clock.now_millis())
            .await?
            .ok_or_else(|| PersistError::UserNotFound(user_id.to_string()))
    }
}
