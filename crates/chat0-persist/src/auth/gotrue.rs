use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{normalize_email, AuthError, AuthProvider, AuthResult, Session};
use crate::client::PersistClient;
use crate::dbs::PostgrestStore;
use crate::error::PersistError;

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Value,
}

/// Sign-in returns `{access_token, user}`; sign-up with confirmation pending
/// returns the bare user object.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    user: Option<AuthUser>,
    #[serde(flatten)]
    bare: Option<AuthUser>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    error: Option<String>,
    error_code: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
}

/// Hosted identity service sitting next to the PostgREST backend
///
/// Successful sign-in hands the access token to the REST store so later
/// queries run as the user.
pub struct GoTrueAuth {
    http_client: Client,
    auth_url: String,
    anon_key: String,
    persist: PersistClient,
    rest: Arc<PostgrestStore>,
}

impl GoTrueAuth {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        persist: PersistClient,
        rest: Arc<PostgrestStore>,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            http_client: Client::new(),
            auth_url: format!("{}/auth/v1", base_url.trim_end_matches('/')),
            anon_key: anon_key.into(),
            persist,
            rest,
        }
    }

    async fn post(&self, path: &str, query: &[(&str, &str)], body: serde_json::Value) -> AuthResult<TokenResponse> {
        let response = self
            .http_client
            .post(format!("{}{}", self.auth_url, path))
            .query(query)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let body: AuthErrorBody = serde_json::from_str(&text).unwrap_or_default();
            return Err(map_error(status.as_u16(), body, text));
        }
        serde_json::from_str(&text).map_err(|e| AuthError::Persist(PersistError::Serialization(e)))
    }

    async fn start_session(&self, response: TokenResponse, fallback_email: &str) -> AuthResult<Session> {
        let user = response
            .user
            .or(response.bare)
            .ok_or_else(|| AuthError::Persist(PersistError::Internal("auth response had no user".to_string())))?;
        let email = user.email.unwrap_or_else(|| fallback_email.to_string());
        let name = user
            .user_metadata
            .get("name")
            .and_then(|n| n.as_str())
            .map(str::to_string);

        self.rest.set_access_token(response.access_token.clone());
        let row = self.persist.users().ensure(&user.id, &email, name).await?;

        Ok(Session {
            user_id: row.id,
            email: row.email,
            name: row.name,
            access_token: response.access_token,
        })
    }
}

fn map_error(status: u16, body: AuthErrorBody, raw: String) -> AuthError {
    let code = body.error_code.as_deref().or(body.error.as_deref()).unwrap_or("");
    let message = body
        .msg
        .clone()
        .or(body.error_description.clone())
        .unwrap_or(raw);

    if code == "user_already_exists" || message.contains("already registered") {
        return AuthError::EmailInUse;
    }
    if code == "invalid_grant" || code == "invalid_credentials" {
        return AuthError::InvalidCredentials;
    }
    let code = if code.is_empty() { status.to_string() } else { code.to_string() };
    AuthError::Persist(PersistError::Backend { code, message })
}

#[async_trait]
impl AuthProvider for GoTrueAuth {
    async fn register(&self, email: &str, password: &str, name: Option<String>) -> AuthResult<Session> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(AuthError::Validation("password is required".to_string()));
        }

        let response = self
            .post(
                "/signup",
                &[],
                json!({ "email": email, "password": password, "data": { "name": name } }),
            )
            .await?;
        let session = self.start_session(response, &email).await?;
        tracing::info!(user_id = %session.user_id, "user registered");
        Ok(session)
    }

    async fn login(&self, email: &str, password: &str) -> AuthResult<Session> {
        let email = normalize_email(email)?;
        let response = self
            .post(
                "/token",
                &[("grant_type", "password")],
                json!({ "email": email, "password": password }),
            )
            .await?;
        let session = self.start_session(response, &email).await?;
        tracing::info!(user_id = %session.user_id, "user logged in");
        Ok(session)
    }

    async fn logout(&self, session: &Session) -> AuthResult<()> {
        if let Some(token) = &session.access_token {
            let result = self
                .http_client
                .post(format!("{}/logout", self.auth_url))
                .header("apikey", &self.anon_key)
                .bearer_auth(token)
                .send()
                .await;
            if let Err(e) = result {
                tracing::warn!(error = %e, "remote sign-out failed");
            }
        }
        self.rest.set_access_token(None);
        Ok(())
    }

    async fn resume(&self, session: &Session) -> AuthResult<()> {
        self.rest.set_access_token(session.access_token.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> AuthErrorBody {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_map_error_email_in_use() {
        let err = map_error(422, body(r#"{"error_code":"user_already_exists","msg":"User already registered"}"#), String::new());
        assert!(matches!(err, AuthError::EmailInUse));
    }

    #[test]
    fn test_map_error_invalid_grant() {
        let err = map_error(
            400,
            body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            String::new(),
        );
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn test_map_error_passes_other_messages_through() {
        let err = map_error(500, AuthErrorBody::default(), "boom".to_string());
        match err {
            AuthError::Persist(PersistError::Backend { code, message }) => {
                assert_eq!(code, "500");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
