use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::RwLock;

use crate::error::{PersistError, Result};
use crate::models::{Message, MessageSummary, Thread, ThreadUpdate, User};
use crate::trait_client::PersistenceClient;

const USERS: &str = "users";
const THREADS: &str = "threads";
const MESSAGES: &str = "messages";
const SUMMARIES: &str = "message_summaries";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Hosted Postgres reached through its PostgREST endpoint
///
/// Every request carries the anon key; the bearer is the signed-in user's
/// access token when one is set, so row-level security applies.
pub struct PostgrestStore {
    http_client: Client,
    rest_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

impl PostgrestStore {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http_client: Client::new(),
            rest_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
            anon_key: anon_key.into(),
            access_token: RwLock::new(None),
        }
    }

    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }

    async fn rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: Option<ErrorBody> = serde_json::from_str(&text).ok();
            let (code, message) = match body {
                Some(ErrorBody { code, message }) => (
                    code.unwrap_or_else(|| status.as_u16().to_string()),
                    message.unwrap_or(text),
                ),
                None => (status.as_u16().to_string(), text),
            };
            tracing::warn!(%code, %message, "backend request failed");
            return Err(PersistError::Backend { code, message });
        }
        Ok(response.json::<Vec<T>>().await?)
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        let response = self
            .request(Method::GET, table)
            .query(&[("select", "*".to_string())])
            .query(query)
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn select_one<T: DeserializeOwned>(&self, table: &str, column: &str, value: &str) -> Result<Option<T>> {
        let rows = self
            .select(table, &[(column, format!("eq.{}", value)), ("limit", "1".to_string())])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert<T: Serialize + DeserializeOwned>(&self, table: &str, row: &T) -> Result<T> {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PersistError::Internal(format!("insert into {} returned no row", table)))
    }

    async fn patch<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
        body: serde_json::Value,
    ) -> Result<Option<T>> {
        let response = self
            .request(Method::PATCH, table)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;
        Ok(Self::rows(response).await?.into_iter().next())
    }

    async fn delete_where(&self, table: &str, column: &str, value: &str) -> Result<u64> {
        let response = self
            .request(Method::DELETE, table)
            .query(&[(column, format!("eq.{}", value))])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let removed: Vec<serde_json::Value> = Self::rows(response).await?;
        Ok(removed.len() as u64)
    }
}

#[async_trait]
impl PersistenceClient for PostgrestStore {
    fn backend_name(&self) -> &'static str {
        "postgrest"
    }

    async fn insert_user(&self, user: User) -> Result<User> {
        self.insert(USERS, &user).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.select_one(USERS, "id", user_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.select_one(USERS, "email", email).await
    }

    async fn update_user_name(
        &self,
        user_id: &str,
        name: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<User>> {
        self.patch(
            USERS,
            user_id,
            json!({ "name": name, "updated_at": updated_at.timestamp_millis() }),
        )
        .await
    }

    async fn insert_thread(&self, thread: Thread) -> Result<Thread> {
        self.insert(THREADS, &thread).await
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        self.select_one(THREADS, "id", thread_id).await
    }

    async fn list_threads(&self, user_id: &str) -> Result<Vec<Thread>> {
        self.select(
            THREADS,
            &[
                ("user_id", format!("eq.{}", user_id)),
                ("order", "last_message_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn update_thread(&self, thread_id: &str, update: ThreadUpdate) -> Result<Option<Thread>> {
        // PATCH cannot take a max, so fold last_message_at locally first.
        let Some(mut thread) = self.get_thread(thread_id).await? else {
            return Ok(None);
        };
        update.apply_to(&mut thread);
        let mut body = serde_json::to_value(&update)?;
        if update.last_message_at.is_some() {
            body["last_message_at"] = json!(thread.last_message_at.timestamp_millis());
        }
        self.patch(THREADS, thread_id, body).await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<bool> {
        Ok(self.delete_where(THREADS, "id", thread_id).await? > 0)
    }

    async fn insert_message(&self, message: Message) -> Result<Message> {
        self.insert(MESSAGES, &message).await
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>> {
        self.select_one(MESSAGES, "id", message_id).await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        self.select(
            MESSAGES,
            &[
                ("thread_id", format!("eq.{}", thread_id)),
                ("order", "created_at.asc".to_string()),
            ],
        )
        .await
    }

    async fn delete_message(&self, message_id: &str) -> Result<bool> {
        Ok(self.delete_where(MESSAGES, "id", message_id).await? > 0)
    }

    async fn delete_messages_for_thread(&self, thread_id: &str) -> Result<u64> {
        self.delete_where(MESSAGES, "thread_id", thread_id).await
    }

    async fn insert_summary(&self, summary: MessageSummary) -> Result<MessageSummary> {
        self.insert(SUMMARIES, &summary).await
    }

    async fn list_summaries(&self, thread_id: &str) -> Result<Vec<MessageSummary>> {
        self.select(
            SUMMARIES,
            &[
                ("thread_id", format!("eq.{}", thread_id)),
                ("order", "created_at.asc".to_string()),
            ],
        )
        .await
    }

    async fn delete_summary(&self, summary_id: &str) -> Result<bool> {
        Ok(self.delete_where(SUMMARIES, "id", summary_id).await? > 0)
    }

    async fn delete_summaries_for_thread(&self, thread_id: &str) -> Result<u64> {
        self.delete_where(SUMMARIES, "thread_id", thread_id).await
    }

    async fn delete_summaries_for_message(&self, message_id: &str) -> Result<u64> {
        self.delete_where(SUMMARIES, "message_id", message_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_url_trims_trailing_slash() {
        let store = PostgrestStore::new("https://example.supabase.co/", "anon");
        assert_eq!(store.rest_url(), "https://example.supabase.co/rest/v1");
    }

    #[test]
    fn test_bearer_falls_back_to_anon_key() {
        let store = PostgrestStore::new("http://localhost", "anon");
        assert_eq!(store.bearer(), "anon");

        store.set_access_token(Some("user-token".to_string()));
        assert_eq!(store.bearer(), "user-token");

        store.set_access_token(None);
        assert_eq!(store.bearer(), "anon");
    }
}
