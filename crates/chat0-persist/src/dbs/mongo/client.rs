use async_trait::async_trait;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};

use super::models::{MongoCredentials, MongoMessage, MongoSummary, MongoThread, MongoUser};
use crate::auth::{CredentialStore, UserCredentials};
use crate::error::{PersistError, Result};
use crate::models::{Message, MessageSummary, Thread, ThreadUpdate, User};
use crate::trait_client::PersistenceClient;

pub struct MongoStore {
    users: Collection<MongoUser>,
    threads: Collection<MongoThread>,
    messages: Collection<MongoMessage>,
    summaries: Collection<MongoSummary>,
    credentials: Collection<MongoCredentials>,
}

impl MongoStore {
    /// Connect to MongoDB and make sure the lookup indexes exist
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;
        let db = client.database(database);

        let store = Self {
            users: db.collection("users"),
            threads: db.collection("threads"),
            messages: db.collection("messages"),
            summaries: db.collection("message_summaries"),
            credentials: db.collection("credentials"),
        };
        store.ensure_indexes().await?;

        tracing::info!(database, "connected to MongoDB");
        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<()> {
        self.users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await?;
        self.threads
            .create_index(IndexModel::builder().keys(doc! { "user_id": 1, "last_message_at": -1 }).build())
            .await?;
        self.messages
            .create_index(IndexModel::builder().keys(doc! { "thread_id": 1, "created_at": 1 }).build())
            .await?;
        self.summaries
            .create_index(IndexModel::builder().keys(doc! { "thread_id": 1 }).build())
            .await?;
        self.summaries
            .create_index(IndexModel::builder().keys(doc! { "message_id": 1 }).build())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceClient for MongoStore {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    async fn insert_user(&self, user: User) -> Result<User> {
        self.users.insert_one(MongoUser::from(user.clone())).await?;
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.users.find_one(doc! { "_id": user_id }).await?.map(Into::into))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.find_one(doc! { "email": email }).await?.map(Into::into))
    }

    async fn update_user_name(
        &self,
        user_id: &str,
        name: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let update = doc! {
            "$set": { "name": name, "updated_at": updated_at.timestamp_millis() }
        };
        let user = self
            .users
            .find_one_and_update(doc! { "_id": user_id }, update)
            .return_document(ReturnDocument::After)
            .await?;
        Ok(user.map(Into::into))
    }

    async fn insert_thread(&self, thread: Thread) -> Result<Thread> {
        self.threads.insert_one(MongoThread::from(thread.clone())).await?;
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        Ok(self.threads.find_one(doc! { "_id": thread_id }).await?.map(Into::into))
    }

    async fn list_threads(&self, user_id: &str) -> Result<Vec<Thread>> {
        let threads: Vec<MongoThread> = self
            .threads
            .find(doc! { "user_id": user_id })
            .sort(doc! { "last_message_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(threads.into_iter().map(Into::into).collect())
    }

    async fn update_thread(&self, thread_id: &str, update: ThreadUpdate) -> Result<Option<Thread>> {
        let mut set = Document::new();
        if let Some(title) = &update.title {
            set.insert("title", title.as_str());
        }
        if let Some(updated_at) = update.updated_at {
            set.insert("updated_at", updated_at.timestamp_millis());
        }

        let mut ops = Document::new();
        if !set.is_empty() {
            ops.insert("$set", set);
        }
        if let Some(last_message_at) = update.last_message_at {
            ops.insert("$max", doc! { "last_message_at": last_message_at.timestamp_millis() });
        }
        if ops.is_empty() {
            return self.get_thread(thread_id).await;
        }

        let thread = self
            .threads
            .find_one_and_update(doc! { "_id": thread_id }, ops)
            .return_document(ReturnDocument::After)
            .await?;
        Ok(thread.map(Into::into))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<bool> {
        let result = self.threads.delete_one(doc! { "_id": thread_id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_message(&self, message: Message) -> Result<Message> {
        self.messages.insert_one(MongoMessage::from(message.clone())).await?;
        Ok(message)
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>> {
        Ok(self.messages.find_one(doc! { "_id": message_id }).await?.map(Into::into))
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        let messages: Vec<MongoMessage> = self
            .messages
            .find(doc! { "thread_id": thread_id })
            .sort(doc! { "created_at": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(messages.into_iter().map(Into::into).collect())
    }

    async fn delete_message(&self, message_id: &str) -> Result<bool> {
        let result = self.messages.delete_one(doc! { "_id": message_id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_messages_for_thread(&self, thread_id: &str) -> Result<u64> {
        let result = self.messages.delete_many(doc! { "thread_id": thread_id }).await?;
        Ok(result.deleted_count)
    }

    async fn insert_summary(&self, summary: MessageSummary) -> Result<MessageSummary> {
        self.summaries.insert_one(MongoSummary::from(summary.clone())).await?;
        Ok(summary)
    }

    async fn list_summaries(&self, thread_id: &str) -> Result<Vec<MessageSummary>> {
        let summaries: Vec<MongoSummary> = self
            .summaries
            .find(doc! { "thread_id": thread_id })
            .sort(doc! { "created_at": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(summaries.into_iter().map(Into::into).collect())
    }

    async fn delete_summary(&self, summary_id: &str) -> Result<bool> {
        let result = self.summaries.delete_one(doc! { "_id": summary_id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_summaries_for_thread(&self, thread_id: &str) -> Result<u64> {
        let result = self.summaries.delete_many(doc! { "thread_id": thread_id }).await?;
        Ok(result.deleted_count)
    }

    async fn delete_summaries_for_message(&self, message_id: &str) -> Result<u64> {
        let result = self.summaries.delete_many(doc! { "message_id": message_id }).await?;
        Ok(result.deleted_count)
    }
}

#[async_trait]
impl CredentialStore for MongoStore {
    async fn save_credentials(&self, credentials: UserCredentials) -> Result<()> {
        let doc = MongoCredentials::from(credentials);
        self.credentials
            .replace_one(doc! { "_id": doc.email.as_str() }, &doc)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn credentials_for(&self, email: &str) -> Result<Option<UserCredentials>> {
        Ok(self.credentials.find_one(doc! { "_id": email }).await?.map(Into::into))
    }
}
