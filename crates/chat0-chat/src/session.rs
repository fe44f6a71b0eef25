use chat0_llm::{ChatClient, ChatOptions, ChatRequest, ModelConfig};
use chat0_persist::{
    LiveView, Message, MessageRole, MessageSummary, NewMessage, PersistClient, QueryCache,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::client_factory::ClientResolver;
use crate::error::{ChatError, Result};
use crate::settings::{ApiKeyStore, ModelStore};
use crate::summary::{derive_title, summarize};
use crate::types::{ChatEvent, ChatStatus};

const EVENT_CAPACITY: usize = 64;

struct SessionState {
    status: ChatStatus,
    /// Bumped on every dispatch and on stop; a reply is kept only if it still matches
    epoch: u64,
    error: Option<String>,
    summarized: HashSet<String>,
}

/// One signed-in user talking in one thread
///
/// The transcript is a [`LiveView`] over the thread's messages, so rows
/// written by other clients show up on the next [`ChatSession::sync`] or
/// send. Only one provider call is in flight at a time.
pub struct ChatSession {
    persist: PersistClient,
    cache: Arc<QueryCache>,
    resolver: Arc<dyn ClientResolver>,
    models: ModelStore,
    keys: ApiKeyStore,
    user_id: String,
    thread_id: String,
    transcript: Mutex<LiveView<Message>>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<ChatEvent>,
}

pub(crate) struct SessionParts {
    pub persist: PersistClient,
    pub cache: Arc<QueryCache>,
    pub resolver: Arc<dyn ClientResolver>,
    pub models: ModelStore,
    pub keys: ApiKeyStore,
    pub user_id: String,
    pub thread_id: String,
    pub transcript: LiveView<Message>,
    pub summarized: HashSet<String>,
}

impl ChatSession {
    pub(crate) fn from_parts(parts: SessionParts) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        tracing::info!(
            thread_id = %parts.thread_id,
            user_id = %parts.user_id,
            messages = parts.transcript.len(),
            "chat session opened"
        );
        Self {
            persist: parts.persist,
            cache: parts.cache,
            resolver: parts.resolver,
            models: parts.models,
            keys: parts.keys,
            user_id: parts.user_id,
            thread_id: parts.thread_id,
            transcript: Mutex::new(parts.transcript),
            state: Mutex::new(SessionState {
                status: ChatStatus::Idle,
                epoch: 0,
                error: None,
                summarized: parts.summarized,
            }),
            events,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> ChatStatus {
        self.state().status
    }

    /// Last provider failure, cleared by the next send
    pub fn error_banner(&self) -> Option<String> {
        self.state().error.clone()
    }

    /// Snapshot of the transcript, oldest first
    pub fn messages(&self) -> Vec<Message> {
        let mut transcript = self.transcript();
        transcript.drain_pending();
        transcript.items().to_vec()
    }

    /// Apply feed events that arrived since the last call; returns how many changed the transcript
    pub fn sync(&self) -> usize {
        self.transcript().drain_pending()
    }

    pub async fn summaries(&self) -> Result<Vec<MessageSummary>> {
        Ok(self.persist.summaries().list(&self.thread_id).await?)
    }

    /// Send a user message and wait for the reply
    ///
    /// Returns `Ok(None)` when [`ChatSession::stop`] was called before the
    /// provider answered; the late reply is dropped.
    pub async fn submit(&self, text: &str) -> Result<Option<Message>> {
        let content = text.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let (model, client) = self.preflight()?;
        let epoch = self.begin_generation()?;

        self.append_user_message(content).await;
        self.dispatch(model, client, epoch).await
    }

    /// Abandon the in-flight reply, if any
    pub fn stop(&self) {
        let stopped = {
            let mut state = self.state();
            if state.status == ChatStatus::Generating {
                state.status = ChatStatus::Idle;
                state.epoch += 1;
                true
            } else {
                false
            }
        };
        if stopped {
            tracing::info!(thread_id = %self.thread_id, "generation stopped");
            self.emit(ChatEvent::StatusChanged {
                status: ChatStatus::Idle,
            });
        }
    }

    /// Ask again from a point in the transcript
    ///
    /// From a user message, everything after it is dropped. From an
    /// assistant message, the transcript rewinds to the user message that
    /// prompted it.
    pub async fn regenerate(&self, message_id: &str) -> Result<Option<Message>> {
        let (model, client) = self.preflight()?;
        let anchor = self.prompt_for(message_id)?;
        let epoch = self.begin_generation()?;

        let removed = self.transcript().truncate_after(&anchor, false);
        self.remove_messages(removed).await;

        tracing::info!(thread_id = %self.thread_id, anchor = %anchor, "regenerating reply");
        self.dispatch(model, client, epoch).await
    }

    /// Replace a user message and everything after it, then send the new text
    pub async fn edit(&self, message_id: &str, content: &str) -> Result<Option<Message>> {
        if content.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        self.preflight()?;
        if self.status() == ChatStatus::Generating {
            return Err(ChatError::Busy);
        }

        let removed = {
            let mut transcript = self.transcript();
            transcript.drain_pending();
            if transcript.get(message_id).is_none() {
                return Err(ChatError::MessageNotFound(message_id.to_string()));
            }
            transcript.truncate_after(message_id, true)
        };
        self.remove_messages(removed).await;

        self.submit(content).await
    }

    fn preflight(&self) -> Result<(&'static ModelConfig, Arc<dyn ChatClient>)> {
        let model = self.models.selected();
        let Some(api_key) = self.keys.get_key(model.provider) else {
            tracing::warn!(provider = %model.provider, model = model.name, "no API key for selected model");
            self.emit(ChatEvent::ApiKeyMissing {
                provider: model.provider,
            });
            return Err(ChatError::MissingApiKey {
                provider: model.provider,
            });
        };

        let client = self
            .resolver
            .resolve(model.provider, &api_key)
            .map_err(|e| ChatError::Provider(e.to_string()))?;
        Ok((model, client))
    }

    fn begin_generation(&self) -> Result<u64> {
        let epoch = {
            let mut state = self.state();
            if state.status == ChatStatus::Generating {
                return Err(ChatError::Busy);
            }
            state.status = ChatStatus::Generating;
            state.error = None;
            state.epoch += 1;
            state.epoch
        };
        self.emit(ChatEvent::StatusChanged {
            status: ChatStatus::Generating,
        });
        Ok(epoch)
    }

    fn finish_generation(&self, epoch: u64) {
        let finished = {
            let mut state = self.state();
            if state.epoch == epoch && state.status == ChatStatus::Generating {
                state.status = ChatStatus::Idle;
                true
            } else {
                false
            }
        };
        if finished {
            self.emit(ChatEvent::StatusChanged {
                status: ChatStatus::Idle,
            });
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        let state = self.state();
        state.epoch == epoch && state.status == ChatStatus::Generating
    }

    /// The user message a regenerate from `message_id` starts after
    fn prompt_for(&self, message_id: &str) -> Result<String> {
        let mut transcript = self.transcript();
        transcript.drain_pending();
        let items = transcript.items();

        let index = items
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| ChatError::MessageNotFound(message_id.to_string()))?;
        if items[index].role == MessageRole::User {
            return Ok(message_id.to_string());
        }

        items[..index]
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.id.clone())
            .ok_or_else(|| ChatError::MessageNotFound(message_id.to_string()))
    }

    async fn append_user_message(&self, content: &str) {
        let message = self.local_message(MessageRole::User, content);
        let first_prompt = {
            let mut transcript = self.transcript();
            transcript.drain_pending();
            let first = !transcript.items().iter().any(|m| m.role == MessageRole::User);
            transcript.insert_local(message.clone());
            first
        };
        self.emit(ChatEvent::MessageAppended {
            message: message.clone(),
        });

        let persisted = self.persist_message(&message).await;

        if first_prompt {
            let title = derive_title(content);
            match self.persist.threads().rename(&self.thread_id, title.as_str()).await {
                Ok(thread) => {
                    self.cache.invalidate_operation("threads");
                    self.emit(ChatEvent::TitleChanged {
                        thread_id: thread.id,
                        title: thread.title,
                    });
                }
                Err(e) => {
                    tracing::warn!(thread_id = %self.thread_id, error = %e, "failed to set thread title")
                }
            }
        }

        if persisted {
            self.create_summary(&message).await;
        }
    }

    async fn dispatch(
        &self,
        model: &'static ModelConfig,
        client: Arc<dyn ChatClient>,
        epoch: u64,
    ) -> Result<Option<Message>> {
        let history: Vec<chat0_llm::Message> = {
            let mut transcript = self.transcript();
            transcript.drain_pending();
            transcript.items().iter().map(chat0_llm::Message::from).collect()
        };
        let request = ChatRequest::new(model.model_id, history).with_options(ChatOptions::chat0_defaults());

        tracing::info!(
            thread_id = %self.thread_id,
            provider = client.provider_name(),
            model = model.model_id,
            messages = request.messages.len(),
            "dispatching chat request"
        );
        let reply = match client.chat(request).await {
            Ok(response) => response.text().map(str::to_string),
            Err(e) => Err(e),
        };

        if !self.is_current(epoch) {
            tracing::debug!(thread_id = %self.thread_id, "discarding reply after stop");
            return Ok(None);
        }

        let text = match reply {
            Ok(text) => text,
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(thread_id = %self.thread_id, provider = client.provider_name(), error = %message, "provider call failed");
                self.state().error = Some(message.clone());
                self.emit(ChatEvent::Toast {
                    message: message.clone(),
                });
                self.finish_generation(epoch);
                return Err(ChatError::Provider(message));
            }
        };

        let message = self.local_message(MessageRole::Assistant, &text);
        self.transcript().insert_local(message.clone());
        self.emit(ChatEvent::MessageAppended {
            message: message.clone(),
        });

        if self.persist_message(&message).await {
            self.create_summary(&message).await;
        }
        self.finish_generation(epoch);
        Ok(Some(message))
    }

    fn local_message(&self, role: MessageRole, content: &str) -> Message {
        Message {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: self.thread_id.clone(),
            content: content.to_string(),
            role,
            user_id: self.user_id.clone(),
            created_at: self.persist.clock().now_millis(),
        }
    }

    async fn persist_message(&self, message: &Message) -> bool {
        let new = NewMessage::new(
            message.thread_id.as_str(),
            message.user_id.as_str(),
            message.role,
            message.content.as_str(),
        )
        .with_id(message.id.as_str())
        .created_at(message.created_at);

        match self.persist.messages().create(new).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(message_id = %message.id, thread_id = %self.thread_id, error = %e, "failed to persist message");
                false
            }
        }
    }

    async fn create_summary(&self, message: &Message) {
        if !self.state().summarized.insert(message.id.clone()) {
            return;
        }

        let result = self
            .persist
            .summaries()
            .create(&self.thread_id, &message.id, summarize(&message.content), &self.user_id)
            .await;
        match result {
            Ok(summary) => self.emit(ChatEvent::SummaryCreated { summary }),
            Err(e) => {
                self.state().summarized.remove(&message.id);
                tracing::warn!(message_id = %message.id, error = %e, "failed to create summary");
            }
        }
    }

    async fn remove_messages(&self, removed: Vec<Message>) {
        if removed.is_empty() {
            return;
        }

        let mut ids = Vec::with_capacity(removed.len());
        for message in removed {
            if let Err(e) = self.persist.messages().delete(&message.id).await {
                tracing::warn!(message_id = %message.id, error = %e, "failed to delete message");
            }
            self.state().summarized.remove(&message.id);
            ids.push(message.id);
        }
        self.emit(ChatEvent::MessagesRemoved { ids });
    }

    fn emit(&self, event: ChatEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transcript(&self) -> MutexGuard<'_, LiveView<Message>> {
        self.transcript.lock().unwrap_or_else(|e| e.into_inner())
    }
}
