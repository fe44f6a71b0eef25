use async_trait::async_trait;
use chat0_chat::{
    ApiKeyStore, ChatError, ChatEvent, ChatSession, ChatSessionBuilder, ChatStatus, ClientResolver,
    LocalStorage, ModelStore,
};
use chat0_llm::{ChatClient, ChatRequest, ChatResponse, ProviderType};
use chat0_persist::{MemoryStore, MessageRole, PersistClient, PersistError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, Notify};

const USER_ID: &str = "user-1";

/// Answers from a script; optionally waits on a gate before answering
#[derive(Default)]
struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedClient {
    fn replying(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            ..Self::default()
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(message.to_string())])),
            ..Self::default()
        }
    }

    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn chat(&self, request: ChatRequest) -> anyhow::Result<ChatResponse> {
        self.requests.lock().unwrap().push(request);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()));
        match reply {
            Ok(text) => Ok(ChatResponse {
                content: Some(text),
                usage: None,
                finish_reason: Some("stop".to_string()),
                raw: serde_json::Value::Null,
            }),
            Err(message) => Err(anyhow::anyhow!(message)),
        }
    }

    fn provider_name(&self) -> &'static str {
        "Scripted"
    }
}

/// Hands out the same scripted client and remembers who asked for what
struct RecordingResolver {
    client: Arc<ScriptedClient>,
    calls: Mutex<Vec<(ProviderType, String)>>,
}

impl ClientResolver for RecordingResolver {
    fn resolve(&self, provider: ProviderType, api_key: &str) -> anyhow::Result<Arc<dyn ChatClient>> {
        self.calls.lock().unwrap().push((provider, api_key.to_string()));
        Ok(self.client.clone())
    }
}

struct Harness {
    _dir: TempDir,
    store: Arc<MemoryStore>,
    persist: PersistClient,
    client: Arc<ScriptedClient>,
    resolver: Arc<RecordingResolver>,
    models: ModelStore,
    keys: ApiKeyStore,
}

impl Harness {
    fn new(client: ScriptedClient) -> Self {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(LocalStorage::with_path(dir.path().join("storage.json")));
        let store = Arc::new(MemoryStore::new());
        let client = Arc::new(client);

        Self {
            persist: PersistClient::new(store.clone()),
            store,
            resolver: Arc::new(RecordingResolver {
                client: client.clone(),
                calls: Mutex::new(Vec::new()),
            }),
            client,
            models: ModelStore::load(storage.clone()),
            keys: ApiKeyStore::load(storage),
            _dir: dir,
        }
    }

    fn with_google_key(client: ScriptedClient) -> Self {
        let harness = Self::new(client);
        harness.keys.set_key(ProviderType::Google, "google-key").unwrap();
        harness
    }

    fn builder(&self) -> ChatSessionBuilder {
        ChatSessionBuilder::new()
            .persist(self.persist.clone())
            .feed(self.store.clone())
            .resolver(self.resolver.clone())
            .models(self.models.clone())
            .keys(self.keys.clone())
            .user_id(USER_ID)
    }

    async fn session(&self) -> ChatSession {
        self.builder().new_thread().await.unwrap()
    }

    fn resolved(&self) -> Vec<(ProviderType, String)> {
        self.resolver.calls.lock().unwrap().clone()
    }
}

fn drain(rx: &mut broadcast::Receiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn wait_for_generating(rx: &mut broadcast::Receiver<ChatEvent>) {
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let Ok(ChatEvent::StatusChanged {
                status: ChatStatus::Generating,
            }) = rx.recv().await
            {
                return;
            }
        }
    })
    .await
    .expect("session never started generating");
}

#[tokio::test]
async fn test_submit_without_key_calls_nothing_and_persists_nothing() {
    let harness = Harness::new(ScriptedClient::replying(&["unused"]));
    let session = harness.session().await;
    let mut rx = session.subscribe();

    let err = session.submit("Hello").await.unwrap_err();

    assert!(matches!(
        err,
        ChatError::MissingApiKey {
            provider: ProviderType::Google
        }
    ));
    assert!(harness.resolved().is_empty());
    assert!(harness.client.requests().is_empty());
    assert!(harness.persist.messages().list(session.thread_id()).await.unwrap().is_empty());
    assert_eq!(session.status(), ChatStatus::Idle);
    assert_eq!(
        drain(&mut rx),
        vec![ChatEvent::ApiKeyMissing {
            provider: ProviderType::Google
        }]
    );
}

#[tokio::test]
async fn test_submit_hello_persists_both_messages_and_titles_thread() {
    let harness = Harness::with_google_key(ScriptedClient::replying(&["Hi! How can I help?"]));
    let session = harness.session().await;
    let mut rx = session.subscribe();

    let reply = session.submit("Hello").await.unwrap().unwrap();

    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.content, "Hi! How can I help?");

    let stored = harness.persist.messages().list(session.thread_id()).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!((stored[0].role, stored[0].content.as_str()), (MessageRole::User, "Hello"));
    assert_eq!(stored[1].id, reply.id);

    let thread = harness.persist.threads().get(session.thread_id()).await.unwrap().unwrap();
    assert_eq!(thread.title, "Hello");
    assert!(thread.last_message_at >= reply.created_at);

    assert_eq!(harness.resolved(), vec![(ProviderType::Google, "google-key".to_string())]);
    let requests = harness.client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "gemini-2.0-flash");
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[0].options.max_tokens, Some(2048));

    let events = drain(&mut rx);
    assert_eq!(
        events.first(),
        Some(&ChatEvent::StatusChanged {
            status: ChatStatus::Generating
        })
    );
    assert_eq!(
        events.last(),
        Some(&ChatEvent::StatusChanged {
            status: ChatStatus::Idle
        })
    );
    assert!(events.contains(&ChatEvent::TitleChanged {
        thread_id: session.thread_id().to_string(),
        title: "Hello".to_string(),
    }));
    let summaries = events
        .iter()
        .filter(|e| matches!(e, ChatEvent::SummaryCreated { .. }))
        .count();
    assert_eq!(summaries, 2);
}

#[tokio::test]
async fn test_title_is_set_only_from_first_prompt() {
    let harness = Harness::with_google_key(ScriptedClient::replying(&["a", "b"]));
    let session = harness.session().await;

    session
        .submit("What is the weather like in Lisbon this weekend?")
        .await
        .unwrap();
    session.submit("And next week?").await.unwrap();

    let thread = harness.persist.threads().get(session.thread_id()).await.unwrap().unwrap();
    assert_eq!(thread.title, "What is the weather like in Li...");
    assert_eq!(harness.client.requests()[1].messages.len(), 3);
}

#[tokio::test]
async fn test_selected_model_picks_the_provider() {
    let harness = Harness::new(ScriptedClient::replying(&["hey"]));
    harness.keys.set_key(ProviderType::OpenAI, "sk-test").unwrap();
    harness.models.set_model("GPT-4o").unwrap();
    let session = harness.session().await;

    session.submit("Hello").await.unwrap();

    assert_eq!(harness.resolved(), vec![(ProviderType::OpenAI, "sk-test".to_string())]);
    assert_eq!(harness.client.requests()[0].model, "gpt-4o");
}

#[tokio::test]
async fn test_provider_failure_sets_banner_and_returns_to_idle() {
    let harness = Harness::with_google_key(ScriptedClient::failing("Gemini API error: quota exceeded"));
    let session = harness.session().await;
    let mut rx = session.subscribe();

    let err = session.submit("Hello").await.unwrap_err();

    assert!(matches!(&err, ChatError::Provider(msg) if msg == "Gemini API error: quota exceeded"));
    assert_eq!(session.status(), ChatStatus::Idle);
    assert_eq!(
        session.error_banner().as_deref(),
        Some("Gemini API error: quota exceeded")
    );
    assert!(drain(&mut rx).contains(&ChatEvent::Toast {
        message: "Gemini API error: quota exceeded".to_string()
    }));
    assert_eq!(harness.client.requests().len(), 1);

    // The prompt itself was kept
    let stored = harness.persist.messages().list(session.thread_id()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].role, MessageRole::User);

    session.submit("Try again").await.unwrap();
    assert_eq!(session.error_banner(), None);
}

#[tokio::test]
async fn test_second_submit_while_generating_is_busy() {
    let gate = Arc::new(Notify::new());
    let harness = Harness::with_google_key(ScriptedClient::gated(gate.clone()));
    let session = Arc::new(harness.session().await);
    let mut rx = session.subscribe();

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.submit("Hello").await }
    });
    wait_for_generating(&mut rx).await;

    assert!(matches!(session.submit("Again").await, Err(ChatError::Busy)));

    gate.notify_one();
    assert!(first.await.unwrap().unwrap().is_some());
    assert_eq!(session.status(), ChatStatus::Idle);
}

#[tokio::test]
async fn test_stop_discards_the_late_reply() {
    let gate = Arc::new(Notify::new());
    let harness = Harness::with_google_key(ScriptedClient::gated(gate.clone()));
    let session = Arc::new(harness.session().await);
    let mut rx = session.subscribe();

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.submit("Hello").await }
    });
    wait_for_generating(&mut rx).await;

    session.stop();
    assert_eq!(session.status(), ChatStatus::Idle);
    gate.notify_one();

    assert_eq!(pending.await.unwrap().unwrap(), None);
    let stored = harness.persist.messages().list(session.thread_id()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].role, MessageRole::User);
}

#[tokio::test]
async fn test_regenerate_from_assistant_rewinds_to_its_prompt() {
    let harness = Harness::with_google_key(ScriptedClient::replying(&["A1", "A2", "A3"]));
    let session = harness.session().await;

    let a1 = session.submit("Q1").await.unwrap().unwrap();
    session.submit("Q2").await.unwrap();
    let mut rx = session.subscribe();

    let a3 = session.regenerate(&a1.id).await.unwrap().unwrap();

    assert_eq!(a3.content, "A3");
    let stored = harness.persist.messages().list(session.thread_id()).await.unwrap();
    let contents: Vec<&str> = stored.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["Q1", "A3"]);
    assert_eq!(harness.client.requests().last().unwrap().messages.len(), 1);

    let removed = drain(&mut rx).into_iter().find_map(|e| match e {
        ChatEvent::MessagesRemoved { ids } => Some(ids),
        _ => None,
    });
    assert_eq!(removed.map(|ids| ids.len()), Some(3));
}

#[tokio::test]
async fn test_regenerate_unknown_message() {
    let harness = Harness::with_google_key(ScriptedClient::default());
    let session = harness.session().await;

    assert!(matches!(
        session.regenerate("missing").await,
        Err(ChatError::MessageNotFound(_))
    ));
    assert_eq!(session.status(), ChatStatus::Idle);
}

#[tokio::test]
async fn test_edit_replaces_prompt_and_tail() {
    let harness = Harness::with_google_key(ScriptedClient::replying(&["A1", "A2"]));
    let session = harness.session().await;
    session.submit("Q1").await.unwrap();
    let q1 = session.messages()[0].clone();

    session.edit(&q1.id, "Edited question").await.unwrap();

    let stored = harness.persist.messages().list(session.thread_id()).await.unwrap();
    let contents: Vec<&str> = stored.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["Edited question", "A2"]);
    assert!(stored.iter().all(|m| m.id != q1.id));

    let summaries = harness.persist.summaries().list(session.thread_id()).await.unwrap();
    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.message_id != q1.id));
}

#[tokio::test]
async fn test_persist_failure_does_not_block_the_reply() {
    let harness = Harness::with_google_key(ScriptedClient::replying(&["still here"]));
    let session = harness.session().await;
    harness.store.fail_operation("insert_message");

    let reply = session.submit("Hello").await.unwrap().unwrap();

    assert_eq!(reply.content, "still here");
    assert_eq!(session.messages().len(), 2);
    harness.store.clear_failures();
    assert!(harness.persist.messages().list(session.thread_id()).await.unwrap().is_empty());
    assert!(harness.persist.summaries().list(session.thread_id()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reopen_loads_transcript_and_dedupes_summaries() {
    let harness = Harness::with_google_key(ScriptedClient::replying(&["Hi"]));
    let session = harness.session().await;
    session.submit("Hello").await.unwrap();
    let thread_id = session.thread_id().to_string();
    let first = session.messages()[0].clone();
    drop(session);

    harness
        .persist
        .summaries()
        .create(&thread_id, &first.id, "Hello", USER_ID)
        .await
        .unwrap();

    let reopened = harness.builder().thread_id(thread_id.as_str()).open().await.unwrap();

    assert_eq!(reopened.messages().len(), 2);
    assert_eq!(reopened.summaries().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_open_missing_thread() {
    let harness = Harness::new(ScriptedClient::default());

    let err = harness.builder().thread_id("nope").open().await.err().unwrap();

    assert!(matches!(err, ChatError::Persist(PersistError::ThreadNotFound(_))));
}

#[tokio::test]
async fn test_open_thread_of_another_user() {
    let harness = Harness::with_google_key(ScriptedClient::default());
    let owned = harness.session().await;
    let thread_id = owned.thread_id().to_string();
    drop(owned);

    let err = harness
        .builder()
        .user_id("user-2")
        .thread_id(thread_id.as_str())
        .open()
        .await
        .err()
        .unwrap();

    assert!(matches!(err, ChatError::Persist(PersistError::ThreadNotFound(_))));
    let thread = harness.persist.threads().get(&thread_id).await.unwrap().unwrap();
    assert_eq!(thread.user_id, USER_ID);
    assert_eq!(thread.title, "New Chat");
    assert!(harness.persist.messages().list(&thread_id).await.unwrap().is_empty());

    let reopened = harness.builder().thread_id(thread_id.as_str()).open().await;
    assert!(reopened.is_ok());
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let harness = Harness::with_google_key(ScriptedClient::default());
    let session = harness.session().await;

    assert!(matches!(session.submit("   ").await, Err(ChatError::EmptyMessage)));
    assert!(harness.resolved().is_empty());
}
