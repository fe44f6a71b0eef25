use chat0_chat::ChatError;
use chat0_cli::{AppState, CliError, Command, Config, Repl};
use chat0_llm::ProviderType;
use chat0_persist::PersistError;
use tempfile::TempDir;

fn config(dir: &TempDir) -> Config {
    let toml = format!(
        r#"
        [backend]
        kind = "memory"
        poll_interval_ms = 50

        [cache]
        ttl_secs = 30
        min_interval_ms = 0
        max_calls_per_window = 60
        window_secs = 60

        [chat]
        app_url = "http://localhost:3000"
        app_title = "Chat0"
        storage_path = "{}"

        [logging]
        level = "warn"
        format = "pretty"
        "#,
        dir.path().join("storage.json").display()
    );
    toml::from_str(&toml).unwrap()
}

async fn signed_in(dir: &TempDir) -> Repl {
    let state = AppState::build(config(dir)).await.unwrap();
    let mut repl = Repl::new(state);
    repl.execute(Command::Register {
        email: "ada@example.com".to_string(),
        password: "correct horse".to_string(),
        name: Some("Ada".to_string()),
    })
    .await
    .unwrap();
    repl
}

#[tokio::test]
async fn test_commands_need_a_user() {
    let dir = TempDir::new().unwrap();
    let mut repl = Repl::new(AppState::build(config(&dir)).await.unwrap());

    assert!(matches!(repl.execute(Command::New).await, Err(CliError::NotSignedIn)));
    assert!(matches!(repl.execute(Command::Threads).await, Err(CliError::NotSignedIn)));
}

#[tokio::test]
async fn test_register_greets_and_asks_for_key() {
    let dir = TempDir::new().unwrap();
    let mut repl = Repl::new(AppState::build(config(&dir)).await.unwrap());

    let output = repl
        .execute(Command::Register {
            email: "ada@example.com".to_string(),
            password: "pw".to_string(),
            name: Some("Ada".to_string()),
        })
        .await
        .unwrap();

    assert!(output.starts_with("Welcome, Ada."));
    assert!(output.contains("/key google"));
    assert_eq!(repl.user().map(|u| u.email.as_str()), Some("ada@example.com"));
}

#[tokio::test]
async fn test_thread_lifecycle() {
    let dir = TempDir::new().unwrap();
    let mut repl = signed_in(&dir).await;

    assert_eq!(
        repl.execute(Command::Threads).await.unwrap(),
        "No chats yet. Start one with /new."
    );

    let opened = repl.execute(Command::New).await.unwrap();
    let thread_id = repl.chat().unwrap().thread_id().to_string();
    assert!(opened.contains(&thread_id));

    let listing = repl.execute(Command::Threads).await.unwrap();
    assert!(listing.contains("New Chat"));
    assert!(listing.starts_with('*'));

    repl.execute(Command::Rename("Trip plans".to_string())).await.unwrap();
    let listing = repl.execute(Command::Threads).await.unwrap();
    assert!(listing.contains("Trip plans"));

    assert_eq!(
        repl.execute(Command::Messages).await.unwrap(),
        "No messages yet."
    );

    assert_eq!(
        repl.execute(Command::Delete(thread_id.clone())).await.unwrap(),
        "Chat deleted."
    );
    assert!(repl.chat().is_none());
    assert_eq!(
        repl.execute(Command::Delete(thread_id)).await.unwrap(),
        "No such chat."
    );
}

#[tokio::test]
async fn test_cannot_open_another_users_chat() {
    let dir = TempDir::new().unwrap();
    let mut repl = signed_in(&dir).await;
    repl.execute(Command::New).await.unwrap();
    let thread_id = repl.chat().unwrap().thread_id().to_string();

    repl.execute(Command::Logout).await.unwrap();
    repl.execute(Command::Register {
        email: "bob@example.com".to_string(),
        password: "pw".to_string(),
        name: None,
    })
    .await
    .unwrap();

    assert!(matches!(
        repl.execute(Command::Open(thread_id)).await,
        Err(CliError::Chat(ChatError::Persist(PersistError::ThreadNotFound(_))))
    ));
    assert!(repl.chat().is_none());
}

#[tokio::test]
async fn test_chat_commands_need_an_open_chat() {
    let dir = TempDir::new().unwrap();
    let mut repl = signed_in(&dir).await;

    assert!(matches!(
        repl.execute(Command::Say("Hello".to_string())).await,
        Err(CliError::NoSession)
    ));
    assert!(matches!(repl.execute(Command::Stop).await, Err(CliError::NoSession)));
}

#[tokio::test]
async fn test_model_and_key_settings() {
    let dir = TempDir::new().unwrap();
    let mut repl = signed_in(&dir).await;

    let reply = repl
        .execute(Command::Model(Some("GPT-4o".to_string())))
        .await
        .unwrap();
    assert_eq!(reply, "Model set to GPT-4o (openai). Add a key with /key openai <key>.");

    repl.execute(Command::Key {
        provider: ProviderType::OpenAI,
        key: "sk-test".to_string(),
    })
    .await
    .unwrap();
    let listing = repl.execute(Command::Model(None)).await.unwrap();
    let selected: Vec<&str> = listing.lines().filter(|l| l.starts_with('*')).collect();
    assert_eq!(selected, vec!["* GPT-4o  [openai]"]);

    assert!(matches!(
        repl.execute(Command::Model(Some("GPT-9".to_string()))).await,
        Err(CliError::Settings(_))
    ));
}

#[tokio::test]
async fn test_session_survives_restart_and_logout_clears_it() {
    let dir = TempDir::new().unwrap();
    let repl = signed_in(&dir).await;
    let state = AppState::build(config(&dir)).await.unwrap();
    drop(repl);

    // Same settings file, fresh process state
    let mut restored = Repl::new(state);
    restored.restore_session().await;
    assert_eq!(restored.user().map(|u| u.email.as_str()), Some("ada@example.com"));

    assert_eq!(restored.execute(Command::Logout).await.unwrap(), "Signed out.");
    assert!(restored.user().is_none());

    let mut again = Repl::new(AppState::build(config(&dir)).await.unwrap());
    again.restore_session().await;
    assert!(again.user().is_none());
}
