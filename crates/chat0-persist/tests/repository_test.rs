use chat0_persist::{
    DeleteOutcome, ManualClock, MemoryStore, MessageRole, NewMessage, PersistClient, PersistError,
    PersistenceClient,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

fn start() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
}

fn setup() -> (PersistClient, Arc<MemoryStore>, Arc<ManualClock>) {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::starting_at(start()));
    let persist = PersistClient::with_clock(store.clone(), clock.clone());
    (persist, store, clock)
}

#[tokio::test]
async fn test_create_thread_sets_all_timestamps() {
    let (persist, _, _) = setup();

    let thread = persist.threads().create("New Chat", "u1").await.unwrap();

    assert_eq!(thread.title, "New Chat");
    assert_eq!(thread.user_id, "u1");
    assert_eq!(thread.created_at, start());
    assert_eq!(thread.updated_at, start());
    assert_eq!(thread.last_message_at, start());
}

#[tokio::test]
async fn test_list_threads_most_recent_first() {
    let (persist, _, clock) = setup();

    let older = persist.threads().create("older", "u1").await.unwrap();
    clock.advance(Duration::from_secs(5));
    let newer = persist.threads().create("newer", "u1").await.unwrap();
    persist.threads().create("other user", "u2").await.unwrap();

    let ids: Vec<String> = persist
        .threads()
        .list("u1")
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![newer.id.clone(), older.id.clone()]);

    clock.advance(Duration::from_secs(5));
    persist
        .messages()
        .create(NewMessage::new(&older.id, "u1", MessageRole::User, "bump"))
        .await
        .unwrap();

    let first = persist.threads().list("u1").await.unwrap().remove(0);
    assert_eq!(first.id, older.id);
}

#[tokio::test]
async fn test_message_create_moves_last_message_at_forward_only() {
    let (persist, _, clock) = setup();
    let thread = persist.threads().create("t", "u1").await.unwrap();

    clock.advance(Duration::from_secs(10));
    let late = persist
        .messages()
        .create(NewMessage::new(&thread.id, "u1", MessageRole::User, "late"))
        .await
        .unwrap();

    // Backdated message must not pull the thread backwards.
    persist
        .messages()
        .create(
            NewMessage::new(&thread.id, "u1", MessageRole::Assistant, "early")
                .created_at(start()),
        )
        .await
        .unwrap();

    let thread = persist.threads().get(&thread.id).await.unwrap().unwrap();
    assert_eq!(thread.last_message_at, late.created_at);
    assert!(thread.last_message_at >= thread.created_at);
}

#[tokio::test]
async fn test_message_for_missing_thread_is_rejected() {
    let (persist, store, _) = setup();

    let err = persist
        .messages()
        .create(NewMessage::new("nope", "u1", MessageRole::User, "hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, PersistError::ThreadNotFound(id) if id == "nope"));
    assert!(store.list_messages("nope").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_message_survives_failed_thread_bump() {
    let (persist, store, _) = setup();
    let thread = persist.threads().create("t", "u1").await.unwrap();

    store.fail_operation("update_thread");
    let message = persist
        .messages()
        .create(NewMessage::new(&thread.id, "u1", MessageRole::User, "hi"))
        .await
        .unwrap();

    store.clear_failures();
    let stored = persist.messages().list(&thread.id).await.unwrap();
    assert_eq!(stored, vec![message]);
}

#[tokio::test]
async fn test_messages_listed_oldest_first() {
    let (persist, _, clock) = setup();
    let thread = persist.threads().create("t", "u1").await.unwrap();

    for content in ["one", "two", "three"] {
        persist
            .messages()
            .create(NewMessage::new(&thread.id, "u1", MessageRole::User, content))
            .await
            .unwrap();
        clock.advance(Duration::from_millis(1));
    }

    let contents: Vec<String> = persist
        .messages()
        .list(&thread.id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_delete_thread_cascades() {
    let (persist, _, _) = setup();
    let thread = persist.threads().create("t", "u1").await.unwrap();
    let keep = persist.threads().create("keep", "u1").await.unwrap();

    let message = persist
        .messages()
        .create(NewMessage::new(&thread.id, "u1", MessageRole::User, "hi"))
        .await
        .unwrap();
    persist
        .summaries()
        .create(&thread.id, &message.id, "hi", "u1")
        .await
        .unwrap();
    let kept_message = persist
        .messages()
        .create(NewMessage::new(&keep.id, "u1", MessageRole::User, "stay"))
        .await
        .unwrap();

    let outcome = persist.threads().delete(&thread.id).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert!(persist.threads().get(&thread.id).await.unwrap().is_none());
    assert!(persist.messages().list(&thread.id).await.unwrap().is_empty());
    assert!(persist.summaries().list(&thread.id).await.unwrap().is_empty());
    assert_eq!(persist.messages().list(&keep.id).await.unwrap(), vec![kept_message]);
}

#[tokio::test]
async fn test_delete_thread_twice_is_not_found() {
    let (persist, _, _) = setup();
    let thread = persist.threads().create("t", "u1").await.unwrap();

    assert_eq!(persist.threads().delete(&thread.id).await.unwrap(), DeleteOutcome::Deleted);
    assert_eq!(persist.threads().delete(&thread.id).await.unwrap(), DeleteOutcome::NotFound);
}

#[tokio::test]
async fn test_delete_thread_continues_past_child_failures() {
    let (persist, store, _) = setup();
    let thread = persist.threads().create("t", "u1").await.unwrap();
    persist
        .messages()
        .create(NewMessage::new(&thread.id, "u1", MessageRole::User, "hi"))
        .await
        .unwrap();

    store.fail_operation("delete_messages_for_thread");
    let outcome = persist.threads().delete(&thread.id).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert!(persist.threads().get(&thread.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_rename_missing_thread() {
    let (persist, _, _) = setup();

    let err = persist.threads().rename("ghost", "title").await.unwrap_err();

    assert!(matches!(err, PersistError::ThreadNotFound(_)));
}

#[tokio::test]
async fn test_rename_bumps_updated_at() {
    let (persist, _, clock) = setup();
    let thread = persist.threads().create("New Chat", "u1").await.unwrap();

    clock.advance(Duration::from_secs(3));
    let renamed = persist.threads().rename(&thread.id, "Weather talk").await.unwrap();

    assert_eq!(renamed.title, "Weather talk");
    assert_eq!(renamed.updated_at, start() + chrono::Duration::seconds(3));
    assert_eq!(renamed.last_message_at, thread.last_message_at);
}

#[tokio::test]
async fn test_delete_message_removes_its_summaries() {
    let (persist, _, _) = setup();
    let thread = persist.threads().create("t", "u1").await.unwrap();
    let first = persist
        .messages()
        .create(NewMessage::new(&thread.id, "u1", MessageRole::User, "one"))
        .await
        .unwrap();
    let second = persist
        .messages()
        .create(NewMessage::new(&thread.id, "u1", MessageRole::User, "two"))
        .await
        .unwrap();
    persist.summaries().create(&thread.id, &first.id, "one", "u1").await.unwrap();
    persist.summaries().create(&thread.id, &second.id, "two", "u1").await.unwrap();

    assert!(persist.messages().delete(&first.id).await.unwrap());
    assert!(!persist.messages().delete(&first.id).await.unwrap());

    let summaries = persist.summaries().list(&thread.id).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].message_id, second.id);
}

#[tokio::test]
async fn test_dedupe_keeps_earliest_summary_per_message() {
    let (persist, _, clock) = setup();
    let thread = persist.threads().create("t", "u1").await.unwrap();
    let message = persist
        .messages()
        .create(NewMessage::new(&thread.id, "u1", MessageRole::User, "hello"))
        .await
        .unwrap();

    let original = persist
        .summaries()
        .create(&thread.id, &message.id, "first", "u1")
        .await
        .unwrap();
    clock.advance(Duration::from_millis(10));
    persist.summaries().create(&thread.id, &message.id, "second", "u1").await.unwrap();
    persist.summaries().create(&thread.id, &message.id, "third", "u1").await.unwrap();

    assert_eq!(persist.summaries().dedupe(&thread.id).await.unwrap(), 2);
    assert_eq!(persist.summaries().list(&thread.id).await.unwrap(), vec![original]);
    assert_eq!(persist.summaries().dedupe(&thread.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_ensure_user_is_idempotent() {
    let (persist, _, _) = setup();

    let first = persist
        .users()
        .ensure("u1", "a@example.com", Some("Ada".to_string()))
        .await
        .unwrap();
    let again = persist.users().ensure("u1", "a@example.com", None).await.unwrap();

    assert_eq!(first, again);
    assert_eq!(
        persist.users().get_by_email("a@example.com").await.unwrap(),
        Some(first)
    );
}

#[tokio::test]
async fn test_empty_ids_are_validation_errors() {
    let (persist, _, _) = setup();

    assert!(matches!(
        persist.threads().create("t", "").await.unwrap_err(),
        PersistError::Validation(_)
    ));
    assert!(matches!(
        persist.messages().list(" ").await.unwrap_err(),
        PersistError::Validation(_)
    ));
}
