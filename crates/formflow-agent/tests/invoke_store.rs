//! Store-backed conversations through `FormFlow::invoke`.

use formflow_agent::{FlowError, FormFlow, FormFlowConfig};
use formflow_contract::testing::{Contact, ContactSpec};
use formflow_contract::{HistoryStore, Phase, Role, StateStore};
use formflow_store_adapters::{FileStore, KeepLastTrimmer, MemoryHistoryStore, MemoryStateStore};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_invoke_round_trip_with_memory_stores() {
    let spec = Arc::new(ContactSpec::new());
    let flow = FormFlow::local(spec.clone());
    let states = MemoryStateStore::<Contact>::new();
    let histories = MemoryHistoryStore::new();

    let r = flow
        .invoke(&states, &histories, "user-1", "name: Ann", None)
        .await
        .unwrap();
    assert_eq!(r.phase, Phase::Collecting);
    assert_eq!(r.form_state.name, "Ann");

    let stored = states.read("user-1").await.unwrap().unwrap();
    assert_eq!(stored.phase, Phase::Collecting);
    assert_eq!(stored.form_state.name, "Ann");
    let history = histories.load("user-1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "name: Ann");
    assert_eq!(history[1].role, Role::Assistant);

    let r = flow
        .invoke(&states, &histories, "user-1", "email = ann@example.com", None)
        .await
        .unwrap();
    assert_eq!(r.phase, Phase::Confirming);
    assert!(r.message.starts_with("name=Ann, email=ann@example.com"));

    let r = flow
        .invoke(&states, &histories, "user-1", "confirm", None)
        .await
        .unwrap();
    assert_eq!(r.phase, Phase::Submitted);
    assert!(r.completed);
    assert_eq!(spec.submit_count(), 1);

    assert!(states.read("user-1").await.unwrap().is_none());
    assert!(histories.load("user-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_keys_are_isolated() {
    let flow = FormFlow::local(Arc::new(ContactSpec::new()));
    let states = MemoryStateStore::<Contact>::new();
    let histories = MemoryHistoryStore::new();

    flow.invoke(&states, &histories, "a", "name: Ann", None)
        .await
        .unwrap();
    flow.invoke(&states, &histories, "b", "cancel", None)
        .await
        .unwrap();

    let a = states.read("a").await.unwrap().unwrap();
    assert_eq!(a.form_state.name, "Ann");
    assert!(states.read("b").await.unwrap().is_none());
}

#[tokio::test]
async fn test_file_store_keeps_terminal_state_when_not_clearing() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path()).with_trimmer(KeepLastTrimmer::new(4));
    let flow = FormFlow::local_with_config(
        Arc::new(ContactSpec::new()),
        FormFlowConfig::default().with_clear_on_completion(false),
    );

    flow.invoke(&store, &store, "k1", "name: Ann, email: ann@example.com", None)
        .await
        .unwrap();
    let r = flow
        .invoke(&store, &store, "k1", "cancel", None)
        .await
        .unwrap();
    assert_eq!(r.phase, Phase::Cancelled);

    let stored: Contact = StateStore::<Contact>::read(&store, "k1")
        .await
        .unwrap()
        .map(|s| {
            assert_eq!(s.phase, Phase::Cancelled);
            s.form_state
        })
        .unwrap();
    assert_eq!(stored.email, "ann@example.com");
    assert_eq!(store.load("k1").await.unwrap().len(), 4);

    let err = flow
        .invoke(&store, &store, "k1", "name: Bea", None)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::ConversationClosed(Phase::Cancelled)));
}

#[tokio::test]
async fn test_invalid_key_is_a_store_error() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path());
    let flow = FormFlow::local(Arc::new(ContactSpec::new()));

    let err = flow
        .invoke(&store, &store, "../escape", "hi", None)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Store(_)));
}
