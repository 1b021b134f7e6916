//! Session store integration tests.
//!
//! These tests drive the store through its public API against real
//! backends, including simulated process restarts and a backend whose
//! load can be held open to exercise the rehydration window.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio_test::{assert_pending, assert_ready};

use auth_store::gate::{self, AccessDecision};
use auth_store::persist::{envelope, FileBackend, MemoryBackend, PersistenceBackend, DEFAULT_KEY};
use auth_store::{AuthStoreError, RehydrateOutcome, SessionStore};

/// Backend whose `load` waits until the test releases it.
#[derive(Debug)]
struct HeldBackend {
    inner: MemoryBackend,
    release: Mutex<Option<oneshot::Receiver<()>>>,
}

impl HeldBackend {
    fn new(inner: MemoryBackend) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let backend = Self {
            inner,
            release: Mutex::new(Some(rx)),
        };
        (backend, tx)
    }
}

#[async_trait]
impl PersistenceBackend for HeldBackend {
    async fn load(&self, key: &str) -> auth_store::Result<Option<String>> {
        let release = self.release.lock().unwrap().take();
        if let Some(release) = release {
            let _ = release.await;
        }
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, value: &str) -> auth_store::Result<()> {
        self.inner.save(key, value).await
    }

    async fn remove(&self, key: &str) -> auth_store::Result<()> {
        self.inner.remove(key).await
    }
}

fn stored_envelope(token: &str, user: serde_json::Value) -> String {
    let session = auth_store::Session::new(token, user).unwrap();
    envelope::encode(&session).unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_fresh_store_rehydrates_logged_out() {
    let store = SessionStore::new(MemoryBackend::new(), DEFAULT_KEY).unwrap();

    assert_eq!(store.rehydrate().await, RehydrateOutcome::Empty);
    assert!(store.is_hydrated());
    assert!(store.token().is_none());
}

#[tokio::test]
async fn test_session_survives_restart() {
    let backend = MemoryBackend::new();

    let first = SessionStore::new(backend.clone(), DEFAULT_KEY).unwrap();
    first.rehydrate().await;
    first.set_session("abc123", json!({"id": "u1"})).unwrap();
    first.flush().await.unwrap();
    drop(first);

    let second = SessionStore::new(backend, DEFAULT_KEY).unwrap();
    assert!(!second.is_hydrated());
    second.rehydrate().await;

    assert_eq!(second.token().as_deref(), Some("abc123"));
    assert_eq!(second.user().unwrap()["id"], "u1");
    assert!(second.is_hydrated());
}

#[tokio::test]
async fn test_clear_removes_persisted_copy() {
    let backend = MemoryBackend::new();
    let store = SessionStore::new(backend.clone(), DEFAULT_KEY).unwrap();

    store.set_session("t1", json!({"id": "u1"})).unwrap();
    store.flush().await.unwrap();
    assert!(backend.contains(DEFAULT_KEY));

    store.clear_session();
    store.flush().await.unwrap();
    assert!(backend.load(DEFAULT_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_token_rejected_without_side_effects() {
    let backend = MemoryBackend::new();
    let store = SessionStore::new(backend.clone(), DEFAULT_KEY).unwrap();

    let err = store.set_session("", json!({"id": "u1"})).unwrap_err();
    assert!(matches!(err, AuthStoreError::InvalidSessionInput(_)));
    assert!(store.token().is_none());
    assert!(store.user().is_none());
    assert!(!store.is_hydrated());

    store.flush().await.unwrap();
    assert!(!backend.contains(DEFAULT_KEY));
}

// ============================================================================
// Hydration
// ============================================================================

#[tokio::test]
async fn test_not_hydrated_while_load_pending() {
    let memory = MemoryBackend::new();
    memory.insert(DEFAULT_KEY, stored_envelope("t", json!({"id": "u"})));
    let (backend, release) = HeldBackend::new(memory);
    let store = SessionStore::new(backend, DEFAULT_KEY).unwrap();

    let mut rehydrate = tokio_test::task::spawn(store.rehydrate());
    assert_pending!(rehydrate.poll());
    assert!(!store.is_hydrated());
    assert_eq!(
        gate::evaluate(&store.snapshot(), "/visits"),
        AccessDecision::Checking
    );

    release.send(()).unwrap();
    assert!(rehydrate.is_woken());
    let outcome = assert_ready!(rehydrate.poll());

    assert_eq!(outcome, RehydrateOutcome::Restored);
    assert!(store.is_hydrated());
    assert!(gate::evaluate(&store.snapshot(), "/visits").is_granted());
}

#[tokio::test]
async fn test_mutation_during_rehydrate_wins() {
    let memory = MemoryBackend::new();
    memory.insert(DEFAULT_KEY, stored_envelope("stale", json!({"id": "old"})));
    let (backend, release) = HeldBackend::new(memory.clone());
    let store = SessionStore::new(backend, DEFAULT_KEY).unwrap();

    let mut rehydrate = tokio_test::task::spawn(store.rehydrate());
    assert_pending!(rehydrate.poll());

    // Applied immediately, not queued behind the pending load
    store.set_session("fresh", json!({"id": "new"})).unwrap();
    assert_eq!(store.token().as_deref(), Some("fresh"));

    release.send(()).unwrap();
    let outcome = assert_ready!(rehydrate.poll());
    drop(rehydrate);

    assert_eq!(outcome, RehydrateOutcome::Superseded);
    assert!(store.is_hydrated());
    assert_eq!(store.token().as_deref(), Some("fresh"));
    assert_eq!(store.user().unwrap()["id"], "new");

    store.flush().await.unwrap();
    let persisted = envelope::decode(&memory.get(DEFAULT_KEY).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(persisted.token.as_deref(), Some("fresh"));
}

#[tokio::test]
async fn test_logout_during_rehydrate_wins() {
    let memory = MemoryBackend::new();
    memory.insert(DEFAULT_KEY, stored_envelope("stale", json!({"id": "old"})));
    let (backend, release) = HeldBackend::new(memory);
    let store = SessionStore::new(backend, DEFAULT_KEY).unwrap();

    let mut rehydrate = tokio_test::task::spawn(store.rehydrate());
    assert_pending!(rehydrate.poll());

    store.clear_session();

    release.send(()).unwrap();
    assert_eq!(assert_ready!(rehydrate.poll()), RehydrateOutcome::Superseded);
    assert!(store.token().is_none());
    assert!(store.is_hydrated());
}

#[tokio::test]
async fn test_logout_before_rehydrate_stays_logged_out() {
    let backend = MemoryBackend::new();
    backend.insert(DEFAULT_KEY, stored_envelope("stale", json!({"id": "old"})));
    let store = SessionStore::new(backend.clone(), DEFAULT_KEY).unwrap();

    store.clear_session();
    assert_eq!(store.rehydrate().await, RehydrateOutcome::Superseded);
    store.flush().await.unwrap();

    assert!(store.is_hydrated());
    assert!(store.token().is_none());
    assert!(store.user().is_none());
    assert!(backend.load(DEFAULT_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_before_rehydrate_keeps_new_session() {
    let backend = MemoryBackend::new();
    backend.insert(DEFAULT_KEY, stored_envelope("stale", json!({"id": "old"})));
    let store = SessionStore::new(backend.clone(), DEFAULT_KEY).unwrap();

    store.set_session("fresh", json!({"id": "new"})).unwrap();
    assert_eq!(store.rehydrate().await, RehydrateOutcome::Superseded);
    store.flush().await.unwrap();

    assert_eq!(store.token().as_deref(), Some("fresh"));
    assert_eq!(store.user().unwrap()["id"], "new");
    let persisted = envelope::decode(&backend.get(DEFAULT_KEY).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(persisted.token.as_deref(), Some("fresh"));
}

#[tokio::test]
async fn test_rehydrate_after_failed_write_keeps_memory() {
    let backend = MemoryBackend::new();
    backend.insert(DEFAULT_KEY, stored_envelope("stale", json!({"id": "old"})));
    let store = SessionStore::new(backend.clone(), DEFAULT_KEY).unwrap();

    backend.set_fail_writes(true);
    store.set_session("fresh", json!({"id": "new"})).unwrap();
    store.flush().await.unwrap();

    // Storage still holds the old session; memory stays authoritative
    assert_eq!(store.rehydrate().await, RehydrateOutcome::Superseded);
    assert_eq!(store.token().as_deref(), Some("fresh"));
}

#[tokio::test]
async fn test_read_failure_fails_open() {
    let backend = MemoryBackend::new();
    backend.insert(DEFAULT_KEY, stored_envelope("t", json!({})));
    backend.set_fail_reads(true);

    let store = SessionStore::new(backend, DEFAULT_KEY).unwrap();
    assert_eq!(store.rehydrate().await, RehydrateOutcome::Failed);
    assert!(store.is_hydrated());
    assert!(store.token().is_none());
    assert!(matches!(
        gate::evaluate(&store.snapshot(), "/orders"),
        AccessDecision::Denied { .. }
    ));
}

#[tokio::test]
async fn test_hydration_is_monotonic() {
    let store = SessionStore::new(MemoryBackend::new(), DEFAULT_KEY).unwrap();
    let mut rx = store.subscribe();

    store.rehydrate().await;
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_hydrated());

    store.set_session("t", json!({})).unwrap();
    store.clear_session();
    store.rehydrate().await;
    store.mark_hydrated();

    assert!(store.is_hydrated());
    assert!(rx.borrow_and_update().is_hydrated());
}

#[tokio::test]
async fn test_legacy_bare_format_rehydrates() {
    let backend = MemoryBackend::new();
    backend.insert(
        "crm.activeUser",
        r#"{"user":{"id":"u3","role":{"slug":"Manager"}},"token":"legacy-token"}"#,
    );

    let store = SessionStore::new(backend, "crm.activeUser").unwrap();
    assert_eq!(store.rehydrate().await, RehydrateOutcome::Restored);
    assert_eq!(store.token().as_deref(), Some("legacy-token"));

    let gate = auth_store::RoleGate::new(["manager"]);
    assert!(gate.evaluate(&store.snapshot(), "/reports").is_granted());
}

#[tokio::test]
async fn test_unknown_version_is_discarded() {
    let backend = MemoryBackend::new();
    backend.insert(
        DEFAULT_KEY,
        r#"{"state":{"token":"t","user":{"id":"u"}},"version":9}"#,
    );

    let store = SessionStore::new(backend, DEFAULT_KEY).unwrap();
    assert_eq!(store.rehydrate().await, RehydrateOutcome::Empty);
    assert!(store.token().is_none());
}

#[tokio::test]
async fn test_tampered_token_never_reaches_header() {
    let backend = MemoryBackend::new();
    backend.insert(
        DEFAULT_KEY,
        r#"{"state":{"token":"abc\r\nX-Evil: 1","user":{"id":"u"}},"version":0}"#,
    );

    let store = SessionStore::new(backend, DEFAULT_KEY).unwrap();
    store.rehydrate().await;
    assert!(store.is_hydrated());
    assert!(store.token().is_none());
    assert!(store.authorization_header().is_none());
    assert!(!store.is_authenticated());
}

// ============================================================================
// File backend
// ============================================================================

#[tokio::test]
async fn test_file_backend_restart() {
    let dir = TempDir::new().unwrap();

    let first = SessionStore::new(FileBackend::new(dir.path()), "dpm-auth").unwrap();
    first.rehydrate().await;
    first
        .set_session("file-token", json!({"id": "u7", "name": "Omar", "role": "rep"}))
        .unwrap();
    first.flush().await.unwrap();
    assert!(dir.path().join("dpm-auth.json").exists());

    let second = SessionStore::new(FileBackend::new(dir.path()), "dpm-auth").unwrap();
    second.rehydrate().await;
    assert_eq!(second.token().as_deref(), Some("file-token"));
    assert_eq!(second.user().unwrap()["name"], "Omar");

    second.clear_session();
    second.flush().await.unwrap();
    assert!(!dir.path().join("dpm-auth.json").exists());

    let third = SessionStore::new(FileBackend::new(dir.path()), "dpm-auth").unwrap();
    assert_eq!(third.rehydrate().await, RehydrateOutcome::Empty);
}

#[tokio::test]
async fn test_file_backend_corrupt_file_fails_open() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("session-store.json"), "{\"state\": tru").unwrap();

    let store = SessionStore::new(FileBackend::new(dir.path()), DEFAULT_KEY).unwrap();
    assert_eq!(store.rehydrate().await, RehydrateOutcome::Failed);
    assert!(store.is_hydrated());
    assert!(store.token().is_none());
}

#[tokio::test]
async fn test_shared_backend_handle() {
    let backend: Arc<dyn PersistenceBackend> = Arc::new(MemoryBackend::new());

    let first = SessionStore::with_backend(Arc::clone(&backend), DEFAULT_KEY).unwrap();
    first.set_session("t", json!({"id": "u"})).unwrap();
    first.flush().await.unwrap();

    let second = SessionStore::with_backend(backend, DEFAULT_KEY).unwrap();
    assert_eq!(second.rehydrate().await, RehydrateOutcome::Restored);
}
