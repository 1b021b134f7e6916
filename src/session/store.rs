//! Session store: in-memory state, persistence writer, and rehydration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::credentials;
use super::{Session, Snapshot};
use crate::error::AuthStoreError;
use crate::persist::{envelope, validate_key, PersistenceBackend};
use crate::Result;

/// Operation handed to the persistence writer.
#[derive(Debug)]
enum PersistOp {
    Save(String),
    Remove,
    Flush(oneshot::Sender<()>),
}

/// What a call to [`SessionStore::rehydrate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RehydrateOutcome {
    /// A stored session was applied.
    Restored,
    /// Nothing usable was stored.
    Empty,
    /// The backend failed or held undecodable data.
    Failed,
    /// The session was set or cleared in this process before the load
    /// finished; stored data was dropped.
    Superseded,
}

#[derive(Debug)]
struct Inner {
    state: watch::Sender<Snapshot>,
    /// Bumped by every `set_session`/`clear_session`, inside the state lock.
    /// Non-zero means in-memory state is newer than anything stored.
    generation: AtomicU64,
    backend: Arc<dyn PersistenceBackend>,
    key: String,
    writes: mpsc::UnboundedSender<PersistOp>,
}

/// Handle to the current session and its hydration status.
///
/// Cloning the handle shares the same store. Build one at startup and pass
/// it to whatever needs it.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Create a store persisting under `key` in `backend`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime; the persistence writer is
    /// spawned onto the current runtime.
    pub fn new<B>(backend: B, key: impl Into<String>) -> Result<Self>
    where
        B: PersistenceBackend + 'static,
    {
        Self::with_backend(Arc::new(backend), key)
    }

    /// Create a store on an already shared backend.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn with_backend(
        backend: Arc<dyn PersistenceBackend>,
        key: impl Into<String>,
    ) -> Result<Self> {
        let key = key.into();
        validate_key(&key)?;

        let (state, _) = watch::channel(Snapshot::default());
        let (writes, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(Arc::clone(&backend), key.clone(), rx));

        debug!(key = %key, "session store created");

        Ok(Self {
            inner: Arc::new(Inner {
                state,
                generation: AtomicU64::new(0),
                backend,
                key,
                writes,
            }),
        })
    }

    /// Storage key this store persists under.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Set the session.
    ///
    /// Both fields are replaced together and a write to the backend is
    /// queued. Backend failures are logged, never returned. An empty or
    /// malformed token, or a `null` user, is rejected before anything changes.
    pub fn set_session(&self, token: impl Into<String>, user: Value) -> Result<()> {
        let session = Session::new(token, user)?;
        self.commit(session);
        Ok(())
    }

    /// Set the session from a login response body and its `Authorization` header.
    pub fn apply_login_response(&self, body: &Value, authorization: Option<&str>) -> Result<()> {
        let session = credentials::resolve_login_response(body, authorization)?;
        self.commit(session);
        Ok(())
    }

    fn commit(&self, session: Session) {
        let payload = match envelope::encode(&session) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(key = %self.inner.key, error = %e, "failed to encode session; not persisted");
                None
            }
        };

        self.inner.state.send_modify(|snapshot| {
            snapshot.session = session;
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            if let Some(payload) = payload {
                self.enqueue(PersistOp::Save(payload));
            }
        });
        debug!(key = %self.inner.key, "session set");
    }

    /// Clear the session.
    ///
    /// Clearing an empty store changes nothing observable and notifies no
    /// subscriber, but the stored copy is still removed.
    pub fn clear_session(&self) {
        let changed = self.inner.state.send_if_modified(|snapshot| {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            self.enqueue(PersistOp::Remove);
            if snapshot.session.is_empty() {
                return false;
            }
            snapshot.session = Session::default();
            true
        });
        if changed {
            debug!(key = %self.inner.key, "session cleared");
        }
    }

    /// Clear the session after the server rejected its token.
    pub fn handle_unauthorized(&self) {
        warn!(key = %self.inner.key, "token rejected by server; clearing session");
        self.clear_session();
    }

    /// Mark rehydration as complete. Only the first call has any effect.
    pub fn mark_hydrated(&self) {
        let changed = self
            .inner
            .state
            .send_if_modified(|snapshot| snapshot.hydration.mark());
        if changed {
            info!(
                key = %self.inner.key,
                authenticated = self.inner.state.borrow().session.token.is_some(),
                "session store hydrated"
            );
        }
    }

    /// Load the persisted session and mark the store hydrated.
    ///
    /// Read and decode failures leave the session untouched; hydration
    /// completes either way. Stored data is only applied to a store whose
    /// session has never been set or cleared in this process: any such
    /// change, made before the call or while the load is pending, is newer
    /// than the stored copy and wins.
    pub async fn rehydrate(&self) -> RehydrateOutcome {
        let outcome = match self.load_stored().await {
            Some(stored) => self.apply_stored(stored),
            None => RehydrateOutcome::Empty,
        };

        self.mark_hydrated();
        outcome
    }

    async fn load_stored(&self) -> Option<Result<Session>> {
        let key = &self.inner.key;
        let raw = match self.inner.backend.load(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "no stored session");
                return None;
            }
            Err(e) => return Some(Err(e)),
        };

        match envelope::decode(&raw) {
            Ok(Some(session)) if !session.is_empty() => Some(Ok(session)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        }
    }

    fn apply_stored(&self, stored: Result<Session>) -> RehydrateOutcome {
        let session = match stored {
            Ok(session) => session,
            Err(e) => {
                warn!(key = %self.inner.key, error = %e, "could not read stored session; starting logged out");
                return RehydrateOutcome::Failed;
            }
        };

        if session.is_partial() {
            warn!(
                key = %self.inner.key,
                has_token = session.token.is_some(),
                has_user = session.user.is_some(),
                "stored session is incomplete"
            );
        }

        let applied = self.inner.state.send_if_modified(|snapshot| {
            if self.inner.generation.load(Ordering::SeqCst) != 0 {
                return false;
            }
            snapshot.session = session;
            true
        });

        if applied {
            debug!(key = %self.inner.key, "stored session restored");
            RehydrateOutcome::Restored
        } else {
            debug!(key = %self.inner.key, "session already changed in this process; stored copy dropped");
            RehydrateOutcome::Superseded
        }
    }

    /// Wait until every persistence operation queued so far has been attempted.
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .writes
            .send(PersistOp::Flush(tx))
            .map_err(|_| AuthStoreError::ChannelClosed)?;
        rx.await.map_err(|_| AuthStoreError::ChannelClosed)
    }

    /// Subscribe to changes of the token, user, or hydration status.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.state.subscribe()
    }

    /// Current state.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.borrow().clone()
    }

    /// Current token.
    pub fn token(&self) -> Option<String> {
        self.inner.state.borrow().session.token.clone()
    }

    /// Current user.
    pub fn user(&self) -> Option<Value> {
        self.inner.state.borrow().session.user.clone()
    }

    /// Whether rehydration has completed.
    pub fn is_hydrated(&self) -> bool {
        self.inner.state.borrow().is_hydrated()
    }

    /// Hydrated and holding a token.
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// `Authorization` header value for the current token.
    pub fn authorization_header(&self) -> Option<String> {
        self.inner
            .state
            .borrow()
            .token()
            .map(credentials::bearer)
    }

    fn enqueue(&self, op: PersistOp) {
        if self.inner.writes.send(op).is_err() {
            warn!(key = %self.inner.key, "persistence writer stopped; change kept in memory only");
        }
    }
}

/// Apply queued persistence operations one at a time, in order.
async fn run_writer(
    backend: Arc<dyn PersistenceBackend>,
    key: String,
    mut rx: mpsc::UnboundedReceiver<PersistOp>,
) {
    while let Some(op) = rx.recv().await {
        match op {
            PersistOp::Save(payload) => {
                if let Err(e) = backend.save(&key, &payload).await {
                    warn!(key = %key, error = %e, "failed to persist session");
                }
            }
            PersistOp::Remove => {
                if let Err(e) = backend.remove(&key).await {
                    warn!(key = %key, error = %e, "failed to remove stored session");
                }
            }
            PersistOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!(key = %key, "persistence writer stopped");
}
