//! # auth-store
//!
//! Persisted client session store with asynchronous rehydration gating.
//!
//! A [`SessionStore`] holds the current token and user together with a
//! one-way `hydrated` flag. On startup the application calls
//! [`SessionStore::rehydrate`] once; until it resolves the session is
//! unknown and gates answer [`gate::AccessDecision::Checking`]. Every
//! session change is written to a [`persist::PersistenceBackend`] in the
//! background.
//!
//! ## Quick Start
//!
//! ```no_run
//! use auth_store::persist::{FileBackend, DEFAULT_KEY};
//! use auth_store::{gate, SessionStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> auth_store::Result<()> {
//!     auth_store::logging::try_init().ok();
//!
//!     let store = SessionStore::new(FileBackend::new(".auth-store"), DEFAULT_KEY)?;
//!     store.rehydrate().await;
//!
//!     if !gate::evaluate(&store.snapshot(), "/visits").is_granted() {
//!         store.set_session("abc123", json!({"id": "u1", "name": "Sara"}))?;
//!     }
//!
//!     store.flush().await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod logging;
pub mod persist;
pub mod session;

// Re-export commonly used types
pub use error::{AuthStoreError, Result};
pub use gate::{AccessDecision, RoleGate};
pub use persist::{FileBackend, MemoryBackend, PersistenceBackend};
pub use session::{HydrationStatus, RehydrateOutcome, Session, SessionStore, Snapshot};
