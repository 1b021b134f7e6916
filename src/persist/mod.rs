//! Persistence backends for the session store.
//!
//! A backend is a durable key-value slot store. The session store reads one
//! key once at startup and writes it whenever the session changes; the value
//! is the JSON envelope produced by [`envelope::encode`].
//!
//! ## Example
//!
//! ```rust
//! use auth_store::persist::{MemoryBackend, PersistenceBackend};
//!
//! # tokio_test::block_on(async {
//! let backend = MemoryBackend::new();
//! backend.save("session-store", "{}").await.unwrap();
//! assert_eq!(backend.load("session-store").await.unwrap().as_deref(), Some("{}"));
//! # });
//! ```

pub mod envelope;
mod file;
mod memory;

use async_trait::async_trait;

use crate::error::AuthStoreError;
use crate::Result;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Storage key used when none is configured.
pub const DEFAULT_KEY: &str = "session-store";

/// Durable key-value storage consumed by the session store.
#[async_trait]
pub trait PersistenceBackend: std::fmt::Debug + Send + Sync {
    /// Read the value stored under `key`, or `None` if nothing is stored.
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value under `key`. Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Check that a key is usable by every backend.
///
/// Keys are limited to ASCII letters, digits, `.`, `_` and `-`, and may not
/// be `.` or `..`.
pub fn validate_key(key: &str) -> Result<()> {
    let allowed = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if key.is_empty() || !allowed || key == "." || key == ".." {
        return Err(AuthStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
