//! In-memory backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::PersistenceBackend;
use crate::error::AuthStoreError;
use crate::Result;

#[derive(Debug, Default)]
struct Slots {
    values: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

/// Process-local backend.
///
/// Clones share the same slots, so a second store built on a clone sees what
/// the first one wrote. Reads and writes can be made to fail on demand.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    slots: Arc<Slots>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a slot directly, bypassing failure injection.
    pub fn get(&self, key: &str) -> Option<String> {
        self.slots
            .values
            .lock()
            .ok()
            .and_then(|values| values.get(key).cloned())
    }

    /// Write a slot directly, bypassing failure injection.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut values) = self.slots.values.lock() {
            values.insert(key.into(), value.into());
        }
    }

    /// Check if a slot holds a value.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Make subsequent loads fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.slots.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent saves and removals fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.slots.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.slots.fail_writes.load(Ordering::SeqCst) {
            return Err(AuthStoreError::BackendWrite("storage unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        if self.slots.fail_reads.load(Ordering::SeqCst) {
            return Err(AuthStoreError::BackendRead("storage unavailable".into()));
        }
        let values = self
            .slots
            .values
            .lock()
            .map_err(|_| AuthStoreError::BackendRead("lock poisoned".into()))?;
        Ok(values.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        let mut values = self
            .slots
            .values
            .lock()
            .map_err(|_| AuthStoreError::BackendWrite("lock poisoned".into()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        let mut values = self
            .slots
            .values
            .lock()
            .map_err(|_| AuthStoreError::BackendWrite("lock poisoned".into()))?;
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_remove() {
        let backend = MemoryBackend::new();
        assert!(backend.load("k").await.unwrap().is_none());

        backend.save("k", "v1").await.unwrap();
        assert_eq!(backend.load("k").await.unwrap().as_deref(), Some("v1"));

        backend.remove("k").await.unwrap();
        assert!(backend.load("k").await.unwrap().is_none());

        // Removing again is fine
        backend.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_clones_share_slots() {
        let a = MemoryBackend::new();
        let b = a.clone();

        a.save("k", "shared").await.unwrap();
        assert_eq!(b.get("k").as_deref(), Some("shared"));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let backend = MemoryBackend::new();
        backend.insert("k", "v");

        backend.set_fail_reads(true);
        assert!(matches!(
            backend.load("k").await,
            Err(AuthStoreError::BackendRead(_))
        ));

        backend.set_fail_writes(true);
        assert!(backend.save("k", "other").await.is_err());
        assert!(backend.remove("k").await.is_err());
        assert_eq!(backend.get("k").as_deref(), Some("v"));

        backend.set_fail_reads(false);
        assert_eq!(backend.load("k").await.unwrap().as_deref(), Some("v"));
    }
}
