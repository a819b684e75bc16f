//! Mock ConfigStorage for unit testing
//!
//! Keeps objects in memory, records writes, and can be told to fail so tests
//! can exercise operational-error paths without a filesystem or cluster.

use crate::error::StorageError;
use crate::models::{ConfigKind, ConfigObject, ConfigSnapshot};
use crate::storage_trait::{ConfigStorage, SnapshotStream};
use crate::watch::poll_snapshots;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Mock storage for testing
#[derive(Debug, Clone)]
pub struct MockStorage {
    objects: Arc<Mutex<ConfigSnapshot>>,
    failing: Arc<AtomicBool>,
    applies: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
    poll_period: Duration,
}

impl MockStorage {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(ConfigSnapshot::default())),
            failing: Arc::new(AtomicBool::new(false)),
            applies: Arc::new(AtomicUsize::new(0)),
            deletes: Arc::new(AtomicUsize::new(0)),
            poll_period: Duration::from_millis(10),
        }
    }

    /// Seed an object (for test setup, not counted as a write)
    pub fn insert(&self, object: ConfigObject) {
        self.lock().insert(object);
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful `apply` calls
    pub fn apply_count(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }

    /// Number of successful `delete` calls
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Copy of the current contents
    pub fn contents(&self) -> ConfigSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, ConfigSnapshot> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_failing(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::io(
                "mock",
                std::io::Error::other("mock storage set to fail"),
            ));
        }
        Ok(())
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ConfigStorage for MockStorage {
    fn backend(&self) -> &'static str {
        "mock"
    }

    async fn snapshot(&self) -> Result<ConfigSnapshot, StorageError> {
        self.check_failing()?;
        Ok(self.contents())
    }

    fn watch(&self) -> SnapshotStream {
        poll_snapshots(self.clone(), self.poll_period)
    }

    async fn apply(&self, object: ConfigObject) -> Result<(), StorageError> {
        self.check_failing()?;
        self.lock().insert(object);
        self.applies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, kind: ConfigKind, name: &str) -> Result<(), StorageError> {
        self.check_failing()?;
        {
            let mut objects = self.lock();
            match kind {
                ConfigKind::Upstream => {
                    objects.upstreams.remove(name);
                }
                ConfigKind::VirtualService => {
                    objects.virtual_services.remove(name);
                }
            }
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
