//! ConfigStorage trait
//!
//! The uniform capability set every storage backend exposes. The controller
//! holds backends as `Arc<dyn ConfigStorage>` and tests swap in
//! [`MockStorage`](crate::MockStorage).

use crate::error::StorageError;
use crate::models::{ConfigKind, ConfigObject, ConfigSnapshot};
use futures::stream::BoxStream;

/// Stream of snapshots produced by [`ConfigStorage::watch`]
pub type SnapshotStream = BoxStream<'static, Result<ConfigSnapshot, StorageError>>;

/// Trait for configuration storage operations
///
/// Implementations must be safe to call concurrently from several
/// reconciliation loops; the controller adds no locking of its own.
#[async_trait::async_trait]
pub trait ConfigStorage: Send + Sync {
    /// Short backend name used in log lines
    fn backend(&self) -> &'static str;

    /// Read every stored object
    async fn snapshot(&self) -> Result<ConfigSnapshot, StorageError>;

    /// Watch for changes
    ///
    /// The stream yields the current snapshot first, then a new snapshot
    /// each time the stored set differs from the previous one. Read errors
    /// are yielded in place and polling continues.
    fn watch(&self) -> SnapshotStream;

    /// Create or replace one object
    async fn apply(&self, object: ConfigObject) -> Result<(), StorageError>;

    /// Delete one object; deleting an absent object succeeds
    async fn delete(&self, kind: ConfigKind, name: &str) -> Result<(), StorageError>;
}
