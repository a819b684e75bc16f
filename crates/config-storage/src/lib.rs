//! Configuration Storage
//!
//! Backends holding the gloo configuration objects (`Upstream`,
//! `VirtualService`) that the ingress controller writes and watches.
//!
//! Every backend implements [`ConfigStorage`], so callers only ever hold an
//! `Arc<dyn ConfigStorage>` and never care which technology sits behind it.
//!
//! # Example
//!
//! ```no_run
//! use config_storage::{ConfigStorage, FileStorage};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), config_storage::StorageError> {
//! let storage = FileStorage::new("_gloo_config", Duration::from_secs(30)).await?;
//! let snapshot = storage.snapshot().await?;
//! println!("{} upstreams", snapshot.upstreams.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Backends
//!
//! - **File**: one YAML file per object under a root directory
//! - **Cluster resource**: namespaced custom resources in the Kubernetes API

pub mod crd;
pub mod error;
pub mod file;
#[cfg(test)]
mod file_test;
pub mod models;
#[path = "trait.rs"]
pub mod storage_trait;
mod watch;
#[cfg(feature = "test-util")]
pub mod mock;

pub use crd::CrdStorage;
pub use error::StorageError;
pub use file::FileStorage;
pub use models::*;
pub use storage_trait::{ConfigStorage, SnapshotStream};
#[cfg(feature = "test-util")]
pub use mock::MockStorage;
