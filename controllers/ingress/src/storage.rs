//! Storage backend selection.
//!
//! Turns the declared backend kind into a live [`ConfigStorage`] handle.
//! Construction failures are wrapped with the backend and parameter that
//! caused them and returned as-is; retrying is left to whoever runs the
//! process.

use crate::client::build_client;
use crate::error::ControllerError;
use crate::options::BootstrapOptions;
use config_storage::{ConfigStorage, CrdStorage, FileStorage};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// YAML files in a local directory
    File,
    /// Custom resources in the cluster
    ClusterResource,
}

impl StorageKind {
    /// Names accepted on the command line
    pub const SUPPORTED: [&'static str; 2] = ["file", "cluster-resource"];
}

impl FromStr for StorageKind {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(StorageKind::File),
            "cluster-resource" | "kube" => Ok(StorageKind::ClusterResource),
            other => Err(ControllerError::Configuration(format!(
                "unknown or unspecified config storage type: {other:?} (supported: [{}])",
                Self::SUPPORTED.join(" | ")
            ))),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::File => f.write_str("file"),
            StorageKind::ClusterResource => f.write_str("cluster-resource"),
        }
    }
}

/// Construct the storage backend declared in `options`.
///
/// The cluster-resource backend builds its own control-plane client so the
/// storage watcher can be configured independently of the reconciliation
/// client.
pub async fn create_storage(
    options: &BootstrapOptions,
) -> Result<Arc<dyn ConfigStorage>, ControllerError> {
    let kind: StorageKind = options.storage_type.parse()?;

    match kind {
        StorageKind::File => {
            let dir = &options.file.config_dir;
            if dir.as_os_str().is_empty() {
                return Err(ControllerError::Configuration(
                    "must provide directory for file config storage".to_string(),
                ));
            }
            let storage = FileStorage::new(dir.clone(), options.sync_period)
                .await
                .map_err(|e| {
                    ControllerError::Configuration(format!(
                        "failed to start file config storage for directory {}: {e}",
                        dir.display()
                    ))
                })?;
            info!("Using file config storage at {}", dir.display());
            Ok(Arc::new(storage))
        }
        StorageKind::ClusterResource => {
            let kube = &options.kube;
            let client = build_client(kube.master_url.as_deref(), kube.kubeconfig.as_deref())
                .await
                .map_err(|e| {
                    ControllerError::Configuration(format!(
                        "building kube client for config storage: {e}"
                    ))
                })?;
            let storage = CrdStorage::new(client, &kube.namespace, options.sync_period)
                .await
                .map_err(|e| {
                    ControllerError::Configuration(format!(
                        "failed to start cluster-resource config storage in namespace {}: {e}",
                        kube.namespace
                    ))
                })?;
            info!(
                "Using cluster-resource config storage in namespace {}",
                kube.namespace
            );
            Ok(Arc::new(storage))
        }
    }
}
