//! File-backed storage
//!
//! Objects live as one YAML document per file:
//!
//! ```text
//! <root>/upstreams/<name>.yml
//! <root>/virtualservices/<name>.yml
//! ```
//!
//! Files are written through a temporary sibling and renamed into place so a
//! concurrent reader never observes a half-written document.

use crate::error::StorageError;
use crate::models::{validate_name, ConfigKind, ConfigObject, ConfigSnapshot};
use crate::storage_trait::{ConfigStorage, SnapshotStream};
use crate::watch::poll_snapshots;
use kube::ResourceExt;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Storage backend keeping objects as YAML files under a root directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: Arc<PathBuf>,
    sync_period: Duration,
}

impl FileStorage {
    /// Open (and create if needed) file storage rooted at `dir`.
    ///
    /// Fails if the per-kind sub-directories cannot be created.
    pub async fn new(dir: impl Into<PathBuf>, sync_period: Duration) -> Result<Self, StorageError> {
        let root = dir.into();
        for kind in ConfigKind::ALL {
            let kind_dir = root.join(kind.plural());
            tokio::fs::create_dir_all(&kind_dir)
                .await
                .map_err(|e| StorageError::io(&kind_dir, e))?;
        }
        info!("File storage ready at {}", root.display());
        Ok(Self {
            root: Arc::new(root),
            sync_period,
        })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, kind: ConfigKind, name: &str) -> PathBuf {
        self.root.join(kind.plural()).join(format!("{name}.yml"))
    }

    async fn read_kind<K>(&self, kind: ConfigKind) -> Result<BTreeMap<String, K>, StorageError>
    where
        K: DeserializeOwned + kube::Resource,
    {
        let dir = self.root.join(kind.plural());
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;
        let mut objects = BTreeMap::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&dir, e))?
        {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| EXTENSIONS.contains(&ext));
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Skip non-YAML files and in-flight temporaries
            if !is_yaml || stem.starts_with('.') {
                continue;
            }

            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| StorageError::io(&path, e))?;
            let mut object: K =
                serde_yaml::from_str(&contents).map_err(|e| StorageError::yaml(&path, e))?;
            if object.meta().name.is_none() {
                object.meta_mut().name = Some(stem.to_string());
            }
            objects.insert(object.name_any(), object);
        }

        Ok(objects)
    }
}

#[async_trait::async_trait]
impl ConfigStorage for FileStorage {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn snapshot(&self) -> Result<ConfigSnapshot, StorageError> {
        Ok(ConfigSnapshot {
            upstreams: self.read_kind(ConfigKind::Upstream).await?,
            virtual_services: self.read_kind(ConfigKind::VirtualService).await?,
        })
    }

    fn watch(&self) -> SnapshotStream {
        poll_snapshots(self.clone(), self.sync_period)
    }

    async fn apply(&self, object: ConfigObject) -> Result<(), StorageError> {
        let name = object.name();
        validate_name(&name)?;
        let kind = object.kind();
        let path = self.object_path(kind, &name);

        let yaml = match &object {
            ConfigObject::Upstream(u) => serde_yaml::to_string(u),
            ConfigObject::VirtualService(vs) => serde_yaml::to_string(vs),
        }
        .map_err(|e| StorageError::yaml(&path, e))?;

        let tmp = path.with_file_name(format!(".{name}.yml.tmp"));
        tokio::fs::write(&tmp, yaml)
            .await
            .map_err(|e| StorageError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;

        debug!("Wrote {} {} to {}", kind, name, path.display());
        Ok(())
    }

    async fn delete(&self, kind: ConfigKind, name: &str) -> Result<(), StorageError> {
        validate_name(name)?;
        let path = self.object_path(kind, name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted {} {}", kind, name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }
}
