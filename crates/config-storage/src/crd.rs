//! Cluster-resource storage
//!
//! Stores objects as namespaced `Upstream` and `VirtualService` custom
//! resources. The CRDs must already be installed (see the `crdgen` binary in
//! the `crds` crate).

use crate::error::StorageError;
use crate::models::{user_metadata, validate_name, ConfigKind, ConfigObject, ConfigSnapshot};
use crate::storage_trait::{ConfigStorage, SnapshotStream};
use crate::watch::poll_snapshots;
use crds::{Upstream, VirtualService};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "ingress-controller";

/// Storage backend backed by custom resources in one namespace.
#[derive(Clone)]
pub struct CrdStorage {
    namespace: String,
    upstreams: Api<Upstream>,
    virtual_services: Api<VirtualService>,
    sync_period: Duration,
}

impl std::fmt::Debug for CrdStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrdStorage")
            .field("namespace", &self.namespace)
            .field("sync_period", &self.sync_period)
            .finish_non_exhaustive()
    }
}

impl CrdStorage {
    /// Connect to the configuration CRDs in `namespace`.
    ///
    /// Issues one bounded list per kind so an unreachable API server or a
    /// missing CRD fails here rather than on the first reconciliation pass.
    pub async fn new(
        client: Client,
        namespace: &str,
        sync_period: Duration,
    ) -> Result<Self, StorageError> {
        let storage = Self {
            namespace: namespace.to_string(),
            upstreams: Api::namespaced(client.clone(), namespace),
            virtual_services: Api::namespaced(client, namespace),
            sync_period,
        };

        let probe = ListParams::default().limit(1);
        storage.upstreams.list_metadata(&probe).await?;
        storage.virtual_services.list_metadata(&probe).await?;

        info!("Cluster-resource storage ready in namespace {}", namespace);
        Ok(storage)
    }

    /// Namespace holding the configuration resources
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

async fn list_all<K>(api: &Api<K>) -> Result<BTreeMap<String, K>, StorageError>
where
    K: kube::Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default,
{
    let list = api.list(&ListParams::default()).await?;
    Ok(list
        .items
        .into_iter()
        .map(|mut object| {
            *object.meta_mut() = user_metadata(object.meta());
            (object.name_any(), object)
        })
        .collect())
}

#[async_trait::async_trait]
impl ConfigStorage for CrdStorage {
    fn backend(&self) -> &'static str {
        "cluster-resource"
    }

    async fn snapshot(&self) -> Result<ConfigSnapshot, StorageError> {
        Ok(ConfigSnapshot {
            upstreams: list_all(&self.upstreams).await?,
            virtual_services: list_all(&self.virtual_services).await?,
        })
    }

    fn watch(&self) -> SnapshotStream {
        poll_snapshots(self.clone(), self.sync_period)
    }

    async fn apply(&self, object: ConfigObject) -> Result<(), StorageError> {
        let name = object.name();
        let kind = object.kind();
        validate_name(&name)?;
        let pp = PatchParams::apply(FIELD_MANAGER).force();

        match object {
            ConfigObject::Upstream(mut u) => {
                u.metadata = user_metadata(&u.metadata);
                self.upstreams.patch(&name, &pp, &Patch::Apply(&u)).await?;
            }
            ConfigObject::VirtualService(mut vs) => {
                vs.metadata = user_metadata(&vs.metadata);
                self.virtual_services
                    .patch(&name, &pp, &Patch::Apply(&vs))
                    .await?;
            }
        }

        debug!("Applied {} {}/{}", kind, self.namespace, name);
        Ok(())
    }

    async fn delete(&self, kind: ConfigKind, name: &str) -> Result<(), StorageError> {
        let dp = DeleteParams::default();
        let result = match kind {
            ConfigKind::Upstream => self.upstreams.delete(name, &dp).await.map(|_| ()),
            ConfigKind::VirtualService => self.virtual_services.delete(name, &dp).await.map(|_| ()),
        };

        match result {
            Ok(()) => {
                debug!("Deleted {} {}/{}", kind, self.namespace, name);
                Ok(())
            }
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
