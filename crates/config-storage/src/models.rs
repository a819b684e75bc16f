//! Storage models
//!
//! Backend-neutral views over the configuration CRDs.

use crate::error::StorageError;
use crds::{Upstream, VirtualService, MANAGED_BY_LABEL, MANAGED_BY_VALUE};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of configuration object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigKind {
    /// [`Upstream`]
    Upstream,
    /// [`VirtualService`]
    VirtualService,
}

impl ConfigKind {
    /// Every kind, in the order backends read them
    pub const ALL: [ConfigKind; 2] = [ConfigKind::Upstream, ConfigKind::VirtualService];

    /// Directory (file backend) or plural (CRD backend) name for this kind
    pub fn plural(self) -> &'static str {
        match self {
            ConfigKind::Upstream => "upstreams",
            ConfigKind::VirtualService => "virtualservices",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigKind::Upstream => f.write_str("Upstream"),
            ConfigKind::VirtualService => f.write_str("VirtualService"),
        }
    }
}

/// One storable configuration object
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigObject {
    /// An upstream
    Upstream(Upstream),
    /// A virtual service
    VirtualService(VirtualService),
}

impl ConfigObject {
    /// Kind of the wrapped object
    pub fn kind(&self) -> ConfigKind {
        match self {
            ConfigObject::Upstream(_) => ConfigKind::Upstream,
            ConfigObject::VirtualService(_) => ConfigKind::VirtualService,
        }
    }

    /// Object name (empty when unset)
    pub fn name(&self) -> String {
        match self {
            ConfigObject::Upstream(u) => u.name_any(),
            ConfigObject::VirtualService(vs) => vs.name_any(),
        }
    }
}

impl From<Upstream> for ConfigObject {
    fn from(upstream: Upstream) -> Self {
        ConfigObject::Upstream(upstream)
    }
}

impl From<VirtualService> for ConfigObject {
    fn from(virtual_service: VirtualService) -> Self {
        ConfigObject::VirtualService(virtual_service)
    }
}

/// Point-in-time view of everything in storage, keyed by object name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    /// Stored upstreams
    pub upstreams: BTreeMap<String, Upstream>,
    /// Stored virtual services
    pub virtual_services: BTreeMap<String, VirtualService>,
}

impl ConfigSnapshot {
    /// Insert an object, replacing any object of the same kind and name
    pub fn insert(&mut self, object: ConfigObject) {
        let name = object.name();
        match object {
            ConfigObject::Upstream(u) => {
                self.upstreams.insert(name, u);
            }
            ConfigObject::VirtualService(vs) => {
                self.virtual_services.insert(name, vs);
            }
        }
    }

    /// Total number of stored objects
    pub fn len(&self) -> usize {
        self.upstreams.len() + self.virtual_services.len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of objects of `kind` labelled as generated by the ingress controller
    pub fn managed_names(&self, kind: ConfigKind) -> Vec<String> {
        match kind {
            ConfigKind::Upstream => self
                .upstreams
                .iter()
                .filter(|(_, u)| is_managed(&u.metadata))
                .map(|(name, _)| name.clone())
                .collect(),
            ConfigKind::VirtualService => self
                .virtual_services
                .iter()
                .filter(|(_, vs)| is_managed(&vs.metadata))
                .map(|(name, _)| name.clone())
                .collect(),
        }
    }
}

/// True if the object carries the ingress controller's managed-by label
pub fn is_managed(meta: &ObjectMeta) -> bool {
    meta.labels
        .as_ref()
        .and_then(|labels| labels.get(MANAGED_BY_LABEL))
        .is_some_and(|value| value == MANAGED_BY_VALUE)
}

/// Validate an object name as a DNS-1123 subdomain.
///
/// Names become file names in the file backend, so anything outside
/// `[a-z0-9.-]` is rejected up front.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    let valid = !name.is_empty()
        && name.len() <= 253
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

/// Keep only the metadata that describes the object itself.
///
/// Server-populated fields (resource version, uid, managed fields, ...)
/// change on every write and would make unchanged snapshots compare unequal.
pub(crate) fn user_metadata(meta: &ObjectMeta) -> ObjectMeta {
    ObjectMeta {
        name: meta.name.clone(),
        labels: meta.labels.clone(),
        annotations: meta.annotations.clone(),
        ..ObjectMeta::default()
    }
}
