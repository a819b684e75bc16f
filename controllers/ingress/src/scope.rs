//! Reconciliation scope and service references, validated when a loop is
//! constructed.

use crate::error::ControllerError;
use kube::{Api, Client, Resource};
use std::fmt;

/// Which Ingress resources the loops act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressScope {
    /// Every namespace in the cluster
    Global,
    /// A single namespace
    Namespaced(String),
}

impl IngressScope {
    /// Resolve the scope from the global flag and optional namespace.
    pub fn resolve(global: bool, namespace: Option<&str>) -> Result<Self, ControllerError> {
        if global {
            return Ok(IngressScope::Global);
        }
        match namespace {
            Some(ns) if is_dns_label(ns) => Ok(IngressScope::Namespaced(ns.to_string())),
            Some(ns) => Err(ControllerError::Startup(format!(
                "watch namespace {ns:?} is not a valid namespace name"
            ))),
            None => Err(ControllerError::Startup(
                "a watch namespace is required when ingress is not global".to_string(),
            )),
        }
    }

    /// Namespace when namespaced
    pub fn namespace(&self) -> Option<&str> {
        match self {
            IngressScope::Global => None,
            IngressScope::Namespaced(ns) => Some(ns),
        }
    }

    /// API handle for `K` covering this scope.
    pub fn api<K>(&self, client: &Client) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        match self {
            IngressScope::Global => Api::all(client.clone()),
            IngressScope::Namespaced(ns) => Api::namespaced(client.clone(), ns),
        }
    }
}

impl fmt::Display for IngressScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngressScope::Global => f.write_str("all namespaces"),
            IngressScope::Namespaced(ns) => write!(f, "namespace {ns}"),
        }
    }
}

/// Reference to the proxy service whose load balancer status is mirrored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRef {
    /// Service namespace
    pub namespace: String,
    /// Service name
    pub name: String,
}

impl ServiceRef {
    /// Parse `[namespace/]name`, using `default_namespace` when no namespace
    /// is given.
    pub fn parse(raw: &str, default_namespace: &str) -> Result<Self, ControllerError> {
        let (namespace, name) = match raw.split_once('/') {
            Some((ns, name)) => (ns, name),
            None => (default_namespace, raw),
        };
        if !is_dns_label(namespace) || !is_dns_label(name) {
            return Err(ControllerError::Startup(format!(
                "invalid service reference {raw:?}, expected [namespace/]name"
            )));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// DNS-1123 label: lowercase alphanumerics and '-', at most 63 characters,
/// starting and ending with an alphanumeric.
fn is_dns_label(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 63
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !value.starts_with('-')
        && !value.ends_with('-')
}
