//! Upstream CRD
//!
//! Defines a routable destination backed by a Kubernetes service port.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "gloo.solo.io",
    version = "v1",
    kind = "Upstream",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamSpec {
    /// Upstream type
    #[serde(default)]
    pub upstream_type: UpstreamType,

    /// Name of the Kubernetes service receiving traffic
    pub service_name: String,

    /// Namespace of the Kubernetes service
    pub service_namespace: String,

    /// Service port, either a port number or a named port
    pub service_port: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UpstreamType {
    /// Kubernetes service discovered through the cluster API
    #[default]
    Kubernetes,

    /// Static host list managed outside the cluster
    Static,
}

impl UpstreamSpec {
    /// Spec for a Kubernetes service port.
    pub fn kubernetes(
        service_name: impl Into<String>,
        service_namespace: impl Into<String>,
        service_port: impl Into<String>,
    ) -> Self {
        Self {
            upstream_type: UpstreamType::Kubernetes,
            service_name: service_name.into(),
            service_namespace: service_namespace.into(),
            service_port: service_port.into(),
        }
    }
}
