//! VirtualService CRD
//!
//! Defines the routes served for a set of domains.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "gloo.solo.io",
    version = "v1",
    kind = "VirtualService",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceSpec {
    /// Domains (HTTP host headers) matched by this virtual service; `*` matches any host
    pub domains: Vec<String>,

    /// Routes evaluated in order, first match wins
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Request path to match
    pub path: String,

    /// How `path` is compared against the request path
    #[serde(default)]
    pub match_type: PathMatchType,

    /// Name of the Upstream receiving matched requests
    pub upstream: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PathMatchType {
    /// Matches any path starting with `path`
    #[default]
    Prefix,

    /// Matches `path` exactly
    Exact,
}
