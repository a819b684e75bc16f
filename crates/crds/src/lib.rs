//! Gloo Configuration CRDs
//!
//! Custom resources for the configuration objects the ingress controller
//! keeps in its storage backend. The same types are serialized to YAML by the
//! file backend and stored as namespaced custom resources by the
//! cluster-resource backend.

pub mod upstream;
pub mod virtual_service;

pub use upstream::*;
pub use virtual_service::*;

/// API group shared by all configuration CRDs.
pub const GROUP: &str = "gloo.solo.io";

/// Label marking objects generated from Kubernetes Ingress resources.
pub const MANAGED_BY_LABEL: &str = "ingress.gloo.solo.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`] written by the ingress controller.
pub const MANAGED_BY_VALUE: &str = "ingress-controller";
