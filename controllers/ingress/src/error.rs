//! Controller-specific error types.
//!
//! Startup failures (`Configuration`, `Connectivity`, `Startup`) end the
//! process. Everything a running loop reports is operational: it is logged
//! and the loop carries on at its next tick.

use config_storage::StorageError;
use kube::Error as KubeError;
use std::fmt;
use thiserror::Error;

/// Errors that can occur in the Ingress Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Invalid or missing setup parameter
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Control-plane credentials could not be resolved
    #[error("Control plane unreachable: {0}")]
    Connectivity(String),

    /// A loop rejected its construction arguments
    #[error("Failed to start loop: {0}")]
    Startup(String),

    /// A reconciliation or sync pass failed
    #[error("Pass failed: {0}")]
    Operational(String),

    /// Kubernetes API error during a pass
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Storage error during a pass
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Taxonomy class of a [`ControllerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal while starting
    Configuration,
    /// Fatal while starting
    Connectivity,
    /// Fatal while starting
    Startup,
    /// Logged, never fatal
    Operational,
}

impl ControllerError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControllerError::Configuration(_) => ErrorKind::Configuration,
            ControllerError::Connectivity(_) => ErrorKind::Connectivity,
            ControllerError::Startup(_) => ErrorKind::Startup,
            ControllerError::Operational(_)
            | ControllerError::Kube(_)
            | ControllerError::Storage(_) => ErrorKind::Operational,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::Startup => "startup",
            ErrorKind::Operational => "operational",
        };
        f.write_str(name)
    }
}
