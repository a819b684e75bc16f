//! Storage errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when reading or writing configuration storage
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error on a specific path
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// A stored YAML document could not be parsed or written
    #[error("YAML error in {path}: {source}")]
    Yaml {
        /// Offending file
        path: PathBuf,
        /// Underlying error
        source: serde_yaml::Error,
    },

    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Object name cannot be stored by this backend
    #[error("Invalid object name: {0}")]
    InvalidName(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: path.into(),
            source,
        }
    }
}
