//! Control-plane client construction.
//!
//! Resolves connection parameters into a `kube::Client`:
//! - neither URL nor kubeconfig: in-cluster service account, falling back to
//!   the default kubeconfig (`Config::infer`)
//! - kubeconfig: the file's current context, with the URL overriding its
//!   server when both are given
//! - URL only: an unauthenticated connection to that endpoint
//!
//! No request is sent to the API server here.

use crate::error::ControllerError;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use tracing::{debug, info};

/// Install the process-wide rustls crypto provider used by kube's TLS stack.
///
/// Must run before the first client is built. Installing twice is harmless.
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }
}

/// Build a control-plane client from optional explicit parameters.
pub async fn build_client(
    master_url: Option<&str>,
    kubeconfig: Option<&Path>,
) -> Result<Client, ControllerError> {
    let cluster_url = master_url
        .map(|url| {
            url.parse::<http::Uri>().map_err(|e| {
                ControllerError::Connectivity(format!("invalid master URL {url}: {e}"))
            })
        })
        .transpose()?;

    let mut config = match kubeconfig {
        Some(path) => {
            debug!("Loading kubeconfig from {}", path.display());
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                ControllerError::Connectivity(format!(
                    "failed to read kubeconfig {}: {e}",
                    path.display()
                ))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    ControllerError::Connectivity(format!(
                        "failed to load kubeconfig {}: {e}",
                        path.display()
                    ))
                })?
        }
        None => match &cluster_url {
            Some(url) => Config::new(url.clone()),
            None => Config::infer().await.map_err(|e| {
                ControllerError::Connectivity(format!(
                    "no in-cluster or default kubeconfig credentials found: {e}"
                ))
            })?,
        },
    };

    if let Some(url) = cluster_url {
        config.cluster_url = url;
    }

    info!("Kubernetes API server: {}", config.cluster_url);
    Client::try_from(config)
        .map_err(|e| ControllerError::Connectivity(format!("failed to create kube client: {e}")))
}
