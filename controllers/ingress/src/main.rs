//! Ingress Controller
//!
//! Keeps gloo configuration (`Upstream`s and `VirtualService`s) in sync with
//! the cluster's Ingress resources, and optionally publishes the proxy
//! service's load balancer endpoints on every Ingress status.
//!
//! Configuration comes from flags or the environment (see `--help`). The
//! process exits 0 after a signal-initiated shutdown and non-zero when
//! startup fails.

mod client;
mod controller;
mod coordinator;
mod error;
mod ingress;
mod options;
mod scope;
mod signals;
mod status;
mod stop;
mod storage;
mod supervisor;
#[cfg(test)]
mod supervisor_test;
#[cfg(test)]
mod test_utils;

use crate::client::install_crypto_provider;
use crate::controller::Controller;
use crate::error::ControllerError;
use crate::options::{BootstrapOptions, Cli};
use crate::supervisor::KubeLoopFactory;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error_kind = %e.kind(), "Ingress controller failed to start: {}", e);
            eprintln!("ingress-controller: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ControllerError> {
    info!("Starting Ingress Controller");
    install_crypto_provider();

    let options = BootstrapOptions::try_from(cli)?;
    info!("Configuration:");
    info!("  Storage type: {}", options.storage_type);
    info!("  Sync period: {:?}", options.sync_period);
    info!("  Global ingress: {}", options.global_ingress);
    info!(
        "  Watch namespace: {}",
        options.watch_namespace.as_deref().unwrap_or("all namespaces")
    );
    info!("  Service: {}", options.service_name.as_deref().unwrap_or("none"));

    let mut controller = Controller::new(&options, &KubeLoopFactory).await?;
    controller.listen_for_signals();
    let report = controller.run().await;
    if !report.abandoned.is_empty() {
        info!("Abandoned loops at exit: {}", report.abandoned.join(", "));
    }
    Ok(())
}
