//! Main controller implementation.
//!
//! Bootstraps storage, the control-plane client and the supervised loops,
//! then hands them to the [`Coordinator`] until shutdown.

use crate::client::build_client;
use crate::coordinator::{Coordinator, Phase, ShutdownReport};
use crate::error::ControllerError;
use crate::options::BootstrapOptions;
use crate::stop::StopSignal;
use crate::storage::create_storage;
use crate::supervisor::{start_loops, LoopFactory};
use tokio::sync::watch;
use tracing::info;

/// Running ingress controller.
#[derive(Debug)]
pub struct Controller {
    coordinator: Coordinator,
}

impl Controller {
    /// Construct storage, client and loops.
    ///
    /// Any failure is returned before a loop is spawned.
    pub async fn new(
        options: &BootstrapOptions,
        factory: &dyn LoopFactory,
    ) -> Result<Self, ControllerError> {
        info!("Initializing Ingress Controller");
        let mut coordinator = Coordinator::new(options.drain_timeout);

        let storage = create_storage(options).await?;
        let client = build_client(
            options.kube.master_url.as_deref(),
            options.kube.kubeconfig.as_deref(),
        )
        .await?;

        let loops = start_loops(factory, &client, storage, options, coordinator.stop_signal())?;
        info!("Started {} loops", loops.len());
        coordinator.supervise(loops);

        Ok(Self { coordinator })
    }

    /// Handle that stops the controller when fired
    pub fn stop_signal(&self) -> StopSignal {
        self.coordinator.stop_signal().clone()
    }

    /// Subscribe to lifecycle phase changes
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.coordinator.phase()
    }

    /// Stop on SIGINT/SIGTERM.
    pub fn listen_for_signals(&mut self) {
        self.coordinator.listen_for_signals();
    }

    /// Run until stopped and every loop has drained.
    pub async fn run(self) -> ShutdownReport {
        self.coordinator.run().await
    }
}
