//! Reconciliation loop supervision.
//!
//! Each loop is a tokio task that runs one pass per interval tick (or per
//! trigger notification), strictly one pass at a time. Failed passes are sent
//! to the loop's error channel and the loop carries on. Loops stop at the
//! next tick boundary after the [`StopSignal`] fires; a pass already in
//! flight is allowed to finish.

use crate::error::ControllerError;
use crate::ingress::IngressController;
use crate::options::BootstrapOptions;
use crate::scope::{IngressScope, ServiceRef};
use crate::status::StatusSyncer;
use crate::stop::StopSignal;
use config_storage::ConfigStorage;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Name of the primary reconciliation loop
pub const INGRESS_LOOP: &str = "ingress controller";
/// Name of the load balancer status sync loop
pub const STATUS_LOOP: &str = "ingress status sync";

/// Upper bound on trigger notifications folded into a single pass
const TRIGGER_BATCH: usize = 256;

/// One reconciliation or sync pass, run repeatedly by a supervised loop.
#[async_trait::async_trait]
pub trait Reconcile: Send + Sync {
    /// Run a single pass.
    async fn reconcile(&self) -> Result<(), ControllerError>;

    /// Notifications that should start a pass before the next interval tick.
    fn triggers(&self) -> Option<BoxStream<'static, ()>> {
        None
    }
}

/// A running supervised loop.
#[derive(Debug)]
pub struct LoopHandle {
    name: &'static str,
    errors: mpsc::UnboundedReceiver<ControllerError>,
    task: JoinHandle<()>,
}

impl LoopHandle {
    /// Loop identity used in log lines
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Errors reported by failed passes; closes once the loop has stopped.
    pub fn errors(&mut self) -> &mut mpsc::UnboundedReceiver<ControllerError> {
        &mut self.errors
    }

    /// Split into name, error channel and task.
    pub fn into_parts(
        self,
    ) -> (
        &'static str,
        mpsc::UnboundedReceiver<ControllerError>,
        JoinHandle<()>,
    ) {
        (self.name, self.errors, self.task)
    }
}

/// Spawn a supervised loop running `reconciler` every `sync_period`.
pub fn spawn_loop(
    name: &'static str,
    reconciler: Arc<dyn Reconcile>,
    sync_period: Duration,
    stop: StopSignal,
) -> LoopHandle {
    let (error_tx, errors) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_loop(name, reconciler, sync_period, stop, error_tx));
    LoopHandle { name, errors, task }
}

async fn run_loop(
    name: &'static str,
    reconciler: Arc<dyn Reconcile>,
    sync_period: Duration,
    stop: StopSignal,
    error_tx: mpsc::UnboundedSender<ControllerError>,
) {
    info!(loop_name = name, "Starting {}", name);

    let mut ticker = tokio::time::interval(sync_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut triggers = match reconciler.triggers() {
        Some(triggers) => triggers.ready_chunks(TRIGGER_BATCH).boxed(),
        None => stream::pending().boxed(),
    };
    let mut passes: u64 = 0;

    loop {
        tokio::select! {
            biased;

            () = stop.fired() => break,
            _ = ticker.tick() => {}
            Some(batch) = triggers.next() => {
                debug!(loop_name = name, notifications = batch.len(), "Pass triggered early");
                ticker.reset();
            }
        }

        passes += 1;
        match reconciler.reconcile().await {
            Ok(()) => debug!(loop_name = name, pass = passes, "Pass complete"),
            Err(e) => {
                if error_tx.send(e).is_err() {
                    debug!(loop_name = name, "Error receiver dropped");
                }
            }
        }
    }

    info!(loop_name = name, passes, "{} stopped", name);
}

/// Constructors for the supervised loops.
///
/// Constructors validate their arguments synchronously and return a
/// `Startup` error instead of a loop that would fail later.
pub trait LoopFactory: Send + Sync {
    /// Primary loop applying Ingress resources to configuration storage.
    fn ingress_controller(
        &self,
        client: &Client,
        storage: Arc<dyn ConfigStorage>,
        scope: &IngressScope,
    ) -> Result<Arc<dyn Reconcile>, ControllerError>;

    /// Loop mirroring `service`'s load balancer endpoints onto Ingress status.
    fn status_syncer(
        &self,
        client: &Client,
        scope: &IngressScope,
        service: &ServiceRef,
    ) -> Result<Arc<dyn Reconcile>, ControllerError>;
}

/// Factory for the Kubernetes-backed loops.
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeLoopFactory;

impl LoopFactory for KubeLoopFactory {
    fn ingress_controller(
        &self,
        client: &Client,
        storage: Arc<dyn ConfigStorage>,
        scope: &IngressScope,
    ) -> Result<Arc<dyn Reconcile>, ControllerError> {
        Ok(Arc::new(IngressController::new(client, storage, scope)))
    }

    fn status_syncer(
        &self,
        client: &Client,
        scope: &IngressScope,
        service: &ServiceRef,
    ) -> Result<Arc<dyn Reconcile>, ControllerError> {
        Ok(Arc::new(StatusSyncer::new(client, scope, service.clone())))
    }
}

fn with_stage(stage: &str, error: ControllerError) -> ControllerError {
    match error {
        ControllerError::Startup(msg) => ControllerError::Startup(format!("{stage}: {msg}")),
        other => other,
    }
}

/// Start the primary loop and, when a service is configured, the status sync
/// loop.
///
/// Both loops are constructed before either is spawned, so a construction
/// failure leaves nothing running.
pub fn start_loops(
    factory: &dyn LoopFactory,
    client: &Client,
    storage: Arc<dyn ConfigStorage>,
    options: &BootstrapOptions,
    stop: &StopSignal,
) -> Result<Vec<LoopHandle>, ControllerError> {
    let scope = IngressScope::resolve(options.global_ingress, options.watch_namespace.as_deref())
        .map_err(|e| with_stage("failed to create ingress controller", e))?;

    let ingress = factory
        .ingress_controller(client, storage, &scope)
        .map_err(|e| with_stage("failed to create ingress controller", e))?;

    let status = match options.service_name.as_deref() {
        Some(raw) => {
            let default_namespace = scope.namespace().unwrap_or("default");
            let service = ServiceRef::parse(raw, default_namespace)
                .map_err(|e| with_stage("failed to start load balancer status syncer", e))?;
            let syncer = factory
                .status_syncer(client, &scope, &service)
                .map_err(|e| with_stage("failed to start load balancer status syncer", e))?;
            info!("Ingress status will track service {}", service);
            Some(syncer)
        }
        None => None,
    };

    info!("Reconciling ingresses in {}", scope);
    let mut loops = vec![spawn_loop(INGRESS_LOOP, ingress, options.sync_period, stop.clone())];
    if let Some(syncer) = status {
        loops.push(spawn_loop(STATUS_LOOP, syncer, options.sync_period, stop.clone()));
    }
    Ok(loops)
}
