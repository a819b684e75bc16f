//! Test utilities for loop and coordinator tests
//!
//! Provides an offline control-plane client, a scriptable [`Reconcile`]
//! implementation and a [`LoopFactory`] that hands those out.

use crate::client::{build_client, install_crypto_provider};
use crate::error::ControllerError;
use crate::scope::{IngressScope, ServiceRef};
use crate::supervisor::{LoopFactory, Reconcile};
use config_storage::ConfigStorage;
use futures::stream::BoxStream;
use kube::Client;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Client pointed at an address nothing listens on; building it sends no
/// request.
pub async fn test_client() -> Client {
    install_crypto_provider();
    build_client(Some("http://127.0.0.1:6443"), None)
        .await
        .expect("offline client should build")
}

/// Reconciler that counts passes and can be told to fail or to be slow.
#[derive(Default)]
pub struct CountingReconcile {
    started: AtomicUsize,
    completed: AtomicUsize,
    failing: AtomicBool,
    pass_duration: Option<Duration>,
    triggers: Mutex<Option<BoxStream<'static, ()>>>,
}

impl CountingReconcile {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let reconciler = Self::default();
        reconciler.failing.store(true, Ordering::SeqCst);
        Arc::new(reconciler)
    }

    pub fn slow(pass_duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            pass_duration: Some(pass_duration),
            ..Self::default()
        })
    }

    pub fn with_triggers(triggers: BoxStream<'static, ()>) -> Arc<Self> {
        Arc::new(Self {
            triggers: Mutex::new(Some(triggers)),
            ..Self::default()
        })
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Reconcile for CountingReconcile {
    async fn reconcile(&self) -> Result<(), ControllerError> {
        let pass = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(duration) = self.pass_duration {
            tokio::time::sleep(duration).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ControllerError::Operational(format!("pass {pass} failed")));
        }
        Ok(())
    }

    fn triggers(&self) -> Option<BoxStream<'static, ()>> {
        self.triggers.lock().expect("triggers lock").take()
    }
}

/// Loop factory handing out [`CountingReconcile`]s and counting calls.
#[derive(Default)]
pub struct FakeLoopFactory {
    pub ingress: Arc<CountingReconcile>,
    pub status: Arc<CountingReconcile>,
    pub ingress_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub services: Mutex<Vec<ServiceRef>>,
}

impl FakeLoopFactory {
    pub fn calls(&self) -> (usize, usize) {
        (
            self.ingress_calls.load(Ordering::SeqCst),
            self.status_calls.load(Ordering::SeqCst),
        )
    }
}

impl LoopFactory for FakeLoopFactory {
    fn ingress_controller(
        &self,
        _client: &Client,
        _storage: Arc<dyn ConfigStorage>,
        _scope: &IngressScope,
    ) -> Result<Arc<dyn Reconcile>, ControllerError> {
        self.ingress_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ingress.clone())
    }

    fn status_syncer(
        &self,
        _client: &Client,
        _scope: &IngressScope,
        service: &ServiceRef,
    ) -> Result<Arc<dyn Reconcile>, ControllerError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.services.lock().expect("services lock").push(service.clone());
        Ok(self.status.clone())
    }
}
