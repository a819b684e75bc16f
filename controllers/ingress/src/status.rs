//! Status-sync loop: mirrors the proxy service's load balancer endpoints onto
//! every Ingress in scope.

use crate::error::ControllerError;
use crate::scope::{IngressScope, ServiceRef};
use crate::supervisor::Reconcile;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::{Ingress, IngressLoadBalancerIngress};
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info, warn};

/// Keeps Ingress `status.loadBalancer.ingress` in sync with a Service.
pub struct StatusSyncer {
    client: Client,
    services: Api<Service>,
    ingresses: Api<Ingress>,
    service: ServiceRef,
}

impl StatusSyncer {
    /// Create a syncer publishing `service`'s endpoints to Ingresses in `scope`.
    pub fn new(client: &Client, scope: &IngressScope, service: ServiceRef) -> Self {
        Self {
            client: client.clone(),
            services: Api::namespaced(client.clone(), &service.namespace),
            ingresses: scope.api(client),
            service,
        }
    }

    async fn publish(&self, ingress: &Ingress, endpoints: &[IngressLoadBalancerIngress]) -> Result<(), kube::Error> {
        let namespace = ingress.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), &namespace);
        let patch = serde_json::json!({
            "status": {
                "loadBalancer": {
                    "ingress": endpoints
                }
            }
        });
        api.patch_status(&ingress.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Reconcile for StatusSyncer {
    async fn reconcile(&self) -> Result<(), ControllerError> {
        let service = self.services.get_opt(&self.service.name).await?.ok_or_else(|| {
            ControllerError::Operational(format!("service {} not found", self.service))
        })?;
        let endpoints = load_balancer_endpoints(&service);

        let ingresses = self.ingresses.list(&ListParams::default()).await?;
        let mut failures = Vec::new();
        for ingress in &ingresses.items {
            if same_endpoints(&ingress_endpoints(ingress), &endpoints) {
                continue;
            }
            let id = format!(
                "{}/{}",
                ingress.namespace().unwrap_or_default(),
                ingress.name_any()
            );
            match self.publish(ingress, &endpoints).await {
                Ok(()) => info!("Updated load balancer status of ingress {} from {}", id, self.service),
                Err(e) => {
                    warn!("Failed to update status of ingress {}: {}", id, e);
                    failures.push(format!("{id}: {e}"));
                }
            }
        }

        if !failures.is_empty() {
            return Err(ControllerError::Operational(format!(
                "failed to update status of {} ingresses: {}",
                failures.len(),
                failures.join("; ")
            )));
        }
        debug!(
            ingresses = ingresses.items.len(),
            endpoints = endpoints.len(),
            "Ingress status in sync with {}",
            self.service
        );
        Ok(())
    }
}

/// Load balancer ingress points of `service`, in a stable order.
pub fn load_balancer_endpoints(service: &Service) -> Vec<IngressLoadBalancerIngress> {
    let mut endpoints: Vec<IngressLoadBalancerIngress> = service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .into_iter()
        .flatten()
        .filter(|point| point.ip.is_some() || point.hostname.is_some())
        .map(|point| IngressLoadBalancerIngress {
            ip: point.ip.clone(),
            hostname: point.hostname.clone(),
            ports: None,
        })
        .collect();
    endpoints.sort_by_key(endpoint_key);
    endpoints.dedup_by_key(|endpoint| endpoint_key(endpoint));
    endpoints
}

/// Load balancer points currently published on `ingress`.
pub fn ingress_endpoints(ingress: &Ingress) -> Vec<IngressLoadBalancerIngress> {
    ingress
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.clone())
        .unwrap_or_default()
}

/// Compare by address only, ignoring order and port status.
pub fn same_endpoints(current: &[IngressLoadBalancerIngress], desired: &[IngressLoadBalancerIngress]) -> bool {
    let mut current: Vec<_> = current.iter().map(endpoint_key).collect();
    let mut desired: Vec<_> = desired.iter().map(endpoint_key).collect();
    current.sort();
    current.dedup();
    desired.sort();
    desired.dedup();
    current == desired
}

fn endpoint_key(endpoint: &IngressLoadBalancerIngress) -> (Option<String>, Option<String>) {
    (endpoint.ip.clone(), endpoint.hostname.clone())
}
