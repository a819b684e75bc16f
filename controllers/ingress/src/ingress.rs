//! Primary loop: Ingress resources to gloo configuration.
//!
//! Every pass lists the Ingresses in scope, translates them into the
//! `Upstream`s and `VirtualService`s they imply, and brings storage in line:
//! objects whose spec differs are applied, managed objects no longer
//! produced are deleted. Objects without the managed-by label are never
//! deleted.

use crate::error::ControllerError;
use crate::scope::IngressScope;
use crate::supervisor::Reconcile;
use config_storage::{is_managed, ConfigKind, ConfigObject, ConfigSnapshot, ConfigStorage};
use crds::{
    PathMatchType, Route, Upstream, UpstreamSpec, VirtualService, VirtualServiceSpec, MANAGED_BY_LABEL,
    MANAGED_BY_VALUE,
};
use futures::future::ready;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use k8s_openapi::api::networking::v1::{Ingress, IngressBackend};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use kube_runtime::watcher;
use kube_runtime::WatchStreamExt;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Domain and object name used for rules without a host
const WILDCARD_DOMAIN: &str = "*";
const WILDCARD_NAME: &str = "wildcard";

/// Reconciles Ingress resources into configuration storage.
pub struct IngressController {
    ingresses: Api<Ingress>,
    storage: Arc<dyn ConfigStorage>,
    scope: IngressScope,
}

impl IngressController {
    /// Create a controller for the Ingresses in `scope`.
    pub fn new(client: &Client, storage: Arc<dyn ConfigStorage>, scope: &IngressScope) -> Self {
        Self {
            ingresses: scope.api(client),
            storage,
            scope: scope.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Reconcile for IngressController {
    async fn reconcile(&self) -> Result<(), ControllerError> {
        let ingresses = self.ingresses.list(&ListParams::default()).await?;
        let desired = translate(&ingresses.items);
        let current = self.storage.snapshot().await?;
        let plan = plan_changes(&current, &desired);

        if plan.is_empty() {
            debug!(
                ingresses = ingresses.items.len(),
                objects = desired.len(),
                "Configuration up to date for {}",
                self.scope
            );
            return Ok(());
        }

        info!(
            apply = plan.apply.len(),
            delete = plan.delete.len(),
            backend = self.storage.backend(),
            "Syncing configuration for {} ingresses in {}",
            ingresses.items.len(),
            self.scope
        );
        apply_plan(self.storage.as_ref(), plan).await
    }

    /// Successful storage changes and Ingress watch events.
    ///
    /// Errors never wake the loop; a failing control plane or store is
    /// retried on the next interval tick.
    fn triggers(&self) -> Option<BoxStream<'static, ()>> {
        // The first snapshot is already covered by the loop's immediate first pass.
        let storage_changes = self.storage.watch().skip(1).filter_map(|snapshot| {
            if let Err(e) = &snapshot {
                debug!("Storage watch error: {}", e);
            }
            ready(snapshot.ok().map(|_| ()))
        });
        let ingress_events = watcher(self.ingresses.clone(), watcher::Config::default())
            .default_backoff()
            .filter_map(|event| {
                if let Err(e) = &event {
                    debug!("Ingress watch error: {}", e);
                }
                ready(event.ok().map(|_| ()))
            });
        Some(stream::select(storage_changes.boxed(), ingress_events.boxed()).boxed())
    }
}

/// Writes needed to turn one snapshot into another.
#[derive(Debug, Default, PartialEq)]
pub struct Plan {
    /// Objects to create or replace, upstreams first
    pub apply: Vec<ConfigObject>,
    /// Managed objects to remove, virtual services first
    pub delete: Vec<(ConfigKind, String)>,
}

impl Plan {
    /// True when storage already matches
    pub fn is_empty(&self) -> bool {
        self.apply.is_empty() && self.delete.is_empty()
    }
}

/// Compute the writes that make `current` match `desired`.
pub fn plan_changes(current: &ConfigSnapshot, desired: &ConfigSnapshot) -> Plan {
    let mut plan = Plan::default();

    for (name, upstream) in &desired.upstreams {
        let up_to_date = current
            .upstreams
            .get(name)
            .is_some_and(|existing| existing.spec == upstream.spec && is_managed(&existing.metadata));
        if !up_to_date {
            plan.apply.push(upstream.clone().into());
        }
    }
    for (name, virtual_service) in &desired.virtual_services {
        let up_to_date = current.virtual_services.get(name).is_some_and(|existing| {
            existing.spec == virtual_service.spec && is_managed(&existing.metadata)
        });
        if !up_to_date {
            plan.apply.push(virtual_service.clone().into());
        }
    }

    // Routes reference upstreams, so virtual services go first.
    for kind in [ConfigKind::VirtualService, ConfigKind::Upstream] {
        for name in current.managed_names(kind) {
            let wanted = match kind {
                ConfigKind::Upstream => desired.upstreams.contains_key(&name),
                ConfigKind::VirtualService => desired.virtual_services.contains_key(&name),
            };
            if !wanted {
                plan.delete.push((kind, name));
            }
        }
    }

    plan
}

pub(crate) async fn apply_plan(storage: &dyn ConfigStorage, plan: Plan) -> Result<(), ControllerError> {
    let total = plan.apply.len() + plan.delete.len();
    let mut failures = Vec::new();

    for object in plan.apply {
        let (kind, name) = (object.kind(), object.name());
        if let Err(e) = storage.apply(object).await {
            warn!("Failed to apply {} {}: {}", kind, name, e);
            failures.push(format!("apply {kind} {name}: {e}"));
        }
    }
    for (kind, name) in plan.delete {
        match storage.delete(kind, &name).await {
            Ok(()) => info!("Deleted stale {} {}", kind, name),
            Err(e) => {
                warn!("Failed to delete {} {}: {}", kind, name, e);
                failures.push(format!("delete {kind} {name}: {e}"));
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ControllerError::Operational(format!(
            "{} of {} configuration changes failed: {}",
            failures.len(),
            total,
            failures.join("; ")
        )))
    }
}

/// Translate Ingresses into the configuration objects they imply.
///
/// Ingresses are processed in namespace/name order. When two rules claim the
/// same host, path and match type, the first one wins.
pub fn translate(ingresses: &[Ingress]) -> ConfigSnapshot {
    let mut ordered: Vec<&Ingress> = ingresses.iter().collect();
    ordered.sort_by_key(|ing| (ing.namespace().unwrap_or_default(), ing.name_any()));

    let mut snapshot = ConfigSnapshot::default();
    let mut hosts: BTreeMap<String, Vec<Route>> = BTreeMap::new();

    for ingress in ordered {
        let namespace = ingress.namespace().unwrap_or_else(|| "default".to_string());
        let Some(spec) = &ingress.spec else { continue };

        for rule in spec.rules.iter().flatten() {
            let host = rule
                .host
                .as_deref()
                .filter(|h| !h.is_empty())
                .unwrap_or(WILDCARD_DOMAIN);
            for path in rule.http.iter().flat_map(|http| &http.paths) {
                let Some(upstream) = backend_upstream(&namespace, &path.backend) else {
                    debug!(
                        "Skipping non-service backend in ingress {}/{}",
                        namespace,
                        ingress.name_any()
                    );
                    continue;
                };
                let route = Route {
                    path: path.path.clone().filter(|p| !p.is_empty()).unwrap_or_else(|| "/".to_string()),
                    match_type: match_type(&path.path_type),
                    upstream: upstream.name_any(),
                };
                hosts.entry(host.to_string()).or_default().push(route);
                snapshot.insert(upstream.into());
            }
        }

        if let Some(upstream) = spec
            .default_backend
            .as_ref()
            .and_then(|backend| backend_upstream(&namespace, backend))
        {
            hosts.entry(WILDCARD_DOMAIN.to_string()).or_default().push(Route {
                path: "/".to_string(),
                match_type: PathMatchType::Prefix,
                upstream: upstream.name_any(),
            });
            snapshot.insert(upstream.into());
        }
    }

    for (host, routes) in hosts {
        let virtual_service = VirtualService {
            metadata: managed_metadata(virtual_service_name(&host)),
            spec: VirtualServiceSpec {
                domains: vec![host],
                routes: order_routes(routes),
            },
        };
        snapshot.insert(virtual_service.into());
    }

    snapshot
}

/// Drop duplicate matches and order the most specific routes first.
fn order_routes(routes: Vec<Route>) -> Vec<Route> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Route> = routes
        .into_iter()
        .filter(|route| seen.insert((route.path.clone(), route.match_type)))
        .collect();
    unique.sort_by(|a, b| {
        b.path
            .len()
            .cmp(&a.path.len())
            .then_with(|| exact_first(a.match_type).cmp(&exact_first(b.match_type)))
            .then_with(|| a.path.cmp(&b.path))
    });
    unique
}

fn exact_first(match_type: PathMatchType) -> u8 {
    match match_type {
        PathMatchType::Exact => 0,
        PathMatchType::Prefix => 1,
    }
}

fn match_type(path_type: &str) -> PathMatchType {
    if path_type == "Exact" {
        PathMatchType::Exact
    } else {
        PathMatchType::Prefix
    }
}

/// Upstream for a service backend; `None` for resource backends and
/// services without a port.
fn backend_upstream(namespace: &str, backend: &IngressBackend) -> Option<Upstream> {
    let service = backend.service.as_ref()?;
    let port = service.port.as_ref()?;
    let port = match (port.number, port.name.as_deref()) {
        (Some(number), _) => number.to_string(),
        (None, Some(name)) if !name.is_empty() => name.to_string(),
        _ => return None,
    };

    let name = upstream_name(namespace, &service.name, &port);
    Some(Upstream {
        metadata: managed_metadata(name),
        spec: UpstreamSpec::kubernetes(&service.name, namespace, port),
    })
}

/// `<namespace>-<service>-<port>`
pub fn upstream_name(namespace: &str, service: &str, port: &str) -> String {
    format!("{namespace}-{service}-{port}")
}

/// Object name for a host's virtual service.
pub fn virtual_service_name(host: &str) -> String {
    if host == WILDCARD_DOMAIN {
        WILDCARD_NAME.to_string()
    } else {
        host.to_ascii_lowercase().replace('*', WILDCARD_NAME)
    }
}

fn managed_metadata(name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        labels: Some(BTreeMap::from([(
            MANAGED_BY_LABEL.to_string(),
            MANAGED_BY_VALUE.to_string(),
        )])),
        ..Default::default()
    }
}
