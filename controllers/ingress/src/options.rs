//! Command-line flags and the immutable bootstrap record built from them.
//!
//! Every flag can also be set from the environment so the controller can be
//! configured entirely from a pod spec.

use crate::error::ControllerError;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

/// Default namespace for cluster-resource storage objects
pub const DEFAULT_STORAGE_NAMESPACE: &str = "gloo-system";

/// Enables gloo to function as a Kubernetes ingress controller
#[derive(Parser, Debug, Clone)]
#[command(name = "ingress-controller", version, about, long_about = None)]
pub struct Cli {
    /// Storage backend for gloo config objects: file | cluster-resource
    #[arg(long = "storage.type", env = "STORAGE_TYPE", default_value = "file")]
    pub storage_type: String,

    /// Root directory to use for storing gloo config files
    #[arg(long = "file.config.dir", env = "FILE_CONFIG_DIR", default_value = "_gloo_config")]
    pub file_config_dir: String,

    /// URL of the Kubernetes API server; not needed if running in-cluster
    #[arg(long = "master", env = "KUBE_MASTER_URL", default_value = "")]
    pub master_url: String,

    /// Path to a kubeconfig file; not needed if running in-cluster
    #[arg(long = "kubeconfig", env = "KUBECONFIG", default_value = "")]
    pub kubeconfig: String,

    /// Namespace to read/write gloo storage objects
    #[arg(long = "kube.namespace", env = "STORAGE_NAMESPACE", default_value = DEFAULT_STORAGE_NAMESPACE)]
    pub storage_namespace: String,

    /// Sync period for watching ingress rules, in seconds
    #[arg(long = "sync-period-secs", env = "SYNC_PERIOD_SECS", default_value_t = 1800)]
    pub sync_period_secs: u64,

    /// Use gloo as the cluster-wide Kubernetes ingress
    #[arg(long = "global", env = "GLOBAL_INGRESS", default_value_t = true, action = ArgAction::Set)]
    pub global: bool,

    /// Namespace to watch for Ingress resources when --global=false
    #[arg(long = "watch-namespace", env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// `[namespace/]name` of the proxy service. When set, ingress objects are
    /// updated with the service's load balancer endpoints
    #[arg(long = "service", env = "INGRESS_SERVICE", default_value = "")]
    pub service: String,

    /// Upper bound, in seconds, on waiting for loops to stop after a shutdown
    /// signal; unbounded when unset
    #[arg(long = "drain-timeout-secs", env = "DRAIN_TIMEOUT_SECS")]
    pub drain_timeout_secs: Option<u64>,
}

/// File backend options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOptions {
    /// Root directory; empty means unset
    pub config_dir: PathBuf,
}

/// Control-plane connection options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeOptions {
    /// Explicit API server URL
    pub master_url: Option<String>,
    /// Explicit kubeconfig path
    pub kubeconfig: Option<PathBuf>,
    /// Namespace holding cluster-resource storage objects
    pub namespace: String,
}

/// Resolved configuration, built once and passed by reference to every
/// constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOptions {
    /// Declared storage backend kind, validated by the storage selector
    pub storage_type: String,
    /// File backend options
    pub file: FileOptions,
    /// Control-plane connection options
    pub kube: KubeOptions,
    /// Reconciliation interval, always non-zero
    pub sync_period: Duration,
    /// Reconcile ingresses cluster-wide
    pub global_ingress: bool,
    /// Namespace reconciled when not global
    pub watch_namespace: Option<String>,
    /// Proxy service reference for status sync
    pub service_name: Option<String>,
    /// Optional bound on shutdown draining
    pub drain_timeout: Option<Duration>,
}

impl BootstrapOptions {
    /// Options with the flag defaults and the given interval, for callers that
    /// do not go through the command line.
    pub fn new(
        storage_type: impl Into<String>,
        sync_period: Duration,
    ) -> Result<Self, ControllerError> {
        if sync_period.is_zero() {
            return Err(ControllerError::Configuration(
                "sync period must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            storage_type: storage_type.into(),
            file: FileOptions {
                config_dir: PathBuf::from("_gloo_config"),
            },
            kube: KubeOptions {
                master_url: None,
                kubeconfig: None,
                namespace: DEFAULT_STORAGE_NAMESPACE.to_string(),
            },
            sync_period,
            global_ingress: true,
            watch_namespace: None,
            service_name: None,
            drain_timeout: None,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl TryFrom<Cli> for BootstrapOptions {
    type Error = ControllerError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let mut options = BootstrapOptions::new(
            cli.storage_type.trim(),
            Duration::from_secs(cli.sync_period_secs),
        )?;
        options.file.config_dir = PathBuf::from(cli.file_config_dir.trim());
        options.kube = KubeOptions {
            master_url: non_empty(cli.master_url),
            kubeconfig: non_empty(cli.kubeconfig).map(PathBuf::from),
            namespace: cli.storage_namespace,
        };
        options.global_ingress = cli.global;
        options.watch_namespace = cli.watch_namespace.and_then(non_empty);
        options.service_name = non_empty(cli.service);
        options.drain_timeout = cli.drain_timeout_secs.map(Duration::from_secs);
        Ok(options)
    }
}
