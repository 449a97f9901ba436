use std::sync::Arc;

use chrono::{DateTime, Utc};
use k8s_openapi::NamespaceResourceScope;
use kube::api::Api;
use kube::client::Client;
use kube::Resource;
use serde::Serialize;
use tokio::{sync::RwLock, time::Duration};

use crate::client::KubeClient;
use crate::util::metrics;

/// Resync period when nothing changed.
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Requeue after a pass that wrote changes to the cluster.
pub const CHANGED_REQUEUE: Duration = Duration::from_secs(5);
/// Requeue after a retryable failure.
pub const RETRY_REQUEUE: Duration = Duration::from_secs(10);
/// Requeue used by the error policy for fatal failures.
pub const ERROR_REQUEUE: Duration = Duration::from_secs(60);

/// State shared between the controllers and the web server
#[derive(Clone)]
pub struct State {
    /// Diagnostics populated by the reconcilers
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
    metrics: metrics::Metrics,
}

impl Default for State {
    fn default() -> Self {
        let registry = prometheus::Registry::default();
        let metrics = metrics::Metrics::default().register(&registry).unwrap();
        State {
            diagnostics: Arc::default(),
            registry,
            metrics,
        }
    }
}

/// State wrapper around the controller outputs for the web server
impl State {
    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub fn to_context(&self, client: Client, namespace: Option<String>) -> Arc<Context> {
        Arc::new(Context {
            client: KubeClient::new(client),
            http: reqwest::Client::new(),
            namespace,
            metrics: self.metrics.clone(),
            diagnostics: self.diagnostics.clone(),
        })
    }
}

// Context for our reconcilers
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: KubeClient,
    /// HTTP client used to reach the deployed applications
    pub http: reqwest::Client,
    /// Namespace being watched, all namespaces when unset
    pub namespace: Option<String>,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: metrics::Metrics,
}

impl Context {
    /// Api over the watched namespace, or over the whole cluster.
    pub fn watched_api<K>(&self) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
    {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.inner().clone(), ns),
            None => Api::all(self.client.inner().clone()),
        }
    }
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    pub reporter: String,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: crate::util::labels::OPERATOR_NAME.to_string(),
        }
    }
}
