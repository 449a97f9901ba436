//! Orchestration of one reconcile pass over a Kogito service.
//!
//! Every step derives the objects it owns, fetches what is deployed and
//! hands both to the delta processor. Steps run in a fixed order and the
//! first failure ends the pass.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use tracing::*;

use super::infra::{BoundInfra, InfraBindings};
use super::truststore::TrustStore;
use super::{config, deployment, image, infra, messaging, monitoring, network, protobuf, truststore};
use crate::api::v1beta1::KogitoService;
use crate::client::ResourceClient;
use crate::framework::{ComparatorRegistry, DeltaProcessor, ResourceSet};
use crate::util::errors::{Error, Result, StdError};
use crate::util::labels::service_labels;
use crate::util::service_status::{ObservedState, ServiceStatusManager};

pub fn service_namespace<S: KogitoService>(service: &S) -> Result<String> {
    service
        .namespace()
        .ok_or_else(|| Error::StdError(StdError::MetadataMissing(format!("{} has no namespace", service.name_any()))))
}

/// Metadata of an object owned (as controller) by `service`.
pub fn child_meta<S: KogitoService>(service: &S, name: impl Into<String>) -> Result<ObjectMeta> {
    let owner = service
        .controller_owner_ref(&())
        .ok_or_else(|| StdError::MetadataMissing(format!("{} has no uid", service.name_any())))?;
    Ok(ObjectMeta {
        name: Some(name.into()),
        namespace: Some(service_namespace(service)?),
        labels: Some(service_labels(&service.name_any())),
        owner_references: Some(vec![owner]),
        ..Default::default()
    })
}

/// What the steps of one pass hand to each other.
pub struct Pass {
    pub registry: ComparatorRegistry,
    pub infras: Vec<BoundInfra>,
    pub bindings: InfraBindings,
    /// Rendered `application.properties` of the operator ConfigMap
    pub app_properties: String,
    /// Rendered content of the user ConfigMap
    pub user_config: Option<String>,
    pub trust_store: Option<TrustStore>,
    /// Image the workload runs
    pub image: Option<String>,
    /// Whether any write was issued
    pub changed: bool,
    pub observed: ObservedState,
}

impl Pass {
    pub fn new(registry: ComparatorRegistry) -> Self {
        Pass {
            registry,
            infras: Vec::new(),
            bindings: InfraBindings::default(),
            app_properties: String::new(),
            user_config: None,
            trust_store: None,
            image: None,
            changed: false,
            observed: ObservedState::default(),
        }
    }

    /// Applies the delta between the two sets on behalf of `service`.
    pub async fn apply<C: ResourceClient, S: KogitoService>(
        &mut self,
        client: &C,
        service: &S,
        requested: ResourceSet,
        deployed: ResourceSet,
    ) -> Result<()> {
        let owner_uid = service
            .uid()
            .ok_or_else(|| StdError::MetadataMissing(format!("{} has no uid", service.name_any())))?;
        let changed = DeltaProcessor::new(client, owner_uid)
            .process_delta(&self.registry, requested, deployed)
            .await?;
        self.changed |= changed;
        Ok(())
    }
}

/// Deploys one Kogito service and reports the outcome in its status.
pub struct ServiceDeployer<'a, C, S> {
    client: &'a C,
    http: &'a reqwest::Client,
    service: S,
}

impl<'a, C: ResourceClient, S: KogitoService> ServiceDeployer<'a, C, S> {
    /// Replicas default to 1 for the duration of the pass only.
    pub fn new(client: &'a C, http: &'a reqwest::Client, service: &S) -> Self {
        let mut service = service.clone();
        service.service_spec_mut().replicas.get_or_insert(1);
        ServiceDeployer { client, http, service }
    }

    pub async fn deploy(&self, pass: &mut Pass) -> Result<()> {
        let client = self.client;
        let service = &self.service;

        pass.infras = infra::fetch_bound(client, service).await?;
        config::reconcile_app_props(client, service, pass).await?;
        config::reconcile_user_config(client, service, pass).await?;
        truststore::reconcile(client, service, pass).await?;
        infra::reconcile(client, service, pass).await?;
        image::reconcile(client, service, pass).await?;
        deployment::reconcile(client, service, pass).await?;
        network::reconcile(client, service, pass).await?;
        monitoring::reconcile(client, service, pass).await?;
        messaging::reconcile(client, service, pass).await?;
        protobuf::reconcile(client, self.http, service, pass).await;
        Ok(())
    }

    /// Runs a pass and writes the resulting status, whatever the outcome.
    ///
    /// Returns whether the pass wrote anything to the cluster.
    pub async fn run_with_status(&self, registry: ComparatorRegistry) -> Result<bool> {
        let mut pass = Pass::new(registry);
        let result = self.deploy(&mut pass).await;
        if let Err(e) = &result {
            warn!("Deploying {} failed: {}", self.service.name_any(), e);
        }

        if pass.observed.deployment.is_none() {
            pass.observed.deployment = self.current_deployment().await;
        }
        ServiceStatusManager::new(self.client)
            .update(&self.service, result.as_ref().err(), &pass.observed)
            .await;

        result.map(|_| pass.changed)
    }

    async fn current_deployment(&self) -> Option<Deployment> {
        let namespace = self.service.namespace()?;
        match self.client.fetch::<Deployment>(&namespace, &self.service.name_any()).await {
            Ok(deployment) => deployment,
            Err(e) => {
                debug!("Could not read deployment of {}: {}", self.service.name_any(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1beta1::{KogitoRuntime, KogitoRuntimeSpec, KogitoServiceSpec};
    use crate::client::fake::FakeClient;
    use crate::controllers::comparators;
    use crate::util::service_status::{DEPLOYED_CONDITION, FAILED_CONDITION, PROVISIONING_CONDITION};
    use k8s_openapi::api::core::v1::{ConfigMap, Service};

    fn runtime() -> KogitoRuntime {
        let mut runtime = KogitoRuntime::new(
            "example",
            KogitoRuntimeSpec {
                service: KogitoServiceSpec {
                    image: Some("quay.io/example/app:1.0".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        runtime.metadata.namespace = Some("ns".to_string());
        runtime
    }

    fn conditions(client: &FakeClient) -> Vec<(String, String)> {
        let stored: KogitoRuntime = client.get("ns", "example").unwrap();
        stored
            .status
            .unwrap()
            .conditions
            .into_iter()
            .map(|c| (c.type_, c.status))
            .collect()
    }

    #[test]
    fn test_child_meta_is_controlled_by_service() {
        let client = FakeClient::new();
        let service = client.seed(runtime());
        let meta = child_meta(&service, "example-app-props").unwrap();
        let owners = meta.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].uid, "example-uid");
        assert_eq!(owners[0].controller, Some(true));
        assert_eq!(meta.labels.unwrap()["app"], "example");

        assert!(child_meta(&runtime(), "x").is_err());
    }

    #[tokio::test]
    async fn test_first_pass_creates_children() {
        let client = FakeClient::new();
        let service = client.seed(runtime());
        let http = reqwest::Client::new();

        let changed = ServiceDeployer::new(&client, &http, &service)
            .run_with_status(comparators::registry())
            .await
            .unwrap();
        assert!(changed);
        assert_eq!(client.count("create", "ConfigMap"), 1);
        assert_eq!(client.count("create", "Deployment"), 1);
        assert_eq!(client.count("create", "Service"), 1);
        assert!(client.get::<Service>("ns", "example").is_some());
        assert!(client.get::<ConfigMap>("ns", "example-app-props").is_some());

        let deployment: Deployment = client.get("ns", "example").unwrap();
        assert_eq!(deployment.spec.unwrap().replicas, Some(1));
        let stored: KogitoRuntime = client.get("ns", "example").unwrap();
        assert_eq!(stored.spec.service.replicas, None);
        assert_eq!(
            conditions(&client),
            vec![
                (FAILED_CONDITION.to_string(), "False".to_string()),
                (PROVISIONING_CONDITION.to_string(), "True".to_string()),
                (DEPLOYED_CONDITION.to_string(), "False".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_pass_writes_nothing() {
        let client = FakeClient::new();
        let service = client.seed(runtime());
        let http = reqwest::Client::new();
        ServiceDeployer::new(&client, &http, &service)
            .run_with_status(comparators::registry())
            .await
            .unwrap();

        client.reset_calls();
        let stored: KogitoRuntime = client.get("ns", "example").unwrap();
        let changed = ServiceDeployer::new(&client, &http, &stored)
            .run_with_status(comparators::registry())
            .await
            .unwrap();
        assert!(!changed);
        assert!(client.writes().is_empty());
        assert_eq!(client.count("update_status", "KogitoRuntime"), 0);
    }

    #[tokio::test]
    async fn test_failed_step_is_reported_in_status() {
        let client = FakeClient::new();
        let mut service = runtime();
        service.spec.service.properties_config_map = Some("missing".to_string());
        let service = client.seed(service);
        let http = reqwest::Client::new();

        let err = ServiceDeployer::new(&client, &http, &service)
            .run_with_status(comparators::registry())
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(client.count("create", "Deployment"), 0);

        let stored: KogitoRuntime = client.get("ns", "example").unwrap();
        let status = stored.status.unwrap();
        let failed = status.conditions.iter().find(|c| c.type_ == FAILED_CONDITION).unwrap();
        assert_eq!(failed.status, "True");
        assert_eq!(failed.reason, "ResourceNotFound");
    }
}
