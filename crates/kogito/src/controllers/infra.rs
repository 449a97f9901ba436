use std::collections::BTreeMap;

use kube::ResourceExt;
use tracing::*;

use super::deployer::{service_namespace, Pass};
use crate::api::v1beta1::{EnvVariable, KogitoInfra, KogitoService};
use crate::client::ResourceClient;
use crate::util::errors::{Error, Result};
use crate::util::status::ConditionSet;

pub const READY_CONDITION: &str = "Ready";

pub const KAFKA_KIND: &str = "Kafka";
pub const INFINISPAN_KIND: &str = "Infinispan";
pub const MONGODB_KIND: &str = "MongoDB";
pub const BROKER_KIND: &str = "Broker";

/// A `KogitoInfra` named by a service, as found on the cluster.
#[derive(Debug, Clone)]
pub struct BoundInfra {
    pub name: String,
    pub infra: Option<KogitoInfra>,
}

impl BoundInfra {
    pub fn ready(&self) -> Option<&KogitoInfra> {
        self.infra.as_ref().filter(|infra| is_ready(infra))
    }
}

/// What the bound infras hand to the workload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfraBindings {
    pub env: Vec<EnvVariable>,
    pub config_map_env_from: Vec<String>,
    pub secret_env_from: Vec<String>,
    /// Namespace and name of the bound Kafka cluster
    pub kafka: Option<(String, String)>,
    /// Bound to an Infinispan or MongoDB infra
    pub persistence: bool,
}

pub fn is_ready(infra: &KogitoInfra) -> bool {
    infra
        .status
        .as_ref()
        .is_some_and(|s| ConditionSet::new(s.conditions.clone()).is_true(READY_CONDITION))
}

fn resource_kind(infra: &KogitoInfra) -> Option<&str> {
    infra.spec.resource.as_ref().map(|r| r.kind.as_str())
}

/// Fetches every infra named by the service, without validating them.
pub async fn fetch_bound<C: ResourceClient, S: KogitoService>(client: &C, service: &S) -> Result<Vec<BoundInfra>> {
    let namespace = service_namespace(service)?;
    let mut bound = Vec::new();
    for name in &service.service_spec().infra {
        let infra = if name.is_empty() {
            None
        } else {
            client.fetch::<KogitoInfra>(&namespace, name).await?
        };
        bound.push(BoundInfra {
            name: name.clone(),
            infra,
        });
    }
    Ok(bound)
}

/// Application properties of the ready infras, later infras overriding earlier ones.
pub fn app_properties(infras: &[BoundInfra]) -> BTreeMap<String, String> {
    infras
        .iter()
        .filter_map(BoundInfra::ready)
        .filter_map(|infra| infra.status.as_ref())
        .flat_map(|status| status.app_properties.clone())
        .collect()
}

/// Checks every bound infra and merges what they provide.
pub fn bindings(infras: &[BoundInfra], namespace: &str) -> Result<InfraBindings> {
    let mut bindings = InfraBindings::default();
    for bound in infras {
        if bound.name.is_empty() {
            return Err(Error::configuration("infra references must not be empty"));
        }
        let Some(infra) = bound.infra.as_ref() else {
            return Err(Error::not_found("KogitoInfra", namespace, &bound.name));
        };
        if !is_ready(infra) {
            return Err(Error::not_ready(format!("KogitoInfra '{}' is not ready", bound.name)));
        }

        if let Some(status) = infra.status.as_ref() {
            bindings.env.extend(status.env.iter().cloned());
            bindings
                .config_map_env_from
                .extend(status.config_map_env_from_references.iter().cloned());
            bindings
                .secret_env_from
                .extend(status.secret_env_from_references.iter().cloned());
        }
        match (resource_kind(infra), infra.spec.resource.as_ref()) {
            (Some(KAFKA_KIND), Some(resource)) => {
                let kafka_namespace = resource.namespace.clone().unwrap_or_else(|| namespace.to_string());
                bindings.kafka = Some((kafka_namespace, resource.name.clone()));
            }
            (Some(INFINISPAN_KIND | MONGODB_KIND), _) => bindings.persistence = true,
            _ => {}
        }
    }
    Ok(bindings)
}

pub async fn reconcile<C: ResourceClient, S: KogitoService>(_client: &C, service: &S, pass: &mut Pass) -> Result<()> {
    let namespace = service_namespace(service)?;
    pass.bindings = bindings(&pass.infras, &namespace)?;
    debug!(
        "{} bound to {} infra(s), kafka: {:?}",
        service.name_any(),
        pass.infras.len(),
        pass.bindings.kafka
    );
    Ok(())
}
