use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use kube::{
    api::{DynamicObject, ListParams},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    Resource, ResourceExt,
};
use tracing::*;

use super::context::{Context, State, ERROR_REQUEUE, RESYNC_INTERVAL, RETRY_REQUEUE};
use super::infra::{BROKER_KIND, INFINISPAN_KIND, KAFKA_KIND, MONGODB_KIND, READY_CONDITION};
use crate::api::v1beta1::{EnvVariable, InfraResource, KogitoInfra, KogitoInfraStatus};
use crate::client::ResourceClient;
use crate::util::errors::{Error, Result, StdError};
use crate::util::service_status::RECONCILED_REASON;
use crate::util::status::{new_condition, ConditionSet, ConditionStatus};

pub const KAFKA_BOOTSTRAP_ENV: &str = "KAFKA_BOOTSTRAP_SERVERS";
pub const KAFKA_BOOTSTRAP_PROPERTY: &str = "kafka.bootstrap.servers";
pub const INFINISPAN_HOSTS_ENV: &str = "QUARKUS_INFINISPAN_CLIENT_HOSTS";
pub const INFINISPAN_HOSTS_PROPERTY: &str = "quarkus.infinispan-client.hosts";
pub const MONGODB_CONNECTION_ENV: &str = "QUARKUS_MONGODB_CONNECTION_STRING";
pub const MONGODB_CONNECTION_PROPERTY: &str = "quarkus.mongodb.connection-string";
pub const BROKER_SINK_ENV: &str = "K_SINK";

const CONTROLLER: &str = "kogitoinfra";

/// What a ready infra hands to the services bound to it.
#[derive(Debug, Default, PartialEq)]
pub struct InfraOutputs {
    pub env: Vec<EnvVariable>,
    pub app_properties: BTreeMap<String, String>,
}

impl InfraOutputs {
    fn with(mut self, env: &str, property: Option<&str>, value: String) -> Self {
        if let Some(property) = property {
            self.app_properties.insert(property.to_string(), value.clone());
        }
        self.env.push(EnvVariable::new(env, value));
        self
    }
}

/// Whether a third party object reports itself as ready.
///
/// Operators disagree on how they say so: conditions of type `Ready`,
/// `Succeeded` or `WellFormed` (Infinispan), or `phase: Running`.
pub fn backing_ready(obj: &DynamicObject) -> bool {
    let status = &obj.data["status"];
    let condition_ready = status["conditions"].as_array().is_some_and(|conditions| {
        conditions.iter().any(|c| {
            matches!(c["type"].as_str(), Some("Ready" | "Succeeded" | "WellFormed")) && c["status"] == "True"
        })
    });
    condition_ready || status["phase"] == "Running"
}

/// Connection details derived from the backing object of a supported kind.
pub fn outputs(resource: &InfraResource, namespace: &str, obj: &DynamicObject) -> Result<InfraOutputs> {
    let name = &resource.name;
    let status = &obj.data["status"];
    let outputs = InfraOutputs::default();
    Ok(match resource.kind.as_str() {
        KAFKA_KIND => {
            let servers = status["listeners"][0]["bootstrapServers"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{name}-kafka-bootstrap:9092"));
            outputs.with(KAFKA_BOOTSTRAP_ENV, Some(KAFKA_BOOTSTRAP_PROPERTY), servers)
        }
        INFINISPAN_KIND => outputs.with(
            INFINISPAN_HOSTS_ENV,
            Some(INFINISPAN_HOSTS_PROPERTY),
            format!("{name}.{namespace}:11222"),
        ),
        MONGODB_KIND => outputs.with(
            MONGODB_CONNECTION_ENV,
            Some(MONGODB_CONNECTION_PROPERTY),
            format!("mongodb://{name}-svc.{namespace}:27017"),
        ),
        BROKER_KIND => {
            let url = status["address"]["url"]
                .as_str()
                .ok_or_else(|| Error::not_ready(format!("Broker '{name}' has no address yet")))?;
            outputs.with(BROKER_SINK_ENV, None, url.to_string())
        }
        _ => outputs,
    })
}

/// Resolves the backing object of `infra` into what bound services receive.
pub async fn resolve<C: ResourceClient>(client: &C, infra: &KogitoInfra) -> Result<InfraOutputs> {
    let Some(resource) = infra.spec.resource.as_ref() else {
        return Ok(InfraOutputs::default());
    };
    if resource.kind.is_empty() || resource.name.is_empty() {
        return Err(Error::configuration(format!(
            "KogitoInfra '{}' needs both a kind and a name for its resource",
            infra.name_any()
        )));
    }
    let namespace = resource
        .namespace
        .clone()
        .or_else(|| infra.namespace())
        .ok_or_else(|| StdError::MetadataMissing(format!("{} has no namespace", infra.name_any())))?;

    let obj = client
        .fetch_dynamic(&resource.api_version, &resource.kind, &namespace, &resource.name)
        .await?
        .ok_or_else(|| Error::not_found(&resource.kind, &namespace, &resource.name))?;
    if !backing_ready(&obj) {
        return Err(Error::not_ready(format!(
            "{} '{}' is not ready",
            resource.kind, resource.name
        )));
    }
    outputs(resource, &namespace, &obj)
}

/// Status of `infra` after a pass with the given outcome.
pub fn compute_status(infra: &KogitoInfra, outcome: &Result<InfraOutputs>) -> KogitoInfraStatus {
    let mut status = infra.status.clone().unwrap_or_default();
    let mut conditions = ConditionSet::new(std::mem::take(&mut status.conditions));
    let generation = infra.meta().generation;
    match outcome {
        Ok(outputs) => {
            conditions.set(new_condition(
                READY_CONDITION,
                ConditionStatus::True,
                RECONCILED_REASON,
                "",
                generation,
            ));
            status.env = outputs.env.clone();
            status.app_properties = infra.spec.infra_properties.clone();
            status.app_properties.extend(outputs.app_properties.clone());
            status.config_map_env_from_references = infra.spec.config_map_env_from_references.clone();
            status.secret_env_from_references = infra.spec.secret_env_from_references.clone();
        }
        Err(e) => {
            conditions.set(new_condition(
                READY_CONDITION,
                ConditionStatus::False,
                e.reason(),
                e.to_string(),
                generation,
            ));
        }
    }
    status.conditions = conditions.into_vec();
    status
}

/// One pass over `infra` against any cluster facade.
pub async fn reconcile_with<C: ResourceClient>(client: &C, infra: &KogitoInfra) -> Result<Action> {
    let outcome = resolve(client, infra).await;
    let status = compute_status(infra, &outcome);
    if infra.status.as_ref() != Some(&status) {
        let mut updated = infra.clone();
        updated.status = Some(status);
        if let Err(e) = client.update_status(&updated).await {
            error!("Failed to update status of KogitoInfra {}: {}", infra.name_any(), e);
        }
    }

    match outcome {
        Ok(_) => Ok(Action::requeue(RESYNC_INTERVAL)),
        Err(e) if e.is_retryable() => Ok(Action::requeue(RETRY_REQUEUE)),
        Err(e) => Err(e),
    }
}

#[instrument(skip(ctx, infra), fields(name = %infra.name_any()))]
pub async fn reconcile(infra: Arc<KogitoInfra>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure(CONTROLLER);
    ctx.diagnostics.write().await.last_event = Utc::now();

    info!(
        "Reconciling KogitoInfra \"{}\" in {}",
        infra.name_any(),
        infra.namespace().unwrap_or_default()
    );
    reconcile_with(&ctx.client, infra.as_ref()).await
}

fn error_policy(infra: Arc<KogitoInfra>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(CONTROLLER, infra.as_ref(), error);
    Action::requeue(ERROR_REQUEUE)
}

/// Initialize the KogitoInfra controller (given the crd is installed)
pub async fn run(state: State, client: Client, namespace: Option<String>) {
    let ctx = state.to_context(client, namespace);
    let infras = ctx.watched_api::<KogitoInfra>();
    if let Err(e) = infras.list(&ListParams::default().limit(1)).await {
        error!("CRD KogitoInfra is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        std::process::exit(1);
    }

    Controller::new(infras, Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
}
