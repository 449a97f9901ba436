use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};

use super::deployer::{service_namespace, Pass};
use crate::api::external::kafka_topic::KafkaTopicSpec;
use crate::api::external::KafkaTopic;
use crate::api::v1beta1::KogitoService;
use crate::client::ResourceClient;
use crate::framework::ResourceSet;
use crate::util::errors::{Result, StdError};
use crate::util::labels::STRIMZI_CLUSTER_LABEL;

const DEFAULT_PARTITIONS: i32 = 1;
const DEFAULT_REPLICAS: i32 = 1;

/// The topic `name` as `service` needs it.
///
/// Topics may be shared between services: an existing topic keeps its
/// labels and owners and is only extended. The owner reference is only
/// set when the topic lives in the namespace of the service.
pub fn build_topic<S: KogitoService>(
    service: &S,
    name: &str,
    kafka_namespace: &str,
    kafka_name: &str,
    deployed: Option<&KafkaTopic>,
) -> Result<KafkaTopic> {
    let mut topic = match deployed {
        Some(deployed) => deployed.clone(),
        None => KafkaTopic {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(kafka_namespace.to_string()),
                ..Default::default()
            },
            spec: KafkaTopicSpec {
                topic_name: Some(name.to_string()),
                partitions: Some(DEFAULT_PARTITIONS),
                replicas: Some(DEFAULT_REPLICAS),
                config: BTreeMap::new(),
            },
        },
    };
    topic
        .metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(STRIMZI_CLUSTER_LABEL.to_string(), kafka_name.to_string());

    if service_namespace(service)? == kafka_namespace {
        let owner = service
            .owner_ref(&())
            .ok_or_else(|| StdError::MetadataMissing(format!("{} has no uid", service.name_any())))?;
        let owners = topic.metadata.owner_references.get_or_insert_with(Vec::new);
        if !owners.iter().any(|o| o.uid == owner.uid) {
            owners.push(owner);
        }
    }
    Ok(topic)
}

/// KafkaTopics of the service type, for services bound to a Kafka infra.
pub async fn reconcile<C: ResourceClient, S: KogitoService>(client: &C, service: &S, pass: &mut Pass) -> Result<()> {
    let Some((kafka_namespace, kafka_name)) = pass.bindings.kafka.clone() else {
        return Ok(());
    };
    let topics = service.definition().topics;
    if topics.is_empty() {
        return Ok(());
    }

    let mut requested = Vec::new();
    let mut deployed = Vec::new();
    for name in topics {
        let existing = client.fetch::<KafkaTopic>(&kafka_namespace, name).await?;
        requested.push(build_topic(service, name, &kafka_namespace, &kafka_name, existing.as_ref())?);
        deployed.extend(existing);
    }
    pass.apply(
        client,
        service,
        ResourceSet::new().with(requested),
        ResourceSet::new().with(deployed),
    )
    .await
}
