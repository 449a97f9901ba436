use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{conditions_schema, EnvVariable};

/// Reference to the third party object backing a `KogitoInfra`
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfraResource {
    pub api_version: String,
    pub kind: String,
    /// Defaults to the namespace of the `KogitoInfra`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

/// Binds Kogito services to an infrastructure component such as Kafka or Infinispan.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(kind = "KogitoInfra", group = "app.kiegroup.org", version = "v1beta1", namespaced)]
#[kube(status = "KogitoInfraStatus", shortname = "kogitoinfra")]
#[serde(rename_all = "camelCase")]
pub struct KogitoInfraSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<InfraResource>,
    /// Application properties handed to every bound service
    #[serde(default)]
    pub infra_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub config_map_env_from_references: Vec<String>,
    #[serde(default)]
    pub secret_env_from_references: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KogitoInfraStatus {
    #[serde(default)]
    #[schemars(schema_with = "conditions_schema")]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub env: Vec<EnvVariable>,
    #[serde(default)]
    pub app_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub config_map_env_from_references: Vec<String>,
    #[serde(default)]
    pub secret_env_from_references: Vec<String>,
}
