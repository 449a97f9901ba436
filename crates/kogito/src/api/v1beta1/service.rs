use std::collections::BTreeMap;
use std::fmt::Debug;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{conditions_schema, EnvVariable, Monitoring, ResourceRequirements, RuntimeType, ServiceType};

/// Fields shared by every deployable Kogito service.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KogitoServiceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub env: Vec<EnvVariable>,
    #[serde(default = "default_http_port")]
    pub http_port: i32,
    /// ConfigMap holding a user supplied `application.properties`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties_config_map: Option<String>,
    /// Names of the `KogitoInfra` resources this service binds to
    #[serde(default)]
    pub infra: Vec<String>,
    /// Secret holding a `cacerts` trust store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_store_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<Monitoring>,
    #[serde(default)]
    pub service_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default)]
    pub insecure_image_registry: bool,
}

pub fn default_http_port() -> i32 {
    8080
}

impl Default for KogitoServiceSpec {
    fn default() -> Self {
        KogitoServiceSpec {
            replicas: None,
            image: None,
            env: Vec::new(),
            http_port: default_http_port(),
            properties_config_map: None,
            infra: Vec::new(),
            trust_store_secret: None,
            monitoring: None,
            service_labels: BTreeMap::new(),
            resources: None,
            insecure_image_registry: false,
        }
    }
}

/// Mirror of a Deployment condition as reported in the service status
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConditionMirror {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KogitoServiceStatus {
    #[serde(default)]
    #[schemars(schema_with = "conditions_schema")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, rename = "externalURI", skip_serializing_if = "Option::is_none")]
    pub external_uri: Option<String>,
    #[serde(default)]
    pub deployment_conditions: Vec<DeploymentConditionMirror>,
    #[serde(default)]
    pub config_map_references: Vec<String>,
    #[serde(default)]
    pub secret_references: Vec<String>,
}

/// What the deployer needs to know about a concrete kind of Kogito service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub default_image: Option<&'static str>,
    pub runtime: RuntimeType,
    /// Create a ServiceMonitor whenever the API is served
    pub monitored_by_default: bool,
    /// Kafka topics this service consumes or produces
    pub topics: Vec<&'static str>,
    /// Supporting services whose URLs are injected as env vars
    pub consumes: Vec<ServiceType>,
    /// Mount every protobuf ConfigMap of the namespace
    pub consumes_protobuf: bool,
    /// Publish the protobuf descriptors served by the application
    pub publishes_protobuf: bool,
    /// Set `ENABLE_EVENTS` when bound to a Kafka infra
    pub events_toggle: bool,
}

impl Default for ServiceDefinition {
    fn default() -> Self {
        ServiceDefinition {
            default_image: None,
            runtime: RuntimeType::Quarkus,
            monitored_by_default: false,
            topics: Vec::new(),
            consumes: Vec::new(),
            consumes_protobuf: false,
            publishes_protobuf: false,
            events_toggle: false,
        }
    }
}

/// A custom resource that results in a Kogito Deployment.
pub trait KogitoService:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    fn service_spec(&self) -> &KogitoServiceSpec;
    fn service_spec_mut(&mut self) -> &mut KogitoServiceSpec;
    fn service_status(&self) -> Option<&KogitoServiceStatus>;
    fn set_service_status(&mut self, status: KogitoServiceStatus);
    fn definition(&self) -> ServiceDefinition;
}
