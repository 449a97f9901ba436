use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements as K8sResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod kogitoinfra;
pub mod kogitoruntime;
pub mod kogitosupportingservice;
pub mod service;

pub use kogitoinfra::{InfraResource, KogitoInfra, KogitoInfraSpec, KogitoInfraStatus};
pub use kogitoruntime::{KogitoRuntime, KogitoRuntimeSpec, RuntimeType};
pub use kogitosupportingservice::{KogitoSupportingService, KogitoSupportingServiceSpec, ServiceType};
pub use service::{KogitoService, KogitoServiceSpec, KogitoServiceStatus, ServiceDefinition};

/// A plain `name=value` environment variable.
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, Eq, JsonSchema)]
pub struct EnvVariable {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl EnvVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        EnvVariable {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl From<&EnvVariable> for EnvVar {
    fn from(env: &EnvVariable) -> Self {
        EnvVar {
            name: env.name.clone(),
            value: Some(env.value.clone()),
            ..Default::default()
        }
    }
}

/// Compute resources given as quantity strings, e.g. `cpu: 500m`.
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, Eq, JsonSchema)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
}

impl From<&ResourceRequirements> for K8sResourceRequirements {
    fn from(resources: &ResourceRequirements) -> Self {
        let quantities = |values: &BTreeMap<String, String>| {
            (!values.is_empty()).then(|| {
                values
                    .iter()
                    .map(|(k, v)| (k.clone(), Quantity(v.clone())))
                    .collect::<BTreeMap<_, _>>()
            })
        };
        K8sResourceRequirements {
            requests: quantities(&resources.requests),
            limits: quantities(&resources.limits),
            ..Default::default()
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct Monitoring {
    #[serde(default = "default_monitoring_scheme")]
    pub scheme: String,
    #[serde(default = "default_monitoring_path")]
    pub path: String,
}

impl Default for Monitoring {
    fn default() -> Self {
        Monitoring {
            scheme: default_monitoring_scheme(),
            path: default_monitoring_path(),
        }
    }
}

fn default_monitoring_scheme() -> String {
    "http".to_string()
}
fn default_monitoring_path() -> String {
    "/metrics".to_string()
}

pub fn conditions_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
    serde_json::from_value(serde_json::json!({
        "type": "array",
        "x-kubernetes-list-type": "map",
        "x-kubernetes-list-map-keys": ["type"],
        "items": {
            "type": "object",
            "properties": {
                "lastTransitionTime": { "format": "date-time", "type": "string" },
                "message": { "type": "string" },
                "observedGeneration": { "type": "integer", "format": "int64", "default": 0 },
                "reason": { "type": "string" },
                "status": { "type": "string", "enum": ["True", "False", "Unknown"] },
                "type": { "type": "string" }
            },
            "required": ["lastTransitionTime", "message", "reason", "status", "type"],
        },
    }))
    .expect("conditions schema is a valid schema literal")
}
