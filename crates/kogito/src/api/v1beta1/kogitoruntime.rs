use core::fmt;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::service::{KogitoService, KogitoServiceSpec, KogitoServiceStatus, ServiceDefinition};
use super::ServiceType;

#[derive(Default, Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    #[default]
    Quarkus,
    Springboot,
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuntimeType::Quarkus => write!(f, "quarkus"),
            RuntimeType::Springboot => write!(f, "springboot"),
        }
    }
}

/// A user built Kogito application.
///
/// This provides a hook for generating the CRD yaml (in crdgen)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(kind = "KogitoRuntime", group = "app.kiegroup.org", version = "v1beta1", namespaced)]
#[kube(status = "KogitoServiceStatus", shortname = "kogitoruntime")]
#[serde(rename_all = "camelCase")]
pub struct KogitoRuntimeSpec {
    #[serde(flatten)]
    pub service: KogitoServiceSpec,
    #[serde(default)]
    pub runtime: RuntimeType,
}

impl KogitoService for KogitoRuntime {
    fn service_spec(&self) -> &KogitoServiceSpec {
        &self.spec.service
    }

    fn service_spec_mut(&mut self) -> &mut KogitoServiceSpec {
        &mut self.spec.service
    }

    fn service_status(&self) -> Option<&KogitoServiceStatus> {
        self.status.as_ref()
    }

    fn set_service_status(&mut self, status: KogitoServiceStatus) {
        self.status = Some(status);
    }

    fn definition(&self) -> ServiceDefinition {
        ServiceDefinition {
            runtime: self.spec.runtime,
            monitored_by_default: true,
            consumes: vec![ServiceType::DataIndex, ServiceType::JobsService],
            publishes_protobuf: true,
            ..Default::default()
        }
    }
}
