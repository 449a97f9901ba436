use core::fmt;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::service::{KogitoService, KogitoServiceSpec, KogitoServiceStatus, ServiceDefinition};
use crate::util::labels::{
    DATA_INDEX_HTTP_URL_ENV, DATA_INDEX_WS_URL_ENV, EXPLAINABILITY_HTTP_URL_ENV, JOBS_SERVICE_URL_ENV,
    TRUSTY_HTTP_URL_ENV, TRUSTY_WS_URL_ENV,
};

#[derive(Default, Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, JsonSchema)]
pub enum ServiceType {
    #[default]
    DataIndex,
    JobsService,
    MgmtConsole,
    TaskConsole,
    TrustyAI,
    TrustyUI,
    Explainability,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ServiceType::DataIndex => write!(f, "DataIndex"),
            ServiceType::JobsService => write!(f, "JobsService"),
            ServiceType::MgmtConsole => write!(f, "MgmtConsole"),
            ServiceType::TaskConsole => write!(f, "TaskConsole"),
            ServiceType::TrustyAI => write!(f, "TrustyAI"),
            ServiceType::TrustyUI => write!(f, "TrustyUI"),
            ServiceType::Explainability => write!(f, "Explainability"),
        }
    }
}

impl ServiceType {
    pub fn default_image(&self) -> &'static str {
        match self {
            ServiceType::DataIndex => "quay.io/kiegroup/kogito-data-index-infinispan:latest",
            ServiceType::JobsService => "quay.io/kiegroup/kogito-jobs-service-ephemeral:latest",
            ServiceType::MgmtConsole => "quay.io/kiegroup/kogito-management-console:latest",
            ServiceType::TaskConsole => "quay.io/kiegroup/kogito-task-console:latest",
            ServiceType::TrustyAI => "quay.io/kiegroup/kogito-trusty-infinispan:latest",
            ServiceType::TrustyUI => "quay.io/kiegroup/kogito-trusty-ui:latest",
            ServiceType::Explainability => "quay.io/kiegroup/kogito-explainability:latest",
        }
    }

    pub fn topics(&self) -> Vec<&'static str> {
        match self {
            ServiceType::DataIndex => vec![
                "kogito-processinstances-events",
                "kogito-usertaskinstances-events",
                "kogito-processdefinitions-events",
                "kogito-jobs-events",
            ],
            ServiceType::JobsService => vec!["kogito-job-service-job-status-events"],
            ServiceType::TrustyAI => vec![
                "kogito-tracing-decision",
                "kogito-tracing-model",
                "trusty-explainability-request",
                "trusty-explainability-result",
            ],
            ServiceType::Explainability => {
                vec!["trusty-explainability-request", "trusty-explainability-result"]
            }
            ServiceType::MgmtConsole | ServiceType::TaskConsole | ServiceType::TrustyUI => Vec::new(),
        }
    }

    /// Environment variables carrying this service's URL to its consumers,
    /// paired with whether the value uses the websocket scheme.
    pub fn url_env_vars(&self) -> Vec<(&'static str, bool)> {
        match self {
            ServiceType::DataIndex => vec![(DATA_INDEX_HTTP_URL_ENV, false), (DATA_INDEX_WS_URL_ENV, true)],
            ServiceType::JobsService => vec![(JOBS_SERVICE_URL_ENV, false)],
            ServiceType::TrustyAI => vec![(TRUSTY_HTTP_URL_ENV, false), (TRUSTY_WS_URL_ENV, true)],
            ServiceType::Explainability => vec![(EXPLAINABILITY_HTTP_URL_ENV, false)],
            ServiceType::MgmtConsole | ServiceType::TaskConsole | ServiceType::TrustyUI => Vec::new(),
        }
    }

    fn consumes(&self) -> Vec<ServiceType> {
        match self {
            ServiceType::MgmtConsole | ServiceType::TaskConsole => vec![ServiceType::DataIndex],
            ServiceType::TrustyUI => vec![ServiceType::TrustyAI],
            ServiceType::TrustyAI => vec![ServiceType::Explainability],
            _ => Vec::new(),
        }
    }
}

/// One of the Kogito supporting services (Data Index, Jobs Service, consoles...)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(
    kind = "KogitoSupportingService",
    group = "app.kiegroup.org",
    version = "v1beta1",
    namespaced
)]
#[kube(status = "KogitoServiceStatus", shortname = "kogitosupportingservice")]
#[serde(rename_all = "camelCase")]
pub struct KogitoSupportingServiceSpec {
    pub service_type: ServiceType,
    #[serde(flatten)]
    pub service: KogitoServiceSpec,
}

impl KogitoService for KogitoSupportingService {
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
        let service_type = self.spec.service_type;
        ServiceDefinition {
            default_image: Some(service_type.default_image()),
            topics: service_type.topics(),
            consumes: service_type.consumes(),
            consumes_protobuf: service_type == ServiceType::DataIndex,
            events_toggle: service_type == ServiceType::JobsService,
            ..Default::default()
        }
    }
}
