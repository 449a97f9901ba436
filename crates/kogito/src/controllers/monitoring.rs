use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::ResourceExt;

use super::deployer::{child_meta, service_namespace, Pass};
use super::deployment::HTTP_PORT_NAME;
use crate::api::external::service_monitor::{Endpoint, NamespaceSelector, ServiceMonitorSpec};
use crate::api::external::ServiceMonitor;
use crate::api::v1beta1::{KogitoService, Monitoring};
use crate::client::ResourceClient;
use crate::framework::ResourceSet;
use crate::util::errors::{Error, Result};
use crate::util::labels::selector_labels;

pub const SERVICE_MONITOR_API_VERSION: &str = "monitoring.coreos.com/v1";
pub const SERVICE_MONITOR_KIND: &str = "ServiceMonitor";

pub fn build_service_monitor<S: KogitoService>(service: &S, monitoring: &Monitoring) -> Result<ServiceMonitor> {
    let name = service.name_any();
    Ok(ServiceMonitor {
        metadata: child_meta(service, name.clone())?,
        spec: ServiceMonitorSpec {
            selector: LabelSelector {
                match_labels: Some(selector_labels(&name)),
                ..Default::default()
            },
            namespace_selector: Some(NamespaceSelector {
                match_names: vec![service_namespace(service)?],
            }),
            endpoints: vec![Endpoint {
                port: Some(HTTP_PORT_NAME.to_string()),
                path: Some(monitoring.path.clone()),
                scheme: Some(monitoring.scheme.clone()),
            }],
        },
    })
}

/// ServiceMonitor for monitored services, when the Prometheus operator is installed.
pub async fn reconcile<C: ResourceClient, S: KogitoService>(client: &C, service: &S, pass: &mut Pass) -> Result<()> {
    let explicit = service.service_spec().monitoring.clone();
    if !client.has_api(SERVICE_MONITOR_API_VERSION, SERVICE_MONITOR_KIND).await? {
        return match explicit {
            Some(_) => Err(Error::api_not_available(SERVICE_MONITOR_API_VERSION, SERVICE_MONITOR_KIND)),
            None => Ok(()),
        };
    }

    let namespace = service_namespace(service)?;
    let deployed = client.fetch::<ServiceMonitor>(&namespace, &service.name_any()).await?;
    let requested = match explicit {
        Some(monitoring) => vec![build_service_monitor(service, &monitoring)?],
        None if service.definition().monitored_by_default => {
            vec![build_service_monitor(service, &Monitoring::default())?]
        }
        None => Vec::new(),
    };
    pass.apply(
        client,
        service,
        ResourceSet::new().with(requested),
        ResourceSet::new().with(deployed.into_iter().collect()),
    )
    .await
}
