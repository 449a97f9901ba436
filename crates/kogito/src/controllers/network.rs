use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use super::deployer::{child_meta, service_namespace, Pass};
use super::deployment::{service_url, HTTP_PORT_NAME};
use crate::api::external::route::{RoutePort, RouteSpec, RouteTargetReference};
use crate::api::external::Route;
use crate::api::v1beta1::KogitoService;
use crate::client::ResourceClient;
use crate::framework::ResourceSet;
use crate::util::errors::Result;
use crate::util::labels::{selector_labels, DISABLE_ROUTE_ANNOTATION};

pub const ROUTE_API_VERSION: &str = "route.openshift.io/v1";
pub const ROUTE_KIND: &str = "Route";

pub fn build_service<S: KogitoService>(service: &S) -> Result<Service> {
    let name = service.name_any();
    let spec = service.service_spec();
    let mut metadata = child_meta(service, name.clone())?;
    metadata
        .labels
        .get_or_insert_with(Default::default)
        .extend(spec.service_labels.clone());

    Ok(Service {
        metadata,
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some(HTTP_PORT_NAME.to_string()),
                port: 80,
                target_port: Some(IntOrString::Int(spec.http_port)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            selector: Some(selector_labels(&name)),
            ..Default::default()
        }),
        status: None,
    })
}

pub fn build_route<S: KogitoService>(service: &S) -> Result<Route> {
    let name = service.name_any();
    Ok(Route {
        metadata: child_meta(service, name.clone())?,
        spec: RouteSpec {
            host: None,
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name,
                weight: None,
            },
            port: Some(RoutePort {
                target_port: IntOrString::String(HTTP_PORT_NAME.to_string()),
            }),
        },
        status: None,
    })
}

pub fn route_disabled<S: KogitoService>(service: &S) -> bool {
    service
        .annotations()
        .get(DISABLE_ROUTE_ANNOTATION)
        .is_some_and(|v| v == "true")
}

/// Service and, on clusters serving routes, the Route.
pub async fn reconcile<C: ResourceClient, S: KogitoService>(client: &C, service: &S, pass: &mut Pass) -> Result<()> {
    let name = service.name_any();
    let namespace = service_namespace(service)?;

    let mut requested = ResourceSet::new().with(vec![build_service(service)?]);
    let deployed_service = client.fetch::<Service>(&namespace, &name).await?;
    let mut deployed = ResourceSet::new().with(deployed_service.into_iter().collect());

    let mut admitted_host = None;
    if client.has_api(ROUTE_API_VERSION, ROUTE_KIND).await? {
        let route = client.fetch::<Route>(&namespace, &name).await?;
        if !route_disabled(service) {
            requested.push(build_route(service)?);
            admitted_host = route.as_ref().and_then(Route::admitted_host).map(str::to_string);
        }
        deployed.extend(route.into_iter().collect());
    }
    pass.apply(client, service, requested, deployed).await?;

    pass.observed.external_uri = Some(match admitted_host {
        Some(host) => format!("http://{host}"),
        None => service_url(&name, &namespace),
    });
    Ok(())
}
