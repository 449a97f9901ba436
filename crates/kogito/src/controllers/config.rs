use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;

use super::deployer::{child_meta, service_namespace, Pass};
use super::infra;
use crate::api::v1beta1::KogitoService;
use crate::client::ResourceClient;
use crate::framework::ResourceSet;
use crate::util::errors::{Error, Result};
use crate::util::labels::APP_PROPERTIES_KEY;

pub fn app_props_name(service: &str) -> String {
    format!("{service}-app-props")
}

/// `key=value` lines in key order.
pub fn render_properties(properties: &BTreeMap<String, String>) -> String {
    properties
        .iter()
        .map(|(k, v)| format!("{k}={v}\n"))
        .collect()
}

pub fn build_app_props<S: KogitoService>(service: &S, content: &str) -> Result<ConfigMap> {
    Ok(ConfigMap {
        metadata: child_meta(service, app_props_name(&service.name_any()))?,
        data: Some(BTreeMap::from([(APP_PROPERTIES_KEY.to_string(), content.to_string())])),
        ..Default::default()
    })
}

/// Writes the `<name>-app-props` snapshot of the infra properties.
pub async fn reconcile_app_props<C: ResourceClient, S: KogitoService>(
    client: &C,
    service: &S,
    pass: &mut Pass,
) -> Result<()> {
    let namespace = service_namespace(service)?;
    let content = render_properties(&infra::app_properties(&pass.infras));
    let requested = build_app_props(service, &content)?;
    let deployed = client
        .fetch::<ConfigMap>(&namespace, &app_props_name(&service.name_any()))
        .await?;

    pass.apply(
        client,
        service,
        ResourceSet::new().with(vec![requested]),
        ResourceSet::new().with(deployed.into_iter().collect()),
    )
    .await?;
    pass.app_properties = content;
    Ok(())
}

/// Checks the ConfigMap referenced by `propertiesConfigMap`. It is only
/// read, never written.
pub async fn reconcile_user_config<C: ResourceClient, S: KogitoService>(
    client: &C,
    service: &S,
    pass: &mut Pass,
) -> Result<()> {
    let Some(name) = service.service_spec().properties_config_map.clone() else {
        return Ok(());
    };
    let namespace = service_namespace(service)?;
    let config_map = client
        .fetch::<ConfigMap>(&namespace, &name)
        .await?
        .ok_or_else(|| Error::not_found("ConfigMap", &namespace, &name))?;

    pass.user_config = Some(render_properties(&config_map.data.unwrap_or_default()));
    pass.observed.config_map_references.push(name);
    Ok(())
}
