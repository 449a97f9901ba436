//! Publishing of the protobuf descriptors generated by Kogito runtimes.
//!
//! Data Index mounts every ConfigMap labelled `app.kiegroup.org/protobuf`,
//! so a runtime with persistence exposes its domain model by having its
//! descriptors copied into such a ConfigMap.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use tracing::*;

use super::deployer::{child_meta, service_namespace, Pass};
use super::deployment::service_url;
use crate::api::v1beta1::KogitoService;
use crate::client::ResourceClient;
use crate::framework::ResourceSet;
use crate::util::errors::{Result, StdError};
use crate::util::labels::PROTOBUF_LABEL;

pub const PROTOBUF_LIST_PATH: &str = "/persistence/protobuf/list";
const PROTOBUF_FILE_PATH: &str = "/persistence/protobuf";

pub fn protobuf_config_map_name(service: &str) -> String {
    format!("{service}-protobuf-files")
}

pub fn should_publish<S: KogitoService>(service: &S, pass: &Pass) -> bool {
    service.definition().publishes_protobuf && pass.bindings.persistence && pass.observed.ready_replicas() > 0
}

pub fn build_protobuf_config_map<S: KogitoService>(service: &S, files: BTreeMap<String, String>) -> Result<ConfigMap> {
    let mut metadata = child_meta(service, protobuf_config_map_name(&service.name_any()))?;
    metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(PROTOBUF_LABEL.to_string(), "true".to_string());
    Ok(ConfigMap {
        metadata,
        data: Some(files),
        ..Default::default()
    })
}

fn http_error(e: reqwest::Error) -> StdError {
    StdError::HttpError(e.to_string())
}

/// Downloads every descriptor listed by the application.
pub async fn fetch_files(http: &reqwest::Client, base_url: &str) -> Result<BTreeMap<String, String>> {
    let names: Vec<String> = http
        .get(format!("{base_url}{PROTOBUF_LIST_PATH}"))
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(http_error)?
        .json()
        .await
        .map_err(http_error)?;

    let mut files = BTreeMap::new();
    for name in names {
        let content = http
            .get(format!("{base_url}{PROTOBUF_FILE_PATH}/{name}"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(http_error)?
            .text()
            .await
            .map_err(http_error)?;
        files.insert(name, content);
    }
    Ok(files)
}

async fn publish<C: ResourceClient, S: KogitoService>(
    client: &C,
    http: &reqwest::Client,
    service: &S,
    pass: &mut Pass,
) -> Result<()> {
    let namespace = service_namespace(service)?;
    let files = fetch_files(http, &service_url(&service.name_any(), &namespace)).await?;
    if files.is_empty() {
        debug!("{} serves no protobuf files", service.name_any());
        return Ok(());
    }
    let requested = build_protobuf_config_map(service, files)?;
    let deployed = client
        .fetch::<ConfigMap>(&namespace, &protobuf_config_map_name(&service.name_any()))
        .await?;
    pass.apply(
        client,
        service,
        ResourceSet::new().with(vec![requested]),
        ResourceSet::new().with(deployed.into_iter().collect()),
    )
    .await
}

/// Best effort: failures are logged and never fail the pass.
pub async fn reconcile<C: ResourceClient, S: KogitoService>(
    client: &C,
    http: &reqwest::Client,
    service: &S,
    pass: &mut Pass,
) {
    if !should_publish(service, pass) {
        return;
    }
    if let Err(e) = publish(client, http, service, pass).await {
        warn!("Could not publish protobuf files of {}: {}", service.name_any(), e);
    }
}
