use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapEnvSource, ConfigMapVolumeSource, Container, ContainerPort, EnvFromSource, EnvVar,
    HTTPGetAction, PodSpec, PodTemplateSpec, Probe, SecretEnvSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use super::config::app_props_name;
use super::deployer::{child_meta, service_namespace, Pass};
use crate::api::v1beta1::{KogitoService, KogitoSupportingService, RuntimeType, ServiceType};
use crate::client::ResourceClient;
use crate::framework::ResourceSet;
use crate::util::errors::{Error, Result};
use crate::util::hash::config_hash;
use crate::util::labels::{
    selector_labels, service_labels, APP_PROPS_PATH, CONFIG_HASH_ANNOTATION, ENABLE_EVENTS_ENV, PROTOBUF_FOLDER,
    PROTOBUF_FOLDER_ENV, PROTOBUF_LABEL, PROTOBUF_WATCH_ENV, SERVICE_URL_ENV, USER_CONFIG_PATH,
};

pub const HTTP_PORT_NAME: &str = "http";
pub const APP_PROPS_VOLUME: &str = "app-props";
pub const USER_CONFIG_VOLUME: &str = "user-config";

/// In-cluster URL of the Service named after the Kogito service.
pub fn service_url(name: &str, namespace: &str) -> String {
    format!("http://{name}.{namespace}")
}

fn ws_url(url: &str) -> String {
    match url.strip_prefix("http") {
        Some(rest) => format!("ws{rest}"),
        None => url.to_string(),
    }
}

fn env_var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

/// Keeps the first definition of every variable name.
pub fn dedup_env(env: Vec<EnvVar>) -> Vec<EnvVar> {
    let mut seen = BTreeSet::new();
    env.into_iter().filter(|e| seen.insert(e.name.clone())).collect()
}

/// URL env vars for the supporting services `service` consumes.
///
/// The first service of each type, by name, is used.
pub fn supporting_service_env(consumes: &[ServiceType], supporting: &[KogitoSupportingService]) -> Vec<EnvVar> {
    let mut sorted: Vec<&KogitoSupportingService> = supporting.iter().collect();
    sorted.sort_by_key(|s| s.name_any());

    let mut env = Vec::new();
    for service_type in consumes {
        let Some(target) = sorted.iter().find(|s| s.spec.service_type == *service_type) else {
            continue;
        };
        let url = target
            .status
            .as_ref()
            .and_then(|s| s.external_uri.clone())
            .unwrap_or_else(|| service_url(&target.name_any(), &target.namespace().unwrap_or_default()));
        for (name, websocket) in service_type.url_env_vars() {
            let value = if websocket { ws_url(&url) } else { url.clone() };
            env.push(env_var(name, value));
        }
    }
    env
}

fn probe(path: &str) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::String(HTTP_PORT_NAME.to_string()),
            ..Default::default()
        }),
        initial_delay_seconds: Some(10),
        timeout_seconds: Some(5),
        period_seconds: Some(10),
        failure_threshold: Some(3),
        ..Default::default()
    }
}

/// Liveness and readiness probes for the runtime flavour.
pub fn probes(runtime: RuntimeType) -> (Probe, Probe) {
    match runtime {
        RuntimeType::Quarkus => (probe("/q/health/live"), probe("/q/health/ready")),
        RuntimeType::Springboot => (probe("/actuator/health"), probe("/actuator/health")),
    }
}

fn protobuf_volume_name(index: usize) -> String {
    format!("protobuf-{index}")
}

fn config_map_volume(volume: &str, config_map: &str) -> Volume {
    Volume {
        name: volume.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn read_only_mount(volume: &str, path: String) -> VolumeMount {
    VolumeMount {
        name: volume.to_string(),
        mount_path: path,
        read_only: Some(true),
        ..Default::default()
    }
}

/// Objects found in the namespace that shape the Deployment.
#[derive(Debug, Default)]
pub struct WorkloadInputs {
    pub supporting_services: Vec<KogitoSupportingService>,
    /// Protobuf ConfigMaps to mount, for services consuming them
    pub protobuf_config_maps: Vec<String>,
}

pub fn build_deployment<S: KogitoService>(service: &S, pass: &Pass, inputs: &WorkloadInputs) -> Result<Deployment> {
    let name = service.name_any();
    let namespace = service_namespace(service)?;
    let spec = service.service_spec();
    let definition = service.definition();
    let image = pass
        .image
        .clone()
        .ok_or_else(|| Error::configuration(format!("{name} has no resolved image")))?;

    let mut env: Vec<EnvVar> = spec.env.iter().map(EnvVar::from).collect();
    env.extend(supporting_service_env(&definition.consumes, &inputs.supporting_services));
    if definition.consumes_protobuf {
        env.push(env_var(PROTOBUF_FOLDER_ENV, PROTOBUF_FOLDER));
        env.push(env_var(PROTOBUF_WATCH_ENV, "true"));
    }
    if definition.events_toggle && pass.bindings.kafka.is_some() {
        env.push(env_var(ENABLE_EVENTS_ENV, "true"));
    }
    env.extend(pass.bindings.env.iter().map(EnvVar::from));
    if let Some(trust_store) = &pass.trust_store {
        env.extend(trust_store.env());
    }
    env.push(env_var(SERVICE_URL_ENV, service_url(&name, &namespace)));

    let env_from: Vec<EnvFromSource> = pass
        .bindings
        .config_map_env_from
        .iter()
        .map(|cm| EnvFromSource {
            config_map_ref: Some(ConfigMapEnvSource {
                name: cm.clone(),
                ..Default::default()
            }),
            ..Default::default()
        })
        .chain(pass.bindings.secret_env_from.iter().map(|secret| EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: secret.clone(),
                ..Default::default()
            }),
            ..Default::default()
        }))
        .collect();

    let mut volumes = vec![config_map_volume(APP_PROPS_VOLUME, &app_props_name(&name))];
    let mut volume_mounts = vec![read_only_mount(APP_PROPS_VOLUME, APP_PROPS_PATH.to_string())];
    if let Some(user_config) = &spec.properties_config_map {
        volumes.push(config_map_volume(USER_CONFIG_VOLUME, user_config));
        volume_mounts.push(read_only_mount(USER_CONFIG_VOLUME, USER_CONFIG_PATH.to_string()));
    }
    if let Some(trust_store) = &pass.trust_store {
        volumes.push(trust_store.volume());
        volume_mounts.push(trust_store.volume_mount());
    }
    // ConfigMap names may hold dots or exceed a DNS label, volume names may not
    for (index, config_map) in inputs.protobuf_config_maps.iter().enumerate() {
        let volume = protobuf_volume_name(index);
        volumes.push(config_map_volume(&volume, config_map));
        volume_mounts.push(read_only_mount(&volume, format!("{PROTOBUF_FOLDER}/{config_map}")));
    }

    let hash = config_hash([pass.app_properties.as_str(), pass.user_config.as_deref().unwrap_or_default()]);
    let (liveness, readiness) = probes(definition.runtime);

    Ok(Deployment {
        metadata: child_meta(service, name.clone())?,
        spec: Some(DeploymentSpec {
            replicas: Some(spec.replicas.unwrap_or(1)),
            selector: LabelSelector {
                match_labels: Some(selector_labels(&name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(service_labels(&name)),
                    annotations: Some(BTreeMap::from([(CONFIG_HASH_ANNOTATION.to_string(), hash)])),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: name.clone(),
                        image: Some(image),
                        ports: Some(vec![ContainerPort {
                            name: Some(HTTP_PORT_NAME.to_string()),
                            container_port: spec.http_port,
                            protocol: Some("TCP".to_string()),
                            ..Default::default()
                        }]),
                        env: Some(dedup_env(env)),
                        env_from: (!env_from.is_empty()).then_some(env_from),
                        resources: spec.resources.as_ref().map(Into::into),
                        liveness_probe: Some(liveness),
                        readiness_probe: Some(readiness),
                        volume_mounts: Some(volume_mounts),
                        ..Default::default()
                    }],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    })
}

/// Creates or updates the workload Deployment.
pub async fn reconcile<C: ResourceClient, S: KogitoService>(client: &C, service: &S, pass: &mut Pass) -> Result<()> {
    let namespace = service_namespace(service)?;
    let definition = service.definition();

    let mut inputs = WorkloadInputs::default();
    if !definition.consumes.is_empty() {
        inputs.supporting_services = client.list::<KogitoSupportingService>(&namespace).await?;
    }
    if definition.consumes_protobuf {
        let selector = BTreeMap::from([(PROTOBUF_LABEL.to_string(), "true".to_string())]);
        let mut names: Vec<String> = client
            .list_with_labels::<ConfigMap>(&namespace, &selector)
            .await?
            .iter()
            .map(|cm| cm.name_any())
            .collect();
        names.sort();
        inputs.protobuf_config_maps = names;
    }

    let requested = build_deployment(service, pass, &inputs)?;
    let deployed = client.fetch::<Deployment>(&namespace, &service.name_any()).await?;
    pass.apply(
        client,
        service,
        ResourceSet::new().with(vec![requested.clone()]),
        ResourceSet::new().with(deployed.clone().into_iter().collect()),
    )
    .await?;
    pass.observed.deployment = deployed.or(Some(requested));
    Ok(())
}
