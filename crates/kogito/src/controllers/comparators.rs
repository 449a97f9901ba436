//! Comparators for the child objects of Kogito services.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServicePort};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use crate::api::external::{ImageStream, KafkaTopic, Route};
use crate::framework::{ComparatorBuilder, ComparatorRegistry};
use crate::util::labels::CONFIG_HASH_ANNOTATION;

/// Registry with the comparators used on every pass.
pub fn registry() -> ComparatorRegistry {
    let mut registry = ComparatorRegistry::new();
    registry
        .register::<Deployment>(
            ComparatorBuilder::new()
                .with_custom(deployment_matches)
                .use_default_comparator()
                .build(),
        )
        .register::<Service>(ComparatorBuilder::new().with_custom(service_matches).build())
        .register::<ConfigMap>(ComparatorBuilder::new().with_custom(config_map_matches).build())
        .register::<ImageStream>(ComparatorBuilder::new().with_custom(image_stream_matches).build())
        .register::<Route>(ComparatorBuilder::new().with_custom(route_matches).build())
        .register::<KafkaTopic>(ComparatorBuilder::new().with_custom(kafka_topic_matches).build());
    registry
}

fn labels_subset(requested: &BTreeMap<String, String>, deployed: &BTreeMap<String, String>) -> bool {
    requested.iter().all(|(k, v)| deployed.get(k) == Some(v))
}

fn template_annotation<'a>(deployment: &'a Deployment, key: &str) -> Option<&'a String> {
    deployment
        .spec
        .as_ref()?
        .template
        .metadata
        .as_ref()?
        .annotations
        .as_ref()?
        .get(key)
}

/// Replicas, config hash, images and volumes must match exactly; the rest
/// is left to the structural comparison.
pub fn deployment_matches(deployed: &Deployment, requested: &Deployment) -> bool {
    let (Some(deployed_spec), Some(requested_spec)) = (deployed.spec.as_ref(), requested.spec.as_ref()) else {
        return deployed.spec.is_none() && requested.spec.is_none();
    };
    if deployed_spec.replicas != requested_spec.replicas {
        return false;
    }
    if template_annotation(deployed, CONFIG_HASH_ANNOTATION) != template_annotation(requested, CONFIG_HASH_ANNOTATION) {
        return false;
    }

    let pod_specs = (
        deployed_spec.template.spec.as_ref(),
        requested_spec.template.spec.as_ref(),
    );
    let (Some(deployed_pod), Some(requested_pod)) = pod_specs else {
        return pod_specs.0.is_none() && pod_specs.1.is_none();
    };
    let images = |containers: &[k8s_openapi::api::core::v1::Container]| {
        containers
            .iter()
            .map(|c| (c.name.clone(), c.image.clone()))
            .collect::<Vec<_>>()
    };
    if images(deployed_pod.containers.as_slice()) != images(requested_pod.containers.as_slice()) {
        return false;
    }
    let volume_names = |pod: &k8s_openapi::api::core::v1::PodSpec| {
        pod.volumes
            .iter()
            .flatten()
            .map(|v| v.name.clone())
            .collect::<BTreeSet<_>>()
    };
    volume_names(deployed_pod) == volume_names(requested_pod)
}

fn normalized_ports(service: &Service) -> Vec<(Option<String>, i32, Option<IntOrString>, String)> {
    service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .map(|p: &ServicePort| {
                    (
                        p.name.clone(),
                        p.port,
                        p.target_port.clone(),
                        p.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Ports (with `TCP` as the default protocol), selector and requested labels.
pub fn service_matches(deployed: &Service, requested: &Service) -> bool {
    let selector = |s: &Service| s.spec.as_ref().and_then(|spec| spec.selector.clone()).unwrap_or_default();
    normalized_ports(deployed) == normalized_ports(requested)
        && selector(deployed) == selector(requested)
        && labels_subset(requested.labels(), deployed.labels())
}

pub fn config_map_matches(deployed: &ConfigMap, requested: &ConfigMap) -> bool {
    deployed.data.clone().unwrap_or_default() == requested.data.clone().unwrap_or_default()
        && labels_subset(requested.labels(), deployed.labels())
}

fn owners_present<K: ResourceExt>(deployed: &K, requested: &K) -> bool {
    let deployed_owners: BTreeSet<&str> = deployed.owner_references().iter().map(|o| o.uid.as_str()).collect();
    requested
        .owner_references()
        .iter()
        .all(|o| deployed_owners.contains(o.uid.as_str()))
}

/// Image streams are shared, so only missing tags or owners count.
pub fn image_stream_matches(deployed: &ImageStream, requested: &ImageStream) -> bool {
    requested.spec.tags.iter().all(|tag| deployed.has_tag(&tag.name)) && owners_present(deployed, requested)
}

pub fn route_matches(deployed: &Route, requested: &Route) -> bool {
    deployed.spec.to.kind == requested.spec.to.kind
        && deployed.spec.to.name == requested.spec.to.name
        && deployed.spec.port == requested.spec.port
}

pub fn kafka_topic_matches(deployed: &KafkaTopic, requested: &KafkaTopic) -> bool {
    deployed.spec.partitions == requested.spec.partitions
        && deployed.spec.replicas == requested.spec.replicas
        && labels_subset(requested.labels(), deployed.labels())
        && owners_present(deployed, requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::external::image_stream::{ImageStreamSpec, TagReference};
    use crate::api::external::route::{RoutePort, RouteSpec, RouteTargetReference};
    use k8s_openapi::api::core::v1::ServiceSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

    fn service(protocol: Option<&str>, labels: &[(&str, &str)]) -> Service {
        let mut service = Service {
            spec: Some(ServiceSpec {
                ports: Some(vec![ServicePort {
                    name: Some("http".to_string()),
                    port: 80,
                    target_port: Some(IntOrString::Int(8080)),
                    protocol: protocol.map(str::to_string),
                    ..Default::default()
                }]),
                selector: Some(BTreeMap::from([("app".to_string(), "example".to_string())])),
                ..Default::default()
            }),
            ..Default::default()
        };
        service.metadata.labels = Some(
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        service
    }

    #[test]
    fn test_service_ignores_default_protocol_and_extra_labels() {
        let requested = service(None, &[("app", "example")]);
        let deployed = service(Some("TCP"), &[("app", "example"), ("extra", "x")]);
        assert!(service_matches(&deployed, &requested));

        let deployed = service(Some("UDP"), &[("app", "example")]);
        assert!(!service_matches(&deployed, &requested));
    }

    #[test]
    fn test_config_map_data_must_match_exactly() {
        let cm = |data: &[(&str, &str)]| ConfigMap {
            data: Some(data.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
            ..Default::default()
        };
        assert!(config_map_matches(&cm(&[("a", "1")]), &cm(&[("a", "1")])));
        assert!(!config_map_matches(&cm(&[("a", "1"), ("b", "2")]), &cm(&[("a", "1")])));
        assert!(config_map_matches(&ConfigMap::default(), &cm(&[])));
    }

    #[test]
    fn test_image_stream_tags_and_owners_are_subsets() {
        let owner = |uid: &str| OwnerReference {
            uid: uid.to_string(),
            ..Default::default()
        };
        let stream = |tags: &[&str], owners: &[&str]| {
            let mut stream = ImageStream::new(
                "app",
                ImageStreamSpec {
                    tags: tags
                        .iter()
                        .map(|t| TagReference {
                            name: t.to_string(),
                            ..Default::default()
                        })
                        .collect(),
                    ..Default::default()
                },
            );
            stream.metadata.owner_references = Some(owners.iter().map(|o| owner(o)).collect());
            stream
        };
        let deployed = stream(&["1.0", "2.0"], &["a", "b"]);
        assert!(image_stream_matches(&deployed, &stream(&["2.0"], &["a"])));
        assert!(!image_stream_matches(&deployed, &stream(&["3.0"], &["a"])));
        assert!(!image_stream_matches(&deployed, &stream(&["1.0"], &["c"])));
    }

    #[test]
    fn test_route_ignores_assigned_host() {
        let route = |host: Option<&str>| {
            Route::new(
                "app",
                RouteSpec {
                    host: host.map(str::to_string),
                    to: RouteTargetReference {
                        kind: "Service".to_string(),
                        name: "app".to_string(),
                        weight: None,
                    },
                    port: Some(RoutePort {
                        target_port: IntOrString::String("http".to_string()),
                    }),
                },
            )
        };
        assert!(route_matches(&route(Some("app.apps.example.com")), &route(None)));
    }

    #[test]
    fn test_registry_covers_managed_kinds() {
        let registry = registry();
        assert!(registry.is_registered::<Deployment>());
        assert!(registry.is_registered::<Service>());
        assert!(registry.is_registered::<ConfigMap>());
        assert!(registry.is_registered::<ImageStream>());
        assert!(registry.is_registered::<Route>());
        assert!(registry.is_registered::<KafkaTopic>());
        assert!(!registry.is_registered::<crate::api::external::ServiceMonitor>());
    }
}
