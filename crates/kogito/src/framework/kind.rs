use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::Resource;

use super::comparator::{CompareFn, ComparatorRegistry};
use crate::api::external::{ImageStream, KafkaTopic, Route, ServiceMonitor};
use crate::client::KubeObject;

/// Kinds of child objects the operator reconciles.
///
/// The declaration order is the order in which kinds are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    ConfigMap,
    ImageStream,
    KafkaTopic,
    Deployment,
    Service,
    Route,
    ServiceMonitor,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Objects of one kind, as held by a [`ResourceSet`].
#[derive(Debug, Clone)]
pub enum ChildResources {
    ConfigMaps(Vec<ConfigMap>),
    ImageStreams(Vec<ImageStream>),
    KafkaTopics(Vec<KafkaTopic>),
    Deployments(Vec<Deployment>),
    Services(Vec<Service>),
    Routes(Vec<Route>),
    ServiceMonitors(Vec<ServiceMonitor>),
}

impl ChildResources {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ChildResources::ConfigMaps(_) => ResourceKind::ConfigMap,
            ChildResources::ImageStreams(_) => ResourceKind::ImageStream,
            ChildResources::KafkaTopics(_) => ResourceKind::KafkaTopic,
            ChildResources::Deployments(_) => ResourceKind::Deployment,
            ChildResources::Services(_) => ResourceKind::Service,
            ChildResources::Routes(_) => ResourceKind::Route,
            ChildResources::ServiceMonitors(_) => ResourceKind::ServiceMonitor,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ChildResources::ConfigMaps(v) => v.len(),
            ChildResources::ImageStreams(v) => v.len(),
            ChildResources::KafkaTopics(v) => v.len(),
            ChildResources::Deployments(v) => v.len(),
            ChildResources::Services(v) => v.len(),
            ChildResources::Routes(v) => v.len(),
            ChildResources::ServiceMonitors(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A typed child object kind that can take part in delta processing.
pub trait ChildResource: KubeObject {
    const KIND: ResourceKind;

    fn into_resources(items: Vec<Self>) -> ChildResources;

    /// Unwraps `resources`, or hands them back when they hold another kind.
    fn from_resources(resources: ChildResources) -> Result<Vec<Self>, ChildResources>;

    fn as_slice(resources: &ChildResources) -> Option<&[Self]>;

    fn comparator(registry: &ComparatorRegistry) -> Option<&CompareFn<Self>>;

    fn comparator_slot(registry: &mut ComparatorRegistry) -> &mut Option<CompareFn<Self>>;

    /// Builds the object sent on update from the requested one.
    ///
    /// Server assigned fields are carried over from `deployed`.
    fn prepare_update(deployed: &Self, mut requested: Self) -> Self {
        requested.meta_mut().resource_version = deployed.meta().resource_version.clone();
        requested
    }
}

macro_rules! child_resource {
    ($ty:ty, $kind:ident, $variant:ident, $field:ident) => {
        impl ChildResource for $ty {
            const KIND: ResourceKind = ResourceKind::$kind;

            fn into_resources(items: Vec<Self>) -> ChildResources {
                ChildResources::$variant(items)
            }

            fn from_resources(resources: ChildResources) -> Result<Vec<Self>, ChildResources> {
                match resources {
                    ChildResources::$variant(items) => Ok(items),
                    other => Err(other),
                }
            }

            fn as_slice(resources: &ChildResources) -> Option<&[Self]> {
                match resources {
                    ChildResources::$variant(items) => Some(items),
                    _ => None,
                }
            }

            fn comparator(registry: &ComparatorRegistry) -> Option<&CompareFn<Self>> {
                registry.$field.as_ref()
            }

            fn comparator_slot(registry: &mut ComparatorRegistry) -> &mut Option<CompareFn<Self>> {
                &mut registry.$field
            }
        }
    };
}

child_resource!(ConfigMap, ConfigMap, ConfigMaps, config_maps);
child_resource!(ImageStream, ImageStream, ImageStreams, image_streams);
child_resource!(KafkaTopic, KafkaTopic, KafkaTopics, kafka_topics);
child_resource!(Deployment, Deployment, Deployments, deployments);
child_resource!(Route, Route, Routes, routes);
child_resource!(ServiceMonitor, ServiceMonitor, ServiceMonitors, service_monitors);

impl ChildResource for Service {
    const KIND: ResourceKind = ResourceKind::Service;

    fn into_resources(items: Vec<Self>) -> ChildResources {
        ChildResources::Services(items)
    }

    fn from_resources(resources: ChildResources) -> Result<Vec<Self>, ChildResources> {
        match resources {
            ChildResources::Services(items) => Ok(items),
            other => Err(other),
        }
    }

    fn as_slice(resources: &ChildResources) -> Option<&[Self]> {
        match resources {
            ChildResources::Services(items) => Some(items),
            _ => None,
        }
    }

    fn comparator(registry: &ComparatorRegistry) -> Option<&CompareFn<Self>> {
        registry.services.as_ref()
    }

    fn comparator_slot(registry: &mut ComparatorRegistry) -> &mut Option<CompareFn<Self>> {
        &mut registry.services
    }

    /// The cluster IPs are immutable once allocated.
    fn prepare_update(deployed: &Self, mut requested: Self) -> Self {
        requested.metadata.resource_version = deployed.metadata.resource_version.clone();
        if let (Some(requested_spec), Some(deployed_spec)) = (requested.spec.as_mut(), deployed.spec.as_ref()) {
            requested_spec.cluster_ip = deployed_spec.cluster_ip.clone();
            requested_spec.cluster_ips = deployed_spec.cluster_ips.clone();
        }
        requested
    }
}

/// Child objects grouped by kind.
///
/// A kind present with no objects still takes part in delta processing, so
/// every deployed object of that kind owned by the parent gets removed.
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    entries: BTreeMap<ResourceKind, ChildResources>,
}

impl ResourceSet {
    pub fn new() -> Self {
        ResourceSet::default()
    }

    pub fn with<K: ChildResource>(mut self, items: Vec<K>) -> Self {
        self.extend(items);
        self
    }

    pub fn push<K: ChildResource>(&mut self, item: K) {
        self.extend(vec![item]);
    }

    pub fn extend<K: ChildResource>(&mut self, items: Vec<K>) {
        let mut existing = self.take::<K>();
        existing.extend(items);
        self.entries.insert(K::KIND, K::into_resources(existing));
    }

    /// Removes and returns the objects of kind `K`.
    pub fn take<K: ChildResource>(&mut self) -> Vec<K> {
        match self.entries.remove(&K::KIND).map(K::from_resources) {
            Some(Ok(items)) => items,
            Some(Err(other)) => {
                self.entries.insert(other.kind(), other);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    pub fn get<K: ChildResource>(&self) -> &[K] {
        self.entries
            .get(&K::KIND)
            .and_then(K::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn kinds(&self) -> BTreeSet<ResourceKind> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(ChildResources::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn config_map(name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_resource_set_groups_by_kind() {
        let mut set = ResourceSet::new()
            .with(vec![config_map("a")])
            .with::<Deployment>(Vec::new());
        set.push(config_map("b"));

        assert_eq!(set.len(), 2);
        assert_eq!(
            set.kinds().into_iter().collect::<Vec<_>>(),
            vec![ResourceKind::ConfigMap, ResourceKind::Deployment]
        );
        assert!(set.contains(ResourceKind::Deployment));
        assert!(set.get::<Deployment>().is_empty());
        assert_eq!(set.get::<ConfigMap>().len(), 2);

        let taken = set.take::<ConfigMap>();
        assert_eq!(taken.len(), 2);
        assert!(!set.contains(ResourceKind::ConfigMap));
        assert!(set.take::<Service>().is_empty());
    }

    #[test]
    fn test_service_update_keeps_cluster_ip() {
        use k8s_openapi::api::core::v1::ServiceSpec;
        let deployed = Service {
            metadata: ObjectMeta {
                resource_version: Some("7".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: Some("10.0.0.12".to_string()),
                cluster_ips: Some(vec!["10.0.0.12".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let requested = Service {
            spec: Some(ServiceSpec::default()),
            ..Default::default()
        };
        let merged = Service::prepare_update(&deployed, requested);
        assert_eq!(merged.metadata.resource_version.as_deref(), Some("7"));
        let spec = merged.spec.unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("10.0.0.12"));
        assert_eq!(spec.cluster_ips, Some(vec!["10.0.0.12".to_string()]));
    }
}
