//! Equality predicates deciding whether a deployed object needs an update.

use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use serde::Serialize;
use serde_json::Value;
use tracing::*;

use super::kind::ChildResource;
use crate::api::external::{ImageStream, KafkaTopic, Route, ServiceMonitor};

/// Returns true when `deployed` already matches `requested`.
pub type CompareFn<K> = Arc<dyn Fn(&K, &K) -> bool + Send + Sync>;

const SERVER_METADATA_FIELDS: [&str; 6] = [
    "resourceVersion",
    "uid",
    "creationTimestamp",
    "generation",
    "managedFields",
    "selfLink",
];

/// One optional comparator per kind; kinds without one use [`default_compare`].
#[derive(Default, Clone)]
pub struct ComparatorRegistry {
    pub(super) config_maps: Option<CompareFn<ConfigMap>>,
    pub(super) image_streams: Option<CompareFn<ImageStream>>,
    pub(super) kafka_topics: Option<CompareFn<KafkaTopic>>,
    pub(super) deployments: Option<CompareFn<Deployment>>,
    pub(super) services: Option<CompareFn<Service>>,
    pub(super) routes: Option<CompareFn<Route>>,
    pub(super) service_monitors: Option<CompareFn<ServiceMonitor>>,
}

impl ComparatorRegistry {
    pub fn new() -> Self {
        ComparatorRegistry::default()
    }

    /// Registers `compare` for `K`, replacing any earlier registration.
    pub fn register<K: ChildResource>(&mut self, compare: CompareFn<K>) -> &mut Self {
        *K::comparator_slot(self) = Some(compare);
        self
    }

    pub fn is_registered<K: ChildResource>(&self) -> bool {
        K::comparator(self).is_some()
    }

    pub fn compare<K: ChildResource>(&self, deployed: &K, requested: &K) -> bool {
        match K::comparator(self) {
            Some(compare) => compare(deployed, requested),
            None => default_compare(deployed, requested),
        }
    }
}

/// Combines custom predicates with the structural comparison.
pub struct ComparatorBuilder<K> {
    predicates: Vec<CompareFn<K>>,
    structural: bool,
}

impl<K: ChildResource> Default for ComparatorBuilder<K> {
    fn default() -> Self {
        ComparatorBuilder {
            predicates: Vec::new(),
            structural: false,
        }
    }
}

impl<K: ChildResource> ComparatorBuilder<K> {
    pub fn new() -> Self {
        ComparatorBuilder::default()
    }

    pub fn with_custom(mut self, predicate: impl Fn(&K, &K) -> bool + Send + Sync + 'static) -> Self {
        self.predicates.push(Arc::new(predicate));
        self
    }

    /// Also require the structural comparison to hold.
    pub fn use_default_comparator(mut self) -> Self {
        self.structural = true;
        self
    }

    /// With no predicates at all the structural comparison is used alone.
    pub fn build(self) -> CompareFn<K> {
        let structural = self.structural || self.predicates.is_empty();
        let predicates = self.predicates;
        Arc::new(move |deployed: &K, requested: &K| {
            predicates.iter().all(|p| p(deployed, requested))
                && (!structural || default_compare(deployed, requested))
        })
    }
}

/// Structural comparison of the serialized objects.
///
/// Every field set on `requested` must be present and equal on `deployed`.
/// Fields only the server writes (status, resourceVersion, uid...) are
/// ignored, and a requested null or empty value matches a missing one. An
/// object that fails to serialize counts as equal so it is never rewritten
/// in a loop.
pub fn default_compare<K: Serialize>(deployed: &K, requested: &K) -> bool {
    let (mut deployed, mut requested) = match (serde_json::to_value(deployed), serde_json::to_value(requested)) {
        (Ok(deployed), Ok(requested)) => (deployed, requested),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Failed to serialize object for comparison: {}", e);
            return true;
        }
    };
    strip_server_fields(&mut deployed);
    strip_server_fields(&mut requested);
    normalize_quantities(&mut deployed);
    normalize_quantities(&mut requested);
    is_subset(&requested, &deployed)
}

fn strip_server_fields(value: &mut Value) {
    if let Some(obj) = value.as_object_mut() {
        obj.remove("status");
        if let Some(metadata) = obj.get_mut("metadata").and_then(Value::as_object_mut) {
            for field in SERVER_METADATA_FIELDS {
                metadata.remove(field);
            }
        }
    }
}

/// Rewrites resource quantities under `resources.limits` and
/// `resources.requests` to one canonical form, since the API server stores
/// `0.5` as `500m` and `1000m` as `1`.
fn normalize_quantities(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key == "resources" {
                    for bound in ["limits", "requests"] {
                        let Some(quantities) = child.get_mut(bound).and_then(Value::as_object_mut) else {
                            continue;
                        };
                        for quantity in quantities.values_mut() {
                            if let Some(amount) = quantity.as_str().and_then(parse_quantity) {
                                *quantity = Value::String(amount.to_string());
                            }
                        }
                    }
                }
                normalize_quantities(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_quantities),
        _ => {}
    }
}

/// Parses a Kubernetes quantity such as `500m`, `1.5Gi` or `1e3`.
fn parse_quantity(quantity: &str) -> Option<f64> {
    let quantity = quantity.trim();
    let split = quantity
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(quantity.len());
    let (number, suffix) = quantity.split_at(split);
    let number: f64 = number.parse().ok()?;
    let amount = match suffix {
        "" => number,
        "m" => number / 1000.0,
        "k" => number * 1e3,
        "M" => number * 1e6,
        "G" => number * 1e9,
        "T" => number * 1e12,
        "P" => number * 1e15,
        "E" => number * 1e18,
        "Ki" => number * 1024f64,
        "Mi" => number * 1024f64.powi(2),
        "Gi" => number * 1024f64.powi(3),
        "Ti" => number * 1024f64.powi(4),
        "Pi" => number * 1024f64.powi(5),
        "Ei" => number * 1024f64.powi(6),
        exponent if exponent.starts_with(['e', 'E']) => {
            let exponent: i32 = exponent[1..].parse().ok()?;
            number * 10f64.powi(exponent)
        }
        _ => return None,
    };
    Some(amount)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn is_subset(requested: &Value, deployed: &Value) -> bool {
    match (requested, deployed) {
        (Value::Null, _) => true,
        (Value::Object(requested), Value::Object(deployed)) => requested.iter().all(|(key, value)| {
            match deployed.get(key) {
                Some(deployed_value) => is_subset(value, deployed_value),
                None => is_empty(value),
            }
        }),
        (Value::Array(requested), Value::Array(deployed)) => {
            requested.len() == deployed.len()
                && requested
                    .iter()
                    .zip(deployed.iter())
                    .all(|(r, d)| is_subset(r, d))
        }
        (requested, Value::Null) => is_empty(requested),
        (requested, deployed) => requested == deployed,
    }
}
