use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::ResourceExt;
use tracing::*;

use super::comparator::ComparatorRegistry;
use super::kind::{ChildResource, ResourceKind, ResourceSet};
use crate::api::external::{ImageStream, KafkaTopic, Route, ServiceMonitor};
use crate::client::ResourceClient;
use crate::util::errors::{Error, Result, StdError};

/// Writes needed to take the deployed objects of one kind to the requested ones.
#[derive(Debug)]
pub struct Delta<K> {
    pub added: Vec<K>,
    /// `(deployed, requested)` pairs that differ
    pub updated: Vec<(K, K)>,
    pub removed: Vec<K>,
}

impl<K> Default for Delta<K> {
    fn default() -> Self {
        Delta {
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<K> Delta<K> {
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty())
    }
}

/// True when one of `obj`'s owner references points at `owner_uid`.
pub fn is_owned_by<K: ResourceExt>(obj: &K, owner_uid: &str) -> bool {
    obj.owner_references().iter().any(|owner| owner.uid == owner_uid)
}

/// Matches requested and deployed objects by name.
///
/// Deployed objects that were not requested are only removed when the
/// parent owns them; anything else is left alone.
pub fn compute_delta<K: ChildResource>(
    registry: &ComparatorRegistry,
    owner_uid: &str,
    requested: Vec<K>,
    deployed: Vec<K>,
) -> Delta<K> {
    let mut delta = Delta::default();
    let mut deployed: BTreeMap<String, K> = deployed.into_iter().map(|obj| (obj.name_any(), obj)).collect();

    for requested in requested {
        match deployed.remove(&requested.name_any()) {
            None => delta.added.push(requested),
            Some(existing) => {
                if !registry.compare(&existing, &requested) {
                    delta.updated.push((existing, requested));
                }
            }
        }
    }

    for (name, leftover) in deployed {
        if is_owned_by(&leftover, owner_uid) {
            delta.removed.push(leftover);
        } else {
            debug!("Leaving {} '{}' in place, not owned by the parent", K::KIND, name);
        }
    }
    delta
}

fn apply_error<K: ChildResource>(operation: &'static str, obj: &K, error: Error) -> Error {
    let source = match error {
        Error::StdError(e) => e,
        Error::ErrorWithRequeue(e) => e.error,
    };
    Error::StdError(StdError::DeltaApplyError {
        operation,
        kind: K::KIND.to_string(),
        name: obj.name_any(),
        source: Box::new(source),
    })
}

/// Applies the difference between requested and deployed objects.
pub struct DeltaProcessor<'a, C> {
    client: &'a C,
    owner_uid: String,
}

impl<'a, C: ResourceClient> DeltaProcessor<'a, C> {
    pub fn new(client: &'a C, owner_uid: impl Into<String>) -> Self {
        DeltaProcessor {
            client,
            owner_uid: owner_uid.into(),
        }
    }

    /// Processes every kind present in either set, in kind order.
    ///
    /// Within a kind, creates run before updates and updates before
    /// deletes. Processing stops at the first failed write. Returns whether
    /// any write was issued.
    pub async fn process_delta(
        &self,
        registry: &ComparatorRegistry,
        mut requested: ResourceSet,
        mut deployed: ResourceSet,
    ) -> Result<bool> {
        let kinds: Vec<ResourceKind> = requested.kinds().union(&deployed.kinds()).copied().collect();
        let mut changed = false;
        for kind in kinds {
            changed |= match kind {
                ResourceKind::ConfigMap => {
                    self.process_kind::<ConfigMap>(registry, &mut requested, &mut deployed)
                        .await?
                }
                ResourceKind::ImageStream => {
                    self.process_kind::<ImageStream>(registry, &mut requested, &mut deployed)
                        .await?
                }
                ResourceKind::KafkaTopic => {
                    self.process_kind::<KafkaTopic>(registry, &mut requested, &mut deployed)
                        .await?
                }
                ResourceKind::Deployment => {
                    self.process_kind::<Deployment>(registry, &mut requested, &mut deployed)
                        .await?
                }
                ResourceKind::Service => {
                    self.process_kind::<Service>(registry, &mut requested, &mut deployed)
                        .await?
                }
                ResourceKind::Route => {
                    self.process_kind::<Route>(registry, &mut requested, &mut deployed)
                        .await?
                }
                ResourceKind::ServiceMonitor => {
                    self.process_kind::<ServiceMonitor>(registry, &mut requested, &mut deployed)
                        .await?
                }
            };
        }
        Ok(changed)
    }

    async fn process_kind<K: ChildResource>(
        &self,
        registry: &ComparatorRegistry,
        requested: &mut ResourceSet,
        deployed: &mut ResourceSet,
    ) -> Result<bool> {
        let delta = compute_delta(registry, &self.owner_uid, requested.take::<K>(), deployed.take::<K>());
        if !delta.has_changes() {
            trace!("No changes for {}", K::KIND);
            return Ok(false);
        }
        info!(
            "Applying {} changes: {} to create, {} to update, {} to delete",
            K::KIND,
            delta.added.len(),
            delta.updated.len(),
            delta.removed.len()
        );

        for obj in &delta.added {
            self.client
                .create(obj)
                .await
                .map_err(|e| apply_error("create", obj, e))?;
        }
        for (existing, requested) in delta.updated {
            let obj = K::prepare_update(&existing, requested);
            self.client
                .update(&obj)
                .await
                .map_err(|e| apply_error("update", &obj, e))?;
        }
        for obj in &delta.removed {
            self.client
                .delete(obj)
                .await
                .map_err(|e| apply_error("delete", obj, e))?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeClient;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    const OWNER_UID: &str = "parent-uid";

    fn owner() -> OwnerReference {
        OwnerReference {
            api_version: "app.kiegroup.org/v1beta1".to_string(),
            kind: "KogitoRuntime".to_string(),
            name: "parent".to_string(),
            uid: OWNER_UID.to_string(),
            controller: Some(true),
            ..Default::default()
        }
    }

    fn config_map(name: &str, value: &str, owned: bool) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("ns".to_string()),
                owner_references: owned.then(|| vec![owner()]),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("key".to_string(), value.to_string())])),
            ..Default::default()
        }
    }

    #[test]
    fn test_compute_delta_classifies_by_name() {
        let registry = ComparatorRegistry::new();
        let requested = vec![config_map("a", "1", true), config_map("b", "2", true), config_map("c", "3", true)];
        let deployed = vec![
            config_map("b", "2", true),
            config_map("c", "old", true),
            config_map("d", "4", true),
            config_map("e", "5", false),
        ];
        let delta = compute_delta(&registry, OWNER_UID, requested, deployed);
        let names = |items: &[ConfigMap]| items.iter().map(|o| o.name_any()).collect::<Vec<_>>();
        assert_eq!(names(&delta.added), vec!["a"]);
        assert_eq!(delta.updated.len(), 1);
        assert_eq!(delta.updated[0].1.name_any(), "c");
        assert_eq!(names(&delta.removed), vec!["d"]);
    }

    #[tokio::test]
    async fn test_no_changes_issues_no_writes() {
        let client = FakeClient::new();
        let deployed = client.seed(config_map("a", "1", true));
        let processor = DeltaProcessor::new(&client, OWNER_UID);

        let changed = processor
            .process_delta(
                &ComparatorRegistry::new(),
                ResourceSet::new().with(vec![config_map("a", "1", true)]),
                ResourceSet::new().with(vec![deployed]),
            )
            .await
            .unwrap();
        assert!(!changed);
        assert!(client.writes().is_empty());
    }

    #[tokio::test]
    async fn test_one_create_per_added_object() {
        let client = FakeClient::new();
        let processor = DeltaProcessor::new(&client, OWNER_UID);

        let changed = processor
            .process_delta(
                &ComparatorRegistry::new(),
                ResourceSet::new().with(vec![config_map("a", "1", true), config_map("b", "1", true)]),
                ResourceSet::new().with::<ConfigMap>(Vec::new()),
            )
            .await
            .unwrap();
        assert!(changed);
        assert_eq!(client.count("create", "ConfigMap"), 2);
        assert_eq!(client.writes().len(), 2);
        assert!(client.get::<ConfigMap>("ns", "b").is_some());
    }

    #[tokio::test]
    async fn test_update_carries_resource_version() {
        let client = FakeClient::new();
        let deployed = client.seed(config_map("a", "1", true));
        let processor = DeltaProcessor::new(&client, OWNER_UID);

        processor
            .process_delta(
                &ComparatorRegistry::new(),
                ResourceSet::new().with(vec![config_map("a", "2", true)]),
                ResourceSet::new().with(vec![deployed]),
            )
            .await
            .unwrap();
        assert_eq!(client.count("update", "ConfigMap"), 1);
        let stored = client.get::<ConfigMap>("ns", "a").unwrap();
        assert_eq!(stored.data.unwrap()["key"], "2");
        assert_eq!(stored.metadata.resource_version.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_only_owned_objects_are_deleted() {
        let client = FakeClient::new();
        let owned = client.seed(config_map("owned", "1", true));
        let foreign = client.seed(config_map("foreign", "1", false));
        let processor = DeltaProcessor::new(&client, OWNER_UID);

        let changed = processor
            .process_delta(
                &ComparatorRegistry::new(),
                ResourceSet::new().with::<ConfigMap>(Vec::new()),
                ResourceSet::new().with(vec![owned, foreign]),
            )
            .await
            .unwrap();
        assert!(changed);
        assert_eq!(client.count("delete", "ConfigMap"), 1);
        assert!(client.get::<ConfigMap>("ns", "owned").is_none());
        assert!(client.get::<ConfigMap>("ns", "foreign").is_some());
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let client = FakeClient::new();
        let registry = ComparatorRegistry::new();
        let processor = DeltaProcessor::new(&client, OWNER_UID);
        let requested = || ResourceSet::new().with(vec![config_map("a", "1", true), config_map("b", "2", true)]);

        let deployed = ResourceSet::new().with(client.all::<ConfigMap>());
        assert!(processor.process_delta(&registry, requested(), deployed).await.unwrap());

        client.reset_calls();
        let deployed = ResourceSet::new().with(client.all::<ConfigMap>());
        assert!(!processor.process_delta(&registry, requested(), deployed).await.unwrap());
        assert!(client.writes().is_empty());
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let client = FakeClient::new();
        client.fail_on("create", "ConfigMap");
        let processor = DeltaProcessor::new(&client, OWNER_UID);

        let err = processor
            .process_delta(
                &ComparatorRegistry::new(),
                ResourceSet::new()
                    .with(vec![config_map("a", "1", true), config_map("b", "1", true)])
                    .with(vec![Service {
                        metadata: ObjectMeta {
                            name: Some("svc".to_string()),
                            namespace: Some("ns".to_string()),
                            ..Default::default()
                        },
                        ..Default::default()
                    }]),
                ResourceSet::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::StdError(StdError::DeltaApplyError { operation: "create", .. })
        ));
        assert!(err.is_retryable());
        assert_eq!(client.count("create", "ConfigMap"), 1);
        assert_eq!(client.count("create", "Service"), 0);
    }

    #[tokio::test]
    async fn test_adds_run_before_removes() {
        let client = FakeClient::new();
        let old = client.seed(config_map("old", "1", true));
        let processor = DeltaProcessor::new(&client, OWNER_UID);

        processor
            .process_delta(
                &ComparatorRegistry::new(),
                ResourceSet::new().with(vec![config_map("new", "1", true)]),
                ResourceSet::new().with(vec![old]),
            )
            .await
            .unwrap();
        let operations: Vec<_> = client.writes().into_iter().map(|c| c.operation).collect();
        assert_eq!(operations, vec!["create", "delete"]);
    }
}
