//! Facade over the cluster API used by every reconciler.
//!
//! "Not found" never surfaces as an error: fetches return `Ok(None)` and
//! capability checks return `Ok(false)`.

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::DynamicObject;
use kube::{Resource, ResourceExt};
use serde::{de::DeserializeOwned, Serialize};

use crate::util::errors::{Error, Result, StdError};

mod kube_client;
pub use kube_client::KubeClient;

#[cfg(test)]
pub mod fake;

/// Field manager used for every write issued by the operator.
pub const FIELD_MANAGER: &str = "kogito-operator";

/// Any namespaced object the facade can read and write.
pub trait KubeObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> KubeObject for T where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn fetch<K: KubeObject>(&self, namespace: &str, name: &str) -> Result<Option<K>>;

    async fn list_with_labels<K: KubeObject>(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<K>>;

    async fn list<K: KubeObject>(&self, namespace: &str) -> Result<Vec<K>> {
        self.list_with_labels(namespace, &BTreeMap::new()).await
    }

    async fn create<K: KubeObject>(&self, obj: &K) -> Result<K>;

    /// Replaces the object; `resourceVersion` must match the stored one.
    async fn update<K: KubeObject>(&self, obj: &K) -> Result<K>;

    /// Writes only the `status` of the object.
    async fn update_status<K: KubeObject>(&self, obj: &K) -> Result<()>;

    /// Deleting an object that is already gone succeeds.
    async fn delete<K: KubeObject>(&self, obj: &K) -> Result<()>;

    /// Fetches an object of a kind only known at runtime.
    ///
    /// Fails with `ResourceApiNotAvailable` when the kind is not served.
    async fn fetch_dynamic(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>>;

    /// Whether the cluster serves `kind` in `api_version`.
    async fn has_api(&self, api_version: &str, kind: &str) -> Result<bool>;
}

/// Splits `group/version` (or a bare core `version`).
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    api_version.split_once('/').unwrap_or(("", api_version))
}

/// Namespace and name of an object about to be written.
pub fn object_key<K: Resource>(obj: &K) -> Result<(String, String)> {
    let name = obj
        .meta()
        .name
        .clone()
        .ok_or_else(|| Error::StdError(StdError::MetadataMissing("object has no name".to_string())))?;
    let namespace = obj.namespace().ok_or_else(|| {
        Error::StdError(StdError::MetadataMissing(format!("object '{name}' has no namespace")))
    })?;
    Ok((namespace, name))
}
