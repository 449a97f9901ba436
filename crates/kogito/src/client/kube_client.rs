use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::core::GroupVersionKind;
use kube::{discovery, Client, ResourceExt};
use serde_json::json;
use tracing::*;

use super::{object_key, split_api_version, KubeObject, ResourceClient, FIELD_MANAGER};
use crate::util::errors::{Error, Result};

#[derive(Clone)]
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    pub fn new(client: Client) -> Self {
        KubeClient { client }
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    fn api<K: KubeObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }
}

fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn is_not_found(e: &kube::Error) -> bool {
    matches!(e, kube::Error::Api(api_err) if api_err.code == 404)
}

#[async_trait]
impl ResourceClient for KubeClient {
    async fn fetch<K: KubeObject>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }

    async fn list_with_labels<K: KubeObject>(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<K>> {
        let mut params = ListParams::default();
        if !labels.is_empty() {
            params = params.labels(&label_selector(labels));
        }
        let list = self.api::<K>(namespace).list(&params).await?;
        Ok(list.items)
    }

    async fn create<K: KubeObject>(&self, obj: &K) -> Result<K> {
        let (namespace, name) = object_key(obj)?;
        debug!("Creating {} {}/{}", K::kind(&()), namespace, name);
        Ok(self.api::<K>(&namespace).create(&Self::post_params(), obj).await?)
    }

    async fn update<K: KubeObject>(&self, obj: &K) -> Result<K> {
        let (namespace, name) = object_key(obj)?;
        debug!("Replacing {} {}/{}", K::kind(&()), namespace, name);
        Ok(self
            .api::<K>(&namespace)
            .replace(&name, &Self::post_params(), obj)
            .await?)
    }

    async fn update_status<K: KubeObject>(&self, obj: &K) -> Result<()> {
        let (namespace, name) = object_key(obj)?;
        let value = serde_json::to_value(obj)?;
        let patch = json!({ "status": value.get("status").cloned().unwrap_or_default() });
        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.api::<K>(&namespace)
            .patch_status(&name, &params, &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn delete<K: KubeObject>(&self, obj: &K) -> Result<()> {
        let (namespace, name) = object_key(obj)?;
        debug!("Deleting {} {}/{}", K::kind(&()), namespace, name);
        match self
            .api::<K>(&namespace)
            .delete(&name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_dynamic(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        let (group, version) = split_api_version(api_version);
        let gvk = GroupVersionKind::gvk(group, version, kind);
        let (resource, _) = match discovery::pinned_kind(&self.client, &gvk).await {
            Ok(found) => found,
            Err(kube::Error::Discovery(_)) => return Err(Error::api_not_available(api_version, kind)),
            Err(e) if is_not_found(&e) => return Err(Error::api_not_available(api_version, kind)),
            Err(e) => return Err(e.into()),
        };
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &resource);
        let obj = api.get_opt(name).await?;
        if let Some(obj) = &obj {
            trace!("Fetched {} {}/{}", kind, namespace, obj.name_any());
        }
        Ok(obj)
    }

    async fn has_api(&self, api_version: &str, kind: &str) -> Result<bool> {
        let (group, version) = split_api_version(api_version);
        let gvk = GroupVersionKind::gvk(group, version, kind);
        match discovery::pinned_kind(&self.client, &gvk).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Discovery(_)) => Ok(false),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_selector() {
        let labels = BTreeMap::from([
            ("app".to_string(), "example".to_string()),
            ("app.kiegroup.org/service".to_string(), "example".to_string()),
        ]);
        assert_eq!(label_selector(&labels), "app=example,app.kiegroup.org/service=example");
    }
}
