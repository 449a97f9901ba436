//! In-memory [`ResourceClient`] used by unit tests.
//!
//! Objects are stored as JSON keyed by kind, namespace and name. Every write
//! is recorded so tests can assert on the exact calls made against the API.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use kube::api::DynamicObject;
use serde_json::{json, Value};

use super::{object_key, KubeObject, ResourceClient};
use crate::util::errors::{Error, Result, StdError};

type Key = (String, String, String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: &'static str,
    pub kind: String,
    pub name: String,
}

#[derive(Default)]
pub struct FakeClient {
    objects: Mutex<BTreeMap<Key, Value>>,
    calls: Mutex<Vec<Call>>,
    apis: Mutex<BTreeSet<(String, String)>>,
    failures: Mutex<BTreeSet<(&'static str, String)>>,
}

fn fake_error(message: String) -> Error {
    Error::StdError(StdError::HttpError(message))
}

fn resource_version(value: &Value) -> Option<&str> {
    value.pointer("/metadata/resourceVersion").and_then(Value::as_str)
}

fn bump_resource_version(value: &mut Value, previous: Option<&str>) {
    let next = previous
        .and_then(|rv| rv.parse::<u64>().ok())
        .map_or(1, |rv| rv + 1);
    value["metadata"]["resourceVersion"] = json!(next.to_string());
}

fn labels_match(value: &Value, labels: &BTreeMap<String, String>) -> bool {
    labels.iter().all(|(k, v)| {
        value
            .pointer("/metadata/labels")
            .and_then(|l| l.get(k))
            .and_then(Value::as_str)
            == Some(v.as_str())
    })
}

impl FakeClient {
    pub fn new() -> Self {
        FakeClient::default()
    }

    /// Declares an API as served, for `has_api` and `fetch_dynamic`.
    pub fn with_api(self, api_version: &str, kind: &str) -> Self {
        self.apis
            .lock()
            .unwrap()
            .insert((api_version.to_string(), kind.to_string()));
        self
    }

    /// Makes every `operation` on `kind` fail.
    pub fn fail_on(&self, operation: &'static str, kind: &str) {
        self.failures.lock().unwrap().insert((operation, kind.to_string()));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Stores an object as-is, bypassing call recording.
    pub fn seed<K: KubeObject>(&self, obj: K) -> K {
        let (namespace, name) = object_key(&obj).unwrap();
        let mut value = serde_json::to_value(&obj).unwrap();
        if resource_version(&value).is_none() {
            bump_resource_version(&mut value, None);
        }
        if value.pointer("/metadata/uid").is_none() {
            value["metadata"]["uid"] = json!(format!("{name}-uid"));
        }
        let key = (K::kind(&()).to_string(), namespace, name);
        self.objects.lock().unwrap().insert(key, value.clone());
        serde_json::from_value(value).unwrap()
    }

    /// Stores an object of a kind that has no typed counterpart.
    pub fn seed_dynamic(&self, value: Value) {
        let kind = value["kind"].as_str().unwrap().to_string();
        let namespace = value["metadata"]["namespace"].as_str().unwrap().to_string();
        let name = value["metadata"]["name"].as_str().unwrap().to_string();
        self.objects.lock().unwrap().insert((kind, namespace, name), value);
    }

    pub fn get<K: KubeObject>(&self, namespace: &str, name: &str) -> Option<K> {
        let key = (K::kind(&()).to_string(), namespace.to_string(), name.to_string());
        self.objects
            .lock()
            .unwrap()
            .get(&key)
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    pub fn all<K: KubeObject>(&self) -> Vec<K> {
        let kind = K::kind(&()).to_string();
        self.objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((k, _, _), _)| *k == kind)
            .map(|(_, v)| serde_json::from_value(v.clone()).unwrap())
            .collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded writes, ignoring reads and status updates.
    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c.operation, "create" | "update" | "delete"))
            .collect()
    }

    pub fn count(&self, operation: &str, kind: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation && c.kind == kind)
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, operation: &'static str, kind: &str, name: &str) -> Result<()> {
        self.calls.lock().unwrap().push(Call {
            operation,
            kind: kind.to_string(),
            name: name.to_string(),
        });
        if self.failures.lock().unwrap().contains(&(operation, kind.to_string())) {
            return Err(fake_error(format!("injected failure: {operation} {kind} '{name}'")));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceClient for FakeClient {
    async fn fetch<K: KubeObject>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        self.record("get", &K::kind(&()), name)?;
        let key = (K::kind(&()).to_string(), namespace.to_string(), name.to_string());
        let value = self.objects.lock().unwrap().get(&key).cloned();
        Ok(value.map(serde_json::from_value).transpose()?)
    }

    async fn list_with_labels<K: KubeObject>(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<K>> {
        let kind = K::kind(&()).to_string();
        self.record("list", &kind, "")?;
        let values: Vec<Value> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((k, ns, _), v)| *k == kind && ns == namespace && labels_match(v, labels))
            .map(|(_, v)| v.clone())
            .collect();
        Ok(values
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<K>, _>>()?)
    }

    async fn create<K: KubeObject>(&self, obj: &K) -> Result<K> {
        let (namespace, name) = object_key(obj)?;
        let kind = K::kind(&()).to_string();
        self.record("create", &kind, &name)?;
        let key = (kind.clone(), namespace, name.clone());
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(fake_error(format!("409 AlreadyExists: {kind} '{name}'")));
        }
        let mut value = serde_json::to_value(obj)?;
        bump_resource_version(&mut value, None);
        value["metadata"]["uid"] = json!(format!("{name}-uid"));
        objects.insert(key, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    async fn update<K: KubeObject>(&self, obj: &K) -> Result<K> {
        let (namespace, name) = object_key(obj)?;
        let kind = K::kind(&()).to_string();
        self.record("update", &kind, &name)?;
        let key = (kind.clone(), namespace, name.clone());
        let mut objects = self.objects.lock().unwrap();
        let Some(stored) = objects.get(&key) else {
            return Err(fake_error(format!("404 NotFound: {kind} '{name}'")));
        };
        let mut value = serde_json::to_value(obj)?;
        let stored_rv = resource_version(stored).map(str::to_string);
        if let Some(rv) = resource_version(&value) {
            if Some(rv) != stored_rv.as_deref() {
                return Err(fake_error(format!("409 Conflict: {kind} '{name}'")));
            }
        }
        // status is a subresource and survives a replace
        match stored.get("status").cloned() {
            Some(status) => value["status"] = status,
            None => {
                if let Some(map) = value.as_object_mut() {
                    map.remove("status");
                }
            }
        }
        if let Some(uid) = stored.pointer("/metadata/uid").cloned() {
            value["metadata"]["uid"] = uid;
        }
        bump_resource_version(&mut value, stored_rv.as_deref());
        objects.insert(key, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    async fn update_status<K: KubeObject>(&self, obj: &K) -> Result<()> {
        let (namespace, name) = object_key(obj)?;
        let kind = K::kind(&()).to_string();
        self.record("update_status", &kind, &name)?;
        let key = (kind.clone(), namespace, name.clone());
        let mut objects = self.objects.lock().unwrap();
        let Some(stored) = objects.get_mut(&key) else {
            return Err(fake_error(format!("404 NotFound: {kind} '{name}'")));
        };
        let status = serde_json::to_value(obj)?
            .get("status")
            .cloned()
            .unwrap_or(Value::Null);
        stored["status"] = status;
        let previous = resource_version(stored).map(str::to_string);
        bump_resource_version(stored, previous.as_deref());
        Ok(())
    }

    async fn delete<K: KubeObject>(&self, obj: &K) -> Result<()> {
        let (namespace, name) = object_key(obj)?;
        let kind = K::kind(&()).to_string();
        self.record("delete", &kind, &name)?;
        self.objects.lock().unwrap().remove(&(kind, namespace, name));
        Ok(())
    }

    async fn fetch_dynamic(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        if !self.has_api(api_version, kind).await? {
            return Err(Error::api_not_available(api_version, kind));
        }
        self.record("get", kind, name)?;
        let key = (kind.to_string(), namespace.to_string(), name.to_string());
        let value = self.objects.lock().unwrap().get(&key).cloned();
        Ok(value.map(serde_json::from_value).transpose()?)
    }

    async fn has_api(&self, api_version: &str, kind: &str) -> Result<bool> {
        Ok(self
            .apis
            .lock()
            .unwrap()
            .contains(&(api_version.to_string(), kind.to_string())))
    }
}
