//! # In-Memory Store
//!
//! `ObjectStore` kept in process memory. It follows the API server's write rules
//! closely enough for reconciliation tests:
//!
//! - every effective write bumps `metadata.resourceVersion`
//! - a write carrying a stale `resourceVersion` fails with a conflict
//! - `metadata.generation` moves only when `spec` changes
//! - status writes touch nothing but `status`
//! - deleting an object with finalizers only sets `metadata.deletionTimestamp`;
//!   it goes away once the last finalizer is removed

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::{Cluster, ClusterObject, ObjectKind, ObjectPatch, ObjectStore, StoreError};

type StoreKey = (String, String, String);

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<StoreKey, Value>,
    last_resource_version: u64,
    status_updates: usize,
    fail_next_get: Option<u16>,
    fail_next_status_update: Option<u16>,
}

impl Inner {
    fn next_resource_version(&mut self) -> String {
        self.last_resource_version += 1;
        self.last_resource_version.to_string()
    }

    /// Store a new revision of a main resource
    ///
    /// A write that changes nothing keeps the stored revision. An object being
    /// deleted is dropped once its last finalizer is gone.
    fn write(&mut self, key: StoreKey, stored: &Value, mut value: Value) -> Value {
        set_meta(&mut value, "resourceVersion", stored["metadata"]["resourceVersion"].clone());
        set_meta(&mut value, "generation", stored["metadata"]["generation"].clone());
        if value == *stored {
            return value;
        }

        let mut generation = generation(stored);
        if value.get("spec") != stored.get("spec") {
            generation += 1;
        }
        set_meta(&mut value, "generation", Value::from(generation));
        let rv = self.next_resource_version();
        set_meta(&mut value, "resourceVersion", Value::String(rv));

        if is_deleting(&value) && !has_finalizers(&value) {
            self.objects.remove(&key);
        } else {
            self.objects.insert(key, value.clone());
        }
        value
    }
}

/// Object store held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn store_key(kind: &ObjectKind, namespace: Option<&str>, name: &str) -> StoreKey {
    (
        kind.group_kind(),
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

fn object_key(kind: &ObjectKind, obj: &Value) -> StoreKey {
    let namespace = obj.pointer("/metadata/namespace").and_then(Value::as_str);
    let name = obj
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    store_key(kind, namespace, name)
}

fn metadata_mut(obj: &mut Value) -> Option<&mut Map<String, Value>> {
    let map = obj.as_object_mut()?;
    map.entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

fn resource_version(obj: &Value) -> Option<&str> {
    obj.pointer("/metadata/resourceVersion")
        .and_then(Value::as_str)
}

fn generation(obj: &Value) -> i64 {
    obj.pointer("/metadata/generation")
        .and_then(Value::as_i64)
        .unwrap_or(1)
}

fn set_meta(obj: &mut Value, key: &str, value: Value) {
    if let Some(meta) = metadata_mut(obj) {
        meta.insert(key.to_string(), value);
    }
}

fn has_finalizers(obj: &Value) -> bool {
    obj.pointer("/metadata/finalizers")
        .and_then(Value::as_array)
        .is_some_and(|f| !f.is_empty())
}

fn is_deleting(obj: &Value) -> bool {
    obj.pointer("/metadata/deletionTimestamp")
        .is_some_and(|ts| !ts.is_null())
}

/// Keep the stored status on a write to the main resource
fn keep_status(value: &mut Value, stored: &Value) {
    if let Value::Object(map) = value {
        match stored.get("status") {
            Some(status) => map.insert("status".to_string(), status.clone()),
            None => map.remove("status"),
        };
    }
}

fn check_resource_version(
    kind: &ObjectKind,
    (_, _, name): &StoreKey,
    stored: &Value,
    incoming: &Value,
) -> Result<(), StoreError> {
    match resource_version(incoming) {
        Some(rv) if Some(rv) != resource_version(stored) => Err(StoreError::from_code(
            409,
            kind,
            name,
            "the object has been modified; please apply your changes to the latest version",
        )),
        _ => Ok(()),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cluster handle backed by this store
    pub fn cluster(self: &Arc<Self>) -> Cluster {
        let store: Arc<dyn ObjectStore> = Arc::<Self>::clone(self);
        Cluster::new(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Client(format!("memory store lock poisoned: {e}")))
    }

    /// Seed an object as if it had been created through the API
    pub fn insert<K: ClusterObject>(&self, obj: &K) -> Result<K, StoreError> {
        let kind = ObjectKind::of::<K>();
        let mut value = serde_json::to_value(obj)?;
        if let Value::Object(map) = &mut value {
            map.insert("apiVersion".to_string(), Value::String(kind.api_version()));
            map.insert("kind".to_string(), Value::String(kind.kind.clone()));
        }
        let mut inner = self.lock()?;
        let rv = inner.next_resource_version();
        set_meta(&mut value, "resourceVersion", Value::String(rv));
        let generation = generation(&value);
        set_meta(&mut value, "generation", Value::from(generation));
        inner.objects.insert(object_key(&kind, &value), value.clone());
        Ok(serde_json::from_value(value)?)
    }

    /// Current stored copy of an object
    pub fn get_object<K: ClusterObject>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        let kind = ObjectKind::of::<K>();
        let inner = self.lock().ok()?;
        let value = inner.objects.get(&store_key(&kind, namespace, name))?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Drop an object without going through `delete`
    pub fn remove<K: ClusterObject>(&self, namespace: Option<&str>, name: &str) {
        let kind = ObjectKind::of::<K>();
        if let Ok(mut inner) = self.lock() {
            inner.objects.remove(&store_key(&kind, namespace, name));
        }
    }

    /// Number of status writes received, successful or not
    pub fn status_update_count(&self) -> usize {
        self.lock().map(|i| i.status_updates).unwrap_or_default()
    }

    /// Make the next `get` fail with the given HTTP status code
    pub fn fail_next_get(&self, code: u16) {
        if let Ok(mut inner) = self.lock() {
            inner.fail_next_get = Some(code);
        }
    }

    /// Make the next `update_status` fail with the given HTTP status code
    pub fn fail_next_status_update(&self, code: u16) {
        if let Ok(mut inner) = self.lock() {
            inner.fail_next_status_update = Some(code);
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(
        &self,
        kind: &ObjectKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>, StoreError> {
        let mut inner = self.lock()?;
        if let Some(code) = inner.fail_next_get.take() {
            return Err(StoreError::from_code(code, kind, name, "injected failure"));
        }
        Ok(inner
            .objects
            .get(&store_key(kind, namespace, name))
            .cloned())
    }

    async fn list(&self, kind: &ObjectKind, namespace: Option<&str>) -> Result<Vec<Value>, StoreError> {
        let group_kind = kind.group_kind();
        let inner = self.lock()?;
        Ok(inner
            .objects
            .iter()
            .filter(|((gk, ns, _), _)| {
                *gk == group_kind && namespace.is_none_or(|wanted| wanted == ns)
            })
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn create(&self, kind: &ObjectKind, obj: &Value) -> Result<Value, StoreError> {
        let key = object_key(kind, obj);
        let mut inner = self.lock()?;
        if inner.objects.contains_key(&key) {
            return Err(StoreError::from_code(409, kind, &key.2, "already exists"));
        }
        let mut value = obj.clone();
        let rv = inner.next_resource_version();
        set_meta(&mut value, "resourceVersion", Value::String(rv));
        set_meta(&mut value, "generation", Value::from(1));
        inner.objects.insert(key, value.clone());
        Ok(value)
    }

    async fn update(&self, kind: &ObjectKind, obj: &Value) -> Result<Value, StoreError> {
        let key = object_key(kind, obj);
        let mut inner = self.lock()?;
        let Some(stored) = inner.objects.get(&key).cloned() else {
            return Err(StoreError::from_code(404, kind, &key.2, "not found"));
        };
        check_resource_version(kind, &key, &stored, obj)?;

        let mut value = obj.clone();
        keep_status(&mut value, &stored);
        Ok(inner.write(key, &stored, value))
    }

    async fn update_status(&self, kind: &ObjectKind, obj: &Value) -> Result<Value, StoreError> {
        let key = object_key(kind, obj);
        let mut inner = self.lock()?;
        inner.status_updates += 1;
        if let Some(code) = inner.fail_next_status_update.take() {
            return Err(StoreError::from_code(code, kind, &key.2, "injected failure"));
        }
        let Some(mut stored) = inner.objects.get(&key).cloned() else {
            return Err(StoreError::from_code(404, kind, &key.2, "not found"));
        };
        check_resource_version(kind, &key, &stored, obj)?;

        let status = obj.get("status").cloned().unwrap_or(Value::Null);
        if stored.get("status") == Some(&status) {
            return Ok(stored);
        }
        if let Value::Object(map) = &mut stored {
            map.insert("status".to_string(), status);
        }
        let rv = inner.next_resource_version();
        set_meta(&mut stored, "resourceVersion", Value::String(rv));
        inner.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn patch(
        &self,
        kind: &ObjectKind,
        namespace: Option<&str>,
        name: &str,
        patch: &ObjectPatch,
    ) -> Result<Value, StoreError> {
        let key = store_key(kind, namespace, name);
        let mut inner = self.lock()?;
        let Some(stored) = inner.objects.get(&key).cloned() else {
            return Err(StoreError::from_code(404, kind, name, "not found"));
        };

        let mut value = stored.clone();
        match patch {
            ObjectPatch::Merge(merge) => {
                check_resource_version(kind, &key, &stored, merge)?;
                json_patch::merge(&mut value, merge);
            }
            ObjectPatch::Json(ops) => {
                json_patch::patch(&mut value, &ops.0)
                    .map_err(|e| StoreError::from_code(422, kind, name, e.to_string()))?;
            }
        }
        keep_status(&mut value, &stored);
        Ok(inner.write(key, &stored, value))
    }

    async fn delete(&self, kind: &ObjectKind, namespace: Option<&str>, name: &str) -> Result<(), StoreError> {
        let key = store_key(kind, namespace, name);
        let mut inner = self.lock()?;
        let Some(stored) = inner.objects.get(&key).cloned() else {
            return Ok(());
        };
        if !has_finalizers(&stored) {
            inner.objects.remove(&key);
            return Ok(());
        }
        if !is_deleting(&stored) {
            let mut value = stored.clone();
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
            set_meta(&mut value, "deletionTimestamp", Value::String(now));
            inner.write(key, &stored, value);
        }
        Ok(())
    }
}
