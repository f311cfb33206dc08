//! # Kubernetes API Store
//!
//! `ObjectStore` backed by the API server through `Api<DynamicObject>`.

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::{ObjectKind, ObjectPatch, ObjectStore, StoreError};

/// Object store talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    field_manager: String,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api(&self, kind: &ObjectKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(&kind.group, &kind.version, &kind.kind);
        let resource = ApiResource::from_gvk_with_plural(&gvk, &kind.plural);
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }
}

fn map_error(err: kube::Error, kind: &ObjectKind, name: &str) -> StoreError {
    match err {
        kube::Error::Api(resp) => StoreError::from_code(resp.code, kind, name, resp.message),
        other => StoreError::Client(other.to_string()),
    }
}

fn object_name(obj: &Value) -> &str {
    obj.pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn object_namespace(obj: &Value) -> Option<&str> {
    obj.pointer("/metadata/namespace").and_then(Value::as_str)
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(
        &self,
        kind: &ObjectKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>, StoreError> {
        let obj = self
            .api(kind, namespace)
            .get_opt(name)
            .await
            .map_err(|e| map_error(e, kind, name))?;
        obj.map(serde_json::to_value).transpose().map_err(Into::into)
    }

    async fn list(&self, kind: &ObjectKind, namespace: Option<&str>) -> Result<Vec<Value>, StoreError> {
        let list = self
            .api(kind, namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| map_error(e, kind, ""))?;
        list.items
            .into_iter()
            .map(|o| serde_json::to_value(o).map_err(Into::into))
            .collect()
    }

    async fn create(&self, kind: &ObjectKind, obj: &Value) -> Result<Value, StoreError> {
        let name = object_name(obj);
        let dynamic: DynamicObject = serde_json::from_value(obj.clone())?;
        let created = self
            .api(kind, object_namespace(obj))
            .create(&PostParams::default(), &dynamic)
            .await
            .map_err(|e| map_error(e, kind, name))?;
        debug!("Created {} {}", kind, name);
        Ok(serde_json::to_value(created)?)
    }

    async fn update(&self, kind: &ObjectKind, obj: &Value) -> Result<Value, StoreError> {
        let name = object_name(obj);
        let dynamic: DynamicObject = serde_json::from_value(obj.clone())?;
        let updated = self
            .api(kind, object_namespace(obj))
            .replace(name, &PostParams::default(), &dynamic)
            .await
            .map_err(|e| map_error(e, kind, name))?;
        Ok(serde_json::to_value(updated)?)
    }

    async fn update_status(&self, kind: &ObjectKind, obj: &Value) -> Result<Value, StoreError> {
        let name = object_name(obj);
        // Carrying the resourceVersion turns the merge patch into an optimistic write
        let patch = json!({
            "metadata": {
                "resourceVersion": obj.pointer("/metadata/resourceVersion").cloned().unwrap_or(Value::Null),
            },
            "status": obj.get("status").cloned().unwrap_or(Value::Null),
        });
        let updated = self
            .api(kind, object_namespace(obj))
            .patch_status(
                name,
                &PatchParams::apply(&self.field_manager),
                &Patch::Merge(patch),
            )
            .await
            .map_err(|e| map_error(e, kind, name))?;
        Ok(serde_json::to_value(updated)?)
    }

    async fn patch(
        &self,
        kind: &ObjectKind,
        namespace: Option<&str>,
        name: &str,
        patch: &ObjectPatch,
    ) -> Result<Value, StoreError> {
        let params = PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..PatchParams::default()
        };
        let api = self.api(kind, namespace);
        let patched = match patch {
            ObjectPatch::Merge(value) => api.patch(name, &params, &Patch::Merge(value)).await,
            ObjectPatch::Json(ops) => api.patch(name, &params, &Patch::<Value>::Json(ops.clone())).await,
        }
        .map_err(|e| map_error(e, kind, name))?;
        debug!("Patched {} {}", kind, name);
        Ok(serde_json::to_value(patched)?)
    }

    async fn delete(&self, kind: &ObjectKind, namespace: Option<&str>, name: &str) -> Result<(), StoreError> {
        match self
            .api(kind, namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => {
                debug!("{} {} already deleted", kind, name);
                Ok(())
            }
            Err(e) => Err(map_error(e, kind, name)),
        }
    }
}
