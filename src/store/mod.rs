//! # Cluster Store
//!
//! The boundary between reconciliation logic and the Kubernetes API.
//!
//! - `ObjectStore` - object-safe async trait over untyped JSON objects
//! - `Cluster` - typed facade used by actions, honouring the invocation's cancellation
//! - `KubeStore` - implementation backed by a `kube::Client`
//! - `MemoryStore` - in-process implementation for tests and local runs

mod api;
mod kind;
mod memory;

pub use api::KubeStore;
pub use kind::{ClusterObject, ObjectKey, ObjectKind};
pub use memory::MemoryStore;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::composed::ActionContext;

/// Errors raised by the object store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    #[error("conflict writing {kind} {name}: {message}")]
    Conflict {
        kind: String,
        name: String,
        message: String,
    },

    #[error("API error {code} for {kind} {name}: {message}")]
    Api {
        code: u16,
        kind: String,
        name: String,
        message: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to convert object: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("kubernetes client error: {0}")]
    Client(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Build the error the API server would return for `code`
    pub fn from_code(code: u16, kind: &ObjectKind, name: &str, message: impl Into<String>) -> Self {
        let kind = kind.group_kind();
        let name = name.to_string();
        match code {
            404 => Self::NotFound { kind, name },
            409 => Self::Conflict {
                kind,
                name,
                message: message.into(),
            },
            code => Self::Api {
                code,
                kind,
                name,
                message: message.into(),
            },
        }
    }
}

/// Patch sent to the main resource of an object
#[derive(Debug, Clone)]
pub enum ObjectPatch {
    /// RFC 7386 JSON merge patch
    Merge(Value),
    /// RFC 6902 JSON patch
    Json(json_patch::Patch),
}

/// Untyped read/write access to cluster objects
///
/// `namespace` is `None` for cluster-scoped kinds and for listing across all
/// namespaces. Objects are full JSON documents including `apiVersion`, `kind`,
/// and `metadata`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object; `Ok(None)` when it does not exist
    async fn get(
        &self,
        kind: &ObjectKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>, StoreError>;

    async fn list(&self, kind: &ObjectKind, namespace: Option<&str>) -> Result<Vec<Value>, StoreError>;

    async fn create(&self, kind: &ObjectKind, obj: &Value) -> Result<Value, StoreError>;

    /// Replace the object, spec and metadata; the status is left as stored
    async fn update(&self, kind: &ObjectKind, obj: &Value) -> Result<Value, StoreError>;

    /// Write only the status subresource of `obj`
    async fn update_status(&self, kind: &ObjectKind, obj: &Value) -> Result<Value, StoreError>;

    /// Patch spec and metadata; the status is left as stored
    async fn patch(
        &self,
        kind: &ObjectKind,
        namespace: Option<&str>,
        name: &str,
        patch: &ObjectPatch,
    ) -> Result<Value, StoreError>;

    /// Delete the object; deleting a missing object succeeds
    async fn delete(&self, kind: &ObjectKind, namespace: Option<&str>, name: &str) -> Result<(), StoreError>;
}

/// Typed access to the cluster for actions
///
/// Every call races against the invocation's cancellation token and fails with
/// `StoreError::Cancelled` once it fires.
#[derive(Clone)]
pub struct Cluster {
    store: Arc<dyn ObjectStore>,
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster").finish_non_exhaustive()
    }
}

impl Cluster {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub async fn get<K: ClusterObject>(
        &self,
        ctx: &ActionContext,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<K>, StoreError> {
        let kind = ObjectKind::of::<K>();
        let value = ctx
            .cancellable(self.store.get(&kind, namespace, name))
            .await?;
        value.map(from_value).transpose()
    }

    pub async fn list<K: ClusterObject>(
        &self,
        ctx: &ActionContext,
        namespace: Option<&str>,
    ) -> Result<Vec<K>, StoreError> {
        let kind = ObjectKind::of::<K>();
        let values = ctx.cancellable(self.store.list(&kind, namespace)).await?;
        values.into_iter().map(from_value).collect()
    }

    pub async fn create<K: ClusterObject>(&self, ctx: &ActionContext, obj: &K) -> Result<K, StoreError> {
        let kind = ObjectKind::of::<K>();
        let value = to_value(&kind, obj)?;
        from_value(ctx.cancellable(self.store.create(&kind, &value)).await?)
    }

    pub async fn update<K: ClusterObject>(&self, ctx: &ActionContext, obj: &K) -> Result<K, StoreError> {
        let kind = ObjectKind::of::<K>();
        let value = to_value(&kind, obj)?;
        from_value(ctx.cancellable(self.store.update(&kind, &value)).await?)
    }

    pub async fn update_status<K: ClusterObject>(
        &self,
        ctx: &ActionContext,
        obj: &K,
    ) -> Result<K, StoreError> {
        let kind = ObjectKind::of::<K>();
        let value = to_value(&kind, obj)?;
        from_value(ctx.cancellable(self.store.update_status(&kind, &value)).await?)
    }

    pub async fn patch<K: ClusterObject>(
        &self,
        ctx: &ActionContext,
        namespace: Option<&str>,
        name: &str,
        patch: &ObjectPatch,
    ) -> Result<K, StoreError> {
        let kind = ObjectKind::of::<K>();
        from_value(
            ctx.cancellable(self.store.patch(&kind, namespace, name, patch))
                .await?,
        )
    }

    pub async fn delete<K: ClusterObject>(
        &self,
        ctx: &ActionContext,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        let kind = ObjectKind::of::<K>();
        ctx.cancellable(self.store.delete(&kind, namespace, name))
            .await
    }
}

fn from_value<K: DeserializeOwned>(value: Value) -> Result<K, StoreError> {
    Ok(serde_json::from_value(value)?)
}

/// Serialize a typed object, making sure `apiVersion` and `kind` are present
fn to_value<K: ClusterObject>(kind: &ObjectKind, obj: &K) -> Result<Value, StoreError> {
    let mut value = serde_json::to_value(obj)?;
    if let Value::Object(map) = &mut value {
        map.entry("apiVersion")
            .or_insert_with(|| Value::String(kind.api_version()));
        map.entry("kind")
            .or_insert_with(|| Value::String(kind.kind.clone()));
    }
    Ok(value)
}
