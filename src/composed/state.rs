//! # Pipeline State
//!
//! Typed per-invocation state. Each pipeline declares its own state struct; the
//! `ObjectState` capability is what generic actions (status patches, dependency
//! loading, built-in predicates) need from it.

use kube::ResourceExt;

use crate::crd::ObjWithConditions;
use crate::store::{Cluster, ObjectKey};

/// State that owns the object being reconciled and a handle to its cluster
pub trait ObjectState: Send + 'static {
    type Obj: ObjWithConditions;

    fn cluster(&self) -> &Cluster;

    fn obj(&self) -> &Self::Obj;

    /// Replace the object, typically with the copy returned by a write
    fn set_obj(&mut self, obj: Self::Obj);

    fn name(&self) -> String {
        self.obj().name_any()
    }

    fn namespace(&self) -> Option<String> {
        self.obj().namespace()
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::for_object(self.obj())
    }
}

/// Minimal state: the object and the cluster it lives in
#[derive(Debug, Clone)]
pub struct BaseState<K> {
    cluster: Cluster,
    obj: K,
}

impl<K: ObjWithConditions> BaseState<K> {
    pub fn new(cluster: Cluster, obj: K) -> Self {
        Self { cluster, obj }
    }

    pub fn into_obj(self) -> K {
        self.obj
    }
}

impl<K: ObjWithConditions> ObjectState for BaseState<K> {
    type Obj = K;

    fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    fn obj(&self) -> &K {
        &self.obj
    }

    fn set_obj(&mut self, obj: K) {
        self.obj = obj;
    }
}
