//! # Object Kinds and Keys
//!
//! Identity of kinds and objects, independent of the typed CRD structs.

use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

use crate::crd::Condition;

/// Typed object the cluster store can hold
pub trait ClusterObject:
    Resource<DynamicType = ()> + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Status conditions, when the kind exposes them at all
    fn status_conditions(&self) -> Option<&[Condition]> {
        None
    }
}

/// Group/version/kind/plural of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKind {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
}

impl ObjectKind {
    pub fn of<K: Resource<DynamicType = ()>>() -> Self {
        Self {
            group: K::group(&()).into_owned(),
            version: K::version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
            plural: K::plural(&()).into_owned(),
        }
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// `Kind.group`, or just `Kind` for the core group
    pub fn group_kind(&self) -> String {
        if self.group.is_empty() {
            self.kind.clone()
        } else {
            format!("{}.{}", self.kind, self.group)
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.group_kind())
    }
}

/// Stable identity of one object: `<Kind>.<group>/<namespace>/<name>`
///
/// Used as the key for per-object retry bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(kind: &ObjectKind, namespace: Option<&str>, name: &str) -> Self {
        Self(format!(
            "{}/{}/{}",
            kind.group_kind(),
            namespace.unwrap_or_default(),
            name
        ))
    }

    pub fn of<K: Resource<DynamicType = ()>>(namespace: Option<&str>, name: &str) -> Self {
        Self::new(&ObjectKind::of::<K>(), namespace, name)
    }

    pub fn for_object<K: Resource<DynamicType = ()>>(obj: &K) -> Self {
        Self::of::<K>(obj.namespace().as_deref(), &obj.name_any())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
