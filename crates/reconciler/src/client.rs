//! Cluster capabilities the reconciler consumes.
//!
//! The engine never talks to the API server directly. It is handed
//! implementations of these traits: [`crate::KubeCluster`] in production,
//! [`crate::InMemoryCluster`] in tests.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use epha_core::{AnnotatedObject, ObjectKey};
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;

use crate::error::{Error, Result};
use crate::gvr::ResourceType;

/// Kinds with a statically typed accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypedKind {
    Deployment,
    ReplicaSet,
}

impl TypedKind {
    /// Every kind the typed strategy knows about.
    pub const ALL: [Self; 2] = [Self::Deployment, Self::ReplicaSet];

    /// The kind name as it appears in manifests.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::ReplicaSet => "ReplicaSet",
        }
    }
}

impl fmt::Display for TypedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypedKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::unsupported_kind(s))
    }
}

/// A live object fetched through the typed accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedObject {
    Deployment(Deployment),
    ReplicaSet(ReplicaSet),
}

impl TypedObject {
    pub const fn kind(&self) -> TypedKind {
        match self {
            Self::Deployment(_) => TypedKind::Deployment,
            Self::ReplicaSet(_) => TypedKind::ReplicaSet,
        }
    }

    pub const fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Deployment(d) => &d.metadata,
            Self::ReplicaSet(r) => &r.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::Deployment(d) => &mut d.metadata,
            Self::ReplicaSet(r) => &mut r.metadata,
        }
    }
}

/// Reads `AnnotatedObject`s.
#[async_trait]
pub trait DeclaredObjectSource: Send + Sync {
    /// Fetch the declared object, `None` if it does not exist.
    async fn get_declared(&self, key: &ObjectKey) -> Result<Option<AnnotatedObject>>;
}

/// Typed get/update for the fixed [`TypedKind`] set.
#[async_trait]
pub trait TypedClient: Send + Sync {
    /// Fetch a resource, `None` if it does not exist.
    async fn get(&self, kind: TypedKind, namespace: &str, name: &str)
    -> Result<Option<TypedObject>>;

    /// Replace a resource with `object`.
    async fn update(&self, object: &TypedObject) -> Result<()>;
}

/// Type-erased get/update addressed by group/version/resource.
#[async_trait]
pub trait DynamicClient: Send + Sync {
    /// Fetch a resource, `None` if it does not exist.
    async fn get(
        &self,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>>;

    /// Replace a resource with `object`.
    async fn update(&self, resource: &ResourceType, object: &DynamicObject) -> Result<()>;
}
