//! In-memory cluster for tests and local experiments.
//!
//! Implements every client capability over plain maps. Stored objects carry a
//! `resourceVersion` that is checked on update, so stale writes fail with
//! [`Error::Conflict`] like they would against an API server.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use epha_core::{AnnotatedObject, Annotations, ObjectKey, TargetResource};
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::{DynamicObject, TypeMeta};
use tokio::sync::RwLock;

use crate::client::{DeclaredObjectSource, DynamicClient, TypedClient, TypedKind, TypedObject};
use crate::error::{Error, Result};
use crate::gvr::ResourceType;

type Address = (String, String);

/// A fake cluster backed by in-memory maps.
#[derive(Default)]
pub struct InMemoryCluster {
    declared: RwLock<HashMap<ObjectKey, AnnotatedObject>>,
    typed: RwLock<HashMap<(TypedKind, Address), TypedObject>>,
    dynamic: RwLock<HashMap<(ResourceType, Address), DynamicObject>>,
    conflicts: RwLock<HashSet<String>>,
    fetched: RwLock<Vec<String>>,
    updated: RwLock<Vec<String>>,
}

fn describe(kind: &str, namespace: &str, name: &str) -> String {
    TargetResource::new(kind, namespace, name).to_string()
}

fn address(namespace: &str, name: &str) -> Address {
    (namespace.to_string(), name.to_string())
}

fn object_meta<'a>(
    namespace: &str,
    name: &str,
    annotations: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> ObjectMeta {
    let annotations: Annotations = annotations
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
        annotations: (!annotations.is_empty()).then_some(annotations),
        resource_version: Some("1".to_string()),
        ..ObjectMeta::default()
    }
}

fn next_version(stored: &ObjectMeta, incoming: &ObjectMeta, resource: &str) -> Result<String> {
    if stored.resource_version != incoming.resource_version {
        return Err(Error::conflict(
            resource,
            "the object has been modified; please apply your changes to the latest version",
        ));
    }
    let current = stored
        .resource_version
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    Ok(current.saturating_add(1).to_string())
}

impl InMemoryCluster {
    /// Create an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a declared object under its metadata namespace and name.
    pub async fn insert_declared(&self, object: AnnotatedObject) {
        let key = ObjectKey::new(
            object.metadata.namespace.clone().unwrap_or_default(),
            object.metadata.name.clone().unwrap_or_default(),
        );
        self.declared.write().await.insert(key, object);
    }

    /// Store a Deployment. Empty `annotations` leaves the map absent.
    pub async fn insert_deployment<'a>(
        &self,
        namespace: &str,
        name: &str,
        annotations: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let object = TypedObject::Deployment(Deployment {
            metadata: object_meta(namespace, name, annotations),
            ..Deployment::default()
        });
        self.typed
            .write()
            .await
            .insert((TypedKind::Deployment, address(namespace, name)), object);
    }

    /// Store a ReplicaSet. Empty `annotations` leaves the map absent.
    pub async fn insert_replica_set<'a>(
        &self,
        namespace: &str,
        name: &str,
        annotations: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let object = TypedObject::ReplicaSet(ReplicaSet {
            metadata: object_meta(namespace, name, annotations),
            ..ReplicaSet::default()
        });
        self.typed
            .write()
            .await
            .insert((TypedKind::ReplicaSet, address(namespace, name)), object);
    }

    /// Store an arbitrary object of the given resource type.
    pub async fn insert_dynamic<'a>(
        &self,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
        annotations: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let object = DynamicObject {
            types: Some(TypeMeta {
                api_version: resource.api_version(),
                kind: resource.kind.clone(),
            }),
            metadata: object_meta(namespace, name, annotations),
            data: serde_json::json!({}),
        };
        self.dynamic
            .write()
            .await
            .insert((resource.clone(), address(namespace, name)), object);
    }

    /// Make every update of the named resource fail with a conflict.
    pub async fn inject_conflict(&self, kind: &str, namespace: &str, name: &str) {
        self.conflicts
            .write()
            .await
            .insert(describe(kind, namespace, name));
    }

    /// Stored annotations of a Deployment.
    pub async fn deployment_annotations(&self, namespace: &str, name: &str) -> Option<Annotations> {
        self.typed_annotations(TypedKind::Deployment, namespace, name)
            .await
    }

    /// Stored annotations of a ReplicaSet.
    pub async fn replica_set_annotations(&self, namespace: &str, name: &str) -> Option<Annotations> {
        self.typed_annotations(TypedKind::ReplicaSet, namespace, name)
            .await
    }

    async fn typed_annotations(
        &self,
        kind: TypedKind,
        namespace: &str,
        name: &str,
    ) -> Option<Annotations> {
        self.typed
            .read()
            .await
            .get(&(kind, address(namespace, name)))
            .and_then(|object| object.metadata().annotations.clone())
    }

    /// Stored annotations of a dynamic object.
    pub async fn dynamic_annotations(
        &self,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
    ) -> Option<Annotations> {
        self.dynamic
            .read()
            .await
            .get(&(resource.clone(), address(namespace, name)))
            .and_then(|object| object.metadata.annotations.clone())
    }

    /// Targets fetched so far, in call order.
    pub async fn fetched(&self) -> Vec<String> {
        self.fetched.read().await.clone()
    }

    /// Targets successfully updated so far, in call order.
    pub async fn updated(&self) -> Vec<String> {
        self.updated.read().await.clone()
    }

    /// Number of successful updates.
    pub async fn update_count(&self) -> usize {
        self.updated.read().await.len()
    }

    async fn check_injected_conflict(&self, resource: &str) -> Result<()> {
        if self.conflicts.read().await.contains(resource) {
            return Err(Error::conflict(resource, "injected conflict"));
        }
        Ok(())
    }
}

#[async_trait]
impl DeclaredObjectSource for InMemoryCluster {
    async fn get_declared(&self, key: &ObjectKey) -> Result<Option<AnnotatedObject>> {
        Ok(self.declared.read().await.get(key).cloned())
    }
}

#[async_trait]
impl TypedClient for InMemoryCluster {
    async fn get(
        &self,
        kind: TypedKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<TypedObject>> {
        self.fetched
            .write()
            .await
            .push(describe(kind.as_str(), namespace, name));
        Ok(self
            .typed
            .read()
            .await
            .get(&(kind, address(namespace, name)))
            .cloned())
    }

    async fn update(&self, object: &TypedObject) -> Result<()> {
        let meta = object.metadata();
        let namespace = meta.namespace.clone().unwrap_or_default();
        let name = meta.name.clone().unwrap_or_default();
        let resource = describe(object.kind().as_str(), &namespace, &name);

        self.check_injected_conflict(&resource).await?;

        let mut typed = self.typed.write().await;
        let key = (object.kind(), address(&namespace, &name));
        let stored = typed
            .get(&key)
            .ok_or_else(|| Error::target_not_found(resource.clone()))?;
        let version = next_version(stored.metadata(), meta, &resource)?;

        let mut object = object.clone();
        object.metadata_mut().resource_version = Some(version);
        typed.insert(key, object);
        drop(typed);

        self.updated.write().await.push(resource);
        Ok(())
    }
}

#[async_trait]
impl DynamicClient for InMemoryCluster {
    async fn get(
        &self,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        self.fetched
            .write()
            .await
            .push(describe(&resource.kind, namespace, name));
        Ok(self
            .dynamic
            .read()
            .await
            .get(&(resource.clone(), address(namespace, name)))
            .cloned())
    }

    async fn update(&self, resource: &ResourceType, object: &DynamicObject) -> Result<()> {
        let namespace = object.metadata.namespace.clone().unwrap_or_default();
        let name = object.metadata.name.clone().unwrap_or_default();
        let described = describe(&resource.kind, &namespace, &name);

        self.check_injected_conflict(&described).await?;

        let mut dynamic = self.dynamic.write().await;
        let key = (resource.clone(), address(&namespace, &name));
        let stored = dynamic
            .get(&key)
            .ok_or_else(|| Error::target_not_found(described.clone()))?;
        let version = next_version(&stored.metadata, &object.metadata, &described)?;

        let mut object = object.clone();
        object.metadata.resource_version = Some(version);
        dynamic.insert(key, object);
        drop(dynamic);

        self.updated.write().await.push(described);
        Ok(())
    }
}
