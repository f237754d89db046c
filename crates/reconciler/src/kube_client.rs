//! Client capabilities backed by a live API server.

use async_trait::async_trait;
use epha_core::{AnnotatedObject, ObjectKey, TargetResource};
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use kube::api::{Api, PostParams};
use kube::core::{ApiResource, DynamicObject};
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::{DeclaredObjectSource, DynamicClient, TypedClient, TypedKind, TypedObject};
use crate::error::{Error, Result};
use crate::gvr::ResourceType;

const HTTP_CONFLICT: u16 = 409;

/// Talks to the cluster through a [`kube::Client`].
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Wrap an existing client.
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    fn typed_api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }

    fn dynamic_api(&self, resource: &ResourceType, namespace: &str) -> Api<DynamicObject> {
        let api_resource = ApiResource {
            group: resource.group.clone(),
            version: resource.version.clone(),
            api_version: resource.api_version(),
            kind: resource.kind.clone(),
            plural: resource.plural.clone(),
        };
        if namespace.is_empty() {
            Api::all_with(self.client.clone(), &api_resource)
        } else {
            Api::namespaced_with(self.client.clone(), namespace, &api_resource)
        }
    }

    async fn replace<K>(api: &Api<K>, object: &K, resource: &str) -> Result<()>
    where
        K: Resource + Clone + Serialize + DeserializeOwned + std::fmt::Debug,
    {
        let name = object.name_any();
        api.replace(&name, &PostParams::default(), object)
            .await
            .map(|_| ())
            .map_err(|e| map_update_error(e, resource))
    }
}

fn map_update_error(err: kube::Error, resource: &str) -> Error {
    match err {
        kube::Error::Api(response) if response.code == HTTP_CONFLICT => {
            Error::conflict(resource, response.message)
        }
        other => Error::update_failed(resource, other.to_string()),
    }
}

fn describe_meta<K: Resource>(kind: &str, object: &K) -> String {
    TargetResource::new(kind, object.namespace().unwrap_or_default(), object.name_any()).to_string()
}

#[async_trait]
impl DeclaredObjectSource for KubeCluster {
    async fn get_declared(&self, key: &ObjectKey) -> Result<Option<AnnotatedObject>> {
        let api: Api<AnnotatedObject> = Api::namespaced(self.client.clone(), &key.namespace);
        api.get_opt(&key.name)
            .await
            .map_err(|e| Error::fetch_failed(format!("AnnotatedObject {key}"), e.to_string()))
    }
}

#[async_trait]
impl TypedClient for KubeCluster {
    async fn get(
        &self,
        kind: TypedKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<TypedObject>> {
        debug!(%kind, namespace, name, "Fetching typed resource");
        let fetched = match kind {
            TypedKind::Deployment => self
                .typed_api::<Deployment>(namespace)
                .get_opt(name)
                .await
                .map(|found| found.map(TypedObject::Deployment)),
            TypedKind::ReplicaSet => self
                .typed_api::<ReplicaSet>(namespace)
                .get_opt(name)
                .await
                .map(|found| found.map(TypedObject::ReplicaSet)),
        };
        fetched.map_err(|e| {
            Error::fetch_failed(
                TargetResource::new(kind.as_str(), namespace, name).to_string(),
                e.to_string(),
            )
        })
    }

    async fn update(&self, object: &TypedObject) -> Result<()> {
        match object {
            TypedObject::Deployment(deployment) => {
                let resource = describe_meta(TypedKind::Deployment.as_str(), deployment);
                let namespace = deployment.namespace().unwrap_or_default();
                Self::replace(&self.typed_api::<Deployment>(&namespace), deployment, &resource)
                    .await
            }
            TypedObject::ReplicaSet(replica_set) => {
                let resource = describe_meta(TypedKind::ReplicaSet.as_str(), replica_set);
                let namespace = replica_set.namespace().unwrap_or_default();
                Self::replace(&self.typed_api::<ReplicaSet>(&namespace), replica_set, &resource)
                    .await
            }
        }
    }
}

#[async_trait]
impl DynamicClient for KubeCluster {
    async fn get(
        &self,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        debug!(%resource, namespace, name, "Fetching dynamic resource");
        self.dynamic_api(resource, namespace)
            .get_opt(name)
            .await
            .map_err(|e| {
                Error::fetch_failed(
                    TargetResource::new(&resource.kind, namespace, name).to_string(),
                    e.to_string(),
                )
            })
    }

    async fn update(&self, resource: &ResourceType, object: &DynamicObject) -> Result<()> {
        let described = describe_meta(&resource.kind, object);
        let namespace = object.namespace().unwrap_or_default();
        Self::replace(&self.dynamic_api(resource, &namespace), object, &described).await
    }
}
