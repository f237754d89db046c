//! Resolution of target descriptors to live resources.
//!
//! Two strategies exist, chosen once when the reconciler is built:
//!
//! - [`TypedResolver`]: a fixed set of kinds with strongly typed accessors.
//! - [`DynamicResolver`]: any kind, addressed by `(group, version, plural)`
//!   derived from the target's apiVersion and kind.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use epha_core::{Annotations, Config, ResolutionStrategy, TargetResource};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use tracing::debug;

use crate::client::{DynamicClient, TypedClient, TypedKind, TypedObject};
use crate::error::{Error, Result};
use crate::gvr::ResourceType;

enum Live {
    Typed {
        object: TypedObject,
        client: Arc<dyn TypedClient>,
    },
    Dynamic {
        resource: ResourceType,
        object: DynamicObject,
        client: Arc<dyn DynamicClient>,
    },
}

/// A fetched live resource together with the accessor that can persist it.
///
/// Holds a snapshot only for the duration of one get-merge-update sequence.
pub struct ResourceHandle {
    target: String,
    live: Live,
}

impl ResourceHandle {
    fn metadata(&self) -> &ObjectMeta {
        match &self.live {
            Live::Typed { object, .. } => object.metadata(),
            Live::Dynamic { object, .. } => &object.metadata,
        }
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match &mut self.live {
            Live::Typed { object, .. } => object.metadata_mut(),
            Live::Dynamic { object, .. } => &mut object.metadata,
        }
    }

    /// Current annotations of the live resource, if it has any.
    pub fn annotations(&self) -> Option<&Annotations> {
        self.metadata().annotations.as_ref()
    }

    /// Replace the annotation map on the snapshot. Nothing is sent until
    /// [`ResourceHandle::update`].
    pub fn set_annotations(&mut self, annotations: Annotations) {
        self.metadata_mut().annotations = Some(annotations);
    }

    /// Persist the snapshot through the accessor it was resolved with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] on a version mismatch, or another error
    /// if the write fails.
    pub async fn update(&self) -> Result<()> {
        match &self.live {
            Live::Typed { object, client } => client.update(object).await,
            Live::Dynamic {
                resource,
                object,
                client,
            } => client.update(resource, object).await,
        }
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("target", &self.target)
            .field("annotations", &self.annotations())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target)
    }
}

/// Maps a target descriptor to a live resource.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Fetch the live resource named by `target`.
    async fn resolve(&self, target: &TargetResource) -> Result<ResourceHandle>;

    /// The strategy this resolver implements.
    fn strategy(&self) -> ResolutionStrategy;
}

/// Resolver for the fixed [`TypedKind`] set.
pub struct TypedResolver {
    client: Arc<dyn TypedClient>,
    supported_kinds: BTreeSet<TypedKind>,
}

impl TypedResolver {
    /// Create a resolver accepting every [`TypedKind`].
    pub fn new(client: Arc<dyn TypedClient>) -> Self {
        Self {
            client,
            supported_kinds: TypedKind::ALL.into_iter().collect(),
        }
    }

    /// Restrict the accepted kinds.
    #[must_use]
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = TypedKind>) -> Self {
        self.supported_kinds = kinds.into_iter().collect();
        self
    }

    /// Kinds this resolver accepts.
    pub const fn supported_kinds(&self) -> &BTreeSet<TypedKind> {
        &self.supported_kinds
    }
}

#[async_trait]
impl Resolver for TypedResolver {
    async fn resolve(&self, target: &TargetResource) -> Result<ResourceHandle> {
        target.validate()?;

        let kind: TypedKind = target.kind.parse()?;
        if !self.supported_kinds.contains(&kind) {
            return Err(Error::unsupported_kind(&target.kind));
        }

        debug!(target = %target, "Resolving typed target");

        let object = self
            .client
            .get(kind, &target.namespace, &target.name)
            .await?
            .ok_or_else(|| Error::target_not_found(target.to_string()))?;

        Ok(ResourceHandle {
            target: target.to_string(),
            live: Live::Typed {
                object,
                client: Arc::clone(&self.client),
            },
        })
    }

    fn strategy(&self) -> ResolutionStrategy {
        ResolutionStrategy::Typed
    }
}

/// Resolver for arbitrary kinds.
pub struct DynamicResolver {
    client: Arc<dyn DynamicClient>,
}

impl DynamicResolver {
    /// Create a new dynamic resolver.
    pub fn new(client: Arc<dyn DynamicClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resolver for DynamicResolver {
    async fn resolve(&self, target: &TargetResource) -> Result<ResourceHandle> {
        target.validate()?;

        let resource = ResourceType::from_kind(&target.kind, &target.api_version)?;

        debug!(target = %target, resource = %resource, "Resolving dynamic target");

        let object = self
            .client
            .get(&resource, &target.namespace, &target.name)
            .await?
            .ok_or_else(|| Error::target_not_found(target.to_string()))?;

        Ok(ResourceHandle {
            target: target.to_string(),
            live: Live::Dynamic {
                resource,
                object,
                client: Arc::clone(&self.client),
            },
        })
    }

    fn strategy(&self) -> ResolutionStrategy {
        ResolutionStrategy::Dynamic
    }
}

/// Build the resolver the configuration asks for.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] if `typed_kinds` names a kind without a
/// typed accessor.
pub fn resolver_from_config<C>(config: &Config, client: Arc<C>) -> Result<Arc<dyn Resolver>>
where
    C: TypedClient + DynamicClient + 'static,
{
    match config.strategy {
        ResolutionStrategy::Typed => {
            let kinds = config
                .typed_kinds
                .iter()
                .map(|kind| {
                    kind.parse::<TypedKind>().map_err(|_| {
                        Error::invalid_config(format!("typed_kinds: no typed accessor for '{kind}'"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Arc::new(TypedResolver::new(client).with_kinds(kinds)))
        }
        ResolutionStrategy::Dynamic => Ok(Arc::new(DynamicResolver::new(client))),
    }
}
