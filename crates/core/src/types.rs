//! The `AnnotatedObject` custom resource and its target descriptors.

use std::collections::BTreeMap;
use std::fmt;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Annotation key/value pairs, in the shape `ObjectMeta` uses.
pub type Annotations = BTreeMap<String, String>;

/// A Kubernetes resource to be annotated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetResource {
    /// Kind of the resource (e.g. `Deployment`).
    pub kind: String,

    /// Name of the resource.
    pub name: String,

    /// Namespace of the resource. Empty for cluster-scoped resources.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// `group/version`, or a bare `version` for the core group.
    /// Only consulted by dynamic resolution.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
}

impl TargetResource {
    /// Create a target for the given kind, namespace and name.
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
            api_version: String::new(),
        }
    }

    /// Set the API version.
    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Check that the fields every resolution strategy relies on are present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTarget`] when `kind` or `name` is empty.
    pub fn validate(&self) -> Result<()> {
        if self.kind.trim().is_empty() {
            return Err(Error::invalid_target(format!(
                "kind must not be empty (name '{}')",
                self.name
            )));
        }
        if self.name.trim().is_empty() {
            return Err(Error::invalid_target(format!(
                "name must not be empty (kind '{}')",
                self.kind
            )));
        }
        Ok(())
    }
}

impl fmt::Display for TargetResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{} {}", self.kind, self.name)
        } else {
            write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
        }
    }
}

/// Metadata to merge into a target resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceMetadata {
    /// Annotations to apply or merge with the target resource.
    #[serde(default)]
    pub annotations: Annotations,
}

/// One entry of `spec.targets`: a resource and the metadata it should carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TargetResourceWithMetadata {
    #[serde(flatten)]
    pub target: TargetResource,

    #[serde(default)]
    pub metadata: ResourceMetadata,
}

impl TargetResourceWithMetadata {
    /// Create a descriptor with no desired annotations.
    pub const fn new(target: TargetResource) -> Self {
        Self {
            target,
            metadata: ResourceMetadata {
                annotations: BTreeMap::new(),
            },
        }
    }

    /// Add a desired annotation.
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.annotations.insert(key.into(), value.into());
        self
    }

    /// The desired annotations.
    pub const fn annotations(&self) -> &Annotations {
        &self.metadata.annotations
    }
}

/// Desired state of an `AnnotatedObject`.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "epha.avyr.io",
    version = "v1",
    kind = "AnnotatedObject",
    namespaced,
    shortname = "ao",
    status = "AnnotatedObjectStatus",
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct AnnotatedObjectSpec {
    /// Target resources and the metadata to apply to each, in order.
    pub targets: Vec<TargetResourceWithMetadata>,
}

/// Observed state of an `AnnotatedObject`. Intentionally empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AnnotatedObjectStatus {}

/// Namespaced name of an `AnnotatedObject`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    /// Create a new object key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
