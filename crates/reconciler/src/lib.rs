//! K8s-style reconciliation of declared annotations onto target resources.
//!
//! An `AnnotatedObject` names a list of target resources and the annotations
//! each should carry. One reconciliation pass:
//!
//! 1. Fetches the declared object (a missing object is a no-op)
//! 2. Resolves each target to its live resource, in declared order
//! 3. Merges the desired annotations over the live ones
//! 4. Persists the result, stopping at the first failure
//!
//! # Resolution strategies
//!
//! - [`TypedResolver`]: `Deployment` and `ReplicaSet` through typed accessors
//! - [`DynamicResolver`]: any kind, addressed by the target's apiVersion and a
//!   plural derived from its kind
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use epha_core::{Config, ObjectKey};
//! use epha_reconciler::{KubeCluster, ReconcilerBuilder, resolver_from_config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cluster = Arc::new(KubeCluster::new(kube::Client::try_default().await?));
//!     let resolver = resolver_from_config(&Config::default(), cluster.clone())?;
//!     let reconciler = ReconcilerBuilder::new()
//!         .with_source(cluster)
//!         .with_resolver(resolver)
//!         .build()?;
//!
//!     reconciler.reconcile(&ObjectKey::new("default", "web")).await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod client;
pub mod error;
pub mod gvr;
pub mod kube_client;
pub mod memory;
pub mod reconciler;
pub mod resolver;
pub mod types;

// Re-export main types
pub use client::{DeclaredObjectSource, DynamicClient, TypedClient, TypedKind, TypedObject};
pub use error::{Error, Result};
pub use gvr::{ResourceType, parse_api_version, pluralize};
pub use kube_client::KubeCluster;
pub use memory::InMemoryCluster;
pub use reconciler::{Reconciler, ReconcilerBuilder};
pub use resolver::{DynamicResolver, Resolver, ResourceHandle, TypedResolver, resolver_from_config};
pub use types::ReconcileOutcome;
