//! # epha-core
//!
//! Data contract, configuration, and annotation merging shared by the epha
//! controller crates.
//!
//! - [`AnnotatedObject`]: the custom resource users create to declare
//!   which resources should carry which annotations.
//! - [`merge_annotations`]: the pure merge applied to every target.
//! - [`Config`]: controller configuration loaded from TOML and the environment.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod annotations;
pub mod config;
pub mod error;
pub mod types;

pub use annotations::merge_annotations;
pub use config::{BackoffConfig, Config, ResolutionStrategy};
pub use error::{Error, Result};
pub use types::{
    AnnotatedObject, AnnotatedObjectSpec, AnnotatedObjectStatus, Annotations, ObjectKey,
    ResourceMetadata, TargetResource, TargetResourceWithMetadata,
};
