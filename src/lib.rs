//! # epha
//!
//! Kubernetes controller that merges the annotations declared in
//! `AnnotatedObject` resources onto their target resources.
//!
//! This library exposes the CLI and controller wiring and re-exports the
//! workspace crates for convenience.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub use epha_core;
pub use epha_reconciler;

pub mod cli;
pub mod controller;
