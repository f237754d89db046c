//! Reconciler implementation.

use std::sync::Arc;

use epha_core::{ObjectKey, TargetResourceWithMetadata, merge_annotations};
use tracing::{debug, info, warn};

use crate::client::DeclaredObjectSource;
use crate::error::{Error, Result};
use crate::resolver::Resolver;
use crate::types::ReconcileOutcome;

/// Drives the annotations of every declared target toward the declaration.
///
/// A pass is sequential and stops at the first failing target. Targets
/// updated before the failure stay updated; the caller is expected to
/// re-run the pass later.
pub struct Reconciler {
    source: Arc<dyn DeclaredObjectSource>,
    resolver: Arc<dyn Resolver>,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(source: Arc<dyn DeclaredObjectSource>, resolver: Arc<dyn Resolver>) -> Self {
        Self { source, resolver }
    }

    /// Run one reconciliation pass for the declared object at `key`.
    ///
    /// # Errors
    ///
    /// Returns the first error hit while fetching the declared object or
    /// resolving, merging, or persisting a target. Remaining targets are not
    /// touched.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome> {
        let Some(declared) = self.source.get_declared(key).await? else {
            debug!(object = %key, "Declared object not found, nothing to do");
            return Ok(ReconcileOutcome::NotFound);
        };

        let targets = &declared.spec.targets;
        info!(
            object = %key,
            targets = targets.len(),
            strategy = %self.resolver.strategy(),
            "Starting reconciliation"
        );

        for (index, target) in targets.iter().enumerate() {
            if let Err(e) = self.reconcile_target(target).await {
                warn!(
                    object = %key,
                    index,
                    target = %target.target,
                    error = %e,
                    "Target failed, aborting pass"
                );
                return Err(e);
            }
        }

        info!(object = %key, targets = targets.len(), "Reconciliation complete");

        Ok(ReconcileOutcome::Reconciled {
            targets: targets.len(),
        })
    }

    /// Resolve, merge, and persist a single target.
    async fn reconcile_target(&self, target: &TargetResourceWithMetadata) -> Result<()> {
        let mut handle = self.resolver.resolve(&target.target).await?;

        let merged = merge_annotations(handle.annotations(), target.annotations());
        handle.set_annotations(merged);

        handle.update().await?;

        debug!(target = %handle, "Target updated");
        Ok(())
    }
}

/// Builder for Reconciler.
#[derive(Default)]
pub struct ReconcilerBuilder {
    source: Option<Arc<dyn DeclaredObjectSource>>,
    resolver: Option<Arc<dyn Resolver>>,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source of declared objects.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn DeclaredObjectSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the source or resolver is missing.
    pub fn build(self) -> Result<Reconciler> {
        let source = self
            .source
            .ok_or_else(|| Error::invalid_config("declared object source is required"))?;
        let resolver = self
            .resolver
            .ok_or_else(|| Error::invalid_config("resolver is required"))?;

        Ok(Reconciler::new(source, resolver))
    }
}
