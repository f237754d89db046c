//! Core types for the reconciler.

/// Terminal state of a successful reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The declared object no longer exists. Nothing to do.
    NotFound,
    /// Every target was merged and persisted.
    Reconciled {
        /// Number of targets updated.
        targets: usize,
    },
}

impl ReconcileOutcome {
    /// Number of targets updated in this pass.
    pub const fn targets_updated(&self) -> usize {
        match self {
            Self::NotFound => 0,
            Self::Reconciled { targets } => *targets,
        }
    }
}
