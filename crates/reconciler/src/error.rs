//! Error types for the reconciler crate.

use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
///
/// Every variant is a "retry later" signal for the caller; none is treated
/// as permanently fatal.
#[derive(Debug, Error)]
pub enum Error {
    /// The live resource behind a target does not exist.
    #[error("{resource} not found")]
    TargetNotFound { resource: String },

    /// The typed strategy has no accessor for this kind.
    #[error("unsupported kind: {kind}")]
    UnsupportedKind { kind: String },

    /// An apiVersion that is neither `group/version` nor `version`.
    #[error("malformed apiVersion '{api_version}': expected 'group/version' or 'version'")]
    MalformedApiVersion { api_version: String },

    /// Optimistic-concurrency conflict on update.
    #[error("conflict updating {resource}: {reason}")]
    Conflict { resource: String, reason: String },

    /// Reading from the cluster failed.
    #[error("failed to fetch {resource}: {reason}")]
    FetchFailed { resource: String, reason: String },

    /// Writing to the cluster failed for a reason other than a conflict.
    #[error("failed to update {resource}: {reason}")]
    UpdateFailed { resource: String, reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Core(#[from] epha_core::Error),
}

impl Error {
    /// Create a target not found error.
    pub fn target_not_found(resource: impl Into<String>) -> Self {
        Self::TargetNotFound {
            resource: resource.into(),
        }
    }

    /// Create an unsupported kind error.
    pub fn unsupported_kind(kind: impl Into<String>) -> Self {
        Self::UnsupportedKind { kind: kind.into() }
    }

    /// Create a malformed apiVersion error.
    pub fn malformed_api_version(api_version: impl Into<String>) -> Self {
        Self::MalformedApiVersion {
            api_version: api_version.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Create a fetch failed error.
    pub fn fetch_failed(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FetchFailed {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Create an update failed error.
    pub fn update_failed(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpdateFailed {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether retrying cannot succeed until the declaration itself changes.
    pub const fn is_poison_pill(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedKind { .. }
                | Self::MalformedApiVersion { .. }
                | Self::Core(epha_core::Error::InvalidTarget { .. })
        )
    }
}
