//! Non-destructive annotation merging.

use crate::types::Annotations;

/// Merge `desired` into `existing`.
///
/// Keys only present in `existing` are kept untouched; keys in `desired`
/// overwrite whatever `existing` held. An absent `existing` yields a copy of
/// `desired`.
pub fn merge_annotations(existing: Option<&Annotations>, desired: &Annotations) -> Annotations {
    let mut merged = existing.cloned().unwrap_or_default();
    merged.extend(
        desired
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    merged
}
