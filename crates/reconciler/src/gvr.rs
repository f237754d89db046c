//! Group/version parsing and resource-collection addressing for dynamic
//! resolution.

use std::fmt;

use crate::error::{Error, Result};

/// Split an apiVersion into `(group, version)`.
///
/// `"apps/v1"` gives `("apps", "v1")`, a bare `"v1"` belongs to the core
/// group and gives `("", "v1")`.
///
/// # Errors
///
/// Returns [`Error::MalformedApiVersion`] for an empty input, an empty
/// version segment, or more than one `/`.
pub fn parse_api_version(api_version: &str) -> Result<(String, String)> {
    let mut segments = api_version.split('/');
    let (group, version) = match (segments.next(), segments.next(), segments.next()) {
        (Some(version), None, None) => ("", version),
        (Some(group), Some(version), None) => (group, version),
        _ => return Err(Error::malformed_api_version(api_version)),
    };

    if version.is_empty() {
        return Err(Error::malformed_api_version(api_version));
    }

    Ok((group.to_string(), version.to_string()))
}

/// Derive the resource-collection name for a kind.
///
/// Lowercase plus a trailing `s`. Irregular plurals (`Ingress`, `NetworkPolicy`)
/// come out wrong; this is a known limitation of dynamic resolution.
pub fn pluralize(kind: &str) -> String {
    format!("{}s", kind.to_lowercase())
}

/// A resource collection addressed by group, version and plural, together
/// with the kind it serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceType {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
}

impl ResourceType {
    /// Build the resource type for a kind and apiVersion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedApiVersion`] if `api_version` does not parse.
    pub fn from_kind(kind: &str, api_version: &str) -> Result<Self> {
        let (group, version) = parse_api_version(api_version)?;
        Ok(Self {
            group,
            version,
            kind: kind.to_string(),
            plural: pluralize(kind),
        })
    }

    /// The apiVersion string objects of this type carry.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}.{}", self.plural, self.version)
        } else {
            write!(f, "{}.{}.{}", self.plural, self.version, self.group)
        }
    }
}
