//! npm registry API response types
//!
//! Only the abbreviated install document (`application/vnd.npm.install-v1+json`)
//! is modelled; it carries everything an install needs.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// Accept header value for abbreviated metadata
pub const ABBREVIATED_METADATA: &str = "application/vnd.npm.install-v1+json";

/// Abbreviated package document
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackageMetadataResponse {
    /// Package name
    pub name: String,
    /// Tag to version mapping, e.g. `latest`
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: HashMap<String, String>,
    /// Versions keyed by version string
    #[serde(default)]
    pub versions: HashMap<String, VersionMetadata>,
    /// Last modification time
    pub modified: Option<String>,
}

impl PackageMetadataResponse {
    /// Version the `latest` tag points at
    pub fn latest(&self) -> Option<&VersionMetadata> {
        self.dist_tags
            .get("latest")
            .and_then(|version| self.versions.get(version))
    }
}

/// One version inside the abbreviated document
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
    #[serde(rename = "optionalDependencies", default)]
    pub optional_dependencies: HashMap<String, String>,
    #[serde(rename = "peerDependencies", default)]
    pub peer_dependencies: HashMap<String, String>,
    /// Distribution information
    pub dist: DistInfo,
}

/// Where to download a version and how to check it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DistInfo {
    /// Tarball download URL; may live on another host than the registry
    pub tarball: String,
    /// Hex SHA-1 of the tarball (legacy)
    pub shasum: String,
    /// Subresource integrity string, e.g. `sha512-...`
    pub integrity: Option<String>,
}
