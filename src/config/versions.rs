//! Version Registry
//!
//! Per-kind tables of deployable versions, each mapping image roles to the
//! images the operator should run. Loaded once at startup and never mutated.

use crate::crd::ComponentKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix that marks a content digest rather than a tag
pub const DIGEST_PREFIX: &str = "sha256:";

// =============================================================================
// Version Entries
// =============================================================================

/// One image of a version entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub name: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub digest: String,
}

impl ImageRef {
    /// Qualified reference, digest-pinned unless tags are requested or no
    /// digest is known
    pub fn qualified(&self, use_tags: bool) -> String {
        if use_tags || self.digest.is_empty() {
            format!("{}:{}", self.name, self.tag)
        } else {
            format!("{}@{}", self.name, self.digest)
        }
    }
}

/// A deployable version of one component kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub images: BTreeMap<String, ImageRef>,
}

/// Result of mapping an image tag or digest back to a version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalVersion {
    pub version: String,
    /// False when the value is a best-effort guess
    pub resolved: bool,
}

// =============================================================================
// Version Registry
// =============================================================================

/// Immutable registry of versions and image aliases
#[derive(Debug, Clone, Default)]
pub struct VersionRegistry {
    tables: BTreeMap<ComponentKind, BTreeMap<String, VersionEntry>>,
    aliases: BTreeMap<String, String>,
    use_tags: bool,
}

impl VersionRegistry {
    /// Build a registry from loaded tables
    pub fn new(
        tables: BTreeMap<ComponentKind, BTreeMap<String, VersionEntry>>,
        aliases: BTreeMap<String, String>,
        use_tags: bool,
    ) -> Self {
        // Entries are keyed by version; keep the embedded field consistent.
        let tables = tables
            .into_iter()
            .map(|(kind, table)| {
                let table = table
                    .into_iter()
                    .map(|(key, mut entry)| {
                        entry.version = key.clone();
                        (key, entry)
                    })
                    .collect();
                (kind, table)
            })
            .collect();

        Self {
            tables,
            aliases,
            use_tags,
        }
    }

    /// The version flagged default for `kind`, if any
    pub fn resolve_default(&self, kind: ComponentKind) -> Option<&str> {
        self.tables
            .get(&kind)?
            .values()
            .find(|entry| entry.is_default)
            .map(|entry| entry.version.as_str())
    }

    /// Exact membership test
    pub fn validate(&self, kind: ComponentKind, version: &str) -> bool {
        self.tables
            .get(&kind)
            .map(|table| table.contains_key(version))
            .unwrap_or(false)
    }

    /// Qualified images for a registered version, keyed by image role
    pub fn images_for(&self, kind: ComponentKind, version: &str) -> Option<BTreeMap<String, String>> {
        let entry = self.tables.get(&kind)?.get(version)?;
        Some(
            entry
                .images
                .iter()
                .map(|(role, image)| (role.clone(), image.qualified(self.use_tags)))
                .collect(),
        )
    }

    /// Registered versions for `kind`
    pub fn versions(&self, kind: ComponentKind) -> Vec<&VersionEntry> {
        self.tables
            .get(&kind)
            .map(|table| table.values().collect())
            .unwrap_or_default()
    }

    /// Map an image tag or digest to a canonical version string.
    ///
    /// Digests are looked up directly. Tags are split into base version and
    /// build date and looked up as `base-date`. Unknown digests come back
    /// unchanged; unknown tags come back unchanged when they already carry a
    /// hyphenated suffix, otherwise as `base-0`.
    pub fn canonicalize(&self, raw: &str) -> CanonicalVersion {
        let raw = raw.trim();

        if raw.starts_with(DIGEST_PREFIX) {
            return match self.aliases.get(raw) {
                Some(version) => CanonicalVersion {
                    version: version.clone(),
                    resolved: true,
                },
                None => CanonicalVersion {
                    version: raw.to_string(),
                    resolved: false,
                },
            };
        }

        let mut parts = raw.splitn(3, '-');
        let base = parts.next().unwrap_or_default();
        let build_date = parts.next().unwrap_or_default();

        if !build_date.is_empty() {
            let key = format!("{}-{}", base, build_date);
            if let Some(version) = self.aliases.get(&key) {
                return CanonicalVersion {
                    version: version.clone(),
                    resolved: true,
                };
            }
            return CanonicalVersion {
                version: raw.to_string(),
                resolved: false,
            };
        }

        CanonicalVersion {
            version: format!("{}-0", base),
            resolved: false,
        }
    }

    pub fn use_tags(&self) -> bool {
        self.use_tags
    }
}

/// Leading integer of a version string ("2.2.1-3" -> 2, unparsable -> 0)
pub fn major_version(version: &str) -> u64 {
    version
        .split(|c: char| c == '.' || c == '-')
        .next()
        .and_then(|major| major.trim_start_matches('v').parse().ok())
        .unwrap_or(0)
}

/// Tag or digest portion of a qualified image reference
pub fn image_suffix(image: &str) -> Option<&str> {
    if let Some((_, digest)) = image.rsplit_once('@') {
        return Some(digest);
    }
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    last_segment.rsplit_once(':').map(|(_, tag)| tag)
}
