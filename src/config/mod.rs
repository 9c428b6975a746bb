//! Deployer Configuration
//!
//! Loaded once at process start from YAML and shared read-only as
//! `Arc<DeployerConfig>`. Holds the version tables, the digest/tag alias
//! table, per-kind default resources and storage, and convergence timing.

pub mod versions;

pub use versions::*;

use crate::crd::{ComponentKind, ResourceRequirements, StorageSpec};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

// =============================================================================
// Convergence Settings
// =============================================================================

/// Polling behaviour while waiting for the operator to settle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceConfig {
    /// Delay between status reads
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound for a create to converge
    #[serde(default = "default_create_timeout_secs")]
    pub create_timeout_secs: u64,
    /// Upper bound for an update or patch to converge
    #[serde(default = "default_update_timeout_secs")]
    pub update_timeout_secs: u64,
    /// Consecutive read failures tolerated on the first node of a multi-node
    /// component before giving up
    #[serde(default = "default_first_node_read_failures")]
    pub first_node_read_failures: u32,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            create_timeout_secs: default_create_timeout_secs(),
            update_timeout_secs: default_update_timeout_secs(),
            first_node_read_failures: default_first_node_read_failures(),
        }
    }
}

impl ConvergenceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.create_timeout_secs)
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.update_timeout_secs)
    }
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_create_timeout_secs() -> u64 {
    600
}

fn default_update_timeout_secs() -> u64 {
    300
}

fn default_first_node_read_failures() -> u32 {
    10
}

// =============================================================================
// Component Defaults
// =============================================================================

/// Default resources and storage for one component kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDefaults {
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRequirements>,
    #[serde(default)]
    pub storage: BTreeMap<String, StorageSpec>,
}

impl ComponentDefaults {
    /// Built-in defaults used when the configuration file omits a kind
    pub fn builtin(kind: ComponentKind) -> Self {
        let slots: &[(&str, &str, &str)] = match kind {
            ComponentKind::Ca => &[("ca", "100m", "200Mi"), ("init", "100m", "200Mi")],
            ComponentKind::Peer => &[
                ("peer", "200m", "400Mi"),
                ("proxy", "100m", "200Mi"),
                ("couchdb", "200m", "400Mi"),
                ("dind", "1", "1Gi"),
                ("fluentd", "100m", "200Mi"),
                ("chaincodelauncher", "200m", "400Mi"),
                ("init", "100m", "200Mi"),
            ],
            ComponentKind::Orderer => &[
                ("orderer", "250m", "500Mi"),
                ("proxy", "100m", "200Mi"),
                ("init", "100m", "200Mi"),
            ],
        };
        let volumes: &[(&str, &str)] = match kind {
            ComponentKind::Ca => &[("ca", "1Gi")],
            ComponentKind::Peer => &[("peer", "100Gi"), ("statedb", "100Gi")],
            ComponentKind::Orderer => &[("orderer", "100Gi")],
        };

        Self {
            resources: slots
                .iter()
                .map(|(slot, cpu, memory)| {
                    (slot.to_string(), ResourceRequirements::symmetric(cpu, memory))
                })
                .collect(),
            storage: volumes
                .iter()
                .map(|(slot, size)| (slot.to_string(), StorageSpec::new(*size, "")))
                .collect(),
        }
    }
}

// =============================================================================
// Deployer Configuration
// =============================================================================

/// Process-wide, load-once configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployerConfig {
    /// Reference images by tag instead of digest
    #[serde(default)]
    pub use_tags: bool,

    /// Deployable versions per kind, keyed by version string
    #[serde(default)]
    pub versions: BTreeMap<ComponentKind, BTreeMap<String, VersionEntry>>,

    /// Digest or `base-date` tag to canonical version
    #[serde(default)]
    pub image_aliases: BTreeMap<String, String>,

    /// Default resources and storage per kind
    #[serde(default)]
    pub defaults: BTreeMap<ComponentKind, ComponentDefaults>,

    #[serde(default)]
    pub convergence: ConvergenceConfig,
}

impl DeployerConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut config: DeployerConfig = serde_yaml::from_str(yaml)?;
        config.fill_builtin_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml_str(&raw)?;

        info!(
            path = %path.display(),
            ca_versions = config.versions.get(&ComponentKind::Ca).map_or(0, |t| t.len()),
            peer_versions = config.versions.get(&ComponentKind::Peer).map_or(0, |t| t.len()),
            orderer_versions = config.versions.get(&ComponentKind::Orderer).map_or(0, |t| t.len()),
            aliases = config.image_aliases.len(),
            "Loaded deployer configuration"
        );

        Ok(config)
    }

    fn fill_builtin_defaults(&mut self) {
        for kind in ComponentKind::ALL {
            self.defaults
                .entry(kind)
                .or_insert_with(|| ComponentDefaults::builtin(kind));
        }
    }

    /// Reject tables the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        for (kind, table) in &self.versions {
            let defaults: Vec<&String> = table
                .iter()
                .filter(|(_, entry)| entry.is_default)
                .map(|(version, _)| version)
                .collect();
            if defaults.len() > 1 {
                return Err(Error::Configuration(format!(
                    "{} has more than one default version: {:?}",
                    kind, defaults
                )));
            }
        }

        let convergence = &self.convergence;
        if convergence.poll_interval_ms == 0 {
            return Err(Error::Configuration(
                "convergence.pollIntervalMs must be positive".into(),
            ));
        }
        let interval = convergence.poll_interval();
        if convergence.create_timeout() < interval || convergence.update_timeout() < interval {
            return Err(Error::Configuration(
                "convergence timeouts must not be shorter than the poll interval".into(),
            ));
        }

        Ok(())
    }

    /// Build the immutable version registry
    pub fn version_registry(&self) -> VersionRegistry {
        VersionRegistry::new(
            self.versions.clone(),
            self.image_aliases.clone(),
            self.use_tags,
        )
    }

    /// Defaults for one kind
    pub fn defaults_for(&self, kind: ComponentKind) -> ComponentDefaults {
        self.defaults
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| ComponentDefaults::builtin(kind))
    }
}
