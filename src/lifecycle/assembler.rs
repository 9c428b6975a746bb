//! Aggregate Assembler
//!
//! Re-reads a component after a mutation (or for a plain read) and packages
//! status, resources, storage, endpoints and credential material into one
//! response. Sub-read failures never abort assembly; they leave the field
//! empty, add a warning and mark the response degraded.

use crate::config::{image_suffix, VersionRegistry};
use crate::crd::{ComponentActions, ComponentKind, ComponentStatus, ResourceRequirements, StorageSpec};
use crate::domain::{
    ArtifactStore, ComponentObject, ComponentSchema, ConnectionProfile, ResourceRef, ResourceStore,
};
use crate::lifecycle::poller::{ConvergenceResult, PollOutcome};
use crate::lifecycle::quantity::{total_resources, ResourceTotals};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

// =============================================================================
// Response
// =============================================================================

/// Aggregate view of one component returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentResponse {
    pub name: String,
    pub kind: ComponentKind,
    pub namespace: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ComponentStatus>,
    /// Convergence outcome when the response follows a mutation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PollOutcome>,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRequirements>,
    #[serde(default)]
    pub resource_totals: ResourceTotals,
    #[serde(default)]
    pub storage: BTreeMap<String, StorageSpec>,
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
    #[serde(default)]
    pub certificates: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_override: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_db: Option<String>,
    #[serde(default)]
    pub pending_actions: ComponentActions,
    /// Per-node views of a multi-node component
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<ComponentResponse>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ComponentResponse {
    /// Response carrying only the component identity
    pub fn empty(kind: ComponentKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            namespace: namespace.into(),
            version: String::new(),
            replicas: None,
            status: None,
            outcome: None,
            resources: BTreeMap::new(),
            resource_totals: ResourceTotals::default(),
            storage: BTreeMap::new(),
            endpoints: BTreeMap::new(),
            certificates: BTreeMap::new(),
            config_override: None,
            state_db: None,
            pending_actions: ComponentActions::default(),
            nodes: Vec::new(),
            warnings: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Assembled response plus whether any sub-read failed
#[derive(Debug, Clone)]
pub struct Assembled {
    pub response: ComponentResponse,
    pub degraded: bool,
}

impl Assembled {
    fn warn(&mut self, message: String) {
        warn!(component = %self.response.name, "{}", message);
        self.response.warnings.push(message);
        self.degraded = true;
    }
}

// =============================================================================
// Assembler
// =============================================================================

pub struct AggregateAssembler<'a> {
    store: &'a dyn ResourceStore,
    artifacts: &'a dyn ArtifactStore,
    registry: &'a VersionRegistry,
}

impl<'a> AggregateAssembler<'a> {
    pub fn new(
        store: &'a dyn ResourceStore,
        artifacts: &'a dyn ArtifactStore,
        registry: &'a VersionRegistry,
    ) -> Self {
        Self {
            store,
            artifacts,
            registry,
        }
    }

    /// Assemble the view of one backend resource.
    ///
    /// `convergence` is the poll result when the read follows a mutation; its
    /// outcome is reported and its artifact reused instead of fetched again.
    pub async fn assemble(
        &self,
        target: &ResourceRef,
        convergence: Option<&ConvergenceResult>,
    ) -> Assembled {
        match self.store.get(target).await {
            Ok(obj) => self.assemble_object(target, obj, convergence).await,
            Err(e) => {
                let mut assembled = Assembled {
                    response: ComponentResponse::empty(target.kind, &target.namespace, &target.name),
                    degraded: false,
                };
                assembled.response.outcome = convergence.map(|c| c.outcome);
                assembled.warn(format!("failed to read {}: {}", target, e));
                // Fall back to the last snapshot the poller saw
                assembled.response.status = convergence.and_then(|c| c.status.clone());
                assembled
            }
        }
    }

    /// Assemble from an object the caller has already read
    pub async fn assemble_object(
        &self,
        target: &ResourceRef,
        obj: ComponentObject,
        convergence: Option<&ConvergenceResult>,
    ) -> Assembled {
        let mut assembled = Assembled {
            response: ComponentResponse::empty(target.kind, &target.namespace, &target.name),
            degraded: false,
        };
        assembled.response.outcome = convergence.map(|c| c.outcome);

        self.fill_from_object(&mut assembled, &obj);

        let cached = convergence.and_then(|c| c.artifact.clone());
        self.fill_connection(&mut assembled, target, cached).await;

        assembled
    }

    /// Combine per-node views of a multi-node component under its service name
    pub fn assemble_group(
        &self,
        kind: ComponentKind,
        namespace: &str,
        service: &str,
        nodes: Vec<Assembled>,
    ) -> Assembled {
        let mut group = Assembled {
            response: ComponentResponse::empty(kind, namespace, service),
            degraded: nodes.iter().any(|n| n.degraded),
        };

        if let Some(first) = nodes.first() {
            let first = &first.response;
            group.response.version = first.version.clone();
            group.response.replicas = first.replicas;
            group.response.resources = first.resources.clone();
            group.response.resource_totals = first.resource_totals;
            group.response.storage = first.storage.clone();
            group.response.config_override = first.config_override.clone();
        }

        // Outcome and status of the last node reached tell how far the
        // bootstrap got
        if let Some(last) = nodes.last() {
            group.response.status = last.response.status.clone();
            group.response.outcome = last.response.outcome;
        }

        for node in &nodes {
            for (key, value) in &node.response.endpoints {
                group
                    .response
                    .endpoints
                    .insert(format!("{}.{}", node.response.name, key), value.clone());
            }
            group
                .response
                .warnings
                .extend(node.response.warnings.iter().cloned());
        }

        group.response.nodes = nodes.into_iter().map(|n| n.response).collect();
        group
    }

    fn fill_from_object(&self, assembled: &mut Assembled, obj: &ComponentObject) {
        let response = &mut assembled.response;
        response.replicas = obj.spec.replicas;
        response.status = obj.status.clone();
        response.resources = obj.spec.resources.clone();
        response.storage = obj.spec.storage.clone();
        response.config_override = obj.spec.config_override.clone();
        response.state_db = obj.spec.state_db.clone();
        response.pending_actions = obj.spec.action.clone();

        let version = self.observed_version(obj);
        assembled.response.version = version;

        match total_resources(obj.spec.resources.values()) {
            Ok(totals) => assembled.response.resource_totals = totals,
            Err(e) => assembled.warn(format!("failed to total resources: {}", e)),
        }
    }

    /// Version reported by the operator, else derived from the running image
    fn observed_version(&self, obj: &ComponentObject) -> String {
        if let Some(status) = &obj.status {
            if !status.version.is_empty() {
                return status.version.clone();
            }
        }

        let schema = ComponentSchema::for_kind(obj.kind);
        let suffix = obj
            .spec
            .images
            .get(schema.main_image)
            .and_then(|image| image_suffix(image));

        match suffix {
            Some(suffix) => {
                let canonical = self.registry.canonicalize(suffix);
                if !canonical.resolved {
                    warn!(
                        component = %obj.name,
                        image = %suffix,
                        version = %canonical.version,
                        "Could not resolve image to a known version, using best guess"
                    );
                }
                canonical.version
            }
            None => obj.spec.version.clone(),
        }
    }

    async fn fill_connection(&self, assembled: &mut Assembled, target: &ResourceRef, cached: Option<Bytes>) {
        let raw = match cached {
            Some(raw) => raw,
            None => match self
                .artifacts
                .get_artifact(&target.namespace, &target.artifact_name())
                .await
            {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    debug!(component = %target, "Connection profile not generated yet");
                    assembled
                        .response
                        .warnings
                        .push(format!("connection profile {} not available yet", target.artifact_name()));
                    return;
                }
                Err(e) => {
                    assembled.warn(format!(
                        "failed to read connection profile {}: {}",
                        target.artifact_name(),
                        e
                    ));
                    return;
                }
            },
        };

        match ConnectionProfile::from_bytes(&raw) {
            Ok(profile) => {
                assembled.response.endpoints = profile.endpoints;
                assembled.response.certificates = profile.certificates;
            }
            Err(e) => assembled.warn(format!(
                "failed to parse connection profile {}: {}",
                target.artifact_name(),
                e
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeployerConfig;
    use crate::crd::{ComponentSpec, StatusType};
    use crate::error::{Error, Result};
    use async_trait::async_trait;

    struct OneObject(Option<ComponentObject>);

    #[async_trait]
    impl ResourceStore for OneObject {
        async fn create(&self, obj: &ComponentObject) -> Result<ComponentObject> {
            Ok(obj.clone())
        }

        async fn get(&self, target: &ResourceRef) -> Result<ComponentObject> {
            self.0.clone().ok_or_else(|| Error::ResourceNotFound {
                kind: target.kind.resource_kind().to_string(),
                name: target.name.clone(),
            })
        }

        async fn update(&self, obj: &ComponentObject) -> Result<ComponentObject> {
            Ok(obj.clone())
        }

        async fn patch(&self, target: &ResourceRef, _: serde_json::Value) -> Result<ComponentObject> {
            self.get(target).await
        }

        async fn delete(&self, _: &ResourceRef) -> Result<()> {
            Ok(())
        }

        async fn list(
            &self,
            _: ComponentKind,
            _: &str,
            _: &BTreeMap<String, String>,
        ) -> Result<Vec<ComponentObject>> {
            Ok(self.0.clone().into_iter().collect())
        }
    }

    enum Artifact {
        Present(&'static [u8]),
        Missing,
        Broken,
    }

    #[async_trait]
    impl ArtifactStore for Artifact {
        async fn get_artifact(&self, _: &str, _: &str) -> Result<Option<Bytes>> {
            match self {
                Artifact::Present(raw) => Ok(Some(Bytes::from_static(raw))),
                Artifact::Missing => Ok(None),
                Artifact::Broken => Err(Error::Backend("forbidden".into())),
            }
        }
    }

    fn registry() -> VersionRegistry {
        DeployerConfig::from_yaml_str(include_str!("../../config/deployer.yaml"))
            .unwrap()
            .version_registry()
    }

    fn peer_object() -> ComponentObject {
        let mut spec = ComponentSpec {
            version: "2.2.1-3".into(),
            replicas: Some(1),
            ..Default::default()
        };
        spec.resources
            .insert("peer".into(), ResourceRequirements::symmetric("200m", "400Mi"));
        spec.resources
            .insert("proxy".into(), ResourceRequirements::symmetric("100m", "200Mi"));
        spec.storage.insert("peer".into(), StorageSpec::new("100Gi", "default"));

        let mut obj = ComponentObject::new(ComponentKind::Peer, "org1", "peer0", spec);
        obj.status = Some(ComponentStatus {
            status_type: StatusType::Deployed,
            status: "True".into(),
            version: "2.2.1-3".into(),
            ..Default::default()
        });
        obj
    }

    fn target() -> ResourceRef {
        ResourceRef::new(ComponentKind::Peer, "org1", "peer0")
    }

    const PROFILE: &[u8] =
        br#"{"endpoints": {"api": "grpcs://peer0:7051"}, "certificates": {"tls": "LS0t"}}"#;

    #[tokio::test]
    async fn test_assemble_full_view() {
        let store = OneObject(Some(peer_object()));
        let artifacts = Artifact::Present(PROFILE);
        let registry = registry();
        let assembler = AggregateAssembler::new(&store, &artifacts, &registry);

        let assembled = assembler.assemble(&target(), None).await;
        assert!(!assembled.degraded);

        let response = assembled.response;
        assert_eq!(response.name, "peer0");
        assert_eq!(response.version, "2.2.1-3");
        assert_eq!(response.endpoints["api"], "grpcs://peer0:7051");
        assert_eq!(response.certificates["tls"], "LS0t");
        assert_eq!(response.resource_totals.requests.cpu_millicores, 300);
        assert_eq!(response.resource_totals.limits.memory_mb, 600);
        assert!(response.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_failed_artifact_read_degrades() {
        let store = OneObject(Some(peer_object()));
        let artifacts = Artifact::Broken;
        let registry = registry();
        let assembler = AggregateAssembler::new(&store, &artifacts, &registry);

        let assembled = assembler.assemble(&target(), None).await;
        assert!(assembled.degraded);
        assert!(assembled.response.endpoints.is_empty());
        assert_eq!(assembled.response.warnings.len(), 1);
        // Other fields are still filled
        assert_eq!(assembled.response.storage["peer"].size, "100Gi");
    }

    #[tokio::test]
    async fn test_missing_artifact_is_a_warning_only() {
        let store = OneObject(Some(peer_object()));
        let artifacts = Artifact::Missing;
        let registry = registry();
        let assembler = AggregateAssembler::new(&store, &artifacts, &registry);

        let assembled = assembler.assemble(&target(), None).await;
        assert!(!assembled.degraded);
        assert_eq!(assembled.response.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_resource_keeps_name() {
        let store = OneObject(None);
        let artifacts = Artifact::Missing;
        let registry = registry();
        let assembler = AggregateAssembler::new(&store, &artifacts, &registry);

        let convergence = ConvergenceResult {
            outcome: PollOutcome::Timeout,
            status: None,
            artifact: None,
            reads: 3,
            elapsed: std::time::Duration::from_millis(30),
        };
        let assembled = assembler.assemble(&target(), Some(&convergence)).await;
        assert!(assembled.degraded);
        assert_eq!(assembled.response.name, "peer0");
        assert_eq!(assembled.response.outcome, Some(PollOutcome::Timeout));
    }

    #[tokio::test]
    async fn test_version_from_image_digest() {
        let mut obj = peer_object();
        obj.status.as_mut().unwrap().version.clear();
        obj.spec.images.insert(
            "peer".into(),
            "hyperledger/fabric-peer@sha256:04b405a56b2e8e94862dd490d12e41ff8244990b8074214d2d3afc515a2022ba".into(),
        );
        let store = OneObject(Some(obj));
        let artifacts = Artifact::Present(PROFILE);
        let registry = registry();
        let assembler = AggregateAssembler::new(&store, &artifacts, &registry);

        let assembled = assembler.assemble(&target(), None).await;
        assert_eq!(assembled.response.version, "1.4.9-1");
    }

    #[tokio::test]
    async fn test_assemble_group() {
        let store = OneObject(Some(peer_object()));
        let artifacts = Artifact::Present(PROFILE);
        let registry = registry();
        let assembler = AggregateAssembler::new(&store, &artifacts, &registry);

        let first = assembler.assemble(&target(), None).await;
        let mut second = first.clone();
        second.response.name = "peer1".into();
        second.degraded = true;

        let group = assembler.assemble_group(ComponentKind::Orderer, "org1", "os", vec![first, second]);
        assert!(group.degraded);
        assert_eq!(group.response.name, "os");
        assert_eq!(group.response.nodes.len(), 2);
        assert_eq!(group.response.endpoints["peer1.api"], "grpcs://peer0:7051");
        assert_eq!(group.response.version, "2.2.1-3");
    }
}
