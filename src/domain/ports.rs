//! Domain Ports - Collaborator contracts of the reconciliation engine
//!
//! The engine never talks to Kubernetes directly. It reads and mutates
//! component resources through [`ResourceStore`] and fetches operator
//! generated bundles through [`ArtifactStore`].

use crate::crd::ComponentKind;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub use crate::crd::ComponentObject;

/// Data key of the connection profile inside its artifact
pub const CONNECTION_PROFILE_KEY: &str = "profile.json";

// =============================================================================
// Resource Reference
// =============================================================================

/// Address of one backend resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ComponentKind,
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: ComponentKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Name of the connection profile artifact the operator generates
    pub fn artifact_name(&self) -> String {
        connection_profile_name(&self.name)
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.kind.resource_kind(), self.namespace, self.name)
    }
}

impl From<&ComponentObject> for ResourceRef {
    fn from(obj: &ComponentObject) -> Self {
        ResourceRef::new(obj.kind, obj.namespace.clone(), obj.name.clone())
    }
}

/// Deterministic artifact name for a component
pub fn connection_profile_name(component: &str) -> String {
    format!("{}-connprofile", component)
}

// =============================================================================
// Connection Profile
// =============================================================================

/// Endpoints and public credential material generated by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
    /// PEM or base64 certificates keyed by purpose (tls, signcert, cacert...)
    #[serde(default)]
    pub certificates: BTreeMap<String, String>,
}

impl ConnectionProfile {
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

// =============================================================================
// Resource Store Port
// =============================================================================

/// Port for component resource CRUD
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Create a resource; fails with `ResourceExists` on a name clash
    async fn create(&self, obj: &ComponentObject) -> Result<ComponentObject>;

    /// Read spec and status; fails with `ResourceNotFound` when absent
    async fn get(&self, target: &ResourceRef) -> Result<ComponentObject>;

    /// Replace the spec of an existing resource
    async fn update(&self, obj: &ComponentObject) -> Result<ComponentObject>;

    /// Merge a partial spec into an existing resource
    async fn patch(&self, target: &ResourceRef, partial_spec: serde_json::Value)
        -> Result<ComponentObject>;

    /// Delete a resource
    async fn delete(&self, target: &ResourceRef) -> Result<()>;

    /// List resources of a kind carrying all the given labels
    async fn list(
        &self,
        kind: ComponentKind,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<ComponentObject>>;
}

// =============================================================================
// Artifact Store Port
// =============================================================================

/// Port for operator generated side artifacts
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetch an artifact; `Ok(None)` when it does not exist (yet)
    async fn get_artifact(&self, namespace: &str, name: &str) -> Result<Option<Bytes>>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ResourceStoreRef = Arc<dyn ResourceStore>;
pub type ArtifactStoreRef = Arc<dyn ArtifactStore>;
