//! Backend adapters
//!
//! Implementations of the resource and artifact store ports:
//! - Kubernetes: custom resources and ConfigMaps through the API server
//! - Memory: standalone mode and tests

pub mod kubernetes;
pub mod memory;

pub use kubernetes::{api_resource, KubeArtifactStore, KubeResourceStore};
pub use memory::MemoryStore;

use crate::domain::{ArtifactStoreRef, ResourceStoreRef};
use std::sync::Arc;

/// Resource and artifact store pair handed to the component manager
#[derive(Clone)]
pub struct Backends {
    pub resources: ResourceStoreRef,
    pub artifacts: ArtifactStoreRef,
}

impl Backends {
    /// Stores backed by the Kubernetes API
    pub fn kubernetes(client: kube::Client) -> Self {
        Self {
            resources: Arc::new(KubeResourceStore::new(client.clone())),
            artifacts: Arc::new(KubeArtifactStore::new(client)),
        }
    }

    /// One in-memory store serving both ports
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            resources: store.clone(),
            artifacts: store,
        }
    }
}
