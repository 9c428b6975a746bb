//! In-memory backend
//!
//! Stands in for the Kubernetes API in standalone mode and in tests. With
//! auto-deploy enabled it plays the operator too: every write immediately
//! reports a settled `Deployed` status, and with generated profiles it also
//! writes a connection profile for the component.

use crate::crd::{ComponentKind, ComponentObject, ComponentSpec, ComponentStatus, StatusType};
use crate::domain::{connection_profile_name, ArtifactStore, ResourceRef, ResourceStore};
use crate::error::{Error, Result};
use crate::lifecycle::merge_json;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Default)]
pub struct MemoryStore {
    objects: DashMap<ResourceRef, ComponentObject>,
    artifacts: DashMap<(String, String), Bytes>,
    auto_deploy: AtomicBool,
    generate_profiles: AtomicBool,
    revision: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that deploys everything instantly and generates profiles
    pub fn simulated() -> Self {
        let store = Self::new();
        store.set_auto_deploy(true);
        store.generate_profiles.store(true, Ordering::SeqCst);
        store
    }

    pub fn set_auto_deploy(&self, enabled: bool) {
        self.auto_deploy.store(enabled, Ordering::SeqCst);
    }

    /// Put a connection profile (or any artifact) in place
    pub fn put_artifact(&self, namespace: &str, name: &str, content: impl Into<Bytes>) {
        self.artifacts
            .insert((namespace.to_string(), name.to_string()), content.into());
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Simulate the operator reacting to a write
    fn reconcile(&self, obj: &mut ComponentObject) {
        obj.resource_version = Some(self.revision.fetch_add(1, Ordering::SeqCst).to_string());

        if !self.auto_deploy.load(Ordering::SeqCst) {
            return;
        }

        obj.status = Some(ComponentStatus {
            status_type: StatusType::Deployed,
            status: "True".to_string(),
            reason: "Provisioned".to_string(),
            message: "allPodsRunning".to_string(),
            version: obj.spec.version.clone(),
            last_heartbeat_time: Utc::now().to_rfc3339(),
            error_code: None,
        });

        if self.generate_profiles.load(Ordering::SeqCst) {
            let host = format!("{}.{}.svc.cluster.local", obj.name, obj.namespace);
            let profile = json!({
                "endpoints": {
                    "api": format!("grpcs://{}:7051", host),
                    "operations": format!("https://{}:9443", host),
                },
                "certificates": {}
            });
            self.artifacts
                .entry((obj.namespace.clone(), connection_profile_name(&obj.name)))
                .or_insert_with(|| Bytes::from(profile.to_string()));
        }
    }
}

fn not_found(target: &ResourceRef) -> Error {
    Error::ResourceNotFound {
        kind: target.kind.resource_kind().to_string(),
        name: target.name.clone(),
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn create(&self, obj: &ComponentObject) -> Result<ComponentObject> {
        let key = ResourceRef::from(obj);
        if self.objects.contains_key(&key) {
            return Err(Error::ResourceExists {
                kind: obj.kind.resource_kind().to_string(),
                name: obj.name.clone(),
            });
        }

        let mut stored = obj.clone();
        stored.status = None;
        self.reconcile(&mut stored);
        self.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get(&self, target: &ResourceRef) -> Result<ComponentObject> {
        self.objects
            .get(target)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| not_found(target))
    }

    async fn update(&self, obj: &ComponentObject) -> Result<ComponentObject> {
        let key = ResourceRef::from(obj);
        let mut entry = self.objects.get_mut(&key).ok_or_else(|| not_found(&key))?;
        entry.spec = obj.spec.clone();
        entry.labels = obj.labels.clone();
        self.reconcile(&mut entry);
        Ok(entry.clone())
    }

    async fn patch(
        &self,
        target: &ResourceRef,
        partial_spec: serde_json::Value,
    ) -> Result<ComponentObject> {
        let mut entry = self.objects.get_mut(target).ok_or_else(|| not_found(target))?;
        let mut spec = serde_json::to_value(&entry.spec)?;
        merge_json(&mut spec, &partial_spec);
        let spec: ComponentSpec = serde_json::from_value(spec)?;
        entry.spec = spec;
        self.reconcile(&mut entry);
        Ok(entry.clone())
    }

    async fn delete(&self, target: &ResourceRef) -> Result<()> {
        self.objects
            .remove(target)
            .map(|_| ())
            .ok_or_else(|| not_found(target))
    }

    async fn list(
        &self,
        kind: ComponentKind,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<ComponentObject>> {
        let mut matching: Vec<ComponentObject> = self
            .objects
            .iter()
            .filter(|entry| {
                let obj = entry.value();
                obj.kind == kind
                    && obj.namespace == namespace
                    && labels.iter().all(|(k, v)| obj.labels.get(k) == Some(v))
            })
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matching)
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn get_artifact(&self, namespace: &str, name: &str) -> Result<Option<Bytes>> {
        Ok(self
            .artifacts
            .get(&(namespace.to_string(), name.to_string()))
            .map(|entry| entry.value().clone()))
    }
}
