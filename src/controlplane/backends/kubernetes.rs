//! Kubernetes backend
//!
//! Component resources are custom resources owned by the Fabric operator.
//! They are accessed as `DynamicObject`s so one store serves every kind.
//! Connection profiles are ConfigMaps the operator writes next to them.

use crate::crd::{ComponentKind, ComponentObject, API_GROUP, API_VERSION};
use crate::domain::{ArtifactStore, ResourceRef, ResourceStore, CONNECTION_PROFILE_KEY};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::discovery::ApiResource;
use kube::{Client, ResourceExt};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

/// API resource description for a component kind
pub fn api_resource(kind: ComponentKind) -> ApiResource {
    ApiResource {
        group: API_GROUP.to_string(),
        version: API_VERSION.to_string(),
        api_version: ComponentKind::api_version(),
        kind: kind.resource_kind().to_string(),
        plural: kind.plural().to_string(),
    }
}

/// Map API 404 / 409 onto the store's not-found / exists errors
fn map_kube_error(e: kube::Error, kind: ComponentKind, name: &str) -> Error {
    match e {
        kube::Error::Api(ae) if ae.code == 404 => Error::ResourceNotFound {
            kind: kind.resource_kind().to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            Error::ResourceExists {
                kind: kind.resource_kind().to_string(),
                name: name.to_string(),
            }
        }
        other => Error::Kube(other),
    }
}

fn to_dynamic(obj: &ComponentObject) -> Result<DynamicObject> {
    let ar = api_resource(obj.kind);
    let mut dynamic = DynamicObject::new(&obj.name, &ar).within(&obj.namespace);
    if !obj.labels.is_empty() {
        dynamic.metadata.labels = Some(obj.labels.clone());
    }
    dynamic.metadata.resource_version = obj.resource_version.clone();
    dynamic.data = json!({ "spec": serde_json::to_value(&obj.spec)? });
    Ok(dynamic)
}

fn from_dynamic(kind: ComponentKind, dynamic: DynamicObject) -> Result<ComponentObject> {
    let spec = match dynamic.data.get("spec") {
        Some(spec) if !spec.is_null() => serde_json::from_value(spec.clone())?,
        _ => Default::default(),
    };
    let status = match dynamic.data.get("status") {
        Some(status) if !status.is_null() => Some(serde_json::from_value(status.clone())?),
        _ => None,
    };

    Ok(ComponentObject {
        kind,
        name: dynamic.name_any(),
        namespace: dynamic.namespace().unwrap_or_default(),
        labels: dynamic.metadata.labels.clone().unwrap_or_default(),
        resource_version: dynamic.resource_version(),
        spec,
        status,
    })
}

fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

// =============================================================================
// Resource Store
// =============================================================================

pub struct KubeResourceStore {
    client: Client,
    field_manager: String,
}

impl KubeResourceStore {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            field_manager: crate::NAME.to_string(),
        }
    }

    fn api(&self, kind: ComponentKind, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &api_resource(kind))
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn create(&self, obj: &ComponentObject) -> Result<ComponentObject> {
        let api = self.api(obj.kind, &obj.namespace);
        let created = api
            .create(&self.post_params(), &to_dynamic(obj)?)
            .await
            .map_err(|e| map_kube_error(e, obj.kind, &obj.name))?;
        debug!(kind = %obj.kind, namespace = %obj.namespace, name = %obj.name, "Created resource");
        from_dynamic(obj.kind, created)
    }

    async fn get(&self, target: &ResourceRef) -> Result<ComponentObject> {
        let dynamic = self
            .api(target.kind, &target.namespace)
            .get(&target.name)
            .await
            .map_err(|e| map_kube_error(e, target.kind, &target.name))?;
        from_dynamic(target.kind, dynamic)
    }

    async fn update(&self, obj: &ComponentObject) -> Result<ComponentObject> {
        let api = self.api(obj.kind, &obj.namespace);
        let mut dynamic = to_dynamic(obj)?;

        // Replace requires the current resource version
        if dynamic.metadata.resource_version.is_none() {
            let current = api
                .get(&obj.name)
                .await
                .map_err(|e| map_kube_error(e, obj.kind, &obj.name))?;
            dynamic.metadata.resource_version = current.resource_version();
        }

        let replaced = api
            .replace(&obj.name, &self.post_params(), &dynamic)
            .await
            .map_err(|e| map_kube_error(e, obj.kind, &obj.name))?;
        from_dynamic(obj.kind, replaced)
    }

    async fn patch(
        &self,
        target: &ResourceRef,
        partial_spec: serde_json::Value,
    ) -> Result<ComponentObject> {
        let patch = json!({ "spec": partial_spec });
        let params = PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        };
        let patched = self
            .api(target.kind, &target.namespace)
            .patch(&target.name, &params, &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_error(e, target.kind, &target.name))?;
        from_dynamic(target.kind, patched)
    }

    async fn delete(&self, target: &ResourceRef) -> Result<()> {
        self.api(target.kind, &target.namespace)
            .delete(&target.name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, target.kind, &target.name))?;
        Ok(())
    }

    async fn list(
        &self,
        kind: ComponentKind,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<ComponentObject>> {
        let params = ListParams::default().labels(&label_selector(labels));
        let list = self.api(kind, namespace).list(&params).await?;
        list.items
            .into_iter()
            .map(|item| from_dynamic(kind, item))
            .collect()
    }
}

// =============================================================================
// Artifact Store
// =============================================================================

pub struct KubeArtifactStore {
    client: Client,
}

impl KubeArtifactStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactStore for KubeArtifactStore {
    async fn get_artifact(&self, namespace: &str, name: &str) -> Result<Option<Bytes>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let Some(config_map) = api.get_opt(name).await? else {
            return Ok(None);
        };

        if let Some(value) = config_map
            .data
            .as_ref()
            .and_then(|data| data.get(CONNECTION_PROFILE_KEY))
        {
            return Ok(Some(Bytes::from(value.clone())));
        }

        Ok(config_map
            .binary_data
            .as_ref()
            .and_then(|data| data.get(CONNECTION_PROFILE_KEY))
            .map(|value| Bytes::from(value.0.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ComponentSpec, StatusType};

    #[test]
    fn test_api_resource() {
        let ar = api_resource(ComponentKind::Orderer);
        assert_eq!(ar.api_version, "ibp.com/v1beta1");
        assert_eq!(ar.kind, "IBPOrderer");
        assert_eq!(ar.plural, "ibporderers");
    }

    #[test]
    fn test_dynamic_conversion() {
        let spec = ComponentSpec {
            version: "2.2.1-3".into(),
            replicas: Some(1),
            ..Default::default()
        };
        let obj = ComponentObject::new(ComponentKind::Orderer, "org1", "osnode1", spec)
            .with_label("orderingservice", "os");

        let mut dynamic = to_dynamic(&obj).unwrap();
        assert_eq!(dynamic.name_any(), "osnode1");
        assert_eq!(dynamic.namespace().as_deref(), Some("org1"));
        assert_eq!(dynamic.data["spec"]["version"], "2.2.1-3");

        dynamic.data["status"] = json!({"type": "Deployed", "status": "True", "version": "2.2.1-3"});
        let back = from_dynamic(ComponentKind::Orderer, dynamic).unwrap();
        assert_eq!(back.spec, obj.spec);
        assert_eq!(back.labels["orderingservice"], "os");
        let status = back.status.unwrap();
        assert_eq!(status.status_type, StatusType::Deployed);
        assert!(status.is_settled());
    }

    #[test]
    fn test_label_selector() {
        let mut labels = BTreeMap::new();
        labels.insert("orderingservice".to_string(), "os".to_string());
        labels.insert("app".to_string(), "fabric".to_string());
        assert_eq!(label_selector(&labels), "app=fabric,orderingservice=os");
    }
}
