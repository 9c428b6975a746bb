//! Component Manager
//!
//! Entry point for the five component operations. Every request is validated
//! in full (version, slots, quantities, replicas, actions) before anything is
//! written to the backend. After a mutation the manager waits for
//! convergence and answers with an aggregate view plus a status code.
//!
//! An `Error` or `Timeout` convergence outcome is not an `Err`: the caller
//! receives the best-effort view together with a 500 status. Only validation
//! failures and fatal backend errors are returned as `Err`.

use crate::config::{DeployerConfig, VersionRegistry};
use crate::controlplane::metrics::DeployerMetrics;
use crate::crd::{
    ComponentActions, ComponentKind, ComponentObject, ComponentSpec, ResourceRequirements,
    StorageSpec,
};
use crate::domain::{
    ArtifactStoreRef, ComponentSchema, ResourceRef, ResourceStoreRef, SlotContext,
};
use crate::error::{Error, Result};
use crate::lifecycle::{
    check_replicas, merge_json, merge_resources, merge_storage, total_resources, validate_actions,
    AggregateAssembler, Assembled, ComponentResponse, ConvergencePoller, NodePosition,
    PollOutcome, PollSettings,
};
use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Label tying ordering nodes to their service
pub const ORDERING_SERVICE_LABEL: &str = "orderingservice";

// =============================================================================
// Requests and Replies
// =============================================================================

/// Body of a create request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComponentRequest {
    pub name: String,
    /// Version to deploy; the kind's default when absent
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub replicas: Option<u32>,
    #[serde(default)]
    pub resources: Option<BTreeMap<String, ResourceRequirements>>,
    #[serde(default)]
    pub storage: Option<BTreeMap<String, StorageSpec>>,
    #[serde(default)]
    pub config_override: Option<Value>,
    #[serde(default)]
    pub actions: Option<ComponentActions>,
    #[serde(default)]
    pub state_db: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub msp_id: Option<String>,
    #[serde(default)]
    pub enrollment: Option<Value>,
    /// Number of ordering nodes
    #[serde(default)]
    pub cluster_size: Option<u32>,
}

/// Response object plus the status code to report
#[derive(Debug, Clone)]
pub struct Reply<T> {
    pub status: StatusCode,
    pub body: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub name: String,
    pub kind: ComponentKind,
    pub namespace: String,
    /// Backend resources removed
    pub deleted: Vec<String>,
}

// =============================================================================
// Sections
// =============================================================================

/// Addressable part of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    All,
    Status,
    Resources,
    Storage,
    Connection,
    Config,
    Version,
    Replicas,
    Actions,
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Section::All => write!(f, "all"),
            Section::Status => write!(f, "status"),
            Section::Resources => write!(f, "resources"),
            Section::Storage => write!(f, "storage"),
            Section::Connection => write!(f, "connection"),
            Section::Config => write!(f, "config"),
            Section::Version => write!(f, "version"),
            Section::Replicas => write!(f, "replicas"),
            Section::Actions => write!(f, "actions"),
        }
    }
}

impl std::str::FromStr for Section {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "" | "all" => Ok(Section::All),
            "status" => Ok(Section::Status),
            "resources" => Ok(Section::Resources),
            "storage" => Ok(Section::Storage),
            "connection" => Ok(Section::Connection),
            "config" => Ok(Section::Config),
            "version" => Ok(Section::Version),
            "replicas" => Ok(Section::Replicas),
            "actions" => Ok(Section::Actions),
            other => Err(Error::InvalidRequest(format!("unknown section: {}", other))),
        }
    }
}

fn unsupported(operation: &str, section: Section) -> Error {
    Error::UnsupportedSection {
        operation: operation.to_string(),
        section: section.to_string(),
    }
}

// =============================================================================
// Component Manager
// =============================================================================

/// Kind-independent manager for all component operations
pub struct ComponentManager {
    config: Arc<DeployerConfig>,
    registry: VersionRegistry,
    store: ResourceStoreRef,
    artifacts: ArtifactStoreRef,
    metrics: Arc<DeployerMetrics>,
}

impl ComponentManager {
    pub fn new(
        config: Arc<DeployerConfig>,
        store: ResourceStoreRef,
        artifacts: ArtifactStoreRef,
        metrics: Arc<DeployerMetrics>,
    ) -> Self {
        let registry = config.version_registry();
        Self {
            config,
            registry,
            store,
            artifacts,
            metrics,
        }
    }

    pub fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<DeployerMetrics> {
        &self.metrics
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Create a component and wait for it to deploy
    pub async fn create_component(
        &self,
        kind: ComponentKind,
        namespace: &str,
        request: CreateComponentRequest,
    ) -> Result<Reply<ComponentResponse>> {
        let result = self.do_create(kind, namespace, request).await;
        self.record(kind, "create", &result);
        result
    }

    async fn do_create(
        &self,
        kind: ComponentKind,
        namespace: &str,
        request: CreateComponentRequest,
    ) -> Result<Reply<ComponentResponse>> {
        let schema = ComponentSchema::for_kind(kind);
        validate_name(&request.name)?;
        validate_name(namespace)?;

        let version = match request.version.as_deref().filter(|v| !v.is_empty()) {
            Some(version) => {
                self.require_version(kind, version)?;
                version.to_string()
            }
            None => self
                .registry
                .resolve_default(kind)
                .ok_or_else(|| Error::NoDefaultVersion {
                    kind: kind.to_string(),
                })?
                .to_string(),
        };

        check_slot_names(schema, request.resources.as_ref(), request.storage.as_ref())?;

        let defaults = self.config.defaults_for(kind);
        let ctx = SlotContext::new(&version, request.state_db.as_deref());
        let resources = merge_resources(
            &defaults.resources,
            request.resources.as_ref(),
            &schema.active_slots(&ctx),
        );
        validate_quantities(&resources)?;
        let storage = merge_storage(&defaults.storage, request.storage.as_ref());

        let replicas = request.replicas.unwrap_or(1);
        check_replicas(schema, replicas, request.config_override.as_ref())?;

        let actions = request.actions.unwrap_or_default();
        validate_actions(schema, &actions, &ComponentActions::default())?;

        let cluster_size = request.cluster_size.unwrap_or(1);
        if schema.multi_node {
            if cluster_size == 0 {
                return Err(Error::InvalidRequest("clusterSize must be at least 1".into()));
            }
            // Node names carry the index, so the last one is the longest
            validate_name(&format!("{}node{}", request.name, cluster_size))?;
        } else if request.cluster_size.is_some() {
            return Err(Error::InvalidRequest(format!(
                "clusterSize is not supported for {}",
                kind
            )));
        }

        let spec = ComponentSpec {
            images: self.registry.images_for(kind, &version).unwrap_or_default(),
            version,
            replicas: Some(replicas),
            resources,
            storage,
            config_override: request.config_override,
            action: actions,
            state_db: request.state_db,
            zone: request.zone,
            region: request.region,
            domain: request.domain,
            msp_id: request.msp_id,
            enrollment: request.enrollment,
            cluster_size: schema.multi_node.then_some(cluster_size),
        };

        let node_names: Vec<String> = if schema.multi_node {
            (1..=cluster_size)
                .map(|i| format!("{}node{}", request.name, i))
                .collect()
        } else {
            vec![request.name.clone()]
        };

        info!(
            kind = %kind,
            namespace = %namespace,
            name = %request.name,
            version = %spec.version,
            nodes = node_names.len(),
            "Creating component"
        );

        let settings = PollSettings::for_create(&self.config.convergence);
        let total = node_names.len();
        let mut nodes: Vec<Assembled> = Vec::with_capacity(total);

        // Nodes bootstrap one after another; stop at the first that does not
        // deploy
        for (index, node) in node_names.iter().enumerate() {
            let mut obj = ComponentObject::new(kind, namespace, node.as_str(), spec.clone());
            if schema.multi_node {
                obj = obj.with_label(ORDERING_SERVICE_LABEL, request.name.as_str());
            }
            self.store.create(&obj).await?;

            let assembled = self
                .converge(&ResourceRef::from(&obj), NodePosition::of(index, total), settings)
                .await?;
            let deployed = assembled.response.outcome == Some(PollOutcome::Deployed);
            nodes.push(assembled);
            if !deployed {
                break;
            }
        }

        let assembled = if schema.multi_node {
            self.assembler()
                .assemble_group(kind, namespace, &request.name, nodes)
        } else {
            nodes
                .pop()
                .ok_or_else(|| Error::Internal("no node was created".into()))?
        };

        Ok(finish(assembled, StatusCode::CREATED))
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Replace one section of a component and wait for it to converge
    pub async fn update_component_section(
        &self,
        kind: ComponentKind,
        namespace: &str,
        name: &str,
        section: Section,
        body: Value,
    ) -> Result<Reply<ComponentResponse>> {
        let result = self.do_update(kind, namespace, name, section, body).await;
        self.record(kind, "update", &result);
        result
    }

    async fn do_update(
        &self,
        kind: ComponentKind,
        namespace: &str,
        name: &str,
        section: Section,
        body: Value,
    ) -> Result<Reply<ComponentResponse>> {
        let schema = ComponentSchema::for_kind(kind);
        let target = ResourceRef::new(kind, namespace, name);
        let mut obj = self.store.get(&target).await?;
        let defaults = self.config.defaults_for(kind);

        match section {
            Section::Config => {
                let config_override = Some(body).filter(|v| !v.is_null());
                check_replicas(
                    schema,
                    obj.spec.replicas.unwrap_or(1),
                    config_override.as_ref(),
                )?;
                obj.spec.config_override = config_override;
            }
            Section::Resources => {
                let overrides: BTreeMap<String, ResourceRequirements> = parse_body(body)?;
                check_slot_names(schema, Some(&overrides), None)?;
                let ctx = SlotContext::new(&obj.spec.version, obj.spec.state_db.as_deref());
                let resources =
                    merge_resources(&defaults.resources, Some(&overrides), &schema.active_slots(&ctx));
                validate_quantities(&resources)?;
                obj.spec.resources = resources;
            }
            Section::Version => {
                let version: String = parse_field(body, "version")?;
                self.require_version(kind, &version)?;
                obj.spec.images = self.registry.images_for(kind, &version).unwrap_or_default();

                // Slots may switch on or off with the major version; current
                // values win for slots that stay active
                let ctx = SlotContext::new(&version, obj.spec.state_db.as_deref());
                obj.spec.resources = merge_resources(
                    &defaults.resources,
                    Some(&obj.spec.resources),
                    &schema.active_slots(&ctx),
                );
                obj.spec.version = version;
            }
            Section::Replicas => {
                let replicas: u32 = parse_field(body, "replicas")?;
                check_replicas(schema, replicas, obj.spec.config_override.as_ref())?;
                obj.spec.replicas = Some(replicas);
            }
            other => return Err(unsupported("update", other)),
        }

        info!(target = %target, section = %section, "Updating component");
        let updated = self.store.update(&obj).await?;

        let settings = PollSettings::for_update(&self.config.convergence);
        let assembled = self
            .converge(&ResourceRef::from(&updated), NodePosition::Single, settings)
            .await?;
        Ok(finish(assembled, StatusCode::OK))
    }

    // =========================================================================
    // Patch
    // =========================================================================

    /// Merge a partial change into one section and wait for it to converge
    pub async fn patch_component_section(
        &self,
        kind: ComponentKind,
        namespace: &str,
        name: &str,
        section: Section,
        body: Value,
    ) -> Result<Reply<ComponentResponse>> {
        let result = self.do_patch(kind, namespace, name, section, body).await;
        self.record(kind, "patch", &result);
        result
    }

    async fn do_patch(
        &self,
        kind: ComponentKind,
        namespace: &str,
        name: &str,
        section: Section,
        body: Value,
    ) -> Result<Reply<ComponentResponse>> {
        let schema = ComponentSchema::for_kind(kind);
        let target = ResourceRef::new(kind, namespace, name);
        let obj = self.store.get(&target).await?;

        let partial = match section {
            Section::Config => {
                // Validate the merged result; the backend applies the same
                // merge to the patch body
                let mut merged = obj.spec.config_override.clone().unwrap_or(Value::Null);
                merge_json(&mut merged, &body);
                let merged = Some(merged).filter(|v| !v.is_null());
                check_replicas(schema, obj.spec.replicas.unwrap_or(1), merged.as_ref())?;
                json!({ "configOverride": body })
            }
            Section::Resources => {
                let overrides: BTreeMap<String, ResourceRequirements> = parse_body(body)?;
                check_slot_names(schema, Some(&overrides), None)?;
                let ctx = SlotContext::new(&obj.spec.version, obj.spec.state_db.as_deref());
                let merged =
                    merge_resources(&obj.spec.resources, Some(&overrides), &schema.active_slots(&ctx));
                validate_quantities(&merged)?;

                let mut resources = Map::new();
                for slot in obj.spec.resources.keys() {
                    if !merged.contains_key(slot) {
                        resources.insert(slot.clone(), Value::Null);
                    }
                }
                for (slot, requirements) in &merged {
                    // Whole-slot replacement so stale quantity keys go away
                    let mut value = serde_json::to_value(requirements)?;
                    clear_removed_keys(&mut value, obj.spec.resources.get(slot));
                    resources.insert(slot.clone(), value);
                }
                json!({ "resources": resources })
            }
            Section::Replicas => {
                let replicas: u32 = parse_field(body, "replicas")?;
                check_replicas(schema, replicas, obj.spec.config_override.as_ref())?;
                json!({ "replicas": replicas })
            }
            Section::Actions => {
                let requested: ComponentActions = parse_body(body)?;
                validate_actions(schema, &requested, &obj.spec.action)?;
                json!({ "action": obj.spec.action.union(&requested) })
            }
            other => return Err(unsupported("patch", other)),
        };

        info!(target = %target, section = %section, "Patching component");
        self.store.patch(&target, partial).await?;

        let settings = PollSettings::for_update(&self.config.convergence);
        let assembled = self.converge(&target, NodePosition::Single, settings).await?;
        Ok(finish(assembled, StatusCode::OK))
    }

    // =========================================================================
    // Get
    // =========================================================================

    /// Read one section of a component's aggregate view
    pub async fn get_component_section(
        &self,
        kind: ComponentKind,
        namespace: &str,
        name: &str,
        section: Section,
    ) -> Result<Reply<Value>> {
        let result = self.do_get(kind, namespace, name, section).await;
        if let Err(e) = &result {
            self.metrics.record_operation(kind, "get", outcome_label(e));
        }
        result
    }

    async fn do_get(
        &self,
        kind: ComponentKind,
        namespace: &str,
        name: &str,
        section: Section,
    ) -> Result<Reply<Value>> {
        let schema = ComponentSchema::for_kind(kind);
        let target = ResourceRef::new(kind, namespace, name);
        let assembler = self.assembler();

        let assembled = match self.store.get(&target).await {
            Ok(obj) => assembler.assemble_object(&target, obj, None).await,
            Err(Error::ResourceNotFound { .. }) if schema.multi_node => {
                // The name may designate an ordering service instead of a node
                let members = self.service_members(kind, namespace, name).await?;
                if members.is_empty() {
                    return Err(Error::ResourceNotFound {
                        kind: kind.resource_kind().to_string(),
                        name: name.to_string(),
                    });
                }
                let mut nodes = Vec::with_capacity(members.len());
                for member in members {
                    let member_ref = ResourceRef::from(&member);
                    nodes.push(assembler.assemble_object(&member_ref, member, None).await);
                }
                assembler.assemble_group(kind, namespace, name, nodes)
            }
            Err(e) => return Err(e),
        };

        let reply = finish(assembled, StatusCode::OK);
        self.metrics.record_operation(
            kind,
            "get",
            if reply.status.is_success() { "success" } else { "failure" },
        );

        Ok(Reply {
            status: reply.status,
            body: project(&reply.body, section)?,
        })
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Delete a component; an ordering service name removes all its nodes
    pub async fn delete_component(
        &self,
        kind: ComponentKind,
        namespace: &str,
        name: &str,
    ) -> Result<Reply<DeleteResponse>> {
        let result = self.do_delete(kind, namespace, name).await;
        self.record(kind, "delete", &result);
        result
    }

    async fn do_delete(
        &self,
        kind: ComponentKind,
        namespace: &str,
        name: &str,
    ) -> Result<Reply<DeleteResponse>> {
        let schema = ComponentSchema::for_kind(kind);
        let target = ResourceRef::new(kind, namespace, name);
        let mut deleted = Vec::new();

        match self.store.delete(&target).await {
            Ok(()) => deleted.push(name.to_string()),
            Err(Error::ResourceNotFound { .. }) if schema.multi_node => {}
            Err(e) => return Err(e),
        }

        if schema.multi_node {
            for member in self.service_members(kind, namespace, name).await? {
                self.store.delete(&ResourceRef::from(&member)).await?;
                deleted.push(member.name);
            }
        }

        if deleted.is_empty() {
            return Err(Error::ResourceNotFound {
                kind: kind.resource_kind().to_string(),
                name: name.to_string(),
            });
        }

        info!(kind = %kind, namespace = %namespace, name = %name, deleted = ?deleted, "Deleted component");

        Ok(Reply {
            status: StatusCode::OK,
            body: DeleteResponse {
                name: name.to_string(),
                kind,
                namespace: namespace.to_string(),
                deleted,
            },
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn assembler(&self) -> AggregateAssembler<'_> {
        AggregateAssembler::new(self.store.as_ref(), self.artifacts.as_ref(), &self.registry)
    }

    /// Poll one resource and assemble its view
    async fn converge(
        &self,
        target: &ResourceRef,
        position: NodePosition,
        settings: PollSettings,
    ) -> Result<Assembled> {
        let poller = ConvergencePoller::new(self.store.as_ref(), self.artifacts.as_ref(), settings);
        let result = poller.await_convergence(target, position).await?;
        self.metrics.observe_convergence(target.kind, &result);

        if !result.outcome.is_success() {
            warn!(
                target = %target,
                outcome = %result.outcome,
                reads = result.reads,
                "Component did not converge, assembling best-effort response"
            );
        }

        Ok(self.assembler().assemble(target, Some(&result)).await)
    }

    async fn service_members(
        &self,
        kind: ComponentKind,
        namespace: &str,
        service: &str,
    ) -> Result<Vec<ComponentObject>> {
        let mut labels = BTreeMap::new();
        labels.insert(ORDERING_SERVICE_LABEL.to_string(), service.to_string());
        let mut members = self.store.list(kind, namespace, &labels).await?;
        members.sort_by(|a, b| node_order(&a.name).cmp(&node_order(&b.name)));
        Ok(members)
    }

    fn require_version(&self, kind: ComponentKind, version: &str) -> Result<()> {
        if self.registry.validate(kind, version) {
            Ok(())
        } else {
            Err(Error::InvalidVersion {
                kind: kind.to_string(),
                version: version.to_string(),
            })
        }
    }

    fn record<T>(&self, kind: ComponentKind, operation: &str, result: &Result<Reply<T>>) {
        let outcome = match result {
            Ok(reply) if reply.status.is_success() => "success",
            Ok(_) => "failure",
            Err(e) => outcome_label(e),
        };
        self.metrics.record_operation(kind, operation, outcome);
    }
}

// =============================================================================
// Free helpers
// =============================================================================

/// Reply with `success` unless the poll did not deploy or a sub-read failed
fn finish(assembled: Assembled, success: StatusCode) -> Reply<ComponentResponse> {
    let converged = assembled
        .response
        .outcome
        .map_or(true, |outcome| outcome.is_success());
    let status = if converged && !assembled.degraded {
        success
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Reply {
        status,
        body: assembled.response,
    }
}

fn outcome_label(e: &Error) -> &'static str {
    if e.is_validation() {
        "rejected"
    } else {
        "error"
    }
}

/// Names become backend object names, so keep to DNS-1123 labels
fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!("invalid name: {:?}", name)))
    }
}

fn check_slot_names(
    schema: &ComponentSchema,
    resources: Option<&BTreeMap<String, ResourceRequirements>>,
    storage: Option<&BTreeMap<String, StorageSpec>>,
) -> Result<()> {
    if let Some(slot) = resources
        .into_iter()
        .flat_map(|r| r.keys())
        .find(|slot| !schema.has_slot(slot))
    {
        return Err(Error::InvalidRequest(format!(
            "unknown resource slot '{}' for {}",
            slot, schema.kind
        )));
    }
    if let Some(slot) = storage
        .into_iter()
        .flat_map(|s| s.keys())
        .find(|slot| !schema.has_storage_slot(slot))
    {
        return Err(Error::InvalidRequest(format!(
            "unknown storage slot '{}' for {}",
            slot, schema.kind
        )));
    }
    Ok(())
}

/// Every quantity must parse before it is sent to the backend
fn validate_quantities(resources: &BTreeMap<String, ResourceRequirements>) -> Result<()> {
    total_resources(resources.values()).map(|_| ())
}

fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| Error::InvalidRequest(e.to_string()))
}

/// Accept either `{"<field>": value}` or the bare value
fn parse_field<T: DeserializeOwned>(body: Value, field: &str) -> Result<T> {
    match body {
        Value::Object(mut map) if map.contains_key(field) => {
            parse_body(map.remove(field).unwrap_or(Value::Null))
        }
        other => parse_body(other),
    }
}

/// Null out quantity keys present before but absent after a replacement
fn clear_removed_keys(value: &mut Value, previous: Option<&ResourceRequirements>) {
    let Some(previous) = previous else {
        return;
    };
    for (side, old) in [("requests", &previous.requests), ("limits", &previous.limits)] {
        if let Some(Value::Object(map)) = value.get_mut(side) {
            for key in old.keys() {
                map.entry(key.clone()).or_insert(Value::Null);
            }
        }
    }
}

/// Sort key for `<service>node<i>` names
fn node_order(name: &str) -> (u32, String) {
    let index = name
        .rsplit_once("node")
        .and_then(|(_, i)| i.parse().ok())
        .unwrap_or(u32::MAX);
    (index, name.to_string())
}

/// Project the aggregate view onto one section
pub fn project(response: &ComponentResponse, section: Section) -> Result<Value> {
    let mut view = match section {
        Section::All => return Ok(serde_json::to_value(response)?),
        Section::Status => json!({ "status": response.status, "outcome": response.outcome }),
        Section::Resources => json!({
            "resources": response.resources,
            "resourceTotals": response.resource_totals,
        }),
        Section::Storage => json!({ "storage": response.storage }),
        Section::Connection => json!({
            "endpoints": response.endpoints,
            "certificates": response.certificates,
        }),
        Section::Config => json!({ "configOverride": response.config_override }),
        Section::Version => json!({ "version": response.version }),
        Section::Replicas => json!({ "replicas": response.replicas }),
        Section::Actions => json!({ "pendingActions": response.pending_actions }),
    };

    if let Value::Object(map) = &mut view {
        map.insert("name".into(), json!(response.name));
        map.insert("kind".into(), json!(response.kind));
        map.insert("namespace".into(), json!(response.namespace));
        if !response.warnings.is_empty() {
            map.insert("warnings".into(), json!(response.warnings));
        }
    }
    Ok(view)
}
