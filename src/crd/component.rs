//! Component Resources
//!
//! The declarative resource shapes the deployer writes into the backend for
//! the three managed component kinds. The operator that owns these resources
//! reports its observed state through [`ComponentStatus`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::actions::ComponentActions;
use super::resources::{ResourceRequirements, StorageSpec};

/// API group of the component resources
pub const API_GROUP: &str = "ibp.com";
/// API version of the component resources
pub const API_VERSION: &str = "v1beta1";

// =============================================================================
// Component Kind
// =============================================================================

/// The managed component kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// Credential-issuing certificate authority
    Ca,
    /// Ledger-replicating peer
    Peer,
    /// Transaction-ordering node
    Orderer,
}

impl ComponentKind {
    /// All kinds, in registration order
    pub const ALL: [ComponentKind; 3] =
        [ComponentKind::Ca, ComponentKind::Peer, ComponentKind::Orderer];

    /// Backend resource kind
    pub fn resource_kind(&self) -> &'static str {
        match self {
            ComponentKind::Ca => "IBPCA",
            ComponentKind::Peer => "IBPPeer",
            ComponentKind::Orderer => "IBPOrderer",
        }
    }

    /// Backend resource plural
    pub fn plural(&self) -> &'static str {
        match self {
            ComponentKind::Ca => "ibpcas",
            ComponentKind::Peer => "ibppeers",
            ComponentKind::Orderer => "ibporderers",
        }
    }

    /// Full `group/version` string
    pub fn api_version() -> String {
        format!("{}/{}", API_GROUP, API_VERSION)
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentKind::Ca => write!(f, "ca"),
            ComponentKind::Peer => write!(f, "peer"),
            ComponentKind::Orderer => write!(f, "orderer"),
        }
    }
}

impl std::str::FromStr for ComponentKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ca" => Ok(ComponentKind::Ca),
            "peer" => Ok(ComponentKind::Peer),
            "orderer" => Ok(ComponentKind::Orderer),
            other => Err(crate::error::Error::InvalidRequest(format!(
                "unknown component kind: {}. Use 'ca', 'peer', or 'orderer'",
                other
            ))),
        }
    }
}

// =============================================================================
// Component Spec
// =============================================================================

/// Desired state written to the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Canonical component version
    #[serde(default)]
    pub version: String,

    /// Requested replica count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,

    /// Qualified image references by image role
    #[serde(default)]
    pub images: BTreeMap<String, String>,

    /// Resource requirements by slot
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRequirements>,

    /// Persistent storage by slot
    #[serde(default)]
    pub storage: BTreeMap<String, StorageSpec>,

    /// Free-form configuration override handed to the component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_override: Option<serde_json::Value>,

    /// Pending lifecycle actions
    #[serde(default)]
    pub action: ComponentActions,

    /// State database (peer only): couchdb or leveldb
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_db: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Ingress domain used by the operator to build endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msp_id: Option<String>,

    /// Opaque enrollment input passed through to the operator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment: Option<serde_json::Value>,

    /// Number of nodes in the ordering service this node belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_size: Option<u32>,
}

// =============================================================================
// Component Status
// =============================================================================

/// Status type reported by the operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusType {
    Deployed,
    #[default]
    Deploying,
    Warning,
    Error,
    Precreated,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for StatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusType::Deployed => write!(f, "Deployed"),
            StatusType::Deploying => write!(f, "Deploying"),
            StatusType::Warning => write!(f, "Warning"),
            StatusType::Error => write!(f, "Error"),
            StatusType::Precreated => write!(f, "Precreated"),
            StatusType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Observed state reported by the operator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    #[serde(rename = "type", default)]
    pub status_type: StatusType,

    /// Condition status, "True" once the operator has settled
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub last_heartbeat_time: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
}

impl ComponentStatus {
    /// Status flag the operator raises once it has settled on an outcome
    pub fn is_settled(&self) -> bool {
        self.status == "True"
    }

    /// Settled with the error-type marker
    pub fn is_error(&self) -> bool {
        self.is_settled() && self.status_type == StatusType::Error
    }
}

// =============================================================================
// Component Object
// =============================================================================

/// One backend resource as seen by the deployer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentObject {
    pub kind: ComponentKind,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    pub spec: ComponentSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ComponentStatus>,
}

impl ComponentObject {
    /// New object with empty status
    pub fn new(
        kind: ComponentKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: ComponentSpec,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            resource_version: None,
            spec,
            status: None,
        }
    }

    /// Attach a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_and_display() {
        assert_eq!("CA".parse::<ComponentKind>().unwrap(), ComponentKind::Ca);
        assert_eq!("orderer".parse::<ComponentKind>().unwrap(), ComponentKind::Orderer);
        assert!("console".parse::<ComponentKind>().is_err());
        assert_eq!(format!("{}", ComponentKind::Peer), "peer");
        assert_eq!(ComponentKind::Peer.resource_kind(), "IBPPeer");
        assert_eq!(ComponentKind::api_version(), "ibp.com/v1beta1");
    }

    #[test]
    fn test_status_flags() {
        let status: ComponentStatus = serde_json::from_value(serde_json::json!({
            "type": "Error",
            "status": "True",
            "reason": "CrashLoop",
            "errorCode": 7
        }))
        .unwrap();
        assert!(status.is_settled());
        assert!(status.is_error());
        assert_eq!(status.error_code, Some(7));

        let deploying = ComponentStatus {
            status_type: StatusType::Deploying,
            ..Default::default()
        };
        assert!(!deploying.is_settled());
        assert!(!deploying.is_error());
    }

    #[test]
    fn test_unknown_status_type() {
        let status: ComponentStatus =
            serde_json::from_value(serde_json::json!({"type": "Migrating"})).unwrap();
        assert_eq!(status.status_type, StatusType::Unknown);
    }

    #[test]
    fn test_spec_roundtrip_skips_absent_fields() {
        let spec = ComponentSpec {
            version: "2.2.1-3".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert!(value.get("replicas").is_none());
        assert!(value.get("configOverride").is_none());
        assert_eq!(value["version"], "2.2.1-3");
    }
}
