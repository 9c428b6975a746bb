//! Component Schemas
//!
//! One table entry per component kind describing its named resource slots,
//! when each slot is active, its storage slots and its replica policy. The
//! merge and validation engines are driven entirely by these entries.

use crate::config::major_version;
use crate::crd::ComponentKind;
use std::collections::BTreeSet;

/// State database a peer uses when the request does not name one
pub const DEFAULT_STATE_DB: &str = "couchdb";

// =============================================================================
// Slot Activation
// =============================================================================

/// Condition under which a resource slot is part of the deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotActivation {
    Always,
    /// Active when the configured state database matches
    StateDb(&'static str),
    /// Active when the major version is strictly below the bound
    MajorBelow(u64),
    /// Active when the major version is at least the bound
    MajorAtLeast(u64),
}

/// A named resource slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRule {
    pub name: &'static str,
    pub activation: SlotActivation,
}

const fn slot(name: &'static str, activation: SlotActivation) -> SlotRule {
    SlotRule { name, activation }
}

/// Facts about one deployment that decide slot activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotContext {
    pub major_version: u64,
    pub state_db: Option<String>,
}

impl SlotContext {
    pub fn new(version: &str, state_db: Option<&str>) -> Self {
        Self {
            major_version: major_version(version),
            state_db: state_db.map(|db| db.to_lowercase()),
        }
    }
}

impl SlotActivation {
    fn is_active(&self, ctx: &SlotContext) -> bool {
        match self {
            SlotActivation::Always => true,
            SlotActivation::StateDb(db) => {
                ctx.state_db.as_deref().unwrap_or(DEFAULT_STATE_DB) == *db
            }
            SlotActivation::MajorBelow(bound) => ctx.major_version < *bound,
            SlotActivation::MajorAtLeast(bound) => ctx.major_version >= *bound,
        }
    }
}

// =============================================================================
// Replica Policy
// =============================================================================

/// How many replicas a kind may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaPolicy {
    /// More than one replica only with a shared database configured
    SharedStoreScaling,
    /// Zero or one replica
    SingleInstance,
}

// =============================================================================
// Component Schema
// =============================================================================

/// Schema of one component kind
#[derive(Debug)]
pub struct ComponentSchema {
    pub kind: ComponentKind,
    pub slots: &'static [SlotRule],
    pub storage_slots: &'static [&'static str],
    pub replicas: ReplicaPolicy,
    /// Components made of several sequentially bootstrapped nodes
    pub multi_node: bool,
    /// Image role whose tag identifies the running version
    pub main_image: &'static str,
    /// Whether enroll / re-enroll actions apply to this kind
    pub enrollment_actions: bool,
}

static CA_SCHEMA: ComponentSchema = ComponentSchema {
    kind: ComponentKind::Ca,
    slots: &[
        slot("ca", SlotActivation::Always),
        slot("init", SlotActivation::Always),
    ],
    storage_slots: &["ca"],
    replicas: ReplicaPolicy::SharedStoreScaling,
    multi_node: false,
    main_image: "ca",
    enrollment_actions: false,
};

static PEER_SCHEMA: ComponentSchema = ComponentSchema {
    kind: ComponentKind::Peer,
    slots: &[
        slot("peer", SlotActivation::Always),
        slot("proxy", SlotActivation::Always),
        slot("init", SlotActivation::Always),
        slot("couchdb", SlotActivation::StateDb("couchdb")),
        slot("dind", SlotActivation::MajorBelow(2)),
        slot("fluentd", SlotActivation::MajorBelow(2)),
        slot("chaincodelauncher", SlotActivation::MajorAtLeast(2)),
    ],
    storage_slots: &["peer", "statedb"],
    replicas: ReplicaPolicy::SingleInstance,
    multi_node: false,
    main_image: "peer",
    enrollment_actions: true,
};

static ORDERER_SCHEMA: ComponentSchema = ComponentSchema {
    kind: ComponentKind::Orderer,
    slots: &[
        slot("orderer", SlotActivation::Always),
        slot("proxy", SlotActivation::Always),
        slot("init", SlotActivation::Always),
    ],
    storage_slots: &["orderer"],
    replicas: ReplicaPolicy::SingleInstance,
    multi_node: true,
    main_image: "orderer",
    enrollment_actions: true,
};

impl ComponentSchema {
    /// Registered schema for a kind
    pub fn for_kind(kind: ComponentKind) -> &'static ComponentSchema {
        match kind {
            ComponentKind::Ca => &CA_SCHEMA,
            ComponentKind::Peer => &PEER_SCHEMA,
            ComponentKind::Orderer => &ORDERER_SCHEMA,
        }
    }

    /// Slots active for the given deployment facts
    pub fn active_slots(&self, ctx: &SlotContext) -> BTreeSet<&'static str> {
        self.slots
            .iter()
            .filter(|rule| rule.activation.is_active(ctx))
            .map(|rule| rule.name)
            .collect()
    }

    /// Whether `name` is a slot of this kind at all
    pub fn has_slot(&self, name: &str) -> bool {
        self.slots.iter().any(|rule| rule.name == name)
    }

    pub fn has_storage_slot(&self, name: &str) -> bool {
        self.storage_slots.contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_v2_couchdb_slots() {
        let schema = ComponentSchema::for_kind(ComponentKind::Peer);
        let active = schema.active_slots(&SlotContext::new("2.2.1-3", None));
        assert!(active.contains("couchdb"));
        assert!(active.contains("chaincodelauncher"));
        assert!(!active.contains("dind"));
        assert!(!active.contains("fluentd"));
    }

    #[test]
    fn test_peer_v1_leveldb_slots() {
        let schema = ComponentSchema::for_kind(ComponentKind::Peer);
        let active = schema.active_slots(&SlotContext::new("1.4.9-1", Some("LevelDB")));
        assert!(!active.contains("couchdb"));
        assert!(active.contains("dind"));
        assert!(active.contains("fluentd"));
        assert!(!active.contains("chaincodelauncher"));
        assert!(active.contains("peer"));
    }

    #[test]
    fn test_ca_schema() {
        let schema = ComponentSchema::for_kind(ComponentKind::Ca);
        assert_eq!(schema.replicas, ReplicaPolicy::SharedStoreScaling);
        assert!(!schema.multi_node);
        let active = schema.active_slots(&SlotContext::new("1.5.0-1", None));
        assert_eq!(active.into_iter().collect::<Vec<_>>(), vec!["ca", "init"]);
        assert!(schema.has_storage_slot("ca"));
        assert!(!schema.has_slot("couchdb"));
    }

    #[test]
    fn test_orderer_is_multi_node() {
        let schema = ComponentSchema::for_kind(ComponentKind::Orderer);
        assert!(schema.multi_node);
        assert_eq!(schema.replicas, ReplicaPolicy::SingleInstance);
        assert_eq!(schema.main_image, "orderer");
    }
}
