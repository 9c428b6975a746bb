//! Resource and storage spec merging
//!
//! Combines per-kind defaults (or the currently stored values) with a
//! caller-supplied override, slot by slot.

use crate::crd::{ResourceRequirements, StorageSpec};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

// =============================================================================
// Resources
// =============================================================================

/// Apply one slot override on top of a base value.
///
/// An override carrying only requests or only limits is mirrored onto the
/// other side. An override carrying neither keeps the base. An override
/// carrying both replaces the base wholesale.
pub fn apply_resource_override(
    base: Option<&ResourceRequirements>,
    override_req: &ResourceRequirements,
) -> Option<ResourceRequirements> {
    match (
        override_req.requests.is_empty(),
        override_req.limits.is_empty(),
    ) {
        (true, true) => base.cloned(),
        (false, true) => Some(ResourceRequirements {
            requests: override_req.requests.clone(),
            limits: override_req.requests.clone(),
        }),
        (true, false) => Some(ResourceRequirements {
            requests: override_req.limits.clone(),
            limits: override_req.limits.clone(),
        }),
        (false, false) => Some(override_req.clone()),
    }
}

/// Merge resource requirements for the active slots.
///
/// Slots outside `active_slots` are left out of the result even when the
/// defaults or the override carry them.
pub fn merge_resources(
    defaults: &BTreeMap<String, ResourceRequirements>,
    overrides: Option<&BTreeMap<String, ResourceRequirements>>,
    active_slots: &BTreeSet<&str>,
) -> BTreeMap<String, ResourceRequirements> {
    let mut merged = BTreeMap::new();

    for slot in active_slots {
        let base = defaults.get(*slot);
        let value = match overrides.and_then(|o| o.get(*slot)) {
            Some(override_req) => apply_resource_override(base, override_req),
            None => base.cloned(),
        };
        if let Some(value) = value {
            merged.insert(slot.to_string(), value);
        }
    }

    if let Some(overrides) = overrides {
        for slot in overrides.keys() {
            if !active_slots.contains(slot.as_str()) {
                debug!(slot = %slot, "Dropping resource override for inactive slot");
            }
        }
    }

    merged
}

// =============================================================================
// Storage
// =============================================================================

/// Merge storage per slot, replacing only the non-empty override fields
pub fn merge_storage(
    defaults: &BTreeMap<String, StorageSpec>,
    overrides: Option<&BTreeMap<String, StorageSpec>>,
) -> BTreeMap<String, StorageSpec> {
    let mut merged = defaults.clone();

    if let Some(overrides) = overrides {
        for (slot, override_spec) in overrides {
            let entry = merged.entry(slot.clone()).or_default();
            if !override_spec.size.is_empty() {
                entry.size = override_spec.size.clone();
            }
            if !override_spec.class.is_empty() {
                entry.class = override_spec.class.clone();
            }
        }
    }

    merged
}

// =============================================================================
// Free-form JSON
// =============================================================================

/// Apply a JSON merge patch (RFC 7386) to `target` in place.
///
/// Objects merge recursively, `null` removes a key, anything else replaces.
pub fn merge_json(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_json(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quantities(cpu: &str, memory: &str) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("cpu".to_string(), cpu.to_string());
        m.insert("memory".to_string(), memory.to_string());
        m
    }

    fn defaults() -> BTreeMap<String, ResourceRequirements> {
        let mut d = BTreeMap::new();
        d.insert("peer".to_string(), ResourceRequirements::symmetric("200m", "400Mi"));
        d.insert("couchdb".to_string(), ResourceRequirements::symmetric("200m", "400Mi"));
        d.insert("dind".to_string(), ResourceRequirements::symmetric("1", "1Gi"));
        d
    }

    #[test]
    fn test_requests_only_backfills_limits() {
        let ov = ResourceRequirements {
            requests: quantities("500m", "1Gi"),
            limits: BTreeMap::new(),
        };
        let merged = apply_resource_override(None, &ov).unwrap();
        assert_eq!(merged.limits, merged.requests);
        assert_eq!(merged.requests, quantities("500m", "1Gi"));
    }

    #[test]
    fn test_limits_only_backfills_requests() {
        let base = ResourceRequirements::symmetric("200m", "400Mi");
        let ov = ResourceRequirements {
            requests: BTreeMap::new(),
            limits: quantities("2", "4Gi"),
        };
        let merged = apply_resource_override(Some(&base), &ov).unwrap();
        assert_eq!(merged.requests, quantities("2", "4Gi"));
        assert_eq!(merged.limits, merged.requests);
    }

    #[test]
    fn test_empty_override_keeps_default() {
        let base = ResourceRequirements::symmetric("200m", "400Mi");
        let merged = apply_resource_override(Some(&base), &ResourceRequirements::default());
        assert_eq!(merged, Some(base));
    }

    #[test]
    fn test_full_override_replaces_wholesale() {
        let base = ResourceRequirements::symmetric("200m", "400Mi");
        let ov = ResourceRequirements {
            requests: quantities("100m", "100Mi"),
            limits: {
                let mut m = BTreeMap::new();
                m.insert("cpu".to_string(), "1".to_string());
                m
            },
        };
        let merged = apply_resource_override(Some(&base), &ov).unwrap();
        assert_eq!(merged, ov);
        assert!(!merged.limits.contains_key("memory"));
    }

    #[test]
    fn test_inactive_slots_cleared() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "dind".to_string(),
            ResourceRequirements {
                requests: quantities("2", "2Gi"),
                limits: BTreeMap::new(),
            },
        );
        overrides.insert(
            "peer".to_string(),
            ResourceRequirements {
                requests: quantities("1", "2Gi"),
                limits: BTreeMap::new(),
            },
        );

        let active: BTreeSet<&str> = ["peer", "couchdb"].into_iter().collect();
        let merged = merge_resources(&defaults(), Some(&overrides), &active);

        assert_eq!(merged.len(), 2);
        assert!(!merged.contains_key("dind"));
        assert_eq!(merged["peer"].limits, quantities("1", "2Gi"));
        assert_eq!(merged["couchdb"], ResourceRequirements::symmetric("200m", "400Mi"));
    }

    #[test]
    fn test_merge_without_override_keeps_defaults() {
        let active: BTreeSet<&str> = ["peer", "dind", "chaincodelauncher"].into_iter().collect();
        let merged = merge_resources(&defaults(), None, &active);
        // chaincodelauncher has no default and no override
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["dind"], ResourceRequirements::symmetric("1", "1Gi"));
    }

    #[test]
    fn test_merge_storage_partial_fields() {
        let mut defaults = BTreeMap::new();
        defaults.insert("peer".to_string(), StorageSpec::new("100Gi", "default"));
        defaults.insert("statedb".to_string(), StorageSpec::new("100Gi", "default"));

        let mut overrides = BTreeMap::new();
        overrides.insert("peer".to_string(), StorageSpec::new("", "fast-ssd"));
        overrides.insert("statedb".to_string(), StorageSpec::new("50Gi", ""));

        let merged = merge_storage(&defaults, Some(&overrides));
        assert_eq!(merged["peer"], StorageSpec::new("100Gi", "fast-ssd"));
        assert_eq!(merged["statedb"], StorageSpec::new("50Gi", "default"));
        assert_eq!(merge_storage(&defaults, None), defaults);
    }

    #[test]
    fn test_merge_json_patch() {
        let mut target = json!({
            "ca": {"db": {"type": "sqlite3", "datasource": "x"}, "debug": true},
            "keep": 1
        });
        let patch = json!({
            "ca": {"db": {"type": "postgres"}, "debug": null},
            "tlsca": {"db": {"type": "postgres"}}
        });
        merge_json(&mut target, &patch);

        assert_eq!(
            target,
            json!({
                "ca": {"db": {"type": "postgres", "datasource": "x"}},
                "tlsca": {"db": {"type": "postgres"}},
                "keep": 1
            })
        );

        // Non-object patches replace wholesale
        merge_json(&mut target, &json!([1, 2]));
        assert_eq!(target, json!([1, 2]));
    }
}
