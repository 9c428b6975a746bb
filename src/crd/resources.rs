//! Resource and storage requirement shapes
//!
//! Quantities stay as the strings the backend understands ("100m", "200Mi");
//! numeric conversion lives in [`crate::lifecycle::quantity`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Requests and limits for one slot, keyed by quantity kind (cpu, memory, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
}

impl ResourceRequirements {
    /// Identical requests and limits
    pub fn symmetric(cpu: &str, memory: &str) -> Self {
        let mut values = BTreeMap::new();
        values.insert("cpu".to_string(), cpu.to_string());
        values.insert("memory".to_string(), memory.to_string());
        Self {
            requests: values.clone(),
            limits: values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.limits.is_empty()
    }
}

/// Persistent volume size and class for one storage slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub class: String,
}

impl StorageSpec {
    pub fn new(size: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            size: size.into(),
            class: class.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_requirements() {
        let req = ResourceRequirements::symmetric("100m", "200Mi");
        assert_eq!(req.requests, req.limits);
        assert_eq!(req.requests.get("cpu").map(String::as_str), Some("100m"));
        assert!(!req.is_empty());
        assert!(ResourceRequirements::default().is_empty());
    }

    #[test]
    fn test_storage_deserialize_partial() {
        let spec: StorageSpec = serde_json::from_str(r#"{"size": "20Gi"}"#).unwrap();
        assert_eq!(spec.size, "20Gi");
        assert!(spec.class.is_empty());
    }
}
