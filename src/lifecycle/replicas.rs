//! Replica precondition checks
//!
//! Certificate authorities may scale past one replica only when both the
//! primary and the TLS sub-authority keep their state in a shared database.
//! Peers and orderers always run as a single instance.

use crate::domain::{ComponentSchema, ReplicaPolicy};
use crate::error::{Error, Result};
use serde_json::Value;

/// Backing store type that allows several CA replicas
pub const SHARED_DB_TYPE: &str = "postgres";

/// Override blocks of the two sub-authorities, in check order
const SUB_AUTHORITIES: [&str; 2] = ["ca", "tlsca"];

/// Check that `requested` replicas are allowed for this kind and override
pub fn check_replicas(
    schema: &ComponentSchema,
    requested: u32,
    config_override: Option<&Value>,
) -> Result<()> {
    match schema.replicas {
        ReplicaPolicy::SingleInstance => {
            if requested > 1 {
                return Err(Error::ReplicasNotAllowed(format!(
                    "replicas for {} must be 0 or 1, got {}",
                    schema.kind, requested
                )));
            }
            Ok(())
        }
        ReplicaPolicy::SharedStoreScaling => {
            if requested <= 1 {
                return Ok(());
            }
            check_shared_store(config_override)
        }
    }
}

fn check_shared_store(config_override: Option<&Value>) -> Result<()> {
    let config_override = match config_override {
        Some(value) if !value.is_null() => value,
        _ => {
            return Err(Error::ReplicasNotAllowed(
                "config override should be passed to allow replicas > 1".into(),
            ))
        }
    };

    let blocks: Vec<(&str, &Value)> = SUB_AUTHORITIES
        .iter()
        .map(|name| {
            config_override
                .get(name)
                .filter(|v| !v.is_null())
                .map(|v| (*name, v))
                .ok_or_else(|| {
                    Error::ReplicasNotAllowed(format!(
                        "{} override config should be passed to allow replicas > 1",
                        name
                    ))
                })
        })
        .collect::<Result<_>>()?;

    for (name, block) in &blocks {
        let db_type = block
            .pointer("/db/type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !db_type.eq_ignore_ascii_case(SHARED_DB_TYPE) {
            return Err(Error::ReplicasNotAllowed(format!(
                "{} db type should be {} to allow replicas > 1",
                name, SHARED_DB_TYPE
            )));
        }
    }

    for (name, block) in &blocks {
        let datasource = block
            .pointer("/db/datasource")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if datasource.trim().is_empty() {
            return Err(Error::ReplicasNotAllowed(format!(
                "{} db datasource should be passed to allow replicas > 1",
                name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ComponentKind;
    use serde_json::json;

    fn ca() -> &'static ComponentSchema {
        ComponentSchema::for_kind(ComponentKind::Ca)
    }

    fn reason(result: Result<()>) -> String {
        match result {
            Err(Error::ReplicasNotAllowed(msg)) => msg,
            other => panic!("expected replicas error, got {:?}", other),
        }
    }

    fn shared_db_override() -> Value {
        json!({
            "ca": {"db": {"type": "postgres", "datasource": "host=db port=5432 user=ca"}},
            "tlsca": {"db": {"type": "postgres", "datasource": "host=db port=5432 user=tlsca"}}
        })
    }

    #[test]
    fn test_single_replica_always_ok() {
        assert!(check_replicas(ca(), 0, None).is_ok());
        assert!(check_replicas(ca(), 1, None).is_ok());
    }

    #[test]
    fn test_two_replicas_without_override() {
        assert_eq!(
            reason(check_replicas(ca(), 2, None)),
            "config override should be passed to allow replicas > 1"
        );
    }

    #[test]
    fn test_two_replicas_with_shared_db() {
        let ov = shared_db_override();
        assert!(check_replicas(ca(), 2, Some(&ov)).is_ok());
    }

    #[test]
    fn test_missing_tlsca_block() {
        let ov = json!({"ca": {"db": {"type": "postgres", "datasource": "x"}}});
        assert_eq!(
            reason(check_replicas(ca(), 3, Some(&ov))),
            "tlsca override config should be passed to allow replicas > 1"
        );
    }

    #[test]
    fn test_wrong_db_type() {
        let mut ov = shared_db_override();
        ov["tlsca"]["db"]["type"] = json!("sqlite3");
        assert_eq!(
            reason(check_replicas(ca(), 2, Some(&ov))),
            "tlsca db type should be postgres to allow replicas > 1"
        );
    }

    #[test]
    fn test_empty_datasource() {
        let mut ov = shared_db_override();
        ov["ca"]["db"]["datasource"] = json!("");
        assert_eq!(
            reason(check_replicas(ca(), 2, Some(&ov))),
            "ca db datasource should be passed to allow replicas > 1"
        );
    }

    #[test]
    fn test_single_instance_kinds() {
        let peer = ComponentSchema::for_kind(ComponentKind::Peer);
        let orderer = ComponentSchema::for_kind(ComponentKind::Orderer);
        let ov = shared_db_override();

        assert!(check_replicas(peer, 0, None).is_ok());
        assert!(check_replicas(orderer, 1, None).is_ok());
        // No shared-store exception for these kinds
        assert_eq!(
            reason(check_replicas(peer, 2, Some(&ov))),
            "replicas for peer must be 0 or 1, got 2"
        );
        assert!(check_replicas(orderer, 5, None).is_err());
    }
}
