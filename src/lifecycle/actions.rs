//! Action conflict validation
//!
//! A request may not ask for contradictory credential actions, and may not
//! contradict an action that is still pending on the stored resource. The
//! first violation found is reported.

use crate::crd::{ComponentActions, CredentialKind};
use crate::domain::ComponentSchema;
use crate::error::{Error, Result};

/// Validate requested actions against themselves and the pending set
pub fn validate_actions(
    schema: &ComponentSchema,
    requested: &ComponentActions,
    pending: &ComponentActions,
) -> Result<()> {
    if !schema.enrollment_actions && requested.has_credential_actions() {
        return Err(Error::ConflictingActions(format!(
            "enroll and re-enroll actions are not supported for {}",
            schema.kind
        )));
    }

    for credential in CredentialKind::ALL {
        check_credential(credential, requested, pending)?;
    }

    Ok(())
}

fn check_credential(
    credential: CredentialKind,
    requested: &ComponentActions,
    pending: &ComponentActions,
) -> Result<()> {
    let req = requested.flags(credential);
    let pend = pending.flags(credential);

    if req.enroll && req.reenroll {
        return Err(Error::ConflictingActions(format!(
            "cannot request to enroll and re-enroll {} at the same time",
            credential
        )));
    }

    if req.reenroll && req.reenroll_with_new_key {
        return Err(Error::ConflictingActions(format!(
            "cannot request to re-enroll {} with and without a new key at the same time",
            credential
        )));
    }

    if req.enroll && pend.any_reenroll() {
        return Err(Error::ConflictingActions(format!(
            "cannot request to enroll {} when {} re-enroll action is pending",
            credential, credential
        )));
    }

    if req.any_reenroll() && pend.enroll {
        return Err(Error::ConflictingActions(format!(
            "cannot request to re-enroll {} when {} enroll action is pending",
            credential, credential
        )));
    }

    Ok(())
}
