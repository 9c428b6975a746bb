//! Lifecycle actions
//!
//! Flags a caller sets on a component to ask the operator for a one-shot
//! action. The operator clears them once the action has run, so any flag
//! still set on the stored resource is pending.

use serde::{Deserialize, Serialize};

/// Credential kinds that can be enrolled or re-enrolled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Identity (enrollment) certificate
    Ecert,
    /// Transport certificate
    TlsCert,
}

impl CredentialKind {
    pub const ALL: [CredentialKind; 2] = [CredentialKind::Ecert, CredentialKind::TlsCert];
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialKind::Ecert => write!(f, "ecert"),
            CredentialKind::TlsCert => write!(f, "TLS cert"),
        }
    }
}

/// Enroll/re-enroll flags for one credential kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CredentialActionFlags {
    pub enroll: bool,
    pub reenroll: bool,
    pub reenroll_with_new_key: bool,
}

impl CredentialActionFlags {
    pub fn any_reenroll(&self) -> bool {
        self.reenroll || self.reenroll_with_new_key
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollActions {
    #[serde(default)]
    pub ecert: bool,
    #[serde(default)]
    pub tlscert: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReenrollActions {
    #[serde(default)]
    pub ecert: bool,
    #[serde(default)]
    pub ecert_new_key: bool,
    #[serde(default)]
    pub tlscert: bool,
    #[serde(default)]
    pub tlscert_new_key: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewActions {
    #[serde(default)]
    pub tlscert: bool,
}

/// All actions a caller can request on a component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentActions {
    #[serde(default)]
    pub restart: bool,
    #[serde(default)]
    pub enroll: EnrollActions,
    #[serde(default)]
    pub reenroll: ReenrollActions,
    #[serde(default)]
    pub renew: RenewActions,
}

impl ComponentActions {
    /// Project onto the enroll/re-enroll flags of one credential kind
    pub fn flags(&self, credential: CredentialKind) -> CredentialActionFlags {
        match credential {
            CredentialKind::Ecert => CredentialActionFlags {
                enroll: self.enroll.ecert,
                reenroll: self.reenroll.ecert,
                reenroll_with_new_key: self.reenroll.ecert_new_key,
            },
            CredentialKind::TlsCert => CredentialActionFlags {
                enroll: self.enroll.tlscert,
                reenroll: self.reenroll.tlscert,
                reenroll_with_new_key: self.reenroll.tlscert_new_key,
            },
        }
    }

    /// Any enroll or re-enroll flag set
    pub fn has_credential_actions(&self) -> bool {
        CredentialKind::ALL.iter().any(|c| {
            let flags = self.flags(*c);
            flags.enroll || flags.any_reenroll()
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == ComponentActions::default()
    }

    /// Union of two action sets
    pub fn union(&self, other: &ComponentActions) -> ComponentActions {
        ComponentActions {
            restart: self.restart || other.restart,
            enroll: EnrollActions {
                ecert: self.enroll.ecert || other.enroll.ecert,
                tlscert: self.enroll.tlscert || other.enroll.tlscert,
            },
            reenroll: ReenrollActions {
                ecert: self.reenroll.ecert || other.reenroll.ecert,
                ecert_new_key: self.reenroll.ecert_new_key || other.reenroll.ecert_new_key,
                tlscert: self.reenroll.tlscert || other.reenroll.tlscert,
                tlscert_new_key: self.reenroll.tlscert_new_key || other.reenroll.tlscert_new_key,
            },
            renew: RenewActions {
                tlscert: self.renew.tlscert || other.renew.tlscert,
            },
        }
    }
}
