use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_REGISTRAR_MSP: &str = "registrarMSP";
pub const DEFAULT_PARTICIPANT_MSP: &str = "usersMSP";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Registrar,
    Participant,
    Other,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Registrar => f.write_str("registrar"),
            Role::Participant => f.write_str("participant"),
            Role::Other => f.write_str("other"),
        }
    }
}

/// Maps membership-service-provider ids onto roles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MspRoles {
    pub registrar_msp: String,
    pub participant_msp: String,
}

impl Default for MspRoles {
    fn default() -> Self {
        Self {
            registrar_msp: DEFAULT_REGISTRAR_MSP.to_string(),
            participant_msp: DEFAULT_PARTICIPANT_MSP.to_string(),
        }
    }
}

impl MspRoles {
    pub fn role_of(&self, msp_id: &str) -> Role {
        if msp_id == self.registrar_msp {
            Role::Registrar
        } else if msp_id == self.participant_msp {
            Role::Participant
        } else {
            Role::Other
        }
    }

    pub fn caller(&self, msp_id: impl Into<String>) -> Caller {
        let msp_id = msp_id.into();
        Caller {
            role: self.role_of(&msp_id),
            msp_id,
            id: None,
        }
    }
}

/// Authenticated invoker of a transaction, handed to every handler.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Caller {
    pub msp_id: String,
    pub role: Role,
    /// Enrolled user identity as `name/aadhaarId`. When present, participant
    /// calls may only act for that user.
    pub id: Option<String>,
}

impl Caller {
    pub fn registrar() -> Self {
        MspRoles::default().caller(DEFAULT_REGISTRAR_MSP)
    }

    pub fn participant() -> Self {
        MspRoles::default().caller(DEFAULT_PARTICIPANT_MSP)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    /// Whether this caller may act for the user `name`/`aadhaar_id`.
    /// Callers without an enrolled identity are not restricted.
    pub fn acts_for(&self, name: &str, aadhaar_id: &str) -> bool {
        match self.id.as_deref().and_then(|id| id.rsplit_once('/')) {
            Some((id_name, id_aadhaar)) => id_name == name && id_aadhaar == aadhaar_id,
            None => self.id.is_none(),
        }
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{id}@{} ({})", self.msp_id, self.role),
            None => write!(f, "{} ({})", self.msp_id, self.role),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msp_ids_map_to_roles() {
        let roles = MspRoles::default();
        assert_eq!(roles.role_of("registrarMSP"), Role::Registrar);
        assert_eq!(roles.role_of("usersMSP"), Role::Participant);
        assert_eq!(roles.role_of("ordererMSP"), Role::Other);
    }

    #[test]
    fn custom_msp_ids_are_honoured() {
        let roles = MspRoles {
            registrar_msp: "landOfficeMSP".into(),
            participant_msp: "citizensMSP".into(),
        };
        assert!(roles.caller("landOfficeMSP").has_role(Role::Registrar));
        assert!(roles.caller("usersMSP").has_role(Role::Other));
    }

    #[test]
    fn enrolled_identity_limits_whom_a_caller_acts_for() {
        let anonymous = Caller::participant();
        assert!(anonymous.acts_for("Alice", "1111"));

        let alice = Caller::participant().with_id("Alice/1111");
        assert!(alice.acts_for("Alice", "1111"));
        assert!(!alice.acts_for("Alice", "2222"));
        assert!(!alice.acts_for("Bob", "1111"));

        let unparsable = Caller::participant().with_id("alice");
        assert!(!unparsable.acts_for("alice", ""));
    }

    #[test]
    fn caller_display_includes_identity() {
        let caller = Caller::participant().with_id("alice");
        assert_eq!(caller.to_string(), "alice@usersMSP (participant)");
    }
}
