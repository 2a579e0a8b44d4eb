use std::fmt;

use serde::{Deserialize, Serialize};

/// Staff role with a strict hierarchy: Agent < Coordinator < Admin.
/// A higher role satisfies any lower requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Agent,
    Coordinator,
    Admin,
}

impl Role {
    /// Canonical wire name. The frontend and tokens use the original
    /// Portuguese role labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Agent => "agente",
            Role::Coordinator => "coordenadora",
            Role::Admin => "admin",
        }
    }

    /// Maps legacy role aliases onto the canonical set. Unmapped strings are
    /// invalid; there is no default role.
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "agente" | "agent" => Some(Role::Agent),
            "coordenadora" | "coordenador" | "coordinator" => Some(Role::Coordinator),
            "admin" | "administrator" | "administrador" | "administradora" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Returns true if this role meets the required level.
    #[must_use]
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Role::parse(&value).ok_or_else(|| format!("unknown role: {value}"))
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy() {
        assert!(Role::Admin.satisfies(Role::Agent));
        assert!(Role::Admin.satisfies(Role::Coordinator));
        assert!(Role::Coordinator.satisfies(Role::Agent));
        assert!(!Role::Agent.satisfies(Role::Coordinator));
        assert!(!Role::Coordinator.satisfies(Role::Admin));
        assert!(Role::Agent.satisfies(Role::Agent));
    }

    #[test]
    fn test_legacy_aliases() {
        assert_eq!(Role::parse("coordenadora"), Some(Role::Coordinator));
        assert_eq!(Role::parse("Coordinator"), Some(Role::Coordinator));
        assert_eq!(Role::parse("administrator"), Some(Role::Admin));
        assert_eq!(Role::parse("AGENTE"), Some(Role::Agent));
    }

    #[test]
    fn test_unmapped_role_is_invalid() {
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse("user"), None);
    }

    #[test]
    fn test_serde_round_trip() {
        let json = serde_json::to_string(&Role::Coordinator).unwrap();
        assert_eq!(json, "\"coordenadora\"");
        let role: Role = serde_json::from_str("\"coordenador\"").unwrap();
        assert_eq!(role, Role::Coordinator);
        assert!(serde_json::from_str::<Role>("\"root\"").is_err());
    }
}
