/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Account roles, stored as their numeric ids in the `users.rol` column.
///
/// The numbering is historical and load-bearing: role checks, JWT claims
/// and the admin endpoints all speak these integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Role {
    /// Cross-area, read-only reporting role
    CoordinadorGeneral,
    /// Reviews, returns, or advances cases within one area
    CoordinadorArea,
    /// Creates and edits draft cases within one area
    Operativo,
    /// User management only; never a case actor
    Administrador,
}

impl Role {
    pub fn id(self) -> i32 {
        match self {
            Role::CoordinadorGeneral => 1,
            Role::CoordinadorArea => 2,
            Role::Operativo => 3,
            Role::Administrador => 4,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Role::CoordinadorGeneral),
            2 => Some(Role::CoordinadorArea),
            3 => Some(Role::Operativo),
            4 => Some(Role::Administrador),
            _ => None,
        }
    }

    /// Roles that are bound to a single service area
    pub fn requires_area(self) -> bool {
        matches!(self, Role::CoordinadorArea | Role::Operativo)
    }
}

impl TryFrom<i32> for Role {
    type Error = String;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        Role::from_id(id).ok_or_else(|| format!("unknown role id: {}", id))
    }
}

impl From<Role> for i32 {
    fn from(role: Role) -> i32 {
        role.id()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::CoordinadorGeneral => "coordinador general",
            Role::CoordinadorArea => "coordinador de area",
            Role::Operativo => "operativo",
            Role::Administrador => "administrador",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ids_round_trip() {
        for id in 1..=4 {
            assert_eq!(Role::from_id(id).unwrap().id(), id);
        }
        assert!(Role::from_id(0).is_none());
        assert!(Role::from_id(5).is_none());
    }

    #[test]
    fn area_bound_roles() {
        assert!(Role::CoordinadorArea.requires_area());
        assert!(Role::Operativo.requires_area());
        assert!(!Role::CoordinadorGeneral.requires_area());
        assert!(!Role::Administrador.requires_area());
    }

    #[test]
    fn serde_uses_numeric_ids() {
        let json = serde_json::to_string(&Role::Operativo).unwrap();
        assert_eq!(json, "3");
        let role: Role = serde_json::from_str("2").unwrap();
        assert_eq!(role, Role::CoordinadorArea);
        assert!(serde_json::from_str::<Role>("9").is_err());
    }
}
