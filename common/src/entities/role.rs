use serde::{Deserialize, Serialize};

use crate::error::{self, AddCode};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "Citizen")]
    Citizen,
    #[serde(alias = "Department")]
    Department,
    #[serde(alias = "Municipal")]
    Municipal,
    #[serde(alias = "Admin")]
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> error::Result<Role> {
        match s.to_lowercase().as_str() {
            "citizen" => Ok(Role::Citizen),
            "department" => Ok(Role::Department),
            "municipal" => Ok(Role::Municipal),
            "admin" => Ok(Role::Admin),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s).code(400)),
        }
    }

    pub fn stringify(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Department => "department",
            Role::Municipal => "municipal",
            Role::Admin => "admin",
        }
    }

    /// Roles that see every field of every record.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Municipal | Role::Admin)
    }
}
