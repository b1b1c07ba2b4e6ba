//! User roles.

use serde::{Deserialize, Deserializer, Serialize};

/// Role for authorization. Closed set; anything else the backend sends is
/// carried as "no role" and fails every role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Parse a role string. Matching is exact; unknown strings yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        match self {
            Role::Admin | Role::SuperAdmin => true,
            Role::Student | Role::Teacher => false,
        }
    }

    pub fn can_teach(&self) -> bool {
        match self {
            Role::Teacher | Role::Admin | Role::SuperAdmin => true,
            Role::Student => false,
        }
    }
}

/// Deserialize an optional role, mapping unknown strings to `None` instead of
/// failing the whole document.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Role::parse))
}
