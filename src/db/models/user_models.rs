use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User role enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum UserRole {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "supervisor")]
    Supervisor,
    #[serde(rename = "guard")]
    Guard,
}

impl UserRole {
    /// Admins and supervisors receive alerts and manage panic alerts
    pub fn is_elevated(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Supervisor)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Supervisor => "supervisor",
            UserRole::Guard => "guard",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(UserRole::Admin),
            "supervisor" => Some(UserRole::Supervisor),
            "guard" => Some(UserRole::Guard),
            _ => None,
        }
    }
}

/// Notification recipient resolved from an elevated account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Recipient {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
}
