use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Guard {
    pub id: Uuid,
    /// Login account of the guard, if one exists
    pub user_id: Option<Uuid>,
    pub name: String,
    pub site_id: Option<Uuid>,
    pub status: GuardStatus,
    pub created_at: DateTime<Utc>,
}

/// Guard duty status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "guard_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GuardStatus {
    Active,
    OnPatrol,
    OffDuty,
    Suspended,
}
