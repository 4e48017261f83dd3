use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shift model. At most one shift per guard is `Active` at a time.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Shift {
    pub id: Uuid,
    pub guard_id: Uuid,
    pub site_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ShiftStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "shift_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    Scheduled,
    Active,
    Completed,
    Missed,
}
