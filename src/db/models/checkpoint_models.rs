use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Checkpoint model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Checkpoint {
    pub id: Uuid,
    pub site_id: Uuid,
    pub name: String,
    /// Code printed on the QR/NFC tag
    pub code: String,
    pub sequence_order: i32,
    pub scan_interval_minutes: i32,
    pub is_required: bool,
    pub created_at: DateTime<Utc>,
}

/// Required checkpoint joined with a guard's most recent scan of it
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CheckpointLastScan {
    pub id: Uuid,
    pub name: String,
    pub sequence_order: i32,
    pub scan_interval_minutes: i32,
    pub last_scanned_at: Option<DateTime<Utc>>,
}
