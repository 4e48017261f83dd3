use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recorded checkpoint scan. Rows are never updated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PatrolScanEvent {
    pub id: Uuid,
    pub checkpoint_id: Uuid,
    pub guard_id: Uuid,
    pub shift_id: Option<Uuid>,
    pub scanned_at: DateTime<Utc>,
    pub is_on_time: bool,
}

/// Scan submitted by a guard device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub scan_code: String,
    pub guard_id: Uuid,
}
