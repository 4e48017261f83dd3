use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Guard-triggered emergency
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PanicAlert {
    pub id: Uuid,
    pub guard_id: Uuid,
    pub site_id: Uuid,
    pub status: PanicStatus,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
}

impl PanicAlert {
    pub fn new(
        guard_id: Uuid,
        site_id: Uuid,
        location: Option<(f64, f64)>,
        message: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            guard_id,
            site_id,
            status: PanicStatus::Active,
            lat: location.map(|(lat, _)| lat),
            lon: location.map(|(_, lon)| lon),
            message,
            created_at: Utc::now(),
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolved_by: None,
        }
    }
}

/// Panic lifecycle. Only moves forward: active -> acknowledged -> resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, PartialOrd, Ord)]
#[sqlx(type_name = "panic_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PanicStatus {
    Active,
    Acknowledged,
    Resolved,
}

/// Panic trigger sent by a guard device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanicTrigger {
    pub guard_id: Uuid,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}
