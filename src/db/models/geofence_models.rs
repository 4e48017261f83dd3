use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Geofence transition for a (guard, site) pair
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GeofenceEvent {
    pub id: Uuid,
    pub guard_id: Uuid,
    pub site_id: Uuid,
    pub event_type: GeofenceEventType,
    pub lat: f64,
    pub lon: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "geofence_event_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GeofenceEventType {
    Enter,
    Exit,
}

/// Position fix reported by a guard device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionFix {
    pub guard_id: Uuid,
    pub lat: f64,
    pub lon: f64,
    /// Device timestamp; the server time is used when absent
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}
