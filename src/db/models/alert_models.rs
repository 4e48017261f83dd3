use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Alert generated by detection logic
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Alert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub site_id: Uuid,
    pub guard_id: Option<Uuid>,
    pub message: String,
    pub acknowledged: bool,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Build an unacknowledged alert stamped with the current time
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        site_id: Uuid,
        guard_id: Option<Uuid>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            site_id,
            guard_id,
            message: message.into(),
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "alert_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    CheckpointOverdue,
    CheckpointDueSoon,
    GeofenceExit,
    Panic,
}

impl AlertType {
    pub fn title(&self) -> &'static str {
        match self {
            Self::CheckpointOverdue => "Checkpoint overdue",
            Self::CheckpointDueSoon => "Checkpoint due soon",
            Self::GeofenceExit => "Guard left site geofence",
            Self::Panic => "PANIC alert",
        }
    }
}

/// Alert severity, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[sqlx(type_name = "alert_severity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    /// Only high and critical alerts leave the system as notifications
    pub fn requires_dispatch(&self) -> bool {
        *self >= AlertSeverity::High
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl Display for AlertSeverity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label().to_lowercase())
    }
}

/// Alert list filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertQuery {
    pub site_id: Option<Uuid>,
    #[serde(default)]
    pub unacknowledged: bool,
    pub limit: Option<i64>,
}
