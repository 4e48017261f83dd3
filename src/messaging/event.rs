use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Event types carried on the change bus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventType {
    // Scan events
    ScanRecorded,

    // Shift events
    ShiftStarted,
    ShiftEnded,

    // Geofence events
    GeofenceEntered,
    GeofenceExited,

    // Alert events
    AlertRaised,
    AlertAcknowledged,

    // Panic events
    PanicTriggered,
    PanicAcknowledged,
    PanicResolved,

    // Computed state
    ComplianceUpdated,

    // System events
    SystemStartup,
    SystemShutdown,
}

impl EventType {
    /// Routing pattern matching this event type from any source
    pub fn pattern(&self) -> String {
        format!("{}.#", self)
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScanRecorded => write!(f, "scan.recorded"),
            Self::ShiftStarted => write!(f, "shift.started"),
            Self::ShiftEnded => write!(f, "shift.ended"),
            Self::GeofenceEntered => write!(f, "geofence.entered"),
            Self::GeofenceExited => write!(f, "geofence.exited"),
            Self::AlertRaised => write!(f, "alert.raised"),
            Self::AlertAcknowledged => write!(f, "alert.acknowledged"),
            Self::PanicTriggered => write!(f, "panic.triggered"),
            Self::PanicAcknowledged => write!(f, "panic.acknowledged"),
            Self::PanicResolved => write!(f, "panic.resolved"),
            Self::ComplianceUpdated => write!(f, "compliance.updated"),
            Self::SystemStartup => write!(f, "system.startup"),
            Self::SystemShutdown => write!(f, "system.shutdown"),
        }
    }
}

/// Event message structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    /// Unique event ID
    pub id: Uuid,
    /// Event type
    pub event_type: EventType,
    /// Entity the event is about (guard, shift, alert...)
    pub source_id: Option<Uuid>,
    /// Event timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Event data payload
    pub payload: serde_json::Value,
}

impl EventMessage {
    /// Create a new event message
    pub fn new(event_type: EventType, source_id: Option<Uuid>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            source_id,
            timestamp: chrono::Utc::now(),
            payload,
        }
    }

    /// Get the routing key for the event
    pub fn routing_key(&self) -> String {
        match &self.source_id {
            Some(id) => format!("{}.{}", self.event_type, id),
            None => self.event_type.to_string(),
        }
    }

    /// Deserialize the payload into a typed value
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// AMQP topic matching: `*` matches exactly one word, `#` zero or more
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&"*", rest)) => !key.is_empty() && match_words(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && match_words(rest, &key[1..]),
    }
}
