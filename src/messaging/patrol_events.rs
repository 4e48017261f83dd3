use crate::db::models::alert_models::Alert;
use crate::db::models::geofence_models::{GeofenceEvent, GeofenceEventType};
use crate::db::models::panic_models::{PanicAlert, PanicStatus};
use crate::db::models::scan_models::PatrolScanEvent;
use crate::db::models::shift_models::Shift;
use crate::engine::ShiftCompliance;
use crate::messaging::broker::{MessageBrokerTrait, SharedBroker};
use crate::messaging::EventType;
use anyhow::Result;
use log::{debug, info};

/// Helper for publishing patrol domain events on the change bus
#[derive(Clone)]
pub struct PatrolEvents {
    message_broker: SharedBroker,
}

impl PatrolEvents {
    pub fn new(message_broker: SharedBroker) -> Self {
        Self { message_broker }
    }

    pub fn broker(&self) -> &SharedBroker {
        &self.message_broker
    }

    /// Publish a scan recorded event, keyed by guard
    pub async fn scan_recorded(&self, scan: &PatrolScanEvent) -> Result<()> {
        self.message_broker
            .publish(
                EventType::ScanRecorded,
                Some(scan.guard_id),
                serde_json::to_value(scan)?,
            )
            .await?;

        debug!(
            "Published scan recorded event for guard {} (on time: {})",
            scan.guard_id, scan.is_on_time
        );
        Ok(())
    }

    /// Publish a shift started or ended event, keyed by guard
    pub async fn shift_changed(&self, shift: &Shift, started: bool) -> Result<()> {
        let event_type = if started {
            EventType::ShiftStarted
        } else {
            EventType::ShiftEnded
        };

        self.message_broker
            .publish(event_type.clone(), Some(shift.guard_id), serde_json::to_value(shift)?)
            .await?;

        info!("Published {} for shift {}", event_type, shift.id);
        Ok(())
    }

    /// Publish a geofence transition, keyed by guard
    pub async fn geofence_transition(&self, event: &GeofenceEvent) -> Result<()> {
        let event_type = match event.event_type {
            GeofenceEventType::Enter => EventType::GeofenceEntered,
            GeofenceEventType::Exit => EventType::GeofenceExited,
        };

        self.message_broker
            .publish(event_type, Some(event.guard_id), serde_json::to_value(event)?)
            .await?;

        info!(
            "Published geofence {:?} for guard {} at site {}",
            event.event_type, event.guard_id, event.site_id
        );
        Ok(())
    }

    /// Publish an alert raised event, keyed by alert
    pub async fn alert_raised(&self, alert: &Alert) -> Result<()> {
        self.message_broker
            .publish(
                EventType::AlertRaised,
                Some(alert.id),
                serde_json::to_value(alert)?,
            )
            .await?;

        debug!("Published alert raised event for {}", alert.id);
        Ok(())
    }

    pub async fn alert_acknowledged(&self, alert: &Alert) -> Result<()> {
        self.message_broker
            .publish(
                EventType::AlertAcknowledged,
                Some(alert.id),
                serde_json::to_value(alert)?,
            )
            .await?;
        Ok(())
    }

    /// Publish a panic lifecycle event, keyed by panic alert
    pub async fn panic_changed(&self, panic: &PanicAlert) -> Result<()> {
        let event_type = match panic.status {
            PanicStatus::Active => EventType::PanicTriggered,
            PanicStatus::Acknowledged => EventType::PanicAcknowledged,
            PanicStatus::Resolved => EventType::PanicResolved,
        };

        self.message_broker
            .publish(event_type.clone(), Some(panic.id), serde_json::to_value(panic)?)
            .await?;

        info!("Published {} for panic alert {}", event_type, panic.id);
        Ok(())
    }

    /// Publish a compliance status change, keyed by shift
    pub async fn compliance_updated(&self, compliance: &ShiftCompliance) -> Result<()> {
        self.message_broker
            .publish(
                EventType::ComplianceUpdated,
                Some(compliance.shift_id),
                serde_json::to_value(compliance)?,
            )
            .await?;

        debug!(
            "Published compliance {} for shift {}",
            compliance.status, compliance.shift_id
        );
        Ok(())
    }
}
