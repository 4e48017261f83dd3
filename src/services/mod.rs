pub mod alerts;
pub mod compliance;
pub mod due_time;
pub mod geofence;
pub mod panic;
pub mod scans;
pub mod shifts;
#[cfg(test)]
pub(crate) mod testing;

pub use alerts::AlertService;
pub use compliance::ComplianceMonitor;
pub use due_time::DueTimeMonitor;
pub use geofence::GeofenceService;
pub use panic::{PanicNotice, PanicService};
pub use scans::ScanService;
pub use shifts::ShiftService;

use crate::config::PatrolConfig;
use crate::db::Stores;
use crate::engine::{GeofenceDetector, ScanClassifier};
use crate::messaging::PatrolEvents;
use crate::notification::{AlertDispatcher, NotificationChannel};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Panic notices buffered per live session before it lags
const PANIC_FEED_CAPACITY: usize = 64;

/// Every patrol service, wired to one set of stores and one bus
pub struct PatrolServices {
    pub alerts: Arc<AlertService>,
    pub scans: Arc<ScanService>,
    pub shifts: Arc<ShiftService>,
    pub geofence: Arc<GeofenceService>,
    pub compliance: Arc<ComplianceMonitor>,
    pub due_time: Arc<DueTimeMonitor>,
    pub panic: Arc<PanicService>,
}

impl PatrolServices {
    pub fn new(
        stores: Stores,
        config: &PatrolConfig,
        events: PatrolEvents,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        let dispatcher = Arc::new(AlertDispatcher::new(stores.recipients.clone(), channel));

        let alerts = Arc::new(AlertService::new(
            stores.alerts.clone(),
            stores.sites.clone(),
            stores.guards.clone(),
            events.clone(),
            dispatcher,
        ));

        let scans = Arc::new(ScanService::new(
            stores.checkpoints.clone(),
            stores.guards.clone(),
            stores.shifts.clone(),
            stores.scans.clone(),
            events.clone(),
            ScanClassifier::new(config.grace_multiplier),
        ));

        let geofence = Arc::new(GeofenceService::new(
            stores.sites.clone(),
            stores.guards.clone(),
            stores.shifts.clone(),
            stores.geofence_events.clone(),
            Arc::new(GeofenceDetector::new()),
            alerts.clone(),
            events.clone(),
            config.default_geofence_radius_m,
            chrono::Duration::seconds(config.position_stale_after_secs),
        ));

        let shifts = Arc::new(ShiftService::new(
            stores.shifts.clone(),
            stores.guards.clone(),
            geofence.clone(),
            events.clone(),
        ));

        let compliance = Arc::new(ComplianceMonitor::new(
            stores.shifts.clone(),
            stores.checkpoints.clone(),
            stores.scans.clone(),
            events.clone(),
            Duration::from_secs(config.compliance_poll_secs),
        ));

        let due_time = Arc::new(DueTimeMonitor::new(
            stores.shifts.clone(),
            stores.checkpoints.clone(),
            stores.guards.clone(),
            alerts.clone(),
            Duration::from_millis(config.due_tick_ms),
            chrono::Duration::seconds(config.warning_threshold_secs),
        ));

        let panic = Arc::new(PanicService::new(
            stores.panics,
            stores.guards,
            stores.shifts,
            alerts.clone(),
            events,
            PANIC_FEED_CAPACITY,
        ));

        Self {
            alerts,
            scans,
            shifts,
            geofence,
            compliance,
            due_time,
            panic,
        }
    }

    /// Start the background monitors; they stop when `shutdown` is cancelled
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        self.compliance.clone().start(shutdown.clone()).await?;
        self.due_time.clone().start(shutdown).await?;
        Ok(())
    }
}
