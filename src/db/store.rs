//! Storage seams the patrol services are written against.
//!
//! Each trait mirrors one repository; [`Stores::postgres`] wires the sqlx
//! repositories, tests wire an in-memory store instead.

use crate::db::models::alert_models::{Alert, AlertQuery};
use crate::db::models::checkpoint_models::{Checkpoint, CheckpointLastScan};
use crate::db::models::geofence_models::GeofenceEvent;
use crate::db::models::guard_models::{Guard, GuardStatus};
use crate::db::models::panic_models::{PanicAlert, PanicStatus};
use crate::db::models::scan_models::PatrolScanEvent;
use crate::db::models::shift_models::{Shift, ShiftStatus};
use crate::db::models::site_models::Site;
use crate::db::repositories::{
    AlertsRepository, CheckpointsRepository, GeofenceEventsRepository, GuardsRepository,
    PanicAlertsRepository, ScansRepository, ShiftsRepository, SitesRepository, UsersRepository,
};
use crate::notification::RecipientDirectory;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait SiteStore: Send + Sync {
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Site>>;
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Look up a checkpoint by the code printed on its tag
    async fn get_by_code(&self, code: &str) -> Result<Option<Checkpoint>>;

    /// All checkpoints of a site in patrol order
    async fn get_for_site(&self, site_id: &Uuid) -> Result<Vec<Checkpoint>>;

    /// Required checkpoints of a site with the guard's most recent scan of
    /// each, in sequence order
    async fn required_with_last_scan(
        &self,
        site_id: &Uuid,
        guard_id: &Uuid,
    ) -> Result<Vec<CheckpointLastScan>>;
}

#[async_trait]
pub trait GuardStore: Send + Sync {
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Guard>>;
    async fn set_status(&self, id: &Uuid, status: GuardStatus) -> Result<()>;
}

#[async_trait]
pub trait ShiftStore: Send + Sync {
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Shift>>;

    /// All currently active shifts
    async fn get_active(&self) -> Result<Vec<Shift>>;

    async fn get_active_for_guard(&self, guard_id: &Uuid) -> Result<Option<Shift>>;

    /// Move a shift to a new status. A second active shift for the same
    /// guard is `Error::Conflict`.
    async fn set_status(&self, id: &Uuid, status: ShiftStatus) -> Result<Shift>;
}

#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn create(&self, scan: &PatrolScanEvent) -> Result<PatrolScanEvent>;

    /// Time of the guard's most recent scan at a checkpoint
    async fn last_for_guard_at_checkpoint(
        &self,
        guard_id: &Uuid,
        checkpoint_id: &Uuid,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Scans recorded during a shift, oldest first
    async fn for_shift(&self, shift_id: &Uuid) -> Result<Vec<PatrolScanEvent>>;
}

#[async_trait]
pub trait GeofenceEventStore: Send + Sync {
    async fn create(&self, event: &GeofenceEvent) -> Result<GeofenceEvent>;

    /// Most recent transition recorded for a guard at a site
    async fn latest_for_pair(&self, guard_id: &Uuid, site_id: &Uuid)
        -> Result<Option<GeofenceEvent>>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn create(&self, alert: &Alert) -> Result<Alert>;
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Alert>>;

    /// Mark an alert acknowledged; the first acknowledgement is kept
    async fn acknowledge(
        &self,
        id: &Uuid,
        user_id: &Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>>;

    /// Newest first. `sites` restricts the result to those sites when set.
    async fn list(&self, query: &AlertQuery, sites: Option<&[Uuid]>) -> Result<Vec<Alert>>;
}

#[async_trait]
pub trait PanicStore: Send + Sync {
    async fn create(&self, panic: &PanicAlert) -> Result<PanicAlert>;
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<PanicAlert>>;

    /// Persist lifecycle fields, but only if the stored status is still
    /// `expected`. `None` means another writer moved the alert first.
    async fn update(&self, panic: &PanicAlert, expected: PanicStatus)
        -> Result<Option<PanicAlert>>;

    /// Unresolved panic alerts, newest first
    async fn get_open(&self, sites: Option<&[Uuid]>) -> Result<Vec<PanicAlert>>;
}

/// One handle per store, shared by every service
#[derive(Clone)]
pub struct Stores {
    pub sites: Arc<dyn SiteStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub guards: Arc<dyn GuardStore>,
    pub shifts: Arc<dyn ShiftStore>,
    pub scans: Arc<dyn ScanStore>,
    pub geofence_events: Arc<dyn GeofenceEventStore>,
    pub alerts: Arc<dyn AlertStore>,
    pub panics: Arc<dyn PanicStore>,
    pub recipients: Arc<dyn RecipientDirectory>,
}

impl Stores {
    pub fn postgres(pool: Arc<PgPool>) -> Self {
        Self {
            sites: Arc::new(SitesRepository::new(pool.clone())),
            checkpoints: Arc::new(CheckpointsRepository::new(pool.clone())),
            guards: Arc::new(GuardsRepository::new(pool.clone())),
            shifts: Arc::new(ShiftsRepository::new(pool.clone())),
            scans: Arc::new(ScansRepository::new(pool.clone())),
            geofence_events: Arc::new(GeofenceEventsRepository::new(pool.clone())),
            alerts: Arc::new(AlertsRepository::new(pool.clone())),
            panics: Arc::new(PanicAlertsRepository::new(pool.clone())),
            recipients: Arc::new(UsersRepository::new(pool)),
        }
    }
}
