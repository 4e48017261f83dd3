//! In-memory stores for service tests.

use crate::db::models::alert_models::{Alert, AlertQuery};
use crate::db::models::checkpoint_models::{Checkpoint, CheckpointLastScan};
use crate::db::models::geofence_models::GeofenceEvent;
use crate::db::models::guard_models::{Guard, GuardStatus};
use crate::db::models::panic_models::{PanicAlert, PanicStatus};
use crate::db::models::scan_models::PatrolScanEvent;
use crate::db::models::shift_models::{Shift, ShiftStatus};
use crate::db::models::site_models::Site;
use crate::db::models::user_models::Recipient;
use crate::db::store::{
    AlertStore, CheckpointStore, GeofenceEventStore, GuardStore, PanicStore, ScanStore,
    ShiftStore, SiteStore, Stores,
};
use crate::error::Error;
use crate::notification::RecipientDirectory;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    pub sites: Mutex<Vec<Site>>,
    pub checkpoints: Mutex<Vec<Checkpoint>>,
    pub guards: Mutex<Vec<Guard>>,
    pub shifts: Mutex<Vec<Shift>>,
    pub scans: Mutex<Vec<PatrolScanEvent>>,
    pub geofence_events: Mutex<Vec<GeofenceEvent>>,
    pub alerts: Mutex<Vec<Alert>>,
    pub panics: Mutex<Vec<PanicAlert>>,
    pub recipients: Mutex<Vec<Recipient>>,
    /// Fail geofence event inserts while set
    pub fail_geofence_writes: AtomicBool,
    /// Fail alert inserts while set
    pub fail_alert_writes: AtomicBool,
    /// Status another writer sets between the next panic read and update
    pub concurrent_panic_status: Mutex<Option<PanicStatus>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores {
            sites: self.clone(),
            checkpoints: self.clone(),
            guards: self.clone(),
            shifts: self.clone(),
            scans: self.clone(),
            geofence_events: self.clone(),
            alerts: self.clone(),
            panics: self.clone(),
            recipients: self.clone(),
        }
    }

    pub fn add_site(&self, name: &str, lat: f64, lon: f64, radius_m: Option<f64>) -> Site {
        let site = Site {
            id: Uuid::new_v4(),
            name: name.to_string(),
            center_lat: lat,
            center_lon: lon,
            geofence_radius_m: radius_m,
            created_at: Utc::now(),
        };
        self.sites.lock().unwrap().push(site.clone());
        site
    }

    pub fn add_guard(&self, name: &str, site_id: Option<Uuid>) -> Guard {
        let guard = Guard {
            id: Uuid::new_v4(),
            user_id: None,
            name: name.to_string(),
            site_id,
            status: GuardStatus::OffDuty,
            created_at: Utc::now(),
        };
        self.guards.lock().unwrap().push(guard.clone());
        guard
    }

    pub fn add_shift(&self, guard_id: Uuid, site_id: Uuid, status: ShiftStatus) -> Shift {
        let now = Utc::now();
        let shift = Shift {
            id: Uuid::new_v4(),
            guard_id,
            site_id,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(7),
            status,
        };
        self.shifts.lock().unwrap().push(shift.clone());
        shift
    }

    pub fn add_checkpoint(
        &self,
        site_id: Uuid,
        name: &str,
        code: &str,
        sequence_order: i32,
        scan_interval_minutes: i32,
    ) -> Checkpoint {
        let checkpoint = Checkpoint {
            id: Uuid::new_v4(),
            site_id,
            name: name.to_string(),
            code: code.to_string(),
            sequence_order,
            scan_interval_minutes,
            is_required: true,
            created_at: Utc::now(),
        };
        self.checkpoints.lock().unwrap().push(checkpoint.clone());
        checkpoint
    }

    pub fn add_scan(
        &self,
        checkpoint_id: Uuid,
        guard_id: Uuid,
        shift_id: Option<Uuid>,
        scanned_at: DateTime<Utc>,
    ) {
        self.scans.lock().unwrap().push(PatrolScanEvent {
            id: Uuid::new_v4(),
            checkpoint_id,
            guard_id,
            shift_id,
            scanned_at,
            is_on_time: true,
        });
    }
}

#[async_trait]
impl SiteStore for InMemoryStore {
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Site>> {
        Ok(self.sites.lock().unwrap().iter().find(|s| s.id == *id).cloned())
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStore {
    async fn get_by_code(&self, code: &str) -> Result<Option<Checkpoint>> {
        Ok(self
            .checkpoints
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.code == code)
            .cloned())
    }

    async fn get_for_site(&self, site_id: &Uuid) -> Result<Vec<Checkpoint>> {
        let mut checkpoints: Vec<Checkpoint> = self
            .checkpoints
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.site_id == *site_id)
            .cloned()
            .collect();
        checkpoints.sort_by(|a, b| (a.sequence_order, &a.name).cmp(&(b.sequence_order, &b.name)));
        Ok(checkpoints)
    }

    async fn required_with_last_scan(
        &self,
        site_id: &Uuid,
        guard_id: &Uuid,
    ) -> Result<Vec<CheckpointLastScan>> {
        let checkpoints = CheckpointStore::get_for_site(self, site_id).await?;
        let scans = self.scans.lock().unwrap();
        Ok(checkpoints
            .into_iter()
            .filter(|c| c.is_required)
            .map(|c| CheckpointLastScan {
                last_scanned_at: scans
                    .iter()
                    .filter(|s| s.checkpoint_id == c.id && s.guard_id == *guard_id)
                    .map(|s| s.scanned_at)
                    .max(),
                id: c.id,
                name: c.name,
                sequence_order: c.sequence_order,
                scan_interval_minutes: c.scan_interval_minutes,
            })
            .collect())
    }
}

#[async_trait]
impl GuardStore for InMemoryStore {
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Guard>> {
        Ok(self.guards.lock().unwrap().iter().find(|g| g.id == *id).cloned())
    }

    async fn set_status(&self, id: &Uuid, status: GuardStatus) -> Result<()> {
        if let Some(guard) = self.guards.lock().unwrap().iter_mut().find(|g| g.id == *id) {
            guard.status = status;
        }
        Ok(())
    }
}

#[async_trait]
impl ShiftStore for InMemoryStore {
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Shift>> {
        Ok(self.shifts.lock().unwrap().iter().find(|s| s.id == *id).cloned())
    }

    async fn get_active(&self) -> Result<Vec<Shift>> {
        Ok(self
            .shifts
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.status == ShiftStatus::Active)
            .cloned()
            .collect())
    }

    async fn get_active_for_guard(&self, guard_id: &Uuid) -> Result<Option<Shift>> {
        Ok(self
            .shifts
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.guard_id == *guard_id && s.status == ShiftStatus::Active)
            .cloned())
    }

    async fn set_status(&self, id: &Uuid, status: ShiftStatus) -> Result<Shift> {
        let mut shifts = self.shifts.lock().unwrap();
        let guard_id = shifts
            .iter()
            .find(|s| s.id == *id)
            .map(|s| s.guard_id)
            .ok_or_else(|| Error::NotFound(format!("Shift {} not found", id)))?;

        if status == ShiftStatus::Active
            && shifts
                .iter()
                .any(|s| s.id != *id && s.guard_id == guard_id && s.status == ShiftStatus::Active)
        {
            return Err(Error::Conflict("Guard already has an active shift".to_string()).into());
        }

        let shift = shifts
            .iter_mut()
            .find(|s| s.id == *id)
            .ok_or_else(|| Error::NotFound(format!("Shift {} not found", id)))?;
        shift.status = status;
        Ok(shift.clone())
    }
}

#[async_trait]
impl ScanStore for InMemoryStore {
    async fn create(&self, scan: &PatrolScanEvent) -> Result<PatrolScanEvent> {
        self.scans.lock().unwrap().push(scan.clone());
        Ok(scan.clone())
    }

    async fn last_for_guard_at_checkpoint(
        &self,
        guard_id: &Uuid,
        checkpoint_id: &Uuid,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .scans
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.guard_id == *guard_id && s.checkpoint_id == *checkpoint_id)
            .map(|s| s.scanned_at)
            .max())
    }

    async fn for_shift(&self, shift_id: &Uuid) -> Result<Vec<PatrolScanEvent>> {
        let mut scans: Vec<PatrolScanEvent> = self
            .scans
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.shift_id == Some(*shift_id))
            .cloned()
            .collect();
        scans.sort_by_key(|s| s.scanned_at);
        Ok(scans)
    }
}

#[async_trait]
impl GeofenceEventStore for InMemoryStore {
    async fn create(&self, event: &GeofenceEvent) -> Result<GeofenceEvent> {
        if self.fail_geofence_writes.load(Ordering::SeqCst) {
            return Err(Error::Database("geofence_events unavailable".to_string()).into());
        }
        self.geofence_events.lock().unwrap().push(event.clone());
        Ok(event.clone())
    }

    async fn latest_for_pair(
        &self,
        guard_id: &Uuid,
        site_id: &Uuid,
    ) -> Result<Option<GeofenceEvent>> {
        Ok(self
            .geofence_events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.guard_id == *guard_id && e.site_id == *site_id)
            .max_by_key(|e| e.created_at)
            .cloned())
    }
}

#[async_trait]
impl AlertStore for InMemoryStore {
    async fn create(&self, alert: &Alert) -> Result<Alert> {
        if self.fail_alert_writes.load(Ordering::SeqCst) {
            return Err(Error::Database("alerts unavailable".to_string()).into());
        }
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(alert.clone())
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Alert>> {
        Ok(self.alerts.lock().unwrap().iter().find(|a| a.id == *id).cloned())
    }

    async fn acknowledge(
        &self,
        id: &Uuid,
        user_id: &Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        let mut alerts = self.alerts.lock().unwrap();
        Ok(alerts.iter_mut().find(|a| a.id == *id).map(|alert| {
            alert.acknowledged = true;
            alert.acknowledged_by.get_or_insert(*user_id);
            alert.acknowledged_at.get_or_insert(at);
            alert.clone()
        }))
    }

    async fn list(&self, query: &AlertQuery, sites: Option<&[Uuid]>) -> Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| query.site_id.map_or(true, |site| a.site_id == site))
            .filter(|a| !query.unacknowledged || !a.acknowledged)
            .filter(|a| sites.map_or(true, |ids| ids.contains(&a.site_id)))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }
}

#[async_trait]
impl PanicStore for InMemoryStore {
    async fn create(&self, panic: &PanicAlert) -> Result<PanicAlert> {
        self.panics.lock().unwrap().push(panic.clone());
        Ok(panic.clone())
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<PanicAlert>> {
        Ok(self.panics.lock().unwrap().iter().find(|p| p.id == *id).cloned())
    }

    async fn update(
        &self,
        panic: &PanicAlert,
        expected: PanicStatus,
    ) -> Result<Option<PanicAlert>> {
        let interleaved = self.concurrent_panic_status.lock().unwrap().take();
        let mut panics = self.panics.lock().unwrap();
        let stored = match panics.iter_mut().find(|p| p.id == panic.id) {
            Some(stored) => stored,
            None => return Ok(None),
        };

        if let Some(status) = interleaved {
            stored.status = status;
        }
        if stored.status != expected {
            return Ok(None);
        }

        *stored = panic.clone();
        Ok(Some(stored.clone()))
    }

    async fn get_open(&self, sites: Option<&[Uuid]>) -> Result<Vec<PanicAlert>> {
        Ok(self
            .panics
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.status != PanicStatus::Resolved)
            .filter(|p| sites.map_or(true, |ids| ids.contains(&p.site_id)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RecipientDirectory for InMemoryStore {
    async fn elevated_recipients(&self) -> Result<Vec<Recipient>> {
        Ok(self.recipients.lock().unwrap().clone())
    }
}
