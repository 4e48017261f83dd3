use crate::db::models::alert_models::{Alert, AlertSeverity, AlertType};
use crate::db::models::geofence_models::{GeofenceEvent, GeofenceEventType, PositionFix};
use crate::db::store::{GeofenceEventStore, GuardStore, ShiftStore, SiteStore};
use crate::engine::geofence::Transition;
use crate::engine::{Coordinate, GeofenceDetector, Presence, TrackingStatus};
use crate::error::Error;
use crate::messaging::PatrolEvents;
use crate::security::Actor;
use crate::services::alerts::AlertService;
use anyhow::Result;
use chrono::{Duration, Utc};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Position intake feeding the geofence detector
pub struct GeofenceService {
    sites_repo: Arc<dyn SiteStore>,
    guards_repo: Arc<dyn GuardStore>,
    shifts_repo: Arc<dyn ShiftStore>,
    events_repo: Arc<dyn GeofenceEventStore>,
    detector: Arc<GeofenceDetector>,
    alerts: Arc<AlertService>,
    events: PatrolEvents,
    default_radius_m: f64,
    stale_after: Duration,
    /// One writer per guard at a time
    guard_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl GeofenceService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sites_repo: Arc<dyn SiteStore>,
        guards_repo: Arc<dyn GuardStore>,
        shifts_repo: Arc<dyn ShiftStore>,
        events_repo: Arc<dyn GeofenceEventStore>,
        detector: Arc<GeofenceDetector>,
        alerts: Arc<AlertService>,
        events: PatrolEvents,
        default_radius_m: f64,
        stale_after: Duration,
    ) -> Self {
        Self {
            sites_repo,
            guards_repo,
            shifts_repo,
            events_repo,
            detector,
            alerts,
            events,
            default_radius_m,
            stale_after,
            guard_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Feed a position fix. Returns the stored event when the guard crossed
    /// the fence; fixes outside an active shift are ignored.
    pub async fn record_position(
        &self,
        fix: &PositionFix,
        actor: &Actor,
    ) -> Result<Option<GeofenceEvent>> {
        let position = Coordinate::parse(fix.lat, fix.lon)?;

        let shift = self.shifts_repo.get_active_for_guard(&fix.guard_id).await?;
        actor.ensure_acts_for(fix.guard_id, shift.as_ref().map(|shift| shift.site_id))?;

        let shift = match shift {
            Some(shift) => shift,
            None => {
                debug!("Ignoring fix from guard {} without an active shift", fix.guard_id);
                return Ok(None);
            }
        };

        let site = self
            .sites_repo
            .get_by_id(&shift.site_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Site {} not found", shift.site_id)))?;

        let lock = self.guard_lock(fix.guard_id);
        let _held = lock.lock().await;

        if !self.detector.is_known(fix.guard_id, site.id) {
            if let Some(last) = self.events_repo.latest_for_pair(&fix.guard_id, &site.id).await? {
                self.detector
                    .seed(fix.guard_id, site.id, Presence::from(last.event_type));
            }
        }

        let at = fix.recorded_at.unwrap_or_else(Utc::now);
        let transition = match self.detector.evaluate(
            fix.guard_id,
            site.id,
            &site.geofence(self.default_radius_m),
            position,
            at,
        ) {
            Some(transition) => transition,
            None => return Ok(None),
        };

        // Presence only moves once the event is stored
        let event = self.events_repo.create(&to_event(&transition, at)).await?;
        self.detector.commit(&transition);
        info!(
            "Guard {} {:?} site {} ({:.0} m from center)",
            event.guard_id, event.event_type, site.name, transition.distance_m
        );

        if let Err(e) = self.events.geofence_transition(&event).await {
            warn!("Failed to publish geofence event: {}", e);
        }

        if event.event_type == GeofenceEventType::Exit {
            let alert = Alert::new(
                AlertType::GeofenceExit,
                AlertSeverity::Medium,
                site.id,
                Some(event.guard_id),
                format!(
                    "Guard left the {} geofence ({:.0} m from center)",
                    site.name, transition.distance_m
                ),
            );
            if let Err(e) = self.alerts.raise(alert).await {
                error!("Failed to raise geofence exit alert: {}", e);
            }
        }

        Ok(Some(event))
    }

    /// Whether the guard's position stream is fresh enough to trust
    pub async fn tracking(&self, guard_id: Uuid, actor: &Actor) -> Result<TrackingStatus> {
        let guard = self
            .guards_repo
            .get_by_id(&guard_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Guard {} not found", guard_id)))?;
        actor.ensure_acts_for(guard.id, guard.site_id)?;

        Ok(self
            .detector
            .tracking_status(guard.id, Utc::now(), self.stale_after))
    }

    /// Drop presence state and the writer lock of a guard whose shift ended
    pub fn forget_guard(&self, guard_id: Uuid) {
        self.detector.forget_guard(guard_id);
        self.locks().remove(&guard_id);
    }

    fn guard_lock(&self, guard_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.locks().entry(guard_id).or_default().clone()
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>> {
        self.guard_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn tracked_guards(&self) -> usize {
        self.locks().len()
    }
}

fn to_event(transition: &Transition, at: chrono::DateTime<Utc>) -> GeofenceEvent {
    GeofenceEvent {
        id: Uuid::new_v4(),
        guard_id: transition.guard_id,
        site_id: transition.site_id,
        event_type: transition.event_type,
        lat: transition.position.lat,
        lon: transition.position.lon,
        created_at: at,
    }
}
