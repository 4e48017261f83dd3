use crate::db::models::guard_models::GuardStatus;
use crate::db::models::shift_models::{Shift, ShiftStatus};
use crate::db::store::{GuardStore, ShiftStore};
use crate::error::Error;
use crate::messaging::PatrolEvents;
use crate::security::Actor;
use crate::services::geofence::GeofenceService;
use anyhow::Result;
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

/// Starts and ends shifts. Ending a shift stops live attribution for the guard.
pub struct ShiftService {
    shifts_repo: Arc<dyn ShiftStore>,
    guards_repo: Arc<dyn GuardStore>,
    geofence: Arc<GeofenceService>,
    events: PatrolEvents,
}

impl ShiftService {
    pub fn new(
        shifts_repo: Arc<dyn ShiftStore>,
        guards_repo: Arc<dyn GuardStore>,
        geofence: Arc<GeofenceService>,
        events: PatrolEvents,
    ) -> Self {
        Self {
            shifts_repo,
            guards_repo,
            geofence,
            events,
        }
    }

    pub async fn start(&self, shift_id: Uuid, actor: &Actor) -> Result<Shift> {
        let shift = self.load(shift_id, actor).await?;

        match shift.status {
            ShiftStatus::Active => return Ok(shift),
            ShiftStatus::Completed | ShiftStatus::Missed => {
                return Err(Error::Conflict(format!("Shift {} has already ended", shift.id)).into())
            }
            ShiftStatus::Scheduled => {}
        }

        let shift = self
            .shifts_repo
            .set_status(&shift.id, ShiftStatus::Active)
            .await?;
        self.guards_repo
            .set_status(&shift.guard_id, GuardStatus::OnPatrol)
            .await?;

        info!("Shift {} started for guard {}", shift.id, shift.guard_id);
        if let Err(e) = self.events.shift_changed(&shift, true).await {
            warn!("Failed to publish shift started event: {}", e);
        }

        Ok(shift)
    }

    pub async fn end(&self, shift_id: Uuid, actor: &Actor) -> Result<Shift> {
        let shift = self.load(shift_id, actor).await?;

        match shift.status {
            ShiftStatus::Completed => return Ok(shift),
            ShiftStatus::Scheduled | ShiftStatus::Missed => {
                return Err(Error::Conflict(format!("Shift {} is not active", shift.id)).into())
            }
            ShiftStatus::Active => {}
        }

        let shift = self
            .shifts_repo
            .set_status(&shift.id, ShiftStatus::Completed)
            .await?;
        self.guards_repo
            .set_status(&shift.guard_id, GuardStatus::OffDuty)
            .await?;
        self.geofence.forget_guard(shift.guard_id);

        info!("Shift {} ended for guard {}", shift.id, shift.guard_id);
        if let Err(e) = self.events.shift_changed(&shift, false).await {
            warn!("Failed to publish shift ended event: {}", e);
        }

        Ok(shift)
    }

    async fn load(&self, shift_id: Uuid, actor: &Actor) -> Result<Shift> {
        let shift = self
            .shifts_repo
            .get_by_id(&shift_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Shift {} not found", shift_id)))?;
        actor.ensure_acts_for(shift.guard_id, Some(shift.site_id))?;
        Ok(shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::EventType;
    use crate::services::testing::{guard_actor, Harness};
    use std::time::Duration;

    #[tokio::test]
    async fn start_puts_guard_on_patrol() {
        let h = Harness::build();
        let site = h.store.add_site("Harbor Warehouse", 40.7128, -74.0060, None);
        let guard = h.store.add_guard("R. Diaz", Some(site.id));
        let shift = h.store.add_shift(guard.id, site.id, ShiftStatus::Scheduled);
        let mut started = h.listen(EventType::ShiftStarted).await;

        let active = h
            .services
            .shifts
            .start(shift.id, &guard_actor(guard.id))
            .await
            .unwrap();

        assert_eq!(active.status, ShiftStatus::Active);
        assert_eq!(
            h.store.guards.lock().unwrap()[0].status,
            GuardStatus::OnPatrol
        );
        let event = tokio::time::timeout(Duration::from_secs(1), started.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.source_id, Some(guard.id));
    }

    #[tokio::test]
    async fn second_active_shift_is_a_conflict() {
        let h = Harness::build();
        let site = h.store.add_site("Harbor Warehouse", 40.7128, -74.0060, None);
        let guard = h.store.add_guard("R. Diaz", Some(site.id));
        h.store.add_shift(guard.id, site.id, ShiftStatus::Active);
        let next = h.store.add_shift(guard.id, site.id, ShiftStatus::Scheduled);

        let err = h
            .services
            .shifts
            .start(next.id, &guard_actor(guard.id))
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn scheduled_shift_cannot_end() {
        let h = Harness::build();
        let site = h.store.add_site("Harbor Warehouse", 40.7128, -74.0060, None);
        let guard = h.store.add_guard("R. Diaz", Some(site.id));
        let shift = h.store.add_shift(guard.id, site.id, ShiftStatus::Scheduled);

        let err = h
            .services
            .shifts
            .end(shift.id, &guard_actor(guard.id))
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Conflict(_))));
    }
}
