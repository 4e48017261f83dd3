use crate::db::models::scan_models::{PatrolScanEvent, ScanRequest};
use crate::db::store::{CheckpointStore, GuardStore, ScanStore, ShiftStore};
use crate::engine::ScanClassifier;
use crate::error::Error;
use crate::messaging::PatrolEvents;
use crate::security::Actor;
use anyhow::Result;
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

/// Checkpoint scan intake
pub struct ScanService {
    checkpoints_repo: Arc<dyn CheckpointStore>,
    guards_repo: Arc<dyn GuardStore>,
    shifts_repo: Arc<dyn ShiftStore>,
    scans_repo: Arc<dyn ScanStore>,
    events: PatrolEvents,
    classifier: ScanClassifier,
}

impl ScanService {
    pub fn new(
        checkpoints_repo: Arc<dyn CheckpointStore>,
        guards_repo: Arc<dyn GuardStore>,
        shifts_repo: Arc<dyn ShiftStore>,
        scans_repo: Arc<dyn ScanStore>,
        events: PatrolEvents,
        classifier: ScanClassifier,
    ) -> Self {
        Self {
            checkpoints_repo,
            guards_repo,
            shifts_repo,
            scans_repo,
            events,
            classifier,
        }
    }

    /// Record a scan. Late scans are stored too, only labelled; an unknown
    /// code stores nothing.
    pub async fn record_scan(&self, request: &ScanRequest, actor: &Actor) -> Result<PatrolScanEvent> {
        let code = request.scan_code.trim();
        if code.is_empty() {
            return Err(Error::Validation("scan_code must not be empty".to_string()).into());
        }

        let checkpoint = self
            .checkpoints_repo
            .get_by_code(code)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No checkpoint with scan code {}", code)))?;

        let guard = self
            .guards_repo
            .get_by_id(&request.guard_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Guard {} not found", request.guard_id)))?;
        actor.ensure_acts_for(guard.id, Some(checkpoint.site_id))?;

        let shift = self.shifts_repo.get_active_for_guard(&guard.id).await?;
        let previous = self
            .scans_repo
            .last_for_guard_at_checkpoint(&guard.id, &checkpoint.id)
            .await?;

        let now = Utc::now();
        let is_on_time =
            self.classifier
                .is_on_time(checkpoint.scan_interval_minutes, previous, now)?;

        let scan = self
            .scans_repo
            .create(&PatrolScanEvent {
                id: Uuid::new_v4(),
                checkpoint_id: checkpoint.id,
                guard_id: guard.id,
                shift_id: shift.map(|shift| shift.id),
                scanned_at: now,
                is_on_time,
            })
            .await?;

        info!(
            "Guard {} scanned checkpoint {} ({})",
            guard.name,
            checkpoint.name,
            if is_on_time { "on time" } else { "late" }
        );

        if let Err(e) = self.events.scan_recorded(&scan).await {
            warn!("Failed to publish scan recorded event: {}", e);
        }

        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::shift_models::ShiftStatus;
    use crate::services::testing::{guard_actor, Harness};

    fn request(code: &str, guard_id: Uuid) -> ScanRequest {
        ScanRequest {
            scan_code: code.to_string(),
            guard_id,
        }
    }

    #[tokio::test]
    async fn unknown_code_is_not_found_and_stores_nothing() {
        let h = Harness::build();
        let site = h.store.add_site("Harbor Warehouse", 40.7128, -74.0060, None);
        let guard = h.store.add_guard("R. Diaz", Some(site.id));
        h.store.add_shift(guard.id, site.id, ShiftStatus::Active);

        let err = h
            .services
            .scans
            .record_scan(&request("NO-SUCH-TAG", guard.id), &guard_actor(guard.id))
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotFound(_))));
        assert!(h.store.scans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn scan_without_active_shift_is_stored_unattributed() {
        let h = Harness::build();
        let site = h.store.add_site("Harbor Warehouse", 40.7128, -74.0060, None);
        let guard = h.store.add_guard("R. Diaz", Some(site.id));
        h.store.add_checkpoint(site.id, "Gate", "GATE-01", 1, 30);

        let scan = h
            .services
            .scans
            .record_scan(&request(" GATE-01 ", guard.id), &guard_actor(guard.id))
            .await
            .unwrap();

        assert_eq!(scan.shift_id, None);
        assert!(scan.is_on_time);
        assert_eq!(h.store.scans.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scan_during_shift_belongs_to_it() {
        let h = Harness::build();
        let site = h.store.add_site("Harbor Warehouse", 40.7128, -74.0060, None);
        let guard = h.store.add_guard("R. Diaz", Some(site.id));
        let shift = h.store.add_shift(guard.id, site.id, ShiftStatus::Active);
        h.store.add_checkpoint(site.id, "Gate", "GATE-01", 1, 30);

        let scan = h
            .services
            .scans
            .record_scan(&request("GATE-01", guard.id), &guard_actor(guard.id))
            .await
            .unwrap();

        assert_eq!(scan.shift_id, Some(shift.id));
    }

    #[tokio::test]
    async fn guard_cannot_scan_for_someone_else() {
        let h = Harness::build();
        let site = h.store.add_site("Harbor Warehouse", 40.7128, -74.0060, None);
        let guard = h.store.add_guard("R. Diaz", Some(site.id));
        h.store.add_checkpoint(site.id, "Gate", "GATE-01", 1, 30);

        let err = h
            .services
            .scans
            .record_scan(&request("GATE-01", guard.id), &guard_actor(Uuid::new_v4()))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Authorization(_))
        ));
        assert!(h.store.scans.lock().unwrap().is_empty());
    }
}
