use crate::db::models::alert_models::{Alert, AlertSeverity, AlertType};
use crate::db::models::shift_models::Shift;
use crate::db::store::{CheckpointStore, GuardStore, ShiftStore};
use crate::engine::{most_urgent, DueStatus, Threshold, ThresholdTracker};
use crate::error::Error;
use crate::security::Actor;
use crate::services::alerts::AlertService;
use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Server-side countdown for every guard on an active shift.
///
/// Each tick computes the countdown of every required checkpoint per guard
/// and raises an alert the first time a due cycle crosses the warning window
/// or becomes overdue. The most urgent checkpoint is kept for display only.
pub struct DueTimeMonitor {
    shifts_repo: Arc<dyn ShiftStore>,
    checkpoints_repo: Arc<dyn CheckpointStore>,
    guards_repo: Arc<dyn GuardStore>,
    alerts: Arc<AlertService>,
    tick: Duration,
    warning_window: chrono::Duration,
    trackers: Mutex<HashMap<Uuid, ThresholdTracker>>,
    latest: RwLock<HashMap<Uuid, Option<DueStatus>>>,
}

impl DueTimeMonitor {
    pub fn new(
        shifts_repo: Arc<dyn ShiftStore>,
        checkpoints_repo: Arc<dyn CheckpointStore>,
        guards_repo: Arc<dyn GuardStore>,
        alerts: Arc<AlertService>,
        tick: Duration,
        warning_window: chrono::Duration,
    ) -> Self {
        Self {
            shifts_repo,
            checkpoints_repo,
            guards_repo,
            alerts,
            tick,
            warning_window,
            trackers: Mutex::new(HashMap::new()),
            latest: RwLock::new(HashMap::new()),
        }
    }

    pub async fn start(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        info!("Starting due-time monitor (tick {} ms)", self.tick.as_millis());

        tokio::spawn(async move {
            let mut ticker = interval(self.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                if let Err(e) = self.run_tick(Utc::now()).await {
                    error!("Error running due-time tick: {}", e);
                }
            }
            info!("Due-time monitor stopped");
        });

        Ok(())
    }

    /// One pass over all active shifts. A threshold counts as fired only
    /// once its alert is stored; a failed raise is retried on the next tick.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<()> {
        let shifts = self.shifts_repo.get_active().await?;

        let mut latest = HashMap::with_capacity(shifts.len());
        let mut crossed = Vec::new();

        for shift in &shifts {
            let rows = self
                .checkpoints_repo
                .required_with_last_scan(&shift.site_id, &shift.guard_id)
                .await?;
            let statuses = rows
                .iter()
                .map(|row| DueStatus::compute(row, now))
                .collect::<Result<Vec<_>, Error>>()?;
            let watched: HashSet<Uuid> = rows.iter().map(|row| row.id).collect();

            {
                let mut trackers = self.lock_trackers();
                let tracker = trackers
                    .entry(shift.guard_id)
                    .or_insert_with(|| ThresholdTracker::new(self.warning_window));
                tracker.retain(&watched);

                for status in statuses {
                    if let Some(threshold) = tracker.pending(&status) {
                        let alert = threshold_alert(threshold, &status, shift);
                        crossed.push((shift.guard_id, status, threshold, alert));
                    }
                }
            }

            latest.insert(shift.guard_id, most_urgent(&rows, now)?);
        }

        {
            let mut trackers = self.lock_trackers();
            trackers.retain(|guard_id, _| latest.contains_key(guard_id));
        }
        *self.latest.write().await = latest;

        for (guard_id, status, threshold, alert) in crossed {
            match self.alerts.raise(alert).await {
                Ok(_) => {
                    if let Some(tracker) = self.lock_trackers().get_mut(&guard_id) {
                        tracker.mark_fired(&status, threshold);
                    }
                }
                Err(e) => warn!(
                    "Failed to raise {:?} alert for checkpoint {}, retrying next tick: {}",
                    threshold, status.name, e
                ),
            }
        }

        Ok(())
    }

    /// Most urgent checkpoint for a guard. Guards on an active shift get the
    /// last tick's pick; others are computed on demand for their home site.
    pub async fn next_checkpoint(&self, guard_id: Uuid, actor: &Actor) -> Result<Option<DueStatus>> {
        let guard = self
            .guards_repo
            .get_by_id(&guard_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Guard {} not found", guard_id)))?;
        actor.ensure_acts_for(guard.id, guard.site_id)?;

        if let Some(status) = self.latest.read().await.get(&guard.id) {
            return Ok(status.clone());
        }

        let site_id = match guard.site_id {
            Some(site_id) => site_id,
            None => return Ok(None),
        };
        let rows = self
            .checkpoints_repo
            .required_with_last_scan(&site_id, &guard.id)
            .await?;

        Ok(most_urgent(&rows, Utc::now())?)
    }

    fn lock_trackers(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, ThresholdTracker>> {
        self.trackers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Alert for a threshold crossed by one of the guard's checkpoints
fn threshold_alert(threshold: Threshold, status: &DueStatus, shift: &Shift) -> Alert {
    match threshold {
        Threshold::Overdue => Alert::new(
            AlertType::CheckpointOverdue,
            AlertSeverity::High,
            shift.site_id,
            Some(shift.guard_id),
            format!("Checkpoint {} is overdue", status.name),
        ),
        Threshold::Warning => Alert::new(
            AlertType::CheckpointDueSoon,
            AlertSeverity::Low,
            shift.site_id,
            Some(shift.guard_id),
            format!(
                "Checkpoint {} is due in {} seconds",
                status.name,
                status.time_left.num_seconds().max(0)
            ),
        ),
    }
}
