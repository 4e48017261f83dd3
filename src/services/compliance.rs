use crate::db::models::checkpoint_models::Checkpoint;
use crate::db::store::{CheckpointStore, ScanStore, ShiftStore};
use crate::engine::{aggregate_shift, ShiftCompliance};
use crate::messaging::broker::{EventCallback, MessageBrokerTrait};
use crate::messaging::{EventType, PatrolEvents};
use crate::security::Actor;
use anyhow::Result;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Live compliance of every active shift.
///
/// Recomputes when scans or shifts change on the bus and on a fixed poll;
/// both paths run the same idempotent [`ComplianceMonitor::recompute`].
pub struct ComplianceMonitor {
    shifts_repo: Arc<dyn ShiftStore>,
    checkpoints_repo: Arc<dyn CheckpointStore>,
    scans_repo: Arc<dyn ScanStore>,
    events: PatrolEvents,
    poll_interval: Duration,
    snapshot: RwLock<HashMap<Uuid, ShiftCompliance>>,
    subscriptions: Mutex<Vec<String>>,
}

impl ComplianceMonitor {
    pub fn new(
        shifts_repo: Arc<dyn ShiftStore>,
        checkpoints_repo: Arc<dyn CheckpointStore>,
        scans_repo: Arc<dyn ScanStore>,
        events: PatrolEvents,
        poll_interval: Duration,
    ) -> Self {
        Self {
            shifts_repo,
            checkpoints_repo,
            scans_repo,
            events,
            poll_interval,
            snapshot: RwLock::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to scan/shift changes and start the recompute loop
    pub async fn start(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        // One pending trigger is enough; bursts collapse into a single recompute.
        let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(1);

        for event_type in [
            EventType::ScanRecorded,
            EventType::ShiftStarted,
            EventType::ShiftEnded,
        ] {
            let tx = trigger_tx.clone();
            let callback: EventCallback = Arc::new(move |_event| {
                let _ = tx.try_send(());
                Ok(())
            });
            let id = self.events.broker().subscribe(event_type, callback).await?;
            self.subscriptions.lock().await.push(id);
        }

        info!(
            "Starting compliance monitor (poll every {} seconds)",
            self.poll_interval.as_secs()
        );

        tokio::spawn(async move {
            let mut ticker = interval(self.poll_interval);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                    Some(()) = trigger_rx.recv() => {}
                }

                if let Err(e) = self.recompute().await {
                    error!("Error recomputing shift compliance: {}", e);
                }
            }

            for id in self.subscriptions.lock().await.drain(..) {
                if let Err(e) = self.events.broker().unsubscribe(&id).await {
                    debug!("Subscription {} already released: {}", id, e);
                }
            }
            info!("Compliance monitor stopped");
        });

        Ok(())
    }

    /// Rebuild the snapshot from storage and publish status changes.
    /// Returns the number of active shifts.
    pub async fn recompute(&self) -> Result<usize> {
        let shifts = self.shifts_repo.get_active().await?;

        let mut site_checkpoints: HashMap<Uuid, Vec<Checkpoint>> = HashMap::new();
        let mut next = HashMap::with_capacity(shifts.len());

        for shift in &shifts {
            if !site_checkpoints.contains_key(&shift.site_id) {
                let checkpoints = self.checkpoints_repo.get_for_site(&shift.site_id).await?;
                site_checkpoints.insert(shift.site_id, checkpoints);
            }
            let checkpoints = site_checkpoints
                .get(&shift.site_id)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let scans = self.scans_repo.for_shift(&shift.id).await?;
            next.insert(shift.id, aggregate_shift(shift, checkpoints, &scans));
        }

        let changed: Vec<ShiftCompliance> = {
            let mut snapshot = self.snapshot.write().await;
            let changed = status_changes(&snapshot, &next)
                .into_iter()
                .cloned()
                .collect();
            *snapshot = next;
            changed
        };

        for compliance in &changed {
            if let Err(e) = self.events.compliance_updated(compliance).await {
                warn!("Failed to publish compliance update: {}", e);
            }
        }

        debug!(
            "Compliance recomputed for {} shift(s), {} changed",
            shifts.len(),
            changed.len()
        );
        Ok(shifts.len())
    }

    /// Current snapshot restricted to the caller's sites
    pub async fn snapshot(&self, actor: &Actor) -> Result<Vec<ShiftCompliance>> {
        actor.ensure_elevated()?;

        let snapshot = self.snapshot.read().await;
        let mut visible: Vec<ShiftCompliance> = snapshot
            .values()
            .filter(|compliance| actor.can_access_site(compliance.site_id))
            .cloned()
            .collect();
        visible.sort_by(|a, b| {
            b.status
                .cmp(&a.status)
                .then_with(|| a.site_id.cmp(&b.site_id))
                .then_with(|| a.shift_id.cmp(&b.shift_id))
        });

        Ok(visible)
    }
}

/// Entries of `next` whose status differs from `previous`, including shifts
/// seen for the first time
fn status_changes<'a>(
    previous: &HashMap<Uuid, ShiftCompliance>,
    next: &'a HashMap<Uuid, ShiftCompliance>,
) -> Vec<&'a ShiftCompliance> {
    next.values()
        .filter(|compliance| {
            previous
                .get(&compliance.shift_id)
                .map_or(true, |before| before.status != compliance.status)
        })
        .collect()
}
