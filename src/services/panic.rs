use crate::db::models::alert_models::{Alert, AlertSeverity, AlertType};
use crate::db::models::panic_models::{PanicAlert, PanicStatus, PanicTrigger};
use crate::db::store::{GuardStore, PanicStore, ShiftStore};
use crate::engine::panic::{self as lifecycle, PanicAction};
use crate::engine::Coordinate;
use crate::error::Error;
use crate::messaging::PatrolEvents;
use crate::security::Actor;
use crate::services::alerts::AlertService;
use anyhow::Result;
use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Audible cue clients play for an active panic
pub const PANIC_SOUND: &str = "alarm";

/// Message pushed to every connected elevated session
#[derive(Debug, Clone, Serialize)]
pub struct PanicNotice {
    pub panic: PanicAlert,
    /// Set while the panic is active
    pub sound: Option<&'static str>,
}

impl PanicNotice {
    pub fn new(panic: PanicAlert) -> Self {
        let sound = (panic.status == PanicStatus::Active).then_some(PANIC_SOUND);
        Self { panic, sound }
    }

    /// Admins see every notice, supervisors only their sites
    pub fn visible_to(&self, actor: &Actor) -> bool {
        actor.is_elevated() && actor.can_access_site(self.panic.site_id)
    }
}

/// Guard-initiated emergencies and their lifecycle
pub struct PanicService {
    panics_repo: Arc<dyn PanicStore>,
    guards_repo: Arc<dyn GuardStore>,
    shifts_repo: Arc<dyn ShiftStore>,
    alerts: Arc<AlertService>,
    events: PatrolEvents,
    notices: broadcast::Sender<PanicNotice>,
}

impl PanicService {
    pub fn new(
        panics_repo: Arc<dyn PanicStore>,
        guards_repo: Arc<dyn GuardStore>,
        shifts_repo: Arc<dyn ShiftStore>,
        alerts: Arc<AlertService>,
        events: PatrolEvents,
        capacity: usize,
    ) -> Self {
        let (notices, _) = broadcast::channel(capacity.max(1));
        Self {
            panics_repo,
            guards_repo,
            shifts_repo,
            alerts,
            events,
            notices,
        }
    }

    /// Live feed of panic notices
    pub fn subscribe(&self) -> broadcast::Receiver<PanicNotice> {
        self.notices.subscribe()
    }

    /// Store and broadcast a panic. Bypasses the severity filter; the
    /// critical alert raised alongside drives the mail path.
    pub async fn trigger(&self, trigger: &PanicTrigger, actor: &Actor) -> Result<PanicAlert> {
        let location = match (trigger.lat, trigger.lon) {
            (Some(lat), Some(lon)) => {
                let position = Coordinate::parse(lat, lon)?;
                Some((position.lat, position.lon))
            }
            (None, None) => None,
            _ => {
                return Err(Error::Validation(
                    "lat and lon must be given together".to_string(),
                )
                .into())
            }
        };

        let guard = self
            .guards_repo
            .get_by_id(&trigger.guard_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Guard {} not found", trigger.guard_id)))?;

        let site_id = match self.shifts_repo.get_active_for_guard(&guard.id).await? {
            Some(shift) => shift.site_id,
            None => guard.site_id.ok_or_else(|| {
                Error::Validation(format!("Guard {} is not assigned to a site", guard.id))
            })?,
        };
        actor.ensure_acts_for(guard.id, Some(site_id))?;

        let message = trigger
            .message
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_string);

        let panic = self
            .panics_repo
            .create(&PanicAlert::new(guard.id, site_id, location, message))
            .await?;
        info!("PANIC triggered by guard {} at site {}", guard.name, site_id);

        self.broadcast(&panic);
        if let Err(e) = self.events.panic_changed(&panic).await {
            warn!("Failed to publish panic event: {}", e);
        }

        let text = match &panic.message {
            Some(message) => format!("Panic triggered by {}: {}", guard.name, message),
            None => format!("Panic triggered by {}", guard.name),
        };
        let alert = Alert::new(
            AlertType::Panic,
            AlertSeverity::Critical,
            site_id,
            Some(guard.id),
            text,
        );
        if let Err(e) = self.alerts.raise(alert).await {
            error!("Failed to raise panic alert for {}: {}", panic.id, e);
        }

        Ok(panic)
    }

    pub async fn acknowledge(&self, panic_id: Uuid, actor: &Actor) -> Result<PanicAlert> {
        self.transition(panic_id, PanicAction::Acknowledge, actor)
            .await
    }

    pub async fn resolve(&self, panic_id: Uuid, actor: &Actor) -> Result<PanicAlert> {
        self.transition(panic_id, PanicAction::Resolve, actor).await
    }

    /// Unresolved panics visible to the caller
    pub async fn open(&self, actor: &Actor) -> Result<Vec<PanicAlert>> {
        actor.ensure_elevated()?;
        self.panics_repo.get_open(actor.site_filter()).await
    }

    async fn transition(
        &self,
        panic_id: Uuid,
        action: PanicAction,
        actor: &Actor,
    ) -> Result<PanicAlert> {
        actor.ensure_elevated()?;

        let mut panic = self
            .panics_repo
            .get_by_id(&panic_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Panic alert {} not found", panic_id)))?;
        actor.ensure_site(panic.site_id)?;

        let expected = panic.status;
        if !lifecycle::apply(&mut panic, action, actor.user_id, Utc::now())? {
            debug!("Panic alert {} already {:?}", panic.id, panic.status);
            return Ok(panic);
        }

        let panic = match self.panics_repo.update(&panic, expected).await? {
            Some(panic) => panic,
            None => {
                // Another session moved it first; its stamps stay
                let current = self
                    .panics_repo
                    .get_by_id(&panic_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("Panic alert {} not found", panic_id)))?;
                debug!(
                    "Panic alert {} changed concurrently, now {:?}",
                    current.id, current.status
                );
                return Ok(current);
            }
        };
        info!(
            "Panic alert {} is now {:?} ({})",
            panic.id, panic.status, actor.name
        );

        self.broadcast(&panic);
        if let Err(e) = self.events.panic_changed(&panic).await {
            warn!("Failed to publish panic event: {}", e);
        }

        Ok(panic)
    }

    fn broadcast(&self, panic: &PanicAlert) {
        // No connected sessions is not an error
        if self.notices.send(PanicNotice::new(panic.clone())).is_err() {
            debug!("No live sessions for panic alert {}", panic.id);
        }
    }
}
