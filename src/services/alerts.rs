use crate::db::models::alert_models::{Alert, AlertQuery};
use crate::db::store::{AlertStore, GuardStore, SiteStore};
use crate::error::Error;
use crate::messaging::PatrolEvents;
use crate::notification::{AlertContext, AlertDispatcher};
use crate::security::Actor;
use anyhow::Result;
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

/// Stores alerts, announces them on the bus and hands them to the dispatcher
pub struct AlertService {
    alerts_repo: Arc<dyn AlertStore>,
    sites_repo: Arc<dyn SiteStore>,
    guards_repo: Arc<dyn GuardStore>,
    events: PatrolEvents,
    dispatcher: Arc<AlertDispatcher>,
}

impl AlertService {
    pub fn new(
        alerts_repo: Arc<dyn AlertStore>,
        sites_repo: Arc<dyn SiteStore>,
        guards_repo: Arc<dyn GuardStore>,
        events: PatrolEvents,
        dispatcher: Arc<AlertDispatcher>,
    ) -> Self {
        Self {
            alerts_repo,
            sites_repo,
            guards_repo,
            events,
            dispatcher,
        }
    }

    /// Persist a detected alert, publish `alert.raised` and dispatch it in
    /// the background. Only the write can fail the call.
    pub async fn raise(&self, alert: Alert) -> Result<Alert> {
        let alert = self.alerts_repo.create(&alert).await?;
        info!(
            "Raised {} alert {} ({}) at site {}",
            alert.severity, alert.id, alert.message, alert.site_id
        );

        if let Err(e) = self.events.alert_raised(&alert).await {
            warn!("Failed to publish alert raised event: {}", e);
        }

        if alert.severity.requires_dispatch() {
            let context = self.context_for(&alert).await;
            let dispatcher = self.dispatcher.clone();
            let pending = alert.clone();
            tokio::spawn(async move {
                dispatcher.dispatch(&pending, &context).await;
            });
        }

        Ok(alert)
    }

    /// Acknowledge an alert. Acknowledging twice keeps the first stamp.
    pub async fn acknowledge(&self, alert_id: Uuid, actor: &Actor) -> Result<Alert> {
        actor.ensure_elevated()?;

        let alert = self
            .alerts_repo
            .get_by_id(&alert_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Alert {} not found", alert_id)))?;
        actor.ensure_site(alert.site_id)?;

        if alert.acknowledged {
            return Ok(alert);
        }

        let alert = self
            .alerts_repo
            .acknowledge(&alert_id, &actor.user_id, Utc::now())
            .await?
            .ok_or_else(|| Error::NotFound(format!("Alert {} not found", alert_id)))?;

        info!("Alert {} acknowledged by {}", alert.id, actor.name);
        if let Err(e) = self.events.alert_acknowledged(&alert).await {
            warn!("Failed to publish alert acknowledged event: {}", e);
        }

        Ok(alert)
    }

    /// Alerts visible to the caller, newest first
    pub async fn list(&self, query: &AlertQuery, actor: &Actor) -> Result<Vec<Alert>> {
        actor.ensure_elevated()?;
        if let Some(site_id) = query.site_id {
            actor.ensure_site(site_id)?;
        }

        self.alerts_repo.list(query, actor.site_filter()).await
    }

    /// Display names for the notification. Lookup failures fall back to ids.
    async fn context_for(&self, alert: &Alert) -> AlertContext {
        let site_name = match self.sites_repo.get_by_id(&alert.site_id).await {
            Ok(Some(site)) => site.name,
            Ok(None) => alert.site_id.to_string(),
            Err(e) => {
                warn!("Failed to load site for alert {}: {}", alert.id, e);
                alert.site_id.to_string()
            }
        };

        let guard_name = match alert.guard_id {
            Some(guard_id) => match self.guards_repo.get_by_id(&guard_id).await {
                Ok(Some(guard)) => Some(guard.name),
                Ok(None) => Some(guard_id.to_string()),
                Err(e) => {
                    warn!("Failed to load guard for alert {}: {}", alert.id, e);
                    Some(guard_id.to_string())
                }
            },
            None => None,
        };

        AlertContext {
            site_name,
            guard_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::alert_models::{AlertSeverity, AlertType};
    use crate::messaging::EventType;
    use crate::services::testing::{admin, guard_actor, settle, Harness};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test]
    async fn notification_failure_keeps_the_alert() {
        let h = Harness::build();
        let site = h.store.add_site("Harbor Warehouse", 40.7128, -74.0060, None);
        let guard = h.store.add_guard("R. Diaz", Some(site.id));
        h.channel.fail.store(true, Ordering::SeqCst);
        let mut raised = h.listen(EventType::AlertRaised).await;

        let alert = h
            .services
            .alerts
            .raise(Alert::new(
                AlertType::Panic,
                AlertSeverity::Critical,
                site.id,
                Some(guard.id),
                "Panic triggered by R. Diaz",
            ))
            .await
            .unwrap();
        settle().await;

        let stored = h.store.alerts.lock().unwrap().clone();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, alert.id);

        // One attempt, carrying display names rather than ids
        let sent = h.channel.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].site_name, "Harbor Warehouse");
        assert_eq!(sent[0].guard_name.as_deref(), Some("R. Diaz"));

        let event = tokio::time::timeout(Duration::from_secs(1), raised.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.source_id, Some(alert.id));
    }

    #[tokio::test]
    async fn low_severity_is_stored_without_dispatch() {
        let h = Harness::build();
        let site = h.store.add_site("Harbor Warehouse", 40.7128, -74.0060, None);

        h.services
            .alerts
            .raise(Alert::new(
                AlertType::CheckpointDueSoon,
                AlertSeverity::Low,
                site.id,
                None,
                "Checkpoint Gate is due in 60 seconds",
            ))
            .await
            .unwrap();
        settle().await;

        assert_eq!(h.store.alerts.lock().unwrap().len(), 1);
        assert!(h.channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_acknowledgement_wins() {
        let h = Harness::build();
        let site = h.store.add_site("Harbor Warehouse", 40.7128, -74.0060, None);
        let alert = h
            .services
            .alerts
            .raise(Alert::new(
                AlertType::GeofenceExit,
                AlertSeverity::Medium,
                site.id,
                None,
                "Guard left the Harbor Warehouse geofence",
            ))
            .await
            .unwrap();

        let first = admin();
        let acked = h.services.alerts.acknowledge(alert.id, &first).await.unwrap();
        let again = h.services.alerts.acknowledge(alert.id, &admin()).await.unwrap();

        assert!(acked.acknowledged);
        assert_eq!(again.acknowledged_by, Some(first.user_id));
        assert_eq!(again.acknowledged_at, acked.acknowledged_at);
    }

    #[tokio::test]
    async fn guards_cannot_list_alerts() {
        let h = Harness::build();
        let err = h
            .services
            .alerts
            .list(&AlertQuery::default(), &guard_actor(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Authorization(_))
        ));
    }
}
