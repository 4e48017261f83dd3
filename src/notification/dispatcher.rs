use super::{Notification, NotificationChannel};
use crate::db::models::alert_models::Alert;
use crate::db::models::user_models::Recipient;
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info};
use std::sync::Arc;

/// Source of elevated-role accounts that receive alert notifications
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Active admin/supervisor accounts with a contact address
    async fn elevated_recipients(&self) -> Result<Vec<Recipient>>;
}

/// Display names the notification needs besides the alert itself
#[derive(Debug, Clone, Default)]
pub struct AlertContext {
    pub site_name: String,
    pub guard_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Severity below high; stored only
    BelowThreshold,
    /// Nobody to notify
    NoRecipients,
    Delivered { recipients: usize },
    /// Delivery failed; the alert itself is unaffected
    Failed { reason: String },
}

/// Turns high/critical alerts into exactly one delivery attempt.
///
/// Recipients are looked up on every dispatch so role changes apply
/// immediately. Failures are logged and reported in the outcome, never
/// returned as errors, so callers cannot roll back the stored alert.
pub struct AlertDispatcher {
    directory: Arc<dyn RecipientDirectory>,
    channel: Arc<dyn NotificationChannel>,
}

impl AlertDispatcher {
    pub fn new(directory: Arc<dyn RecipientDirectory>, channel: Arc<dyn NotificationChannel>) -> Self {
        Self { directory, channel }
    }

    pub async fn dispatch(&self, alert: &Alert, context: &AlertContext) -> DispatchOutcome {
        if !alert.severity.requires_dispatch() {
            debug!(
                "Alert {} has severity {}, not dispatching",
                alert.id, alert.severity
            );
            return DispatchOutcome::BelowThreshold;
        }

        let recipients = match self.directory.elevated_recipients().await {
            Ok(recipients) => recipients,
            Err(e) => {
                error!("Failed to resolve recipients for alert {}: {}", alert.id, e);
                return DispatchOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let mut addresses: Vec<String> = recipients
            .into_iter()
            .map(|recipient| recipient.email)
            .filter(|email| !email.trim().is_empty())
            .collect();
        addresses.sort();
        addresses.dedup();

        if addresses.is_empty() {
            info!("No elevated recipients for alert {}, skipping", alert.id);
            return DispatchOutcome::NoRecipients;
        }

        let notification = Notification {
            recipients: addresses,
            subject: alert.alert_type.title().to_string(),
            severity_label: alert.severity.label().to_string(),
            message: alert.message.clone(),
            site_name: context.site_name.clone(),
            guard_name: context.guard_name.clone(),
            timestamp: alert.created_at,
        };

        match self.channel.send(&notification).await {
            Ok(()) => {
                info!(
                    "Alert {} dispatched via {} to {} recipient(s)",
                    alert.id,
                    self.channel.name(),
                    notification.recipients.len()
                );
                DispatchOutcome::Delivered {
                    recipients: notification.recipients.len(),
                }
            }
            Err(e) => {
                error!(
                    "Failed to dispatch alert {} via {}: {}",
                    alert.id,
                    self.channel.name(),
                    e
                );
                DispatchOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
