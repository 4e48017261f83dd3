//! Outbound alert notifications.
//!
//! - [`NotificationChannel`] is the delivery contract (mail API, logging...)
//! - [`AlertDispatcher`] decides whether an alert is pushed and to whom

pub mod dispatcher;
pub mod mail;

pub use dispatcher::{AlertContext, AlertDispatcher, DispatchOutcome, RecipientDirectory};
pub use mail::HttpMailChannel;

use crate::config::NotificationConfig;
use crate::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Message handed to a channel for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub subject: String,
    pub severity_label: String,
    pub message: String,
    pub site_name: String,
    pub guard_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Attempt delivery once. Failures map to `Error::NotificationDelivery`.
    async fn send(&self, notification: &Notification) -> Result<(), Error>;
}

/// Channel used when outbound mail is switched off
pub struct LogOnlyChannel;

#[async_trait]
impl NotificationChannel for LogOnlyChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<(), Error> {
        info!(
            "[notification disabled] {} to {} recipient(s): {}",
            notification.subject,
            notification.recipients.len(),
            notification.message
        );
        Ok(())
    }
}

/// Build the channel selected by configuration
pub fn channel_from_config(config: &NotificationConfig) -> anyhow::Result<Arc<dyn NotificationChannel>> {
    if !config.enabled {
        info!("Outbound notifications disabled");
        return Ok(Arc::new(LogOnlyChannel));
    }

    let channel = HttpMailChannel::new(config)?;
    info!("Mail notifications enabled via {}", config.endpoint);
    Ok(Arc::new(channel))
}
