use super::{Notification, NotificationChannel};
use crate::config::NotificationConfig;
use crate::error::Error;
use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use std::time::Duration;

/// Sends notifications through an HTTP mail API (Resend-compatible JSON)
pub struct HttpMailChannel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: String,
}

impl HttpMailChannel {
    pub fn new(config: &NotificationConfig) -> Result<Self, Error> {
        if config.api_key.is_empty() {
            return Err(Error::Config(
                "notification.api_key is required when notifications are enabled".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
        })
    }
}

/// Render the mail body
pub(crate) fn render_html(notification: &Notification) -> String {
    let guard = notification
        .guard_name
        .as_deref()
        .map(|name| format!("<p><strong>Guard:</strong> {}</p>", escape(name)))
        .unwrap_or_default();

    format!(
        "<h2>[{}] {}</h2><p>{}</p><p><strong>Site:</strong> {}</p>{}<p><small>{}</small></p>",
        escape(&notification.severity_label),
        escape(&notification.subject),
        escape(&notification.message),
        escape(&notification.site_name),
        guard,
        notification.timestamp.to_rfc3339(),
    )
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl NotificationChannel for HttpMailChannel {
    fn name(&self) -> &'static str {
        "mail"
    }

    async fn send(&self, notification: &Notification) -> Result<(), Error> {
        let subject = format!("[{}] {}", notification.severity_label, notification.subject);
        let request = MailRequest {
            from: &self.from,
            to: &notification.recipients,
            subject: &subject,
            html: render_html(notification),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::NotificationDelivery(format!("mail request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::NotificationDelivery(format!(
                "mail API returned {}: {}",
                status, body
            )));
        }

        debug!(
            "Mail notification sent to {} recipient(s)",
            notification.recipients.len()
        );
        Ok(())
    }
}
