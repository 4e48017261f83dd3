use crate::{
    db::models::alert_models::{Alert, AlertQuery},
    db::store::AlertStore,
    error::Error,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

const ALERT_COLUMNS: &str = "id, alert_type, severity, site_id, guard_id, message, \
     acknowledged, acknowledged_by, acknowledged_at, created_at";

const DEFAULT_LIST_LIMIT: i64 = 100;

/// Alerts repository
#[derive(Clone)]
pub struct AlertsRepository {
    pool: Arc<PgPool>,
}

impl AlertsRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertStore for AlertsRepository {
    async fn create(&self, alert: &Alert) -> Result<Alert> {
        let result = sqlx::query_as::<_, Alert>(&format!(
            r#"
            INSERT INTO alerts (id, alert_type, severity, site_id, guard_id, message,
                                acknowledged, acknowledged_by, acknowledged_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            ALERT_COLUMNS
        ))
        .bind(alert.id)
        .bind(alert.alert_type)
        .bind(alert.severity)
        .bind(alert.site_id)
        .bind(alert.guard_id)
        .bind(&alert.message)
        .bind(alert.acknowledged)
        .bind(alert.acknowledged_by)
        .bind(alert.acknowledged_at)
        .bind(alert.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create alert: {}", e)))?;

        Ok(result)
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Alert>> {
        let alert = sqlx::query_as::<_, Alert>(&format!(
            "SELECT {} FROM alerts WHERE id = $1",
            ALERT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get alert by ID: {}", e)))?;

        Ok(alert)
    }

    /// Mark an alert acknowledged. An already acknowledged alert keeps its
    /// original acknowledger and timestamp.
    async fn acknowledge(
        &self,
        id: &Uuid,
        user_id: &Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        let alert = sqlx::query_as::<_, Alert>(&format!(
            r#"
            UPDATE alerts
            SET acknowledged = TRUE,
                acknowledged_by = COALESCE(acknowledged_by, $2),
                acknowledged_at = COALESCE(acknowledged_at, $3)
            WHERE id = $1
            RETURNING {}
            "#,
            ALERT_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to acknowledge alert: {}", e)))?;

        Ok(alert)
    }

    /// Newest first. `sites` restricts the result to those sites when set.
    async fn list(&self, query: &AlertQuery, sites: Option<&[Uuid]>) -> Result<Vec<Alert>> {
        let alerts = sqlx::query_as::<_, Alert>(&format!(
            r#"
            SELECT {}
            FROM alerts
            WHERE ($1::uuid IS NULL OR site_id = $1)
              AND ($2 = FALSE OR acknowledged = FALSE)
              AND ($3::uuid[] IS NULL OR site_id = ANY($3))
            ORDER BY created_at DESC
            LIMIT $4
            "#,
            ALERT_COLUMNS
        ))
        .bind(query.site_id)
        .bind(query.unacknowledged)
        .bind(sites.map(|ids| ids.to_vec()))
        .bind(query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 1000))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list alerts: {}", e)))?;

        Ok(alerts)
    }
}
