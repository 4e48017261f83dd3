use crate::{
    db::models::panic_models::{PanicAlert, PanicStatus},
    db::store::PanicStore,
    error::Error,
};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

const PANIC_COLUMNS: &str = "id, guard_id, site_id, status, lat, lon, message, created_at, \
     acknowledged_at, acknowledged_by, resolved_at, resolved_by";

/// Panic alerts repository
#[derive(Clone)]
pub struct PanicAlertsRepository {
    pool: Arc<PgPool>,
}

impl PanicAlertsRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PanicStore for PanicAlertsRepository {
    async fn create(&self, panic: &PanicAlert) -> Result<PanicAlert> {
        let result = sqlx::query_as::<_, PanicAlert>(&format!(
            r#"
            INSERT INTO panic_alerts (id, guard_id, site_id, status, lat, lon, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PANIC_COLUMNS
        ))
        .bind(panic.id)
        .bind(panic.guard_id)
        .bind(panic.site_id)
        .bind(panic.status)
        .bind(panic.lat)
        .bind(panic.lon)
        .bind(&panic.message)
        .bind(panic.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create panic alert: {}", e)))?;

        Ok(result)
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<PanicAlert>> {
        let panic = sqlx::query_as::<_, PanicAlert>(&format!(
            "SELECT {} FROM panic_alerts WHERE id = $1",
            PANIC_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get panic alert by ID: {}", e)))?;

        Ok(panic)
    }

    /// Persist lifecycle fields after a transition. The status guard keeps
    /// a stale read from moving an alert backwards.
    async fn update(
        &self,
        panic: &PanicAlert,
        expected: PanicStatus,
    ) -> Result<Option<PanicAlert>> {
        let result = sqlx::query_as::<_, PanicAlert>(&format!(
            r#"
            UPDATE panic_alerts
            SET status = $1, acknowledged_at = $2, acknowledged_by = $3,
                resolved_at = $4, resolved_by = $5
            WHERE id = $6 AND status = $7
            RETURNING {}
            "#,
            PANIC_COLUMNS
        ))
        .bind(panic.status)
        .bind(panic.acknowledged_at)
        .bind(panic.acknowledged_by)
        .bind(panic.resolved_at)
        .bind(panic.resolved_by)
        .bind(panic.id)
        .bind(expected)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to update panic alert: {}", e)))?;

        Ok(result)
    }

    /// Unresolved panic alerts, newest first
    async fn get_open(&self, sites: Option<&[Uuid]>) -> Result<Vec<PanicAlert>> {
        let panics = sqlx::query_as::<_, PanicAlert>(&format!(
            r#"
            SELECT {}
            FROM panic_alerts
            WHERE status <> 'resolved'
              AND ($1::uuid[] IS NULL OR site_id = ANY($1))
            ORDER BY created_at DESC
            "#,
            PANIC_COLUMNS
        ))
        .bind(sites.map(|ids| ids.to_vec()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get open panic alerts: {}", e)))?;

        Ok(panics)
    }
}
