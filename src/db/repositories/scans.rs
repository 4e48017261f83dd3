use crate::{
    db::models::scan_models::PatrolScanEvent,
    db::store::ScanStore,
    error::Error,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Patrol scan events repository
#[derive(Clone)]
pub struct ScansRepository {
    pool: Arc<PgPool>,
}

impl ScansRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScanStore for ScansRepository {
    /// Insert a scan event
    async fn create(&self, scan: &PatrolScanEvent) -> Result<PatrolScanEvent> {
        let result = sqlx::query_as::<_, PatrolScanEvent>(
            r#"
            INSERT INTO patrol_scan_events (id, checkpoint_id, guard_id, shift_id, scanned_at, is_on_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, checkpoint_id, guard_id, shift_id, scanned_at, is_on_time
            "#,
        )
        .bind(scan.id)
        .bind(scan.checkpoint_id)
        .bind(scan.guard_id)
        .bind(scan.shift_id)
        .bind(scan.scanned_at)
        .bind(scan.is_on_time)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create scan event: {}", e)))?;

        Ok(result)
    }

    /// Time of the guard's most recent scan at a checkpoint
    async fn last_for_guard_at_checkpoint(
        &self,
        guard_id: &Uuid,
        checkpoint_id: &Uuid,
    ) -> Result<Option<DateTime<Utc>>> {
        let last = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r#"
            SELECT MAX(scanned_at)
            FROM patrol_scan_events
            WHERE guard_id = $1 AND checkpoint_id = $2
            "#,
        )
        .bind(guard_id)
        .bind(checkpoint_id)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get last scan: {}", e)))?;

        Ok(last)
    }

    /// Scans recorded during a shift, oldest first
    async fn for_shift(&self, shift_id: &Uuid) -> Result<Vec<PatrolScanEvent>> {
        let scans = sqlx::query_as::<_, PatrolScanEvent>(
            r#"
            SELECT id, checkpoint_id, guard_id, shift_id, scanned_at, is_on_time
            FROM patrol_scan_events
            WHERE shift_id = $1
            ORDER BY scanned_at
            "#,
        )
        .bind(shift_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get scans for shift: {}", e)))?;

        Ok(scans)
    }
}
