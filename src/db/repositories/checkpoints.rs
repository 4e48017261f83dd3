use crate::{
    db::models::checkpoint_models::{Checkpoint, CheckpointLastScan},
    db::store::CheckpointStore,
    error::Error,
};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Checkpoints repository
#[derive(Clone)]
pub struct CheckpointsRepository {
    pool: Arc<PgPool>,
}

impl CheckpointsRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for CheckpointsRepository {
    /// Look up a checkpoint by the code printed on its tag
    async fn get_by_code(&self, code: &str) -> Result<Option<Checkpoint>> {
        let checkpoint = sqlx::query_as::<_, Checkpoint>(
            r#"
            SELECT id, site_id, name, code, sequence_order, scan_interval_minutes, is_required, created_at
            FROM checkpoints
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get checkpoint by code: {}", e)))?;

        Ok(checkpoint)
    }

    /// All checkpoints of a site in patrol order
    async fn get_for_site(&self, site_id: &Uuid) -> Result<Vec<Checkpoint>> {
        let checkpoints = sqlx::query_as::<_, Checkpoint>(
            r#"
            SELECT id, site_id, name, code, sequence_order, scan_interval_minutes, is_required, created_at
            FROM checkpoints
            WHERE site_id = $1
            ORDER BY sequence_order, name
            "#,
        )
        .bind(site_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get checkpoints for site: {}", e)))?;

        Ok(checkpoints)
    }

    /// Required checkpoints of a site with the guard's most recent scan of each,
    /// in sequence order
    async fn required_with_last_scan(
        &self,
        site_id: &Uuid,
        guard_id: &Uuid,
    ) -> Result<Vec<CheckpointLastScan>> {
        let rows = sqlx::query_as::<_, CheckpointLastScan>(
            r#"
            SELECT c.id, c.name, c.sequence_order, c.scan_interval_minutes,
                   MAX(s.scanned_at) AS last_scanned_at
            FROM checkpoints c
            LEFT JOIN patrol_scan_events s
                ON s.checkpoint_id = c.id AND s.guard_id = $2
            WHERE c.site_id = $1 AND c.is_required = TRUE
            GROUP BY c.id, c.name, c.sequence_order, c.scan_interval_minutes
            ORDER BY c.sequence_order, c.name
            "#,
        )
        .bind(site_id)
        .bind(guard_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get checkpoint scan times: {}", e)))?;

        Ok(rows)
    }
}
