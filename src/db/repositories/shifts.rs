use crate::{
    db::models::shift_models::{Shift, ShiftStatus},
    db::store::ShiftStore,
    error::Error,
};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const SHIFT_COLUMNS: &str = "id, guard_id, site_id, start_time, end_time, status";

/// Shifts repository
#[derive(Clone)]
pub struct ShiftsRepository {
    pool: Arc<PgPool>,
}

impl ShiftsRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShiftStore for ShiftsRepository {
    /// Get shift by ID
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Shift>> {
        let shift = sqlx::query_as::<_, Shift>(&format!(
            "SELECT {} FROM shifts WHERE id = $1",
            SHIFT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get shift by ID: {}", e)))?;

        Ok(shift)
    }

    /// All currently active shifts
    async fn get_active(&self) -> Result<Vec<Shift>> {
        let shifts = sqlx::query_as::<_, Shift>(&format!(
            "SELECT {} FROM shifts WHERE status = 'active' ORDER BY start_time",
            SHIFT_COLUMNS
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get active shifts: {}", e)))?;

        Ok(shifts)
    }

    /// The guard's active shift, if any
    async fn get_active_for_guard(&self, guard_id: &Uuid) -> Result<Option<Shift>> {
        let shift = sqlx::query_as::<_, Shift>(&format!(
            "SELECT {} FROM shifts WHERE guard_id = $1 AND status = 'active'",
            SHIFT_COLUMNS
        ))
        .bind(guard_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get active shift for guard: {}", e)))?;

        Ok(shift)
    }

    /// Move a shift to a new status.
    ///
    /// Activating a second shift for the same guard violates the partial
    /// unique index and is reported as `Error::Conflict`.
    async fn set_status(&self, id: &Uuid, status: ShiftStatus) -> Result<Shift> {
        let shift = sqlx::query_as::<_, Shift>(&format!(
            "UPDATE shifts SET status = $1 WHERE id = $2 RETURNING {}",
            SHIFT_COLUMNS
        ))
        .bind(status)
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| match e.as_database_error().and_then(|db| db.code()) {
            Some(code) if code == "23505" => {
                Error::Conflict("Guard already has an active shift".to_string())
            }
            _ => Error::Database(format!("Failed to update shift status: {}", e)),
        })?
        .ok_or_else(|| Error::NotFound(format!("Shift {} not found", id)))?;

        info!("Shift {} is now {:?}", shift.id, shift.status);
        Ok(shift)
    }
}
