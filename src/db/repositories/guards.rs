use crate::{
    db::models::guard_models::{Guard, GuardStatus},
    db::store::GuardStore,
    error::Error,
};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Guards repository
#[derive(Clone)]
pub struct GuardsRepository {
    pool: Arc<PgPool>,
}

impl GuardsRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GuardStore for GuardsRepository {
    /// Get guard by ID
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Guard>> {
        let guard = sqlx::query_as::<_, Guard>(
            r#"
            SELECT id, user_id, name, site_id, status, created_at
            FROM guards
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get guard by ID: {}", e)))?;

        Ok(guard)
    }

    /// Update guard status
    async fn set_status(&self, id: &Uuid, status: GuardStatus) -> Result<()> {
        sqlx::query("UPDATE guards SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to update guard status: {}", e)))?;

        Ok(())
    }
}
