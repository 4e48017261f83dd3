use crate::{
    db::models::site_models::Site,
    db::store::SiteStore,
    error::Error,
};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Sites repository
#[derive(Clone)]
pub struct SitesRepository {
    pool: Arc<PgPool>,
}

impl SitesRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SiteStore for SitesRepository {
    /// Get site by ID
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>(
            r#"
            SELECT id, name, center_lat, center_lon, geofence_radius_m, created_at
            FROM sites
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get site by ID: {}", e)))?;

        Ok(site)
    }
}
