use crate::{
    db::models::geofence_models::GeofenceEvent,
    db::store::GeofenceEventStore,
    error::Error,
};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Geofence events repository
#[derive(Clone)]
pub struct GeofenceEventsRepository {
    pool: Arc<PgPool>,
}

impl GeofenceEventsRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GeofenceEventStore for GeofenceEventsRepository {
    async fn create(&self, event: &GeofenceEvent) -> Result<GeofenceEvent> {
        let result = sqlx::query_as::<_, GeofenceEvent>(
            r#"
            INSERT INTO geofence_events (id, guard_id, site_id, event_type, lat, lon, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, guard_id, site_id, event_type, lat, lon, created_at
            "#,
        )
        .bind(event.id)
        .bind(event.guard_id)
        .bind(event.site_id)
        .bind(event.event_type)
        .bind(event.lat)
        .bind(event.lon)
        .bind(event.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create geofence event: {}", e)))?;

        Ok(result)
    }

    /// Most recent transition recorded for a guard at a site
    async fn latest_for_pair(
        &self,
        guard_id: &Uuid,
        site_id: &Uuid,
    ) -> Result<Option<GeofenceEvent>> {
        let event = sqlx::query_as::<_, GeofenceEvent>(
            r#"
            SELECT id, guard_id, site_id, event_type, lat, lon, created_at
            FROM geofence_events
            WHERE guard_id = $1 AND site_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(guard_id)
        .bind(site_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get latest geofence event: {}", e)))?;

        Ok(event)
    }
}
