use crate::config::DatabaseConfig;
use crate::error::Error;
use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[cfg(test)]
pub(crate) mod memory;
pub mod migrations;
pub mod models;
pub mod repositories;
pub mod store;

pub use store::Stores;

/// Patrol database: the shared Postgres pool plus schema bootstrap.
///
/// Sites, checkpoints, shifts and every scan/geofence/alert/panic record
/// live here; services reach them through [`Stores`].
pub struct DatabaseService {
    pub pool: Arc<PgPool>,
}

impl DatabaseService {
    /// Connect, and apply pending patrol migrations when `auto_migrate` is set
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!(
            "Connecting to patrol database (max {} connections)",
            config.max_connections
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to database: {}", e)))?;

        let service = Self {
            pool: Arc::new(pool),
        };

        if config.auto_migrate {
            service.run_migrations().await?;
        } else {
            info!("Skipping migrations (auto_migrate is off)");
        }

        Ok(service)
    }

    /// Bring the patrol schema up to date
    pub async fn run_migrations(&self) -> Result<()> {
        let applied = migrations::run_migrations(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to run migrations: {}", e)))?;

        info!("Patrol schema ready ({} migration(s) applied)", applied);
        Ok(())
    }

    /// Postgres-backed stores for the patrol services
    pub fn stores(&self) -> Stores {
        Stores::postgres(self.pool.clone())
    }

    /// Whether the pool can still reach Postgres
    pub async fn health_check(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&*self.pool).await {
            Ok(_) => true,
            Err(e) => {
                error!("Database health check failed: {}", e);
                false
            }
        }
    }
}
