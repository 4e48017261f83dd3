use crate::engine::geofence::{Coordinate, Geofence};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Patrolled site with its circular geofence
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Site {
    pub id: Uuid,
    pub name: String,
    pub center_lat: f64,
    pub center_lon: f64,
    /// Geofence radius in meters; `None` falls back to the configured default
    pub geofence_radius_m: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Site {
    /// Geofence for this site, using `default_radius_m` when no radius is set
    /// or the stored one is not positive.
    pub fn geofence(&self, default_radius_m: f64) -> Geofence {
        let radius_m = match self.geofence_radius_m {
            Some(radius) if radius > 0.0 => radius,
            _ => default_radius_m,
        };

        Geofence {
            center: Coordinate::new(self.center_lat, self.center_lon),
            radius_m,
        }
    }
}
