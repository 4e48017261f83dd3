//! Circular geofences and the per-guard enter/exit transition detector.
//!
//! The detector keeps one last-known presence state per (guard, site) pair
//! and only reports a transition when a fix flips that state. Repeated fixes
//! on the same side of the boundary produce nothing, which keeps continuous
//! position streams from flooding the event log.

use crate::db::models::geofence_models::GeofenceEventType;
use crate::error::Error;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build a coordinate, rejecting non-finite or out-of-range values
    pub fn parse(lat: f64, lon: f64) -> Result<Self, Error> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(Error::Validation(
                "coordinates must be finite numbers".to_string(),
            ));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(Error::Validation(format!(
                "latitude {} out of range [-90, 90]",
                lat
            )));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(Error::Validation(format!(
                "longitude {} out of range [-180, 180]",
                lon
            )));
        }
        Ok(Self { lat, lon })
    }
}

/// Great-circle distance in meters
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub center: Coordinate,
    pub radius_m: f64,
}

impl Geofence {
    /// Points exactly on the boundary count as inside
    pub fn contains(&self, point: Coordinate) -> bool {
        haversine_m(point, self.center) <= self.radius_m
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Inside,
    Outside,
}

impl Presence {
    pub fn from_inside(inside: bool) -> Self {
        if inside {
            Presence::Inside
        } else {
            Presence::Outside
        }
    }

    /// Event emitted when a guard arrives in this state
    pub fn event_type(&self) -> GeofenceEventType {
        match self {
            Presence::Inside => GeofenceEventType::Enter,
            Presence::Outside => GeofenceEventType::Exit,
        }
    }
}

impl From<GeofenceEventType> for Presence {
    fn from(event_type: GeofenceEventType) -> Self {
        match event_type {
            GeofenceEventType::Enter => Presence::Inside,
            GeofenceEventType::Exit => Presence::Outside,
        }
    }
}

/// A state flip detected for a (guard, site) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub guard_id: Uuid,
    pub site_id: Uuid,
    pub event_type: GeofenceEventType,
    pub position: Coordinate,
    pub distance_m: f64,
}

/// Whether a guard's position stream is currently usable
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "tracking", rename_all = "lowercase")]
pub enum TrackingStatus {
    Available {
        last_fix_at: DateTime<Utc>,
        presence: Option<Presence>,
    },
    Unavailable {
        last_fix_at: Option<DateTime<Utc>>,
    },
}

type PairKey = (Uuid, Uuid);

#[derive(Default)]
struct DetectorState {
    presence: HashMap<PairKey, Presence>,
    last_fix: HashMap<Uuid, (DateTime<Utc>, Uuid)>,
}

/// Server-owned presence state shared by all position-fix handlers
#[derive(Default)]
pub struct GeofenceDetector {
    state: Mutex<DetectorState>,
}

impl GeofenceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a presence state is known for the pair
    pub fn is_known(&self, guard_id: Uuid, site_id: Uuid) -> bool {
        self.lock().presence.contains_key(&(guard_id, site_id))
    }

    /// Seed the state from a persisted event without emitting anything.
    /// An already known state wins over the seed.
    pub fn seed(&self, guard_id: Uuid, site_id: Uuid, presence: Presence) {
        self.lock()
            .presence
            .entry((guard_id, site_id))
            .or_insert(presence);
    }

    /// Evaluate a position fix against the recorded presence. Returns a
    /// transition only when the computed presence differs from the stored
    /// one; the first fix for a pair with no stored state always reports its
    /// presence. The stored presence is left alone until [`Self::commit`],
    /// so a transition that fails to persist is reported again on the next
    /// fix.
    pub fn evaluate(
        &self,
        guard_id: Uuid,
        site_id: Uuid,
        geofence: &Geofence,
        position: Coordinate,
        at: DateTime<Utc>,
    ) -> Option<Transition> {
        let distance_m = haversine_m(position, geofence.center);
        let presence = Presence::from_inside(distance_m <= geofence.radius_m);

        let mut state = self.lock();
        state.last_fix.insert(guard_id, (at, site_id));

        if state.presence.get(&(guard_id, site_id)) == Some(&presence) {
            return None;
        }

        Some(Transition {
            guard_id,
            site_id,
            event_type: presence.event_type(),
            position,
            distance_m,
        })
    }

    /// Record a persisted transition as the pair's presence
    pub fn commit(&self, transition: &Transition) {
        self.lock().presence.insert(
            (transition.guard_id, transition.site_id),
            Presence::from(transition.event_type),
        );
    }

    /// Drop everything known about a guard (shift ended, guard signed off)
    pub fn forget_guard(&self, guard_id: Uuid) {
        let mut state = self.lock();
        state.presence.retain(|(guard, _), _| *guard != guard_id);
        state.last_fix.remove(&guard_id);
    }

    pub fn tracking_status(
        &self,
        guard_id: Uuid,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> TrackingStatus {
        let state = self.lock();
        match state.last_fix.get(&guard_id) {
            Some((last_fix_at, site_id)) if now - *last_fix_at <= stale_after => {
                TrackingStatus::Available {
                    last_fix_at: *last_fix_at,
                    presence: state.presence.get(&(guard_id, *site_id)).copied(),
                }
            }
            Some((last_fix_at, _)) => TrackingStatus::Unavailable {
                last_fix_at: Some(*last_fix_at),
            },
            None => TrackingStatus::Unavailable { last_fix_at: None },
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DetectorState> {
        // The guarded maps stay consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Evaluate and commit, as a successful write would
    fn observe(
        detector: &GeofenceDetector,
        guard_id: Uuid,
        site_id: Uuid,
        fence: &Geofence,
        position: Coordinate,
        at: DateTime<Utc>,
    ) -> Option<Transition> {
        let transition = detector.evaluate(guard_id, site_id, fence, position, at)?;
        detector.commit(&transition);
        Some(transition)
    }

    fn nyc_fence() -> Geofence {
        Geofence {
            center: Coordinate::new(40.7128, -74.0060),
            radius_m: 500.0,
        }
    }

    #[test]
    fn haversine_known_distance() {
        // One degree of latitude is ~111.19 km on a 6371 km sphere.
        let d = haversine_m(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        assert!((d - 111_194.9).abs() < 1.0, "distance was {}", d);
    }

    #[test]
    fn center_is_inside_for_any_positive_radius() {
        for radius_m in [0.001, 1.0, 500.0, 10_000.0] {
            let fence = Geofence {
                center: Coordinate::new(51.5074, -0.1278),
                radius_m,
            };
            assert!(fence.contains(fence.center));
        }
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(matches!(
            Coordinate::parse(91.0, 0.0),
            Err(Error::Validation(_))
        ));
        assert!(Coordinate::parse(0.0, -180.5).is_err());
        assert!(Coordinate::parse(f64::NAN, 0.0).is_err());
        assert!(Coordinate::parse(-90.0, 180.0).is_ok());
    }

    #[test]
    fn enter_exit_then_silence() {
        let detector = GeofenceDetector::new();
        let fence = nyc_fence();
        let guard = Uuid::new_v4();
        let site = Uuid::new_v4();
        let now = Utc::now();

        let first = observe(&detector, guard, site, &fence, fence.center, now);
        assert_eq!(first.map(|t| t.event_type), Some(GeofenceEventType::Enter));

        // ~2 km north
        let away = Coordinate::new(40.7308, -74.0060);
        let second = observe(&detector, guard, site, &fence, away, now);
        assert_eq!(second.map(|t| t.event_type), Some(GeofenceEventType::Exit));

        assert!(observe(&detector, guard, site, &fence, away, now).is_none());
    }

    #[test]
    fn repeated_state_emits_once() {
        let detector = GeofenceDetector::new();
        let fence = nyc_fence();
        let guard = Uuid::new_v4();
        let site = Uuid::new_v4();
        let now = Utc::now();

        let emitted = (0..5)
            .filter_map(|_| observe(&detector, guard, site, &fence, fence.center, now))
            .count();
        assert_eq!(emitted, 1);
    }

    #[test]
    fn seeded_state_suppresses_duplicate_after_restart() {
        let detector = GeofenceDetector::new();
        let fence = nyc_fence();
        let guard = Uuid::new_v4();
        let site = Uuid::new_v4();

        detector.seed(guard, site, Presence::Inside);
        assert!(observe(&detector, guard, site, &fence, fence.center, Utc::now()).is_none());
    }

    #[test]
    fn guards_are_tracked_independently() {
        let detector = GeofenceDetector::new();
        let fence = nyc_fence();
        let site = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        assert!(observe(&detector, a, site, &fence, fence.center, now).is_some());
        assert!(observe(&detector, b, site, &fence, fence.center, now).is_some());

        detector.forget_guard(a);
        assert!(!detector.is_known(a, site));
        assert!(detector.is_known(b, site));
    }

    #[test]
    fn tracking_goes_stale() {
        let detector = GeofenceDetector::new();
        let fence = nyc_fence();
        let guard = Uuid::new_v4();
        let t0 = Utc::now();
        let stale_after = Duration::seconds(300);

        assert_eq!(
            detector.tracking_status(guard, t0, stale_after),
            TrackingStatus::Unavailable { last_fix_at: None }
        );

        observe(&detector, guard, Uuid::new_v4(), &fence, fence.center, t0);
        assert!(matches!(
            detector.tracking_status(guard, t0 + Duration::seconds(10), stale_after),
            TrackingStatus::Available {
                presence: Some(Presence::Inside),
                ..
            }
        ));
        assert_eq!(
            detector.tracking_status(guard, t0 + Duration::seconds(301), stale_after),
            TrackingStatus::Unavailable {
                last_fix_at: Some(t0)
            }
        );
    }

    #[test]
    fn uncommitted_transition_is_reported_again() {
        let detector = GeofenceDetector::new();
        let fence = nyc_fence();
        let guard = Uuid::new_v4();
        let site = Uuid::new_v4();
        let now = Utc::now();

        // The write for the first enter failed, so nothing was committed
        let first = detector.evaluate(guard, site, &fence, fence.center, now);
        assert_eq!(first.map(|t| t.event_type), Some(GeofenceEventType::Enter));
        assert!(!detector.is_known(guard, site));

        let retry = detector
            .evaluate(guard, site, &fence, fence.center, now)
            .expect("enter is still pending");
        assert_eq!(retry.event_type, GeofenceEventType::Enter);

        detector.commit(&retry);
        assert!(detector
            .evaluate(guard, site, &fence, fence.center, now)
            .is_none());
    }
}
