//! Pure patrol decision logic. Nothing in here touches storage or the bus;
//! the services feed it data and persist what it decides.

pub mod classifier;
pub mod compliance;
pub mod due_time;
pub mod geofence;
pub mod panic;

pub use classifier::ScanClassifier;
pub use compliance::{aggregate_shift, ComplianceStatus, ShiftCompliance};
pub use due_time::{most_urgent, DueStatus, Threshold, ThresholdTracker};
pub use geofence::{Coordinate, Geofence, GeofenceDetector, Presence, TrackingStatus};
pub use panic::PanicAction;
