use crate::error::Error;
use chrono::{DateTime, Utc};

/// Tolerance applied to a checkpoint's scan interval before a scan is late
pub const DEFAULT_GRACE_MULTIPLIER: f64 = 1.5;

/// Labels scans as on-time or late. It never rejects a scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanClassifier {
    grace_multiplier: f64,
}

impl Default for ScanClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_MULTIPLIER)
    }
}

impl ScanClassifier {
    pub fn new(grace_multiplier: f64) -> Self {
        Self { grace_multiplier }
    }

    /// `previous_scan` is the same guard's last scan at this checkpoint.
    ///
    /// The first scan is always on time. After that a scan is on time when
    /// the gap since the previous one is within `interval * grace`.
    pub fn is_on_time(
        &self,
        interval_minutes: i32,
        previous_scan: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        if interval_minutes <= 0 {
            return Err(Error::Validation(format!(
                "scan interval must be positive, got {} minutes",
                interval_minutes
            )));
        }

        let previous = match previous_scan {
            Some(previous) => previous,
            None => return Ok(true),
        };

        let elapsed_ms = (now - previous).num_milliseconds() as f64;
        let allowed_ms = f64::from(interval_minutes) * 60_000.0 * self.grace_multiplier;

        Ok(elapsed_ms <= allowed_ms)
    }
}
