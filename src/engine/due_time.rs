//! Checkpoint due-time scheduling.
//!
//! Each checkpoint is due one interval after its last scan, or immediately
//! if it has never been scanned. [`most_urgent`] picks the checkpoint a
//! guard should head to next and [`ThresholdTracker`] turns countdown
//! values into one-shot warning/overdue signals per due cycle.

use crate::db::models::checkpoint_models::CheckpointLastScan;
use crate::error::Error;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Countdown for one checkpoint at a point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DueStatus {
    pub checkpoint_id: Uuid,
    pub name: String,
    pub due_at: DateTime<Utc>,
    /// Signed; zero or negative means overdue
    #[serde(serialize_with = "serialize_seconds", rename = "time_left_secs")]
    pub time_left: Duration,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

fn serialize_seconds<S: serde::Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(value.num_seconds())
}

impl DueStatus {
    pub fn compute(checkpoint: &CheckpointLastScan, now: DateTime<Utc>) -> Result<Self, Error> {
        if checkpoint.scan_interval_minutes <= 0 {
            return Err(Error::Validation(format!(
                "checkpoint {} has non-positive scan interval {}",
                checkpoint.id, checkpoint.scan_interval_minutes
            )));
        }

        let due_at = match checkpoint.last_scanned_at {
            Some(last) => last + Duration::minutes(i64::from(checkpoint.scan_interval_minutes)),
            None => now,
        };

        Ok(Self {
            checkpoint_id: checkpoint.id,
            name: checkpoint.name.clone(),
            due_at,
            time_left: due_at - now,
            last_scanned_at: checkpoint.last_scanned_at,
        })
    }

    pub fn is_overdue(&self) -> bool {
        self.time_left <= Duration::zero()
    }

    /// Identifies the due cycle for one-shot thresholds. A never-scanned
    /// checkpoint's due time follows the clock, so its cycle has no timestamp.
    pub fn cycle(&self) -> DueCycle {
        DueCycle {
            checkpoint_id: self.checkpoint_id,
            due_at: self.last_scanned_at.map(|_| self.due_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DueCycle {
    pub checkpoint_id: Uuid,
    pub due_at: Option<DateTime<Utc>>,
}

/// Pick the checkpoint shown to the guard as next.
///
/// A running pick is kept while candidates are visited. A candidate replaces
/// it when no pick exists yet, when the candidate is not overdue and has
/// less time left, or when the pick is overdue and the candidate has more
/// time left. A pending checkpoint therefore always beats an overdue one and
/// the least overdue wins among overdue ones, whatever the input order.
/// Overdue alerts do not depend on this pick.
pub fn most_urgent(
    checkpoints: &[CheckpointLastScan],
    now: DateTime<Utc>,
) -> Result<Option<DueStatus>, Error> {
    let mut urgent: Option<DueStatus> = None;

    for checkpoint in checkpoints {
        let candidate = DueStatus::compute(checkpoint, now)?;

        let replace = match &urgent {
            None => true,
            Some(current) => {
                (!candidate.is_overdue() && candidate.time_left < current.time_left)
                    || (current.is_overdue() && candidate.time_left > current.time_left)
            }
        };

        if replace {
            urgent = Some(candidate);
        }
    }

    Ok(urgent)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Threshold {
    /// Time left dropped to the warning window
    Warning,
    /// Time left reached zero
    Overdue,
}

#[derive(Debug, Default, Clone, Copy)]
struct Fired {
    warning: bool,
    overdue: bool,
}

/// One-shot threshold bookkeeping keyed by due cycle.
///
/// Each threshold fires at most once per `(checkpoint, due_at)`. A new due
/// cycle for a checkpoint (after a rescan) replaces the old one. A threshold
/// only counts as fired once [`ThresholdTracker::mark_fired`] is called, so
/// callers mark it after the alert is stored.
#[derive(Debug)]
pub struct ThresholdTracker {
    warning_window: Duration,
    cycles: HashMap<Uuid, (DueCycle, Fired)>,
}

impl ThresholdTracker {
    pub fn new(warning_window: Duration) -> Self {
        Self {
            warning_window,
            cycles: HashMap::new(),
        }
    }

    /// Threshold `status` has crossed that has not fired in its cycle yet.
    /// An overdue checkpoint never reports the warning.
    pub fn pending(&self, status: &DueStatus) -> Option<Threshold> {
        let fired = match self.cycles.get(&status.checkpoint_id) {
            Some((cycle, fired)) if *cycle == status.cycle() => *fired,
            _ => Fired::default(),
        };

        if status.is_overdue() {
            (!fired.overdue).then_some(Threshold::Overdue)
        } else if status.time_left <= self.warning_window && !fired.warning {
            Some(Threshold::Warning)
        } else {
            None
        }
    }

    /// Record that `threshold` fired for the cycle of `status`. Overdue also
    /// retires the warning of that cycle.
    pub fn mark_fired(&mut self, status: &DueStatus, threshold: Threshold) {
        let cycle = status.cycle();
        let entry = self
            .cycles
            .entry(status.checkpoint_id)
            .or_insert((cycle, Fired::default()));
        if entry.0 != cycle {
            *entry = (cycle, Fired::default());
        }

        match threshold {
            Threshold::Overdue => {
                entry.1.overdue = true;
                entry.1.warning = true;
            }
            Threshold::Warning => entry.1.warning = true,
        }
    }

    /// Drop cycles for checkpoints no longer being watched
    pub fn retain(&mut self, watched: &HashSet<Uuid>) {
        self.cycles.retain(|checkpoint_id, _| watched.contains(checkpoint_id));
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(
        name: &str,
        interval: i32,
        last_scanned_at: Option<DateTime<Utc>>,
    ) -> CheckpointLastScan {
        CheckpointLastScan {
            id: Uuid::new_v4(),
            name: name.to_string(),
            sequence_order: 0,
            scan_interval_minutes: interval,
            last_scanned_at,
        }
    }

    #[test]
    fn never_scanned_is_due_now() {
        let now = Utc::now();
        let status = DueStatus::compute(&checkpoint("Gate", 15, None), now).unwrap();
        assert_eq!(status.due_at, now);
        assert!(status.time_left <= Duration::zero());
        assert!(status.is_overdue());
    }

    #[test]
    fn never_scanned_is_overdue_from_start() {
        let now = Utc::now();
        let urgent = most_urgent(&[checkpoint("Lobby", 15, None)], now)
            .unwrap()
            .unwrap();
        assert!(urgent.is_overdue());
        assert_eq!(urgent.name, "Lobby");
    }

    #[test]
    fn picks_least_time_left_among_pending() {
        let now = Utc::now();
        let list = [
            checkpoint("A", 30, Some(now - Duration::minutes(5))),
            checkpoint("B", 30, Some(now - Duration::minutes(25))),
            checkpoint("C", 30, Some(now - Duration::minutes(15))),
        ];
        let urgent = most_urgent(&list, now).unwrap().unwrap();
        assert_eq!(urgent.name, "B");
        assert_eq!(urgent.time_left, Duration::minutes(5));
    }

    #[test]
    fn pending_candidate_beats_overdue_in_any_order() {
        let now = Utc::now();
        let overdue = checkpoint("Overdue", 10, Some(now - Duration::minutes(12)));
        let soon = checkpoint("Soon", 10, Some(now - Duration::minutes(9)));

        for list in [[overdue.clone(), soon.clone()], [soon, overdue]] {
            let urgent = most_urgent(&list, now).unwrap().unwrap();
            assert_eq!(urgent.name, "Soon");
        }
    }

    #[test]
    fn less_overdue_candidate_replaces_overdue_pick() {
        let now = Utc::now();
        let list = [
            checkpoint("Very late", 10, Some(now - Duration::minutes(40))),
            checkpoint("Bit late", 10, Some(now - Duration::minutes(11))),
        ];
        let urgent = most_urgent(&list, now).unwrap().unwrap();
        assert_eq!(urgent.name, "Bit late");
    }

    #[test]
    fn empty_list_has_no_pick() {
        assert!(most_urgent(&[], Utc::now()).unwrap().is_none());
    }

    #[test]
    fn invalid_interval_is_rejected() {
        let err = most_urgent(&[checkpoint("Bad", 0, None)], Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    /// Pending threshold, marked as if its alert was stored
    fn fire(tracker: &mut ThresholdTracker, status: &DueStatus) -> Option<Threshold> {
        let threshold = tracker.pending(status)?;
        tracker.mark_fired(status, threshold);
        Some(threshold)
    }

    #[test]
    fn thresholds_fire_once_per_cycle() {
        let mut tracker = ThresholdTracker::new(Duration::seconds(60));
        let t0 = Utc::now();
        let last = t0 - Duration::minutes(9);
        let cp = checkpoint("Dock", 10, Some(last));

        // 60s left: warning only
        let status = DueStatus::compute(&cp, t0).unwrap();
        assert_eq!(fire(&mut tracker, &status), Some(Threshold::Warning));
        let status = DueStatus::compute(&cp, t0 + Duration::seconds(30)).unwrap();
        assert_eq!(fire(&mut tracker, &status), None);

        // due: overdue once
        let status = DueStatus::compute(&cp, t0 + Duration::seconds(60)).unwrap();
        assert_eq!(fire(&mut tracker, &status), Some(Threshold::Overdue));
        let status = DueStatus::compute(&cp, t0 + Duration::seconds(61)).unwrap();
        assert_eq!(fire(&mut tracker, &status), None);

        // rescanned: new cycle re-arms, first tick already past due
        let rescanned = CheckpointLastScan {
            last_scanned_at: Some(t0 + Duration::seconds(61)),
            ..cp.clone()
        };
        let status =
            DueStatus::compute(&rescanned, t0 + Duration::seconds(61) + Duration::minutes(10))
                .unwrap();
        assert_eq!(fire(&mut tracker, &status), Some(Threshold::Overdue));
    }

    #[test]
    fn never_scanned_fires_overdue_without_warning() {
        let mut tracker = ThresholdTracker::new(Duration::seconds(60));
        let cp = checkpoint("Roof", 15, None);
        let t0 = Utc::now();

        let first = fire(&mut tracker, &DueStatus::compute(&cp, t0).unwrap());
        assert_eq!(first, Some(Threshold::Overdue));
        for tick in 1..5 {
            let status = DueStatus::compute(&cp, t0 + Duration::seconds(tick)).unwrap();
            assert_eq!(tracker.pending(&status), None);
        }
    }

    #[test]
    fn unmarked_threshold_stays_pending() {
        let mut tracker = ThresholdTracker::new(Duration::seconds(60));
        let cp = checkpoint("Stairwell", 15, None);
        let t0 = Utc::now();

        // Alert write failed: nothing marked, the next tick retries
        let status = DueStatus::compute(&cp, t0).unwrap();
        assert_eq!(tracker.pending(&status), Some(Threshold::Overdue));
        let status = DueStatus::compute(&cp, t0 + Duration::seconds(1)).unwrap();
        assert_eq!(tracker.pending(&status), Some(Threshold::Overdue));

        tracker.mark_fired(&status, Threshold::Overdue);
        assert_eq!(tracker.pending(&status), None);
    }

    #[test]
    fn retain_drops_unwatched_cycles() {
        let mut tracker = ThresholdTracker::new(Duration::seconds(60));
        let a = checkpoint("A", 5, None);
        let b = checkpoint("B", 5, None);
        let now = Utc::now();
        fire(&mut tracker, &DueStatus::compute(&a, now).unwrap());
        fire(&mut tracker, &DueStatus::compute(&b, now).unwrap());
        assert_eq!(tracker.len(), 2);

        tracker.retain(&HashSet::from([a.id]));
        assert_eq!(tracker.len(), 1);
    }
}
