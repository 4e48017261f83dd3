use crate::db::models::checkpoint_models::Checkpoint;
use crate::db::models::scan_models::PatrolScanEvent;
use crate::db::models::shift_models::Shift;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Per-shift patrol compliance, in escalating order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    OnTrack,
    Behind,
    Missed,
}

impl Display for ComplianceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnTrack => write!(f, "on_track"),
            Self::Behind => write!(f, "behind"),
            Self::Missed => write!(f, "missed"),
        }
    }
}

/// Rolled-up scan state of one active shift
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShiftCompliance {
    pub shift_id: Uuid,
    pub guard_id: Uuid,
    pub site_id: Uuid,
    /// Required checkpoints with at least one scan this shift
    pub scanned_count: usize,
    pub total_required: usize,
    /// Names of required checkpoints with no scan this shift
    pub missing_checkpoints: Vec<String>,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub status: ComplianceStatus,
}

/// Aggregate a shift from its site's checkpoints and the scans recorded
/// during the shift.
///
/// Status precedence is strict: `Missed` when any required checkpoint has no
/// scan, otherwise `Behind` when any scan was late, otherwise `OnTrack`.
pub fn aggregate_shift(
    shift: &Shift,
    checkpoints: &[Checkpoint],
    scans: &[PatrolScanEvent],
) -> ShiftCompliance {
    let scanned: HashSet<Uuid> = scans.iter().map(|scan| scan.checkpoint_id).collect();

    let required: Vec<&Checkpoint> = checkpoints.iter().filter(|c| c.is_required).collect();

    let missing_checkpoints: Vec<String> = required
        .iter()
        .filter(|c| !scanned.contains(&c.id))
        .map(|c| c.name.clone())
        .collect();

    let any_late = scans.iter().any(|scan| !scan.is_on_time);

    let status = if !missing_checkpoints.is_empty() {
        ComplianceStatus::Missed
    } else if any_late {
        ComplianceStatus::Behind
    } else {
        ComplianceStatus::OnTrack
    };

    ShiftCompliance {
        shift_id: shift.id,
        guard_id: shift.guard_id,
        site_id: shift.site_id,
        scanned_count: required.len() - missing_checkpoints.len(),
        total_required: required.len(),
        missing_checkpoints,
        last_scan_at: scans.iter().map(|scan| scan.scanned_at).max(),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::shift_models::ShiftStatus;
    use chrono::Duration;

    fn shift() -> Shift {
        let now = Utc::now();
        Shift {
            id: Uuid::new_v4(),
            guard_id: Uuid::new_v4(),
            site_id: Uuid::new_v4(),
            start_time: now - Duration::hours(2),
            end_time: now + Duration::hours(6),
            status: ShiftStatus::Active,
        }
    }

    fn checkpoint(site_id: Uuid, name: &str, required: bool) -> Checkpoint {
        Checkpoint {
            id: Uuid::new_v4(),
            site_id,
            name: name.to_string(),
            code: format!("CP-{}", name),
            sequence_order: 0,
            scan_interval_minutes: 30,
            is_required: required,
            created_at: Utc::now(),
        }
    }

    fn scan(shift: &Shift, checkpoint: &Checkpoint, minutes_ago: i64, on_time: bool) -> PatrolScanEvent {
        PatrolScanEvent {
            id: Uuid::new_v4(),
            checkpoint_id: checkpoint.id,
            guard_id: shift.guard_id,
            shift_id: Some(shift.id),
            scanned_at: Utc::now() - Duration::minutes(minutes_ago),
            is_on_time: on_time,
        }
    }

    #[test]
    fn unscanned_required_checkpoint_means_missed() {
        let shift = shift();
        let cps = vec![
            checkpoint(shift.site_id, "Gate", true),
            checkpoint(shift.site_id, "Lobby", true),
            checkpoint(shift.site_id, "Roof", true),
        ];
        let scans = vec![scan(&shift, &cps[0], 30, true), scan(&shift, &cps[1], 10, true)];

        let result = aggregate_shift(&shift, &cps, &scans);
        assert_eq!(result.status, ComplianceStatus::Missed);
        assert_eq!(result.missing_checkpoints, vec!["Roof".to_string()]);
        assert_eq!(result.scanned_count, 2);
        assert_eq!(result.total_required, 3);
        assert_eq!(result.last_scan_at, Some(scans[1].scanned_at));
    }

    #[test]
    fn missed_dominates_behind() {
        let shift = shift();
        let cps = vec![
            checkpoint(shift.site_id, "Gate", true),
            checkpoint(shift.site_id, "Roof", true),
        ];
        let scans = vec![scan(&shift, &cps[0], 50, false)];

        assert_eq!(
            aggregate_shift(&shift, &cps, &scans).status,
            ComplianceStatus::Missed
        );
    }

    #[test]
    fn late_scan_means_behind() {
        let shift = shift();
        let cps = vec![checkpoint(shift.site_id, "Gate", true)];
        let scans = vec![scan(&shift, &cps[0], 60, true), scan(&shift, &cps[0], 5, false)];

        let result = aggregate_shift(&shift, &cps, &scans);
        assert_eq!(result.status, ComplianceStatus::Behind);
        assert_eq!(result.scanned_count, 1);
    }

    #[test]
    fn all_scanned_on_time_is_on_track() {
        let shift = shift();
        let cps = vec![
            checkpoint(shift.site_id, "Gate", true),
            checkpoint(shift.site_id, "Vending", false),
        ];
        let scans = vec![scan(&shift, &cps[0], 5, true)];

        let result = aggregate_shift(&shift, &cps, &scans);
        assert_eq!(result.status, ComplianceStatus::OnTrack);
        assert_eq!(result.total_required, 1);
        assert!(result.missing_checkpoints.is_empty());
    }

    #[test]
    fn optional_checkpoints_never_count_as_missing() {
        let shift = shift();
        let cps = vec![checkpoint(shift.site_id, "Vending", false)];
        let result = aggregate_shift(&shift, &cps, &[]);
        assert_eq!(result.status, ComplianceStatus::OnTrack);
        assert_eq!(result.last_scan_at, None);
    }
}
