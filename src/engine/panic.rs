//! Panic alert lifecycle.
//!
//! ```text
//!   active ──acknowledge──► acknowledged ──resolve──► resolved
//! ```
//!
//! Transitions only move forward. Re-applying a transition that already
//! happened is a no-op; resolving an alert nobody acknowledged is rejected.

use crate::db::models::panic_models::{PanicAlert, PanicStatus};
use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanicAction {
    Acknowledge,
    Resolve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied(PanicStatus),
    Unchanged,
}

/// Status reached by applying `action` to an alert in `current`
pub fn next_status(current: PanicStatus, action: PanicAction) -> Result<Outcome, Error> {
    match (current, action) {
        (PanicStatus::Active, PanicAction::Acknowledge) => {
            Ok(Outcome::Applied(PanicStatus::Acknowledged))
        }
        (PanicStatus::Acknowledged, PanicAction::Resolve) => {
            Ok(Outcome::Applied(PanicStatus::Resolved))
        }
        (PanicStatus::Active, PanicAction::Resolve) => Err(Error::InvalidTransition(
            "panic alert must be acknowledged before it is resolved".to_string(),
        )),
        (PanicStatus::Acknowledged, PanicAction::Acknowledge)
        | (PanicStatus::Resolved, PanicAction::Acknowledge)
        | (PanicStatus::Resolved, PanicAction::Resolve) => Ok(Outcome::Unchanged),
    }
}

/// Apply `action` in place, stamping who and when. Returns whether the
/// alert changed.
pub fn apply(
    alert: &mut PanicAlert,
    action: PanicAction,
    actor: Uuid,
    at: DateTime<Utc>,
) -> Result<bool, Error> {
    match next_status(alert.status, action)? {
        Outcome::Unchanged => Ok(false),
        Outcome::Applied(status) => {
            match status {
                PanicStatus::Acknowledged => {
                    alert.acknowledged_at = Some(at);
                    alert.acknowledged_by = Some(actor);
                }
                PanicStatus::Resolved => {
                    alert.resolved_at = Some(at);
                    alert.resolved_by = Some(actor);
                }
                PanicStatus::Active => {}
            }
            alert.status = status;
            Ok(true)
        }
    }
}
