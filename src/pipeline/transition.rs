//! Rising-edge notification decision.
//!
//! Compares the previous run's status with the current one. Only the edge
//! into `Available` alerts; a missing previous state counts as unavailable.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{AvailabilityStatus, PersistedState};

/// What to do about the current observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    Notify,
    Skip,
}

/// Decide whether to alert.
///
/// ```
/// use showtime_watch::models::AvailabilityStatus::{Available, Unavailable};
/// use showtime_watch::pipeline::{decide, NotificationAction};
///
/// assert_eq!(decide(None, Available), NotificationAction::Notify);
/// assert_eq!(decide(Some(Available), Available), NotificationAction::Skip);
/// assert_eq!(decide(Some(Available), Unavailable), NotificationAction::Skip);
/// ```
pub fn decide(
    previous: Option<AvailabilityStatus>,
    current: AvailabilityStatus,
) -> NotificationAction {
    use crate::models::AvailabilityStatus::{Available, Unavailable};

    match (previous, current) {
        (None | Some(Unavailable), Available) => NotificationAction::Notify,
        (Some(Available), Available) => NotificationAction::Skip,
        (_, Unavailable) => NotificationAction::Skip,
    }
}

/// State to persist after a completed check.
pub fn next_state(
    previous: Option<&PersistedState>,
    current: AvailabilityStatus,
    now: DateTime<Utc>,
) -> PersistedState {
    let available_since = match current {
        AvailabilityStatus::Unavailable => None,
        AvailabilityStatus::Available => previous
            .filter(|p| p.status.is_available())
            .and_then(|p| p.available_since)
            .or(Some(now)),
    };

    PersistedState {
        status: current,
        last_checked: now,
        available_since,
    }
}
