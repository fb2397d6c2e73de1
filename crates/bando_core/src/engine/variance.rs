//! Planned-vs-actual variance.
//!
//! Read-only: evaluation never mutates the instance it looks at.

use crate::model::instance::{DeadlineInstance, DeadlineStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Days ahead of a deadline during which it counts as imminent.
pub const IMMINENT_WINDOW_DAYS: i64 = 7;

/// Urgency band of an instance without an actual date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Imminent,
    /// Past its computed date.
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variance {
    /// Set when an actual date exists; never negative.
    pub late_by_days: Option<i64>,
    /// Set when no actual date exists; negative once overdue.
    pub days_remaining: Option<i64>,
    /// Status re-evaluated against `today`.
    pub status: DeadlineStatus,
    pub urgency: Option<Urgency>,
}

/// Compares an instance against its computed date as of `today`.
pub fn evaluate(instance: &DeadlineInstance, today: NaiveDate) -> Variance {
    match instance.actual_date {
        Some(actual) => Variance {
            late_by_days: Some((actual - instance.computed_date).num_days().max(0)),
            days_remaining: None,
            status: DeadlineStatus::ActualRecorded,
            urgency: None,
        },
        None => {
            let remaining = (instance.computed_date - today).num_days();
            let (status, urgency) = if remaining < 0 {
                (DeadlineStatus::Overdue, Urgency::Urgent)
            } else if remaining <= IMMINENT_WINDOW_DAYS {
                (DeadlineStatus::Planned, Urgency::Imminent)
            } else {
                (DeadlineStatus::Planned, Urgency::Normal)
            };
            Variance {
                late_by_days: None,
                days_remaining: Some(remaining),
                status,
                urgency: Some(urgency),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{evaluate, Urgency};
    use crate::model::instance::{DeadlineInstance, DeadlineStatus};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn early_actual_is_not_negative_lateness() {
        let instance =
            DeadlineInstance::new(Uuid::new_v4(), 0, date(2024, 1, 31), Some(date(2024, 1, 20)));
        let variance = evaluate(&instance, date(2024, 6, 1));
        assert_eq!(variance.late_by_days, Some(0));
        assert_eq!(variance.status, DeadlineStatus::ActualRecorded);
        assert_eq!(variance.urgency, None);
    }

    #[test]
    fn urgency_bands() {
        let instance = DeadlineInstance::new(Uuid::new_v4(), 0, date(2024, 3, 10), None);

        assert_eq!(evaluate(&instance, date(2024, 3, 1)).urgency, Some(Urgency::Normal));
        assert_eq!(evaluate(&instance, date(2024, 3, 3)).urgency, Some(Urgency::Imminent));
        assert_eq!(evaluate(&instance, date(2024, 3, 10)).urgency, Some(Urgency::Imminent));

        let overdue = evaluate(&instance, date(2024, 3, 11));
        assert_eq!(overdue.urgency, Some(Urgency::Urgent));
        assert_eq!(overdue.status, DeadlineStatus::Overdue);
        assert_eq!(overdue.days_remaining, Some(-1));
    }
}
