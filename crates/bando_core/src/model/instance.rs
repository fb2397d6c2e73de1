//! Deadline instance model.
//!
//! # Responsibility
//! - Define one concrete, dated deadline derived from a template for a project.
//!
//! # Invariants
//! - `actual_date`, once set, is never overwritten by recomputation.
//! - `status == ActualRecorded` iff `actual_date.is_some()`.

use crate::model::template::TemplateId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a deadline instance.
///
/// `Planned -> ActualRecorded` is terminal. `Planned -> Overdue` is
/// re-evaluated against the current date until an actual date arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineStatus {
    Planned,
    ActualRecorded,
    Overdue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineInstance {
    pub template_id: TemplateId,
    pub sequence_index: u32,
    pub computed_date: NaiveDate,
    pub actual_date: Option<NaiveDate>,
    pub status: DeadlineStatus,
}

impl DeadlineInstance {
    /// Builds an instance, deriving status from `actual_date`.
    pub fn new(
        template_id: TemplateId,
        sequence_index: u32,
        computed_date: NaiveDate,
        actual_date: Option<NaiveDate>,
    ) -> Self {
        let status = if actual_date.is_some() {
            DeadlineStatus::ActualRecorded
        } else {
            DeadlineStatus::Planned
        };
        Self {
            template_id,
            sequence_index,
            computed_date,
            actual_date,
            status,
        }
    }

    /// Whether this instance is frozen against recomputation.
    pub fn is_frozen(&self) -> bool {
        self.actual_date.is_some()
    }
}
