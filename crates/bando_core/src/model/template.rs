//! Deadline template model.
//!
//! # Responsibility
//! - Define one reusable, per-grant deadline definition.
//! - Keep the offset unit explicit and the reference a typed union.
//!
//! # Invariants
//! - `offset_unit` is stored as given; it is never inferred from the amount.
//! - A `Reference::PriorDeadline(k)` is only meaningful inside the owning
//!   grant's chain (checked by `engine::validator`).

use crate::model::anchor::AnchorEventId;
use crate::model::grant::GrantId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed month length used to convert `OffsetUnit::Months`.
pub const DAYS_PER_MONTH: i64 = 30;

pub type TemplateId = Uuid;

/// Unit of a template offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetUnit {
    Days,
    /// Converted with `DAYS_PER_MONTH`, not calendar-aware.
    Months,
}

impl OffsetUnit {
    /// Converts `amount` in this unit into a day count.
    pub fn to_days(self, amount: i32) -> i64 {
        match self {
            Self::Days => i64::from(amount),
            Self::Months => i64::from(amount) * DAYS_PER_MONTH,
        }
    }
}

/// What a template's offset is measured from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Reference {
    /// A catalog anchor event.
    Anchor(AnchorEventId),
    /// An earlier deadline in the same chain, by sequence index.
    PriorDeadline(u32),
}

/// Business category of a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineCategory {
    Acceptance,
    Start,
    ProgressReport,
    FinalPayment,
    Reporting,
    Communication,
    Extension,
    ProjectClosure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// Reusable definition of one deadline in a grant's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineTemplate {
    pub id: TemplateId,
    pub grant_id: GrantId,
    pub name: String,
    pub description: String,
    /// May be negative for deadlines that precede their reference.
    pub offset_amount: i32,
    pub offset_unit: OffsetUnit,
    pub reference: Reference,
    pub category: DeadlineCategory,
    pub priority: Priority,
    pub mandatory: bool,
    /// Position in the chain, contiguous from 0.
    pub sequence_index: u32,
    pub suggested_owner: Option<String>,
    pub notes: Option<String>,
}

impl DeadlineTemplate {
    /// Creates a mandatory, medium-priority communication template with a
    /// generated id. Callers adjust the remaining fields directly.
    pub fn new(
        grant_id: GrantId,
        sequence_index: u32,
        name: impl Into<String>,
        reference: Reference,
        offset_amount: i32,
        offset_unit: OffsetUnit,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            grant_id,
            name: name.into(),
            description: String::new(),
            offset_amount,
            offset_unit,
            reference,
            category: DeadlineCategory::Communication,
            priority: Priority::Medium,
            mandatory: true,
            sequence_index,
            suggested_owner: None,
            notes: None,
        }
    }

    /// Offset converted to days.
    pub fn offset_days(&self) -> i64 {
        self.offset_unit.to_days(self.offset_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::{OffsetUnit, Reference};

    #[test]
    fn months_use_fixed_thirty_day_factor() {
        assert_eq!(OffsetUnit::Months.to_days(1), 30);
        assert_eq!(OffsetUnit::Months.to_days(2), 60);
        assert_eq!(OffsetUnit::Months.to_days(-1), -30);
        assert_eq!(OffsetUnit::Days.to_days(45), 45);
    }

    #[test]
    fn reference_serializes_as_tagged_union() {
        let anchor = serde_json::to_value(Reference::Anchor("avvio_progetto".into())).unwrap();
        assert_eq!(anchor["kind"], "anchor");
        assert_eq!(anchor["target"], "avvio_progetto");

        let prior = serde_json::to_value(Reference::PriorDeadline(2)).unwrap();
        assert_eq!(prior["kind"], "prior_deadline");
        assert_eq!(prior["target"], 2);
    }
}
