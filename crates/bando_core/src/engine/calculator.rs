//! Deadline date calculator.
//!
//! # Responsibility
//! - Walk a validated chain in index order and produce one dated instance per
//!   resolvable template.
//! - Report every template it had to skip, with the missing reference.
//!
//! # Invariants
//! - Pure: identical inputs give identical output, no state survives a call.
//! - `PriorDeadline(k)` measures from the recorded actual date of `k` when
//!   one exists, otherwise from the date computed for `k` in the same run.
//! - A template depending on a skipped template is skipped as well.

use crate::engine::validator::ValidatedChain;
use crate::model::anchor::AnchorEventId;
use crate::model::instance::DeadlineInstance;
use crate::model::template::{DeadlineTemplate, Reference, TemplateId};
use chrono::{NaiveDate, TimeDelta};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Resolved anchor dates keyed by anchor event id.
pub type AnchorDates = BTreeMap<AnchorEventId, NaiveDate>;
/// Recorded actual dates keyed by sequence index.
pub type PriorActuals = BTreeMap<u32, NaiveDate>;

/// Why a template could not be dated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    MissingAnchor(AnchorEventId),
    /// Referenced deadline has neither an actual nor a computed date.
    MissingPriorDeadline(u32),
    /// Reference date plus offset leaves the supported calendar range.
    DateOutOfRange { offset_days: i64 },
}

/// A template skipped during computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReferenceError {
    pub template_id: TemplateId,
    pub sequence_index: u32,
    pub reason: UnresolvedReason,
}

impl Display for UnresolvedReferenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let Self {
            template_id,
            sequence_index,
            reason,
        } = self;
        match reason {
            UnresolvedReason::MissingAnchor(event_id) => write!(
                f,
                "deadline {template_id} at index {sequence_index}: anchor `{event_id}` has no date"
            ),
            UnresolvedReason::MissingPriorDeadline(index) => write!(
                f,
                "deadline {template_id} at index {sequence_index}: deadline {index} has no date"
            ),
            UnresolvedReason::DateOutOfRange { offset_days } => write!(
                f,
                "deadline {template_id} at index {sequence_index}: offset of {offset_days} days is out of range"
            ),
        }
    }
}

impl Error for UnresolvedReferenceError {}

/// Result of one calculator run: dated instances plus skipped templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleComputation {
    /// Sorted by sequence index.
    pub instances: Vec<DeadlineInstance>,
    pub skipped: Vec<UnresolvedReferenceError>,
}

impl ScheduleComputation {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Computes deadline instances for `chain`.
///
/// Instances whose index appears in `prior_actuals` carry that actual date
/// and `ActualRecorded` status.
pub fn compute(
    chain: &ValidatedChain,
    anchor_dates: &AnchorDates,
    prior_actuals: &PriorActuals,
) -> ScheduleComputation {
    let mut computed: BTreeMap<u32, NaiveDate> = BTreeMap::new();
    let mut output = ScheduleComputation::default();

    for template in chain.templates() {
        let dated = reference_date(template, anchor_dates, prior_actuals, &computed)
            .and_then(|reference| shift(template, reference));

        match dated {
            Ok(computed_date) => {
                computed.insert(template.sequence_index, computed_date);
                output.instances.push(DeadlineInstance::new(
                    template.id,
                    template.sequence_index,
                    computed_date,
                    prior_actuals.get(&template.sequence_index).copied(),
                ));
            }
            Err(reason) => output.skipped.push(UnresolvedReferenceError {
                template_id: template.id,
                sequence_index: template.sequence_index,
                reason,
            }),
        }
    }

    output
}

fn reference_date(
    template: &DeadlineTemplate,
    anchor_dates: &AnchorDates,
    prior_actuals: &PriorActuals,
    computed: &BTreeMap<u32, NaiveDate>,
) -> Result<NaiveDate, UnresolvedReason> {
    match &template.reference {
        Reference::Anchor(event_id) => anchor_dates
            .get(event_id)
            .copied()
            .ok_or_else(|| UnresolvedReason::MissingAnchor(event_id.clone())),
        Reference::PriorDeadline(index) => prior_actuals
            .get(index)
            .or_else(|| computed.get(index))
            .copied()
            .ok_or(UnresolvedReason::MissingPriorDeadline(*index)),
    }
}

fn shift(template: &DeadlineTemplate, reference: NaiveDate) -> Result<NaiveDate, UnresolvedReason> {
    let offset_days = template.offset_days();
    TimeDelta::try_days(offset_days)
        .and_then(|delta| reference.checked_add_signed(delta))
        .ok_or(UnresolvedReason::DateOutOfRange { offset_days })
}
