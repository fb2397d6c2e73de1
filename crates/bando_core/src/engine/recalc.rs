//! Actual-date override and suffix recalculation.
//!
//! # Responsibility
//! - Record a real-world occurrence date on one instance.
//! - Recompute every unfrozen instance by re-running the calculator over the
//!   whole chain with the updated actuals.
//!
//! # Invariants
//! - Instances with a recorded actual date are frozen: both their actual and
//!   computed dates are carried over unchanged.
//! - Every unfrozen instance equals the calculator's output for the updated
//!   actuals; there is no separate incremental path.
//! - Recording is one-shot per instance (`ActualRecorded` is terminal).

use crate::engine::calculator::{
    compute, AnchorDates, PriorActuals, ScheduleComputation, UnresolvedReferenceError,
};
use crate::engine::validator::ValidatedChain;
use crate::model::instance::{DeadlineInstance, DeadlineStatus};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideError {
    /// The chain has no template at this index.
    UnknownSequenceIndex(u32),
    /// The instance already carries an actual date.
    AlreadyRecorded {
        sequence_index: u32,
        actual_date: NaiveDate,
    },
    /// The template exists but its reference cannot be dated.
    Unresolved(UnresolvedReferenceError),
    /// The template is resolvable but the given schedule has no instance for
    /// it, or one built from a replaced template.
    MissingInstance(u32),
}

impl Display for OverrideError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSequenceIndex(index) => {
                write!(f, "no deadline template at index {index}")
            }
            Self::AlreadyRecorded {
                sequence_index,
                actual_date,
            } => write!(
                f,
                "deadline {sequence_index} already has actual date {actual_date}"
            ),
            Self::Unresolved(err) => write!(f, "{err}"),
            Self::MissingInstance(index) => write!(
                f,
                "schedule has no instance for deadline {index}; regenerate it first"
            ),
        }
    }
}

impl Error for OverrideError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unresolved(err) => Some(err),
            _ => None,
        }
    }
}

/// Recorded actual dates present in `instances`, keyed by sequence index.
pub fn recorded_actuals(instances: &[DeadlineInstance]) -> PriorActuals {
    instances
        .iter()
        .filter_map(|instance| {
            instance
                .actual_date
                .map(|actual| (instance.sequence_index, actual))
        })
        .collect()
}

/// Records `actual_date` on the instance at `index` and recomputes the
/// unfrozen instances.
///
/// `chain` and `anchor_dates` must be the inputs the schedule was produced
/// from. Callers serialize calls per project.
///
/// # Errors
/// - `UnknownSequenceIndex` when the chain is shorter than `index + 1`.
/// - `AlreadyRecorded` when the instance is already frozen.
/// - `Unresolved` when the target deadline itself cannot be dated.
/// - `MissingInstance` when `instances` is stale for `index`.
///
/// A target missing from `instances` is classified by a fresh `compute`. The
/// schedule service always passes a freshly computed base, so only direct
/// callers of this function reach that path.
pub fn apply_actual(
    chain: &ValidatedChain,
    anchor_dates: &AnchorDates,
    instances: &[DeadlineInstance],
    index: u32,
    actual_date: NaiveDate,
) -> Result<ScheduleComputation, OverrideError> {
    let Some(template) = chain.get(index) else {
        return Err(OverrideError::UnknownSequenceIndex(index));
    };

    let mut actuals = recorded_actuals(instances);
    let Some(target) = instances
        .iter()
        .find(|instance| instance.sequence_index == index)
    else {
        let current = compute(chain, anchor_dates, &actuals);
        return Err(current
            .skipped
            .into_iter()
            .find(|skipped| skipped.sequence_index == index)
            .map(OverrideError::Unresolved)
            .unwrap_or(OverrideError::MissingInstance(index)));
    };

    if target.template_id != template.id {
        return Err(OverrideError::MissingInstance(index));
    }
    if let Some(recorded) = target.actual_date {
        return Err(OverrideError::AlreadyRecorded {
            sequence_index: index,
            actual_date: recorded,
        });
    }

    actuals.insert(index, actual_date);
    let recomputed = compute(chain, anchor_dates, &actuals);

    let recorded_target = DeadlineInstance {
        actual_date: Some(actual_date),
        status: DeadlineStatus::ActualRecorded,
        ..target.clone()
    };
    let frozen: Vec<DeadlineInstance> = instances
        .iter()
        .filter(|instance| instance.is_frozen())
        .cloned()
        .chain(std::iter::once(recorded_target))
        .collect();

    Ok(overlay_frozen(chain, recomputed, &frozen))
}

/// Replaces calculator output with the frozen instances of `persisted`.
///
/// A frozen instance wins over whatever `computation` holds for its index,
/// including a skip. Instances whose template is no longer at that index of
/// `chain` are ignored.
pub fn overlay_frozen(
    chain: &ValidatedChain,
    computation: ScheduleComputation,
    persisted: &[DeadlineInstance],
) -> ScheduleComputation {
    let mut merged: BTreeMap<u32, DeadlineInstance> = computation
        .instances
        .into_iter()
        .map(|instance| (instance.sequence_index, instance))
        .collect();

    for instance in persisted.iter().filter(|instance| instance.is_frozen()) {
        let same_template = chain
            .get(instance.sequence_index)
            .is_some_and(|template| template.id == instance.template_id);
        if same_template {
            merged.insert(instance.sequence_index, instance.clone());
        }
    }

    let skipped = computation
        .skipped
        .into_iter()
        .filter(|skipped| !merged.contains_key(&skipped.sequence_index))
        .collect();

    ScheduleComputation {
        instances: merged.into_values().collect(),
        skipped,
    }
}
