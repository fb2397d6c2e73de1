//! Anchor date resolution.
//!
//! # Responsibility
//! - Pick the concrete date of an anchor event for one project: the project
//!   override when present, the grant default otherwise.

use crate::engine::calculator::AnchorDates;
use crate::engine::validator::ValidatedChain;
use crate::model::anchor::AnchorEventId;
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Anchor with neither a project override nor a grant default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedAnchorError {
    pub event_id: AnchorEventId,
}

impl Display for UnresolvedAnchorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "anchor event `{}` has no project date and no grant default",
            self.event_id
        )
    }
}

impl Error for UnresolvedAnchorError {}

/// Resolves one anchor date; the project override wins over the grant default.
pub fn resolve_anchor(
    event_id: &str,
    grant_default: Option<NaiveDate>,
    project_override: Option<NaiveDate>,
) -> Result<NaiveDate, UnresolvedAnchorError> {
    project_override
        .or(grant_default)
        .ok_or_else(|| UnresolvedAnchorError {
            event_id: event_id.to_string(),
        })
}

/// Anchor dates for every anchor the chain references, plus the anchors that
/// could not be resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorResolution {
    pub dates: AnchorDates,
    pub unresolved: Vec<UnresolvedAnchorError>,
}

/// Resolves all anchors referenced by `chain`.
///
/// Unresolved anchors are reported, not fatal: the calculator skips the
/// templates that depend on them.
pub fn resolve_chain_anchors(
    chain: &ValidatedChain,
    grant_defaults: &AnchorDates,
    project_overrides: &AnchorDates,
) -> AnchorResolution {
    let mut resolution = AnchorResolution::default();
    for event_id in chain.anchor_event_ids() {
        match resolve_anchor(
            event_id,
            grant_defaults.get(event_id).copied(),
            project_overrides.get(event_id).copied(),
        ) {
            Ok(date) => {
                resolution.dates.insert(event_id.to_string(), date);
            }
            Err(err) => resolution.unresolved.push(err),
        }
    }
    resolution
}
