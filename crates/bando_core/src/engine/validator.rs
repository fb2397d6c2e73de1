//! Deadline chain validation.
//!
//! # Responsibility
//! - Reject malformed template chains before any date arithmetic runs.
//! - Produce a `ValidatedChain` that downstream code can walk left-to-right.
//!
//! # Invariants
//! - Sequence indices are exactly `0..n`.
//! - Index 0 references an anchor event.
//! - `PriorDeadline(k)` only points to `k < sequence_index`, so the reference
//!   graph is a chain with a single predecessor per node.
//! - All templates belong to one grant.

use crate::model::anchor::{AnchorEvent, AnchorEventId};
use crate::model::grant::GrantId;
use crate::model::template::{DeadlineTemplate, Reference, TemplateId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Structural problems that make a template chain unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Sorted indices are not `0..n` (gap or duplicate).
    NonContiguousSequence { expected: u32, found: u32 },
    /// Template at index 0 does not reference an anchor event.
    InvalidFirstReference { template_id: TemplateId },
    /// `PriorDeadline(k)` with `k >= sequence_index`.
    ForwardOrSelfReference {
        template_id: TemplateId,
        sequence_index: u32,
        referenced_index: u32,
    },
    /// Template owned by a different grant than the rest of the chain.
    ForeignTemplate {
        template_id: TemplateId,
        expected_grant: GrantId,
        found_grant: GrantId,
    },
    /// Anchor reference to an event missing from the catalog.
    UnknownAnchorEvent {
        template_id: TemplateId,
        event_id: AnchorEventId,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonContiguousSequence { expected, found } => write!(
                f,
                "deadline sequence is not contiguous: expected index {expected}, found {found}"
            ),
            Self::InvalidFirstReference { template_id } => write!(
                f,
                "first deadline {template_id} must reference an anchor event"
            ),
            Self::ForwardOrSelfReference {
                template_id,
                sequence_index,
                referenced_index,
            } => write!(
                f,
                "deadline {template_id} at index {sequence_index} references index {referenced_index}; only earlier deadlines may be referenced"
            ),
            Self::ForeignTemplate {
                template_id,
                expected_grant,
                found_grant,
            } => write!(
                f,
                "deadline {template_id} belongs to grant {found_grant}, chain belongs to {expected_grant}"
            ),
            Self::UnknownAnchorEvent {
                template_id,
                event_id,
            } => write!(
                f,
                "deadline {template_id} references unknown anchor event `{event_id}`"
            ),
        }
    }
}

impl Error for ValidationError {}

/// Template chain that passed `validate`, sorted by sequence index.
///
/// The only way to build one is through validation; deserialization re-runs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<DeadlineTemplate>",
    into = "Vec<DeadlineTemplate>"
)]
pub struct ValidatedChain {
    templates: Vec<DeadlineTemplate>,
}

impl ValidatedChain {
    /// Templates in evaluation order (index ascending).
    pub fn templates(&self) -> &[DeadlineTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Template at `sequence_index`, if the chain is that long.
    pub fn get(&self, sequence_index: u32) -> Option<&DeadlineTemplate> {
        usize::try_from(sequence_index)
            .ok()
            .and_then(|position| self.templates.get(position))
    }

    /// Owning grant, `None` for an empty chain.
    pub fn grant_id(&self) -> Option<GrantId> {
        self.templates.first().map(|template| template.grant_id)
    }

    /// Distinct anchor events referenced anywhere in the chain.
    pub fn anchor_event_ids(&self) -> BTreeSet<&str> {
        self.templates
            .iter()
            .filter_map(|template| match &template.reference {
                Reference::Anchor(event_id) => Some(event_id.as_str()),
                Reference::PriorDeadline(_) => None,
            })
            .collect()
    }
}

impl TryFrom<Vec<DeadlineTemplate>> for ValidatedChain {
    type Error = ValidationError;

    fn try_from(value: Vec<DeadlineTemplate>) -> Result<Self, Self::Error> {
        validate(value)
    }
}

impl From<ValidatedChain> for Vec<DeadlineTemplate> {
    fn from(value: ValidatedChain) -> Self {
        value.templates
    }
}

/// Validates a template chain and returns it sorted by sequence index.
///
/// An empty chain is valid.
///
/// # Errors
/// - `ForeignTemplate` when templates from several grants are mixed.
/// - `NonContiguousSequence` when indices are not exactly `0..n`.
/// - `InvalidFirstReference` when index 0 is not anchored.
/// - `ForwardOrSelfReference` for any `PriorDeadline(k)` with `k >= index`.
pub fn validate(mut templates: Vec<DeadlineTemplate>) -> Result<ValidatedChain, ValidationError> {
    if let Some(first) = templates.first() {
        let expected_grant = first.grant_id;
        if let Some(foreign) = templates
            .iter()
            .find(|template| template.grant_id != expected_grant)
        {
            return Err(ValidationError::ForeignTemplate {
                template_id: foreign.id,
                expected_grant,
                found_grant: foreign.grant_id,
            });
        }
    }

    templates.sort_by_key(|template| template.sequence_index);

    for (position, template) in templates.iter().enumerate() {
        let expected = u32::try_from(position).unwrap_or(u32::MAX);
        if template.sequence_index != expected {
            return Err(ValidationError::NonContiguousSequence {
                expected,
                found: template.sequence_index,
            });
        }
    }

    if let Some(first) = templates.first() {
        if !matches!(first.reference, Reference::Anchor(_)) {
            return Err(ValidationError::InvalidFirstReference {
                template_id: first.id,
            });
        }
    }

    for template in &templates {
        if let Reference::PriorDeadline(referenced_index) = template.reference {
            if referenced_index >= template.sequence_index {
                return Err(ValidationError::ForwardOrSelfReference {
                    template_id: template.id,
                    sequence_index: template.sequence_index,
                    referenced_index,
                });
            }
        }
    }

    Ok(ValidatedChain { templates })
}

/// Checks every anchor reference of `chain` against the catalog.
pub fn validate_against_catalog(
    chain: &ValidatedChain,
    catalog: &[AnchorEvent],
) -> Result<(), ValidationError> {
    let known: HashSet<&str> = catalog.iter().map(|event| event.id.as_str()).collect();
    for template in chain.templates() {
        if let Reference::Anchor(event_id) = &template.reference {
            if !known.contains(event_id.as_str()) {
                return Err(ValidationError::UnknownAnchorEvent {
                    template_id: template.id,
                    event_id: event_id.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate, ValidatedChain, ValidationError};
    use crate::model::template::{DeadlineTemplate, OffsetUnit, Reference};
    use uuid::Uuid;

    fn template(grant: Uuid, index: u32, reference: Reference) -> DeadlineTemplate {
        DeadlineTemplate::new(grant, index, format!("T{index}"), reference, 30, OffsetUnit::Days)
    }

    #[test]
    fn sorts_templates_by_sequence_index() {
        let grant = Uuid::new_v4();
        let chain = validate(vec![
            template(grant, 2, Reference::PriorDeadline(1)),
            template(grant, 0, Reference::Anchor("avvio_progetto".into())),
            template(grant, 1, Reference::PriorDeadline(0)),
        ])
        .unwrap();

        let order: Vec<u32> = chain.templates().iter().map(|t| t.sequence_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(chain.grant_id(), Some(grant));
    }

    #[test]
    fn empty_chain_is_valid() {
        let chain = validate(Vec::new()).unwrap();
        assert!(chain.is_empty());
        assert_eq!(chain.grant_id(), None);
    }

    #[test]
    fn duplicate_index_is_non_contiguous() {
        let grant = Uuid::new_v4();
        let err = validate(vec![
            template(grant, 0, Reference::Anchor("avvio_progetto".into())),
            template(grant, 1, Reference::PriorDeadline(0)),
            template(grant, 1, Reference::PriorDeadline(0)),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::NonContiguousSequence {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn deserialization_revalidates() {
        let grant = Uuid::new_v4();
        let raw = serde_json::to_value(vec![template(grant, 0, Reference::PriorDeadline(0))])
            .unwrap();
        let result: Result<ValidatedChain, _> = serde_json::from_value(raw);
        assert!(result.is_err());
    }
}
