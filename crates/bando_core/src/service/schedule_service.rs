//! Deadline schedule use-case service.
//!
//! # Responsibility
//! - Load engine inputs from a `DeadlineStore`, run the pure engine, and
//!   persist its output as a separate step.
//! - Surface validation errors to template authors and report skipped
//!   deadlines without dropping the rest of the schedule.
//!
//! # Invariants
//! - Template chains are validated (structure and catalog) before storage
//!   and again before every computation.
//! - Callers serialize `record_actual_date` per project; the service works on
//!   a full snapshot and does not detect concurrent writers.

use crate::engine::anchor::{resolve_chain_anchors, AnchorResolution, UnresolvedAnchorError};
use crate::engine::calculator::{
    compute, AnchorDates, ScheduleComputation, UnresolvedReferenceError,
};
use crate::engine::recalc::{apply_actual, overlay_frozen, OverrideError};
use crate::engine::validator::{validate, validate_against_catalog, ValidatedChain, ValidationError};
use crate::engine::variance::{evaluate, Variance};
use crate::model::grant::{GrantId, ProjectId};
use crate::model::instance::DeadlineInstance;
use crate::model::template::DeadlineTemplate;
use crate::repo::deadline_store::DeadlineStore;
use crate::repo::error::{RepoError, RepoResult};
use chrono::NaiveDate;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ScheduleServiceError {
    /// Template chain is malformed.
    Validation(ValidationError),
    /// Actual date could not be recorded.
    Override(OverrideError),
    /// Project belongs to a different grant than the one requested.
    ProjectGrantMismatch {
        project_id: ProjectId,
        requested: GrantId,
        actual: GrantId,
    },
    Repo(RepoError),
}

impl Display for ScheduleServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Override(err) => write!(f, "{err}"),
            Self::ProjectGrantMismatch {
                project_id,
                requested,
                actual,
            } => write!(
                f,
                "project {project_id} belongs to grant {actual}, not {requested}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ScheduleServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Override(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::ProjectGrantMismatch { .. } => None,
        }
    }
}

impl From<ValidationError> for ScheduleServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<OverrideError> for ScheduleServiceError {
    fn from(value: OverrideError) -> Self {
        Self::Override(value)
    }
}

impl From<RepoError> for ScheduleServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Persisted schedule plus everything that kept it from being complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOutcome {
    /// Sorted by sequence index.
    pub instances: Vec<DeadlineInstance>,
    /// Templates left out of the schedule, with the missing reference.
    pub skipped: Vec<UnresolvedReferenceError>,
    /// Anchors with neither a project date nor a grant default.
    pub unresolved_anchors: Vec<UnresolvedAnchorError>,
}

/// One row of a project's variance report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarianceEntry {
    /// Instance with its status re-evaluated for the report date.
    pub instance: DeadlineInstance,
    pub variance: Variance,
}

/// Schedule service facade over a deadline store.
pub struct ScheduleService<S: DeadlineStore> {
    store: S,
}

impl<S: DeadlineStore> ScheduleService<S> {
    /// Creates a service using the provided store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validates and stores a grant's template chain, replacing the old one.
    ///
    /// Nothing is written when validation fails.
    pub fn save_template_chain(
        &self,
        grant_id: GrantId,
        templates: Vec<DeadlineTemplate>,
    ) -> Result<ValidatedChain, ScheduleServiceError> {
        if let Some(foreign) = templates
            .iter()
            .find(|template| template.grant_id != grant_id)
        {
            return Err(ValidationError::ForeignTemplate {
                template_id: foreign.id,
                expected_grant: grant_id,
                found_grant: foreign.grant_id,
            }
            .into());
        }

        let chain = self.validate_chain(grant_id, templates)?;
        self.store.replace_templates(grant_id, &chain)?;
        info!(
            "event=template_chain_save module=service status=ok grant_id={} templates={}",
            grant_id,
            chain.len()
        );
        Ok(chain)
    }

    /// Computes and persists the schedule of a project from its grant's chain.
    ///
    /// Recorded actual dates are carried into the new schedule. Persisted
    /// instances with an actual date are kept as they are, even when their
    /// own reference has changed or can no longer be dated.
    pub fn generate_schedule(
        &self,
        grant_id: GrantId,
        project_id: ProjectId,
    ) -> Result<ScheduleOutcome, ScheduleServiceError> {
        let owner = self.store.fetch_project_grant(project_id)?;
        if owner != grant_id {
            return Err(ScheduleServiceError::ProjectGrantMismatch {
                project_id,
                requested: grant_id,
                actual: owner,
            });
        }

        let chain = self.load_chain(grant_id)?;
        let anchors = self.resolve_anchors(grant_id, project_id, &chain)?;
        let computation = self.current_schedule(project_id, &chain, &anchors.dates)?;

        report_skipped(project_id, &computation.skipped);
        self.store
            .persist_instances(project_id, &computation.instances)?;
        info!(
            "event=schedule_generate module=service status=ok grant_id={} project_id={} instances={} skipped={}",
            grant_id,
            project_id,
            computation.instances.len(),
            computation.skipped.len()
        );

        Ok(ScheduleOutcome {
            instances: computation.instances,
            skipped: computation.skipped,
            unresolved_anchors: anchors.unresolved,
        })
    }

    /// Records the actual date of one deadline and recomputes the unfrozen
    /// deadlines after it.
    ///
    /// Works from the schedule the current inputs produce, so a deadline
    /// skipped at generation time can be recorded once its reference has a
    /// date.
    pub fn record_actual_date(
        &self,
        project_id: ProjectId,
        sequence_index: u32,
        actual_date: NaiveDate,
    ) -> Result<ScheduleOutcome, ScheduleServiceError> {
        let grant_id = self.store.fetch_project_grant(project_id)?;
        let chain = self.load_chain(grant_id)?;
        let anchors = self.resolve_anchors(grant_id, project_id, &chain)?;

        let base = self.current_schedule(project_id, &chain, &anchors.dates)?;

        let computation =
            match apply_actual(&chain, &anchors.dates, &base.instances, sequence_index, actual_date) {
                Ok(computation) => computation,
                Err(err) => {
                    warn!(
                        "event=actual_record module=service status=error project_id={} sequence_index={} error={}",
                        project_id, sequence_index, err
                    );
                    return Err(err.into());
                }
            };

        report_skipped(project_id, &computation.skipped);
        self.store
            .persist_instances(project_id, &computation.instances)?;
        info!(
            "event=actual_record module=service status=ok project_id={} sequence_index={} instances={}",
            project_id,
            sequence_index,
            computation.instances.len()
        );

        Ok(ScheduleOutcome {
            instances: computation.instances,
            skipped: computation.skipped,
            unresolved_anchors: anchors.unresolved,
        })
    }

    /// Variance report for every persisted deadline of a project as of `today`.
    pub fn get_variance(
        &self,
        project_id: ProjectId,
        today: NaiveDate,
    ) -> RepoResult<Vec<VarianceEntry>> {
        self.store.fetch_project_grant(project_id)?;
        let entries: Vec<VarianceEntry> = self
            .store
            .fetch_instances(project_id)?
            .into_iter()
            .map(|mut instance| {
                let variance = evaluate(&instance, today);
                instance.status = variance.status;
                VarianceEntry { instance, variance }
            })
            .collect();

        info!(
            "event=variance_evaluate module=service status=ok project_id={} instances={} overdue={}",
            project_id,
            entries.len(),
            entries
                .iter()
                .filter(|entry| entry.variance.days_remaining.is_some_and(|days| days < 0))
                .count()
        );
        Ok(entries)
    }

    /// `get_variance` as of the local calendar date.
    pub fn get_variance_today(&self, project_id: ProjectId) -> RepoResult<Vec<VarianceEntry>> {
        self.get_variance(project_id, chrono::Local::now().date_naive())
    }

    /// Calculator output for the current inputs with the persisted frozen
    /// instances laid over it.
    fn current_schedule(
        &self,
        project_id: ProjectId,
        chain: &ValidatedChain,
        anchor_dates: &AnchorDates,
    ) -> RepoResult<ScheduleComputation> {
        let actuals = self.store.fetch_recorded_actuals(project_id)?;
        let persisted = self.store.fetch_instances(project_id)?;
        Ok(overlay_frozen(
            chain,
            compute(chain, anchor_dates, &actuals),
            &persisted,
        ))
    }

    fn load_chain(&self, grant_id: GrantId) -> Result<ValidatedChain, ScheduleServiceError> {
        let templates = self.store.fetch_templates(grant_id)?;
        self.validate_chain(grant_id, templates)
    }

    fn validate_chain(
        &self,
        grant_id: GrantId,
        templates: Vec<DeadlineTemplate>,
    ) -> Result<ValidatedChain, ScheduleServiceError> {
        let catalog = self.store.fetch_anchor_catalog()?;
        let checked = validate(templates).and_then(|chain| {
            validate_against_catalog(&chain, &catalog)?;
            Ok(chain)
        });

        match checked {
            Ok(chain) => {
                info!(
                    "event=chain_validate module=service status=ok grant_id={} templates={}",
                    grant_id,
                    chain.len()
                );
                Ok(chain)
            }
            Err(err) => {
                warn!(
                    "event=chain_validate module=service status=error grant_id={} error={}",
                    grant_id, err
                );
                Err(err.into())
            }
        }
    }

    fn resolve_anchors(
        &self,
        grant_id: GrantId,
        project_id: ProjectId,
        chain: &ValidatedChain,
    ) -> RepoResult<AnchorResolution> {
        let mut grant_defaults = AnchorDates::new();
        for event_id in chain.anchor_event_ids() {
            if let Some(date) = self.store.fetch_grant_anchor_default(grant_id, event_id)? {
                grant_defaults.insert(event_id.to_string(), date);
            }
        }
        let overrides = self.store.fetch_project_anchor_overrides(project_id)?;

        let resolution = resolve_chain_anchors(chain, &grant_defaults, &overrides);
        for unresolved in &resolution.unresolved {
            warn!(
                "event=anchor_resolve module=service status=skipped project_id={} event_id={}",
                project_id, unresolved.event_id
            );
        }
        Ok(resolution)
    }
}

fn report_skipped(project_id: ProjectId, skipped: &[UnresolvedReferenceError]) {
    for entry in skipped {
        warn!(
            "event=deadline_skipped module=service status=skipped project_id={} template_id={} sequence_index={}",
            project_id, entry.template_id, entry.sequence_index
        );
    }
}
