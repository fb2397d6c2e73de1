//! Core domain logic for grant deadline administration.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use engine::anchor::{resolve_anchor, UnresolvedAnchorError};
pub use engine::calculator::{
    compute, AnchorDates, PriorActuals, ScheduleComputation, UnresolvedReason,
    UnresolvedReferenceError,
};
pub use engine::recalc::{apply_actual, overlay_frozen, OverrideError};
pub use engine::validator::{validate, validate_against_catalog, ValidatedChain, ValidationError};
pub use engine::variance::{evaluate, Urgency, Variance};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::anchor::{AnchorEvent, AnchorEventId, AnchorOverride};
pub use model::grant::{Grant, GrantId, Project, ProjectId};
pub use model::instance::{DeadlineInstance, DeadlineStatus};
pub use model::template::{
    DeadlineCategory, DeadlineTemplate, OffsetUnit, Priority, Reference, TemplateId,
};
pub use repo::deadline_store::{DeadlineStore, SqliteDeadlineStore};
pub use repo::error::{RepoError, RepoResult};
pub use repo::grant_repo::{GrantRepository, SqliteGrantRepository};
pub use service::schedule_service::{
    ScheduleOutcome, ScheduleService, ScheduleServiceError, VarianceEntry,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
