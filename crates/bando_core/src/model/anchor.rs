//! Anchor event catalog model.
//!
//! # Responsibility
//! - Define named anchor events usable as the root reference of a deadline chain.
//! - Carry the per-project anchor override shape (grant planned date + project
//!   actual date).
//!
//! # Invariants
//! - Anchor ids are lowercase snake-case slugs and never change once referenced.
//! - Catalog entries are immutable; standard entries are seeded by migration.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static ANCHOR_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid anchor id regex"));

/// Stable slug identifying one anchor event (e.g. `avvio_progetto`).
pub type AnchorEventId = String;

/// Ranking publication. Also the fallback anchor most grants default to.
pub const PUBBLICAZIONE_GRADUATORIA: &str = "pubblicazione_graduatoria";
/// Project start.
pub const AVVIO_PROGETTO: &str = "avvio_progetto";

/// Standard catalog seeded by the initial migration: `(id, name)`.
pub const STANDARD_ANCHOR_EVENTS: &[(&str, &str)] = &[
    ("pubblicazione_bando", "Pubblicazione Bando"),
    (PUBBLICAZIONE_GRADUATORIA, "Pubblicazione Graduatoria"),
    ("accettazione_esiti", "Accettazione Esiti"),
    ("decreto_concessione", "Decreto Concessione"),
    (AVVIO_PROGETTO, "Avvio Progetto"),
    ("conclusione_progetto", "Conclusione Progetto"),
];

/// Validation failures for catalog entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorEventError {
    /// Id is not a lowercase snake-case slug.
    InvalidId(String),
    /// Display name is blank after trim.
    BlankName,
}

impl Display for AnchorEventError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(id) => write!(
                f,
                "anchor event id `{id}` must match ^[a-z][a-z0-9_]*$"
            ),
            Self::BlankName => write!(f, "anchor event name must not be blank"),
        }
    }
}

impl Error for AnchorEventError {}

/// One named occurrence a deadline chain can be rooted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorEvent {
    pub id: AnchorEventId,
    pub name: String,
    pub description: Option<String>,
    /// Seeded catalog entry rather than an administrator addition.
    pub is_standard: bool,
}

impl AnchorEvent {
    /// Creates a non-standard catalog entry after validating id and name.
    pub fn custom(
        id: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<Self, AnchorEventError> {
        let event = Self {
            id: id.into(),
            name: name.into(),
            description,
            is_standard: false,
        };
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), AnchorEventError> {
        if !ANCHOR_ID_RE.is_match(&self.id) {
            return Err(AnchorEventError::InvalidId(self.id.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(AnchorEventError::BlankName);
        }
        Ok(())
    }
}

/// Anchor dates for one project: the grant's planned date and the project's
/// recorded actual date, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorOverride {
    pub event_id: AnchorEventId,
    pub planned_date: Option<NaiveDate>,
    pub actual_date: Option<NaiveDate>,
}

impl AnchorOverride {
    /// Actual date when recorded, planned date otherwise.
    pub fn effective_date(&self) -> Option<NaiveDate> {
        self.actual_date.or(self.planned_date)
    }
}
