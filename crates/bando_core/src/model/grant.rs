//! Grant ("bando") and funded project records.
//!
//! # Responsibility
//! - Define the owners of template chains (grants) and deadline instances
//!   (projects).
//!
//! # Invariants
//! - Grant codes follow `BND-<year>-<number>`.
//! - A project belongs to exactly one grant for its whole lifetime.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static GRANT_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^BND-\d{4}-\d{3,}$").expect("valid grant code regex"));

pub type GrantId = Uuid;
pub type ProjectId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantValidationError {
    InvalidCode(String),
    BlankName,
    BlankProjectTitle,
}

impl Display for GrantValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCode(code) => {
                write!(f, "grant code `{code}` must look like BND-2024-001")
            }
            Self::BlankName => write!(f, "grant name must not be blank"),
            Self::BlankProjectTitle => write!(f, "project title must not be blank"),
        }
    }
}

impl Error for GrantValidationError {}

/// External funding call owning a reusable deadline chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub id: GrantId,
    pub code: String,
    pub name: String,
    pub funding_body: Option<String>,
}

impl Grant {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Result<Self, GrantValidationError> {
        let grant = Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            funding_body: None,
        };
        grant.validate()?;
        Ok(grant)
    }

    pub fn validate(&self) -> Result<(), GrantValidationError> {
        if !GRANT_CODE_RE.is_match(&self.code) {
            return Err(GrantValidationError::InvalidCode(self.code.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(GrantValidationError::BlankName);
        }
        Ok(())
    }
}

/// Funded instance of a grant for one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub grant_id: GrantId,
    pub title: String,
    pub client_name: Option<String>,
}

impl Project {
    pub fn new(grant_id: GrantId, title: impl Into<String>) -> Result<Self, GrantValidationError> {
        let project = Self {
            id: Uuid::new_v4(),
            grant_id,
            title: title.into(),
            client_name: None,
        };
        project.validate()?;
        Ok(project)
    }

    pub fn validate(&self) -> Result<(), GrantValidationError> {
        if self.title.trim().is_empty() {
            return Err(GrantValidationError::BlankProjectTitle);
        }
        Ok(())
    }
}
