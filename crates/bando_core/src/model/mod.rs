//! Domain model for grant deadline administration.
//!
//! # Responsibility
//! - Define grants, projects, the anchor catalog, deadline templates and the
//!   per-project deadline instances derived from them.
//!
//! # Invariants
//! - Dates are calendar dates (`chrono::NaiveDate`), never timestamps.
//! - Offset units and references are typed; nothing is parsed from strings
//!   at use sites.

pub mod anchor;
pub mod grant;
pub mod instance;
pub mod template;
