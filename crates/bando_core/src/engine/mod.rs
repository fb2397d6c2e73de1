//! Deadline cascade engine.
//!
//! # Responsibility
//! - Turn a per-grant template chain into a per-project compliance calendar.
//! - Keep that calendar consistent when actual dates are recorded.
//!
//! # Invariants
//! - Every function here is synchronous and pure over its arguments; no I/O,
//!   no clock reads, no shared mutable state.
//! - Chains reach the calculator only through `validator::validate`.

pub mod anchor;
pub mod calculator;
pub mod recalc;
pub mod validator;
pub mod variance;
