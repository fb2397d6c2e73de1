//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls and pure engine runs into use-case level APIs.
//! - Keep FFI/CLI layers decoupled from storage details.

pub mod schedule_service;
