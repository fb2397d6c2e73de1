//! Flutter-facing bridge over `bando_core`.

pub mod api;
