//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the deadline schedule use-cases to Dart via FRB.
//! - Translate core types into flat, string-based response envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Ids cross the boundary as UUID strings, dates as `YYYY-MM-DD`.

use bando_core::db::open_db;
use bando_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    DeadlineInstance, DeadlineStatus, ScheduleOutcome, ScheduleService, SqliteDeadlineStore,
    Urgency, VarianceEntry,
};
use chrono::NaiveDate;
use log::warn;
use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;

const SCHEDULE_DB_FILE_NAME: &str = "bando_scadenze.sqlite3";
const DATE_FORMAT: &str = "%Y-%m-%d";
static SCHEDULE_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// One dated deadline of a project schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineItem {
    pub template_id: String,
    pub sequence_index: u32,
    /// `YYYY-MM-DD`.
    pub computed_date: String,
    pub actual_date: Option<String>,
    /// `planned|actual_recorded|overdue`.
    pub status: String,
}

/// Response envelope for schedule generation and actual-date recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleResponse {
    pub ok: bool,
    pub items: Vec<DeadlineItem>,
    /// Sequence indices left out because a reference could not be dated.
    pub skipped_indices: Vec<u32>,
    /// Anchor events with no project date and no grant default.
    pub unresolved_anchors: Vec<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl ScheduleResponse {
    fn from_outcome(outcome: ScheduleOutcome, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            items: outcome.instances.iter().map(to_deadline_item).collect(),
            skipped_indices: outcome
                .skipped
                .iter()
                .map(|skipped| skipped.sequence_index)
                .collect(),
            unresolved_anchors: outcome
                .unresolved_anchors
                .into_iter()
                .map(|anchor| anchor.event_id)
                .collect(),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            items: Vec::new(),
            skipped_indices: Vec::new(),
            unresolved_anchors: Vec::new(),
            message: message.into(),
        }
    }
}

/// Variance row for one deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarianceItem {
    pub deadline: DeadlineItem,
    pub late_by_days: Option<i64>,
    pub days_remaining: Option<i64>,
    /// `normal|imminent|urgent`; absent once an actual date is recorded.
    pub urgency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarianceResponse {
    pub ok: bool,
    pub items: Vec<VarianceItem>,
    pub message: String,
}

/// Generates (or regenerates) the deadline schedule of a project.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Skipped deadlines do not fail the call; they are listed in the envelope.
#[flutter_rust_bridge::frb(sync)]
pub fn schedule_generate(grant_id: String, project_id: String) -> ScheduleResponse {
    let result = parse_id(&grant_id, "grant_id").and_then(|grant_id| {
        let project_id = parse_id(&project_id, "project_id")?;
        with_schedule_service(|service| {
            service
                .generate_schedule(grant_id, project_id)
                .map_err(|err| err.to_string())
        })
    });

    match result {
        Ok(outcome) => {
            let message = format!("Generated {} deadline(s).", outcome.instances.len());
            ScheduleResponse::from_outcome(outcome, message)
        }
        Err(err) => schedule_failure("schedule_generate", err),
    }
}

/// Records the actual date of one deadline and cascades it downstream.
///
/// Input semantics:
/// - `actual_date`: `YYYY-MM-DD`.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - A deadline can be recorded once; later calls return `ok=false`.
#[flutter_rust_bridge::frb(sync)]
pub fn schedule_record_actual(
    project_id: String,
    sequence_index: u32,
    actual_date: String,
) -> ScheduleResponse {
    let result = parse_id(&project_id, "project_id").and_then(|project_id| {
        let actual_date = parse_date(&actual_date, "actual_date")?;
        with_schedule_service(|service| {
            service
                .record_actual_date(project_id, sequence_index, actual_date)
                .map_err(|err| err.to_string())
        })
    });

    match result {
        Ok(outcome) => ScheduleResponse::from_outcome(outcome, "Actual date recorded."),
        Err(err) => schedule_failure("schedule_record_actual", err),
    }
}

/// Planned-vs-actual report for a project.
///
/// Input semantics:
/// - `today`: `YYYY-MM-DD`; `None` uses the local calendar date.
///
/// # FFI contract
/// - Sync call, DB-backed execution, read-only.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn schedule_variance(project_id: String, today: Option<String>) -> VarianceResponse {
    let result = parse_id(&project_id, "project_id").and_then(|project_id| {
        let today = today
            .as_deref()
            .map(|raw| parse_date(raw, "today"))
            .transpose()?;
        with_schedule_service(|service| {
            let report = match today {
                Some(today) => service.get_variance(project_id, today),
                None => service.get_variance_today(project_id),
            };
            report.map_err(|err| err.to_string())
        })
    });

    match result {
        Ok(entries) => VarianceResponse {
            ok: true,
            message: format!("Evaluated {} deadline(s).", entries.len()),
            items: entries.iter().map(to_variance_item).collect(),
        },
        Err(err) => {
            warn!("event=ffi_call module=ffi status=error call=schedule_variance error={err}");
            VarianceResponse {
                ok: false,
                items: Vec::new(),
                message: format!("schedule_variance failed: {err}"),
            }
        }
    }
}

fn schedule_failure(call: &str, err: String) -> ScheduleResponse {
    warn!("event=ffi_call module=ffi status=error call={call} error={err}");
    ScheduleResponse::failure(format!("{call} failed: {err}"))
}

fn resolve_schedule_db_path() -> PathBuf {
    SCHEDULE_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("BANDO_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(SCHEDULE_DB_FILE_NAME)
        })
        .clone()
}

fn with_schedule_service<T>(
    f: impl FnOnce(&ScheduleService<SqliteDeadlineStore<'_>>) -> Result<T, String>,
) -> Result<T, String> {
    let db_path = resolve_schedule_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("schedule DB open failed: {err}"))?;
    let store = SqliteDeadlineStore::try_new(&conn)
        .map_err(|err| format!("schedule store init failed: {err}"))?;
    let service = ScheduleService::new(store);
    f(&service)
}

fn parse_id(raw: &str, field: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("{field} is not a valid UUID: `{raw}`"))
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| format!("{field} must be YYYY-MM-DD, got `{raw}`"))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn to_deadline_item(instance: &DeadlineInstance) -> DeadlineItem {
    DeadlineItem {
        template_id: instance.template_id.to_string(),
        sequence_index: instance.sequence_index,
        computed_date: format_date(instance.computed_date),
        actual_date: instance.actual_date.map(format_date),
        status: status_label(instance.status).to_string(),
    }
}

fn to_variance_item(entry: &VarianceEntry) -> VarianceItem {
    VarianceItem {
        deadline: to_deadline_item(&entry.instance),
        late_by_days: entry.variance.late_by_days,
        days_remaining: entry.variance.days_remaining,
        urgency: entry
            .variance
            .urgency
            .map(|urgency| urgency_label(urgency).to_string()),
    }
}

fn status_label(status: DeadlineStatus) -> &'static str {
    match status {
        DeadlineStatus::Planned => "planned",
        DeadlineStatus::ActualRecorded => "actual_recorded",
        DeadlineStatus::Overdue => "overdue",
    }
}

fn urgency_label(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Normal => "normal",
        Urgency::Imminent => "imminent",
        Urgency::Urgent => "urgent",
    }
}
