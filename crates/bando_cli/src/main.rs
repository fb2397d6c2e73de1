//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `bando_core` linkage.
//! - Print a project's deadline variance report from a schedule database.
//!
//! Usage: `bando_cli [db_path] [project_id [YYYY-MM-DD]]`. Without a project
//! id only the linkage check runs. `db_path` falls back to `BANDO_DB_PATH`.

use bando_core::db::open_db;
use bando_core::{ScheduleService, SqliteDeadlineStore};
use chrono::NaiveDate;
use std::process::ExitCode;
use uuid::Uuid;

fn main() -> ExitCode {
    println!("bando_core ping={}", bando_core::ping());
    println!("bando_core version={}", bando_core::core_version());

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let (db_path, rest) = match args.split_first() {
        Some((first, rest)) if Uuid::parse_str(first).is_err() => (Some(first.clone()), rest),
        _ => (std::env::var("BANDO_DB_PATH").ok(), args),
    };
    let Some(project_arg) = rest.first() else {
        return Ok(());
    };
    let db_path = db_path.ok_or("no database path given and BANDO_DB_PATH is unset")?;

    let project_id = Uuid::parse_str(project_arg)
        .map_err(|_| format!("project id is not a valid UUID: `{project_arg}`"))?;
    let today = match rest.get(1) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| format!("date must be YYYY-MM-DD, got `{raw}`"))?,
        None => chrono::Local::now().date_naive(),
    };

    let conn = open_db(&db_path).map_err(|err| err.to_string())?;
    let store = SqliteDeadlineStore::try_new(&conn).map_err(|err| err.to_string())?;
    let report = ScheduleService::new(store)
        .get_variance(project_id, today)
        .map_err(|err| err.to_string())?;

    println!("project={project_id} as_of={today} deadlines={}", report.len());
    for entry in report {
        let instance = &entry.instance;
        let detail = match (entry.variance.late_by_days, entry.variance.days_remaining) {
            (Some(late), _) => format!("late_by_days={late}"),
            (None, Some(remaining)) => format!("days_remaining={remaining}"),
            (None, None) => String::new(),
        };
        println!(
            "#{} computed={} actual={} status={:?} {}",
            instance.sequence_index,
            instance.computed_date,
            instance
                .actual_date
                .map_or_else(|| "-".to_string(), |date| date.to_string()),
            instance.status,
            detail
        );
    }
    Ok(())
}
