use bando_core::db::open_db_in_memory;
use bando_core::{
    DeadlineStatus, DeadlineStore, DeadlineTemplate, Grant, GrantId, GrantRepository,
    OffsetUnit, OverrideError, Project, ProjectId, Reference, RepoError, ScheduleService,
    ScheduleServiceError, SqliteDeadlineStore, SqliteGrantRepository, UnresolvedReason, Urgency,
    ValidationError,
};
use chrono::NaiveDate;
use rusqlite::Connection;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn seed_grant(conn: &Connection) -> (GrantId, ProjectId) {
    let repo = SqliteGrantRepository::try_new(conn).unwrap();
    let grant = Grant::new("BND-2023-001", "Bando Innovazione PMI").unwrap();
    let grant_id = repo.create_grant(&grant).unwrap();
    let project = Project::new(grant_id, "Digitalizzazione magazzino").unwrap();
    let project_id = repo.create_project(&project).unwrap();
    repo.set_grant_anchor_default(grant_id, "pubblicazione_graduatoria", date(2023, 1, 1))
        .unwrap();
    (grant_id, project_id)
}

fn three_step_templates(grant_id: GrantId) -> Vec<DeadlineTemplate> {
    vec![
        DeadlineTemplate::new(
            grant_id,
            0,
            "Accettazione esiti",
            Reference::Anchor("pubblicazione_graduatoria".into()),
            30,
            OffsetUnit::Days,
        ),
        DeadlineTemplate::new(grant_id, 1, "Avvio", Reference::PriorDeadline(0), 60, OffsetUnit::Days),
        DeadlineTemplate::new(grant_id, 2, "SAL", Reference::PriorDeadline(1), 90, OffsetUnit::Days),
    ]
}

fn service(conn: &Connection) -> ScheduleService<SqliteDeadlineStore<'_>> {
    ScheduleService::new(SqliteDeadlineStore::try_new(conn).unwrap())
}

fn computed_dates(instances: &[bando_core::DeadlineInstance]) -> Vec<NaiveDate> {
    instances.iter().map(|instance| instance.computed_date).collect()
}

#[test]
fn generate_schedule_computes_and_persists_the_chain() {
    let conn = open_db_in_memory().unwrap();
    let (grant_id, project_id) = seed_grant(&conn);
    let service = service(&conn);
    service
        .save_template_chain(grant_id, three_step_templates(grant_id))
        .unwrap();

    let outcome = service.generate_schedule(grant_id, project_id).unwrap();
    assert_eq!(
        computed_dates(&outcome.instances),
        vec![date(2023, 1, 31), date(2023, 4, 1), date(2023, 6, 30)]
    );
    assert!(outcome.skipped.is_empty());
    assert!(outcome.unresolved_anchors.is_empty());

    let store = SqliteDeadlineStore::try_new(&conn).unwrap();
    assert_eq!(store.fetch_instances(project_id).unwrap(), outcome.instances);

    let again = service.generate_schedule(grant_id, project_id).unwrap();
    assert_eq!(again.instances, outcome.instances);
}

#[test]
fn project_anchor_date_wins_over_grant_default() {
    let conn = open_db_in_memory().unwrap();
    let (grant_id, project_id) = seed_grant(&conn);
    SqliteGrantRepository::try_new(&conn)
        .unwrap()
        .set_project_anchor_actual(project_id, "pubblicazione_graduatoria", date(2023, 1, 11))
        .unwrap();
    let service = service(&conn);
    service
        .save_template_chain(grant_id, three_step_templates(grant_id))
        .unwrap();

    let outcome = service.generate_schedule(grant_id, project_id).unwrap();
    assert_eq!(outcome.instances[0].computed_date, date(2023, 2, 10));
}

#[test]
fn record_actual_date_cascades_and_persists() {
    let conn = open_db_in_memory().unwrap();
    let (grant_id, project_id) = seed_grant(&conn);
    let service = service(&conn);
    service
        .save_template_chain(grant_id, three_step_templates(grant_id))
        .unwrap();
    service.generate_schedule(grant_id, project_id).unwrap();

    let outcome = service
        .record_actual_date(project_id, 0, date(2023, 2, 10))
        .unwrap();
    assert_eq!(outcome.instances[0].status, DeadlineStatus::ActualRecorded);
    assert_eq!(outcome.instances[0].computed_date, date(2023, 1, 31));
    assert_eq!(outcome.instances[1].computed_date, date(2023, 4, 11));
    assert_eq!(outcome.instances[2].computed_date, date(2023, 7, 10));

    let store = SqliteDeadlineStore::try_new(&conn).unwrap();
    assert_eq!(store.fetch_instances(project_id).unwrap(), outcome.instances);
    assert_eq!(
        store.fetch_recorded_actuals(project_id).unwrap().get(&0),
        Some(&date(2023, 2, 10))
    );

    let err = service
        .record_actual_date(project_id, 0, date(2023, 2, 11))
        .unwrap_err();
    assert!(matches!(
        err,
        ScheduleServiceError::Override(OverrideError::AlreadyRecorded { sequence_index: 0, .. })
    ));
}

#[test]
fn record_actual_date_without_generated_schedule_computes_it_first() {
    let conn = open_db_in_memory().unwrap();
    let (grant_id, project_id) = seed_grant(&conn);
    let service = service(&conn);
    service
        .save_template_chain(grant_id, three_step_templates(grant_id))
        .unwrap();

    let outcome = service
        .record_actual_date(project_id, 1, date(2023, 4, 5))
        .unwrap();
    assert_eq!(outcome.instances.len(), 3);
    assert_eq!(outcome.instances[1].actual_date, Some(date(2023, 4, 5)));
    assert_eq!(outcome.instances[2].computed_date, date(2023, 7, 4));
}

#[test]
fn record_actual_date_rejects_unknown_index_and_project() {
    let conn = open_db_in_memory().unwrap();
    let (grant_id, project_id) = seed_grant(&conn);
    let service = service(&conn);
    service
        .save_template_chain(grant_id, three_step_templates(grant_id))
        .unwrap();
    service.generate_schedule(grant_id, project_id).unwrap();

    assert!(matches!(
        service.record_actual_date(project_id, 7, date(2023, 2, 10)),
        Err(ScheduleServiceError::Override(OverrideError::UnknownSequenceIndex(7)))
    ));
    assert!(matches!(
        service.record_actual_date(uuid::Uuid::new_v4(), 0, date(2023, 2, 10)),
        Err(ScheduleServiceError::Repo(RepoError::NotFound { entity: "project", .. }))
    ));
}

#[test]
fn missing_anchor_is_reported_and_dependents_skipped() {
    let conn = open_db_in_memory().unwrap();
    let (grant_id, project_id) = seed_grant(&conn);
    let service = service(&conn);
    let mut templates = three_step_templates(grant_id);
    templates.push(DeadlineTemplate::new(
        grant_id,
        3,
        "Saldo",
        Reference::Anchor("conclusione_progetto".into()),
        60,
        OffsetUnit::Days,
    ));
    service.save_template_chain(grant_id, templates).unwrap();

    let outcome = service.generate_schedule(grant_id, project_id).unwrap();
    assert_eq!(outcome.instances.len(), 3);
    assert_eq!(outcome.unresolved_anchors.len(), 1);
    assert_eq!(outcome.unresolved_anchors[0].event_id, "conclusione_progetto");
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(
        outcome.skipped[0].reason,
        UnresolvedReason::MissingAnchor("conclusione_progetto".into())
    );

    let err = service
        .record_actual_date(project_id, 3, date(2024, 1, 1))
        .unwrap_err();
    assert!(matches!(
        err,
        ScheduleServiceError::Override(OverrideError::Unresolved(_))
    ));
}

#[test]
fn generate_schedule_rejects_project_of_another_grant() {
    let conn = open_db_in_memory().unwrap();
    let (_, project_id) = seed_grant(&conn);
    let repo = SqliteGrantRepository::try_new(&conn).unwrap();
    let other = repo
        .create_grant(&Grant::new("BND-2023-002", "Bando Export").unwrap())
        .unwrap();

    let err = service(&conn).generate_schedule(other, project_id).unwrap_err();
    assert!(matches!(
        err,
        ScheduleServiceError::ProjectGrantMismatch { requested, .. } if requested == other
    ));
}

#[test]
fn invalid_chain_is_not_stored() {
    let conn = open_db_in_memory().unwrap();
    let (grant_id, _) = seed_grant(&conn);
    let service = service(&conn);
    service
        .save_template_chain(grant_id, three_step_templates(grant_id))
        .unwrap();

    let mut broken = three_step_templates(grant_id);
    broken[1].reference = Reference::PriorDeadline(1);
    assert!(matches!(
        service.save_template_chain(grant_id, broken),
        Err(ScheduleServiceError::Validation(
            ValidationError::ForwardOrSelfReference { .. }
        ))
    ));

    let unknown_anchor = vec![DeadlineTemplate::new(
        grant_id,
        0,
        "Firma",
        Reference::Anchor("firma_convenzione".into()),
        10,
        OffsetUnit::Days,
    )];
    assert!(matches!(
        service.save_template_chain(grant_id, unknown_anchor),
        Err(ScheduleServiceError::Validation(
            ValidationError::UnknownAnchorEvent { .. }
        ))
    ));

    let foreign = three_step_templates(uuid::Uuid::new_v4());
    assert!(matches!(
        service.save_template_chain(grant_id, foreign),
        Err(ScheduleServiceError::Validation(
            ValidationError::ForeignTemplate { .. }
        ))
    ));

    let store = SqliteDeadlineStore::try_new(&conn).unwrap();
    let stored = store.fetch_templates(grant_id).unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[1].reference, Reference::PriorDeadline(0));
}

#[test]
fn recorded_actuals_survive_chain_replacement() {
    let conn = open_db_in_memory().unwrap();
    let (grant_id, project_id) = seed_grant(&conn);
    let service = service(&conn);
    service
        .save_template_chain(grant_id, three_step_templates(grant_id))
        .unwrap();
    service.generate_schedule(grant_id, project_id).unwrap();
    service
        .record_actual_date(project_id, 0, date(2023, 2, 10))
        .unwrap();

    let mut revised = three_step_templates(grant_id);
    revised[2].offset_amount = 3;
    revised[2].offset_unit = OffsetUnit::Months;
    service.save_template_chain(grant_id, revised).unwrap();

    let store = SqliteDeadlineStore::try_new(&conn).unwrap();
    assert!(store.fetch_instances(project_id).unwrap().is_empty());

    let outcome = service.generate_schedule(grant_id, project_id).unwrap();
    assert_eq!(outcome.instances[0].actual_date, Some(date(2023, 2, 10)));
    assert_eq!(outcome.instances[1].computed_date, date(2023, 4, 11));
    assert_eq!(outcome.instances[2].computed_date, date(2023, 7, 10));
}

#[test]
fn variance_report_reevaluates_status_against_today() {
    let conn = open_db_in_memory().unwrap();
    let (grant_id, project_id) = seed_grant(&conn);
    let service = service(&conn);
    service
        .save_template_chain(grant_id, three_step_templates(grant_id))
        .unwrap();
    service.generate_schedule(grant_id, project_id).unwrap();
    service
        .record_actual_date(project_id, 0, date(2023, 2, 5))
        .unwrap();

    let report = service.get_variance(project_id, date(2023, 4, 8)).unwrap();
    assert_eq!(report.len(), 3);

    assert_eq!(report[0].variance.late_by_days, Some(5));
    assert_eq!(report[0].instance.status, DeadlineStatus::ActualRecorded);

    // T1: Feb 5 + 60 days = Apr 6, two days ago.
    assert_eq!(report[1].instance.computed_date, date(2023, 4, 6));
    assert_eq!(report[1].variance.days_remaining, Some(-2));
    assert_eq!(report[1].instance.status, DeadlineStatus::Overdue);
    assert_eq!(report[1].variance.urgency, Some(Urgency::Urgent));

    assert_eq!(report[2].variance.urgency, Some(Urgency::Normal));

    let store = SqliteDeadlineStore::try_new(&conn).unwrap();
    assert_eq!(
        store.fetch_instances(project_id).unwrap()[1].status,
        DeadlineStatus::Planned
    );
}

#[test]
fn deleting_a_project_removes_its_schedule() {
    let conn = open_db_in_memory().unwrap();
    let (grant_id, project_id) = seed_grant(&conn);
    let service = service(&conn);
    service
        .save_template_chain(grant_id, three_step_templates(grant_id))
        .unwrap();
    service.generate_schedule(grant_id, project_id).unwrap();
    service
        .record_actual_date(project_id, 0, date(2023, 2, 10))
        .unwrap();

    SqliteGrantRepository::try_new(&conn)
        .unwrap()
        .delete_project(project_id)
        .unwrap();

    for table in ["deadline_instances", "deadline_actuals", "project_anchor_overrides"] {
        let rows: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE project_id = ?1;"),
                [project_id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 0, "{table} still has rows");
    }
    assert!(matches!(
        service.get_variance(project_id, date(2023, 3, 1)),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn regeneration_keeps_recorded_deadlines_frozen() {
    let conn = open_db_in_memory().unwrap();
    let (grant_id, project_id) = seed_grant(&conn);
    let service = service(&conn);
    service
        .save_template_chain(grant_id, three_step_templates(grant_id))
        .unwrap();
    service.generate_schedule(grant_id, project_id).unwrap();
    let recorded = service
        .record_actual_date(project_id, 0, date(2023, 2, 10))
        .unwrap();
    let before = service.get_variance(project_id, date(2023, 3, 1)).unwrap();
    assert_eq!(before[0].variance.late_by_days, Some(10));

    SqliteGrantRepository::try_new(&conn)
        .unwrap()
        .set_grant_anchor_default(grant_id, "pubblicazione_graduatoria", date(2023, 1, 20))
        .unwrap();
    let regenerated = service.generate_schedule(grant_id, project_id).unwrap();

    assert_eq!(regenerated.instances[0], recorded.instances[0]);
    assert_eq!(regenerated.instances[0].computed_date, date(2023, 1, 31));
    assert_eq!(regenerated.instances[1].computed_date, date(2023, 4, 11));
    assert!(regenerated.skipped.is_empty());

    let after = service.get_variance(project_id, date(2023, 3, 1)).unwrap();
    assert_eq!(after[0].variance.late_by_days, Some(10));
    assert_eq!(after[0].instance, before[0].instance);
}

#[test]
fn deadline_skipped_at_generation_can_be_recorded_once_dated() {
    let conn = open_db_in_memory().unwrap();
    let (grant_id, project_id) = seed_grant(&conn);
    let service = service(&conn);
    service
        .save_template_chain(
            grant_id,
            vec![
                DeadlineTemplate::new(
                    grant_id,
                    0,
                    "Accettazione esiti",
                    Reference::Anchor("pubblicazione_graduatoria".into()),
                    30,
                    OffsetUnit::Days,
                ),
                DeadlineTemplate::new(
                    grant_id,
                    1,
                    "Avvio",
                    Reference::Anchor("avvio_progetto".into()),
                    10,
                    OffsetUnit::Days,
                ),
            ],
        )
        .unwrap();

    let generated = service.generate_schedule(grant_id, project_id).unwrap();
    assert_eq!(generated.instances.len(), 1);
    assert_eq!(generated.skipped.len(), 1);

    SqliteGrantRepository::try_new(&conn)
        .unwrap()
        .set_project_anchor_actual(project_id, "avvio_progetto", date(2023, 3, 1))
        .unwrap();
    let outcome = service
        .record_actual_date(project_id, 1, date(2023, 3, 12))
        .unwrap();

    assert_eq!(outcome.instances.len(), 2);
    assert_eq!(outcome.instances[1].computed_date, date(2023, 3, 11));
    assert_eq!(outcome.instances[1].actual_date, Some(date(2023, 3, 12)));
    assert_eq!(outcome.instances[1].status, DeadlineStatus::ActualRecorded);
    assert!(outcome.skipped.is_empty());
}
