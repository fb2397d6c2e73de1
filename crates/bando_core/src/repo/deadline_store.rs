//! Deadline persistence collaborator and its SQLite implementation.
//!
//! # Responsibility
//! - Load everything the deadline engine consumes (templates, catalog,
//!   anchor dates, recorded actuals, persisted instances).
//! - Store engine output as an explicit side effect, never during computation.
//!
//! # Invariants
//! - `replace_templates` and `persist_instances` are all-or-nothing.
//! - Recorded actual dates are insert-only; persisting never overwrites one.
//! - Read paths reject rows that do not map onto the typed model.

use crate::db::ensure_schema_ready;
use crate::engine::calculator::{AnchorDates, PriorActuals};
use crate::engine::validator::ValidatedChain;
use crate::model::anchor::AnchorEvent;
use crate::model::grant::{GrantId, ProjectId};
use crate::model::instance::{DeadlineInstance, DeadlineStatus};
use crate::model::template::{
    DeadlineCategory, DeadlineTemplate, OffsetUnit, Priority, Reference,
};
use crate::repo::error::{bool_to_int, parse_bool, parse_index, parse_uuid, RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

const TEMPLATE_SELECT_SQL: &str = "SELECT
    id,
    grant_id,
    sequence_index,
    name,
    description,
    offset_amount,
    offset_unit,
    reference_kind,
    reference_anchor,
    reference_index,
    category,
    priority,
    mandatory,
    suggested_owner,
    notes
FROM deadline_templates";

/// Storage operations the deadline engine consumes.
pub trait DeadlineStore {
    /// Templates of one grant, sorted by sequence index (not yet validated).
    fn fetch_templates(&self, grant_id: GrantId) -> RepoResult<Vec<DeadlineTemplate>>;
    fn fetch_anchor_catalog(&self) -> RepoResult<Vec<AnchorEvent>>;
    fn fetch_grant_anchor_default(
        &self,
        grant_id: GrantId,
        event_id: &str,
    ) -> RepoResult<Option<NaiveDate>>;
    fn fetch_project_anchor_overrides(&self, project_id: ProjectId) -> RepoResult<AnchorDates>;
    fn fetch_recorded_actuals(&self, project_id: ProjectId) -> RepoResult<PriorActuals>;
    /// Replaces the project's instance set and records any new actual dates.
    fn persist_instances(
        &self,
        project_id: ProjectId,
        instances: &[DeadlineInstance],
    ) -> RepoResult<()>;
    /// Owning grant of a project; `NotFound` when the project does not exist.
    fn fetch_project_grant(&self, project_id: ProjectId) -> RepoResult<GrantId>;
    /// Persisted instances of a project, sorted by sequence index.
    fn fetch_instances(&self, project_id: ProjectId) -> RepoResult<Vec<DeadlineInstance>>;
    /// Replaces a grant's whole template chain.
    fn replace_templates(&self, grant_id: GrantId, chain: &ValidatedChain) -> RepoResult<()>;
}

/// SQLite-backed deadline store.
pub struct SqliteDeadlineStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDeadlineStore<'conn> {
    /// Constructs a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    fn ensure_grant_exists(&self, grant_id: GrantId) -> RepoResult<()> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM grants WHERE id = ?1);",
            [grant_id.to_string()],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(RepoError::not_found("grant", grant_id))
        }
    }
}

impl DeadlineStore for SqliteDeadlineStore<'_> {
    fn fetch_templates(&self, grant_id: GrantId) -> RepoResult<Vec<DeadlineTemplate>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TEMPLATE_SELECT_SQL}
             WHERE grant_id = ?1
             ORDER BY sequence_index ASC;"
        ))?;
        let mut rows = stmt.query([grant_id.to_string()])?;
        let mut templates = Vec::new();
        while let Some(row) = rows.next()? {
            templates.push(parse_template_row(row)?);
        }
        Ok(templates)
    }

    fn fetch_anchor_catalog(&self) -> RepoResult<Vec<AnchorEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, is_standard
             FROM anchor_events
             ORDER BY is_standard DESC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut catalog = Vec::new();
        while let Some(row) = rows.next()? {
            catalog.push(AnchorEvent {
                id: row.get("id")?,
                name: row.get("name")?,
                description: row.get("description")?,
                is_standard: parse_bool(row.get("is_standard")?, "anchor_events.is_standard")?,
            });
        }
        Ok(catalog)
    }

    fn fetch_grant_anchor_default(
        &self,
        grant_id: GrantId,
        event_id: &str,
    ) -> RepoResult<Option<NaiveDate>> {
        let date = self
            .conn
            .query_row(
                "SELECT planned_date
                 FROM grant_anchor_defaults
                 WHERE grant_id = ?1 AND event_id = ?2;",
                params![grant_id.to_string(), event_id],
                |row| row.get::<_, NaiveDate>(0),
            )
            .optional()?;
        Ok(date)
    }

    fn fetch_project_anchor_overrides(&self, project_id: ProjectId) -> RepoResult<AnchorDates> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, actual_date
             FROM project_anchor_overrides
             WHERE project_id = ?1;",
        )?;
        let rows = stmt.query_map([project_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, NaiveDate>(1)?))
        })?;

        let mut overrides = AnchorDates::new();
        for row in rows {
            let (event_id, date) = row?;
            overrides.insert(event_id, date);
        }
        Ok(overrides)
    }

    fn fetch_recorded_actuals(&self, project_id: ProjectId) -> RepoResult<PriorActuals> {
        let mut stmt = self.conn.prepare(
            "SELECT sequence_index, actual_date
             FROM deadline_actuals
             WHERE project_id = ?1;",
        )?;
        let mut rows = stmt.query([project_id.to_string()])?;
        let mut actuals = PriorActuals::new();
        while let Some(row) = rows.next()? {
            let index = parse_index(row.get(0)?, "deadline_actuals.sequence_index")?;
            actuals.insert(index, row.get(1)?);
        }
        Ok(actuals)
    }

    fn persist_instances(
        &self,
        project_id: ProjectId,
        instances: &[DeadlineInstance],
    ) -> RepoResult<()> {
        self.fetch_project_grant(project_id)?;
        let project = project_id.to_string();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM deadline_instances WHERE project_id = ?1;",
            [project.as_str()],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO deadline_instances (
                    project_id,
                    sequence_index,
                    template_id,
                    computed_date,
                    actual_date,
                    status
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            )?;
            let mut record_actual = tx.prepare(
                "INSERT INTO deadline_actuals (project_id, sequence_index, actual_date)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (project_id, sequence_index) DO NOTHING;",
            )?;

            for instance in instances {
                insert.execute(params![
                    project.as_str(),
                    instance.sequence_index,
                    instance.template_id.to_string(),
                    instance.computed_date,
                    instance.actual_date,
                    status_to_db(instance.status),
                ])?;
                if let Some(actual) = instance.actual_date {
                    record_actual.execute(params![
                        project.as_str(),
                        instance.sequence_index,
                        actual
                    ])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn fetch_project_grant(&self, project_id: ProjectId) -> RepoResult<GrantId> {
        let grant_text = self
            .conn
            .query_row(
                "SELECT grant_id FROM projects WHERE id = ?1;",
                [project_id.to_string()],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .ok_or_else(|| RepoError::not_found("project", project_id))?;
        parse_uuid(&grant_text, "projects.grant_id")
    }

    fn fetch_instances(&self, project_id: ProjectId) -> RepoResult<Vec<DeadlineInstance>> {
        let mut stmt = self.conn.prepare(
            "SELECT template_id, sequence_index, computed_date, actual_date, status
             FROM deadline_instances
             WHERE project_id = ?1
             ORDER BY sequence_index ASC;",
        )?;
        let mut rows = stmt.query([project_id.to_string()])?;
        let mut instances = Vec::new();
        while let Some(row) = rows.next()? {
            instances.push(parse_instance_row(row)?);
        }
        Ok(instances)
    }

    fn replace_templates(&self, grant_id: GrantId, chain: &ValidatedChain) -> RepoResult<()> {
        self.ensure_grant_exists(grant_id)?;
        if let Some(foreign) = chain.grant_id().filter(|owner| *owner != grant_id) {
            return Err(RepoError::InvalidData(format!(
                "chain of grant {foreign} cannot be stored under grant {grant_id}"
            )));
        }

        let grant = grant_id.to_string();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM deadline_templates WHERE grant_id = ?1;",
            [grant.as_str()],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO deadline_templates (
                    id,
                    grant_id,
                    sequence_index,
                    name,
                    description,
                    offset_amount,
                    offset_unit,
                    reference_kind,
                    reference_anchor,
                    reference_index,
                    category,
                    priority,
                    mandatory,
                    suggested_owner,
                    notes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15);",
            )?;
            for template in chain.templates() {
                let (reference_kind, reference_anchor, reference_index) =
                    reference_to_db(&template.reference);
                insert.execute(params![
                    template.id.to_string(),
                    grant.as_str(),
                    template.sequence_index,
                    template.name.as_str(),
                    template.description.as_str(),
                    template.offset_amount,
                    offset_unit_to_db(template.offset_unit),
                    reference_kind,
                    reference_anchor,
                    reference_index,
                    category_to_db(template.category),
                    priority_to_db(template.priority),
                    bool_to_int(template.mandatory),
                    template.suggested_owner.as_deref(),
                    template.notes.as_deref(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn parse_template_row(row: &Row<'_>) -> RepoResult<DeadlineTemplate> {
    let id_text: String = row.get("id")?;
    let grant_text: String = row.get("grant_id")?;
    let unit_text: String = row.get("offset_unit")?;
    let category_text: String = row.get("category")?;
    let priority_text: String = row.get("priority")?;

    let reference = parse_reference(
        &row.get::<_, String>("reference_kind")?,
        row.get("reference_anchor")?,
        row.get("reference_index")?,
    )?;

    Ok(DeadlineTemplate {
        id: parse_uuid(&id_text, "deadline_templates.id")?,
        grant_id: parse_uuid(&grant_text, "deadline_templates.grant_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        offset_amount: row.get("offset_amount")?,
        offset_unit: parse_offset_unit(&unit_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid offset unit `{unit_text}` in deadline_templates.offset_unit"
            ))
        })?,
        reference,
        category: parse_category(&category_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid category `{category_text}` in deadline_templates.category"
            ))
        })?,
        priority: parse_priority(&priority_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid priority `{priority_text}` in deadline_templates.priority"
            ))
        })?,
        mandatory: parse_bool(row.get("mandatory")?, "deadline_templates.mandatory")?,
        sequence_index: parse_index(
            row.get("sequence_index")?,
            "deadline_templates.sequence_index",
        )?,
        suggested_owner: row.get("suggested_owner")?,
        notes: row.get("notes")?,
    })
}

fn parse_instance_row(row: &Row<'_>) -> RepoResult<DeadlineInstance> {
    let template_text: String = row.get("template_id")?;
    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in deadline_instances.status"
        ))
    })?;
    let actual_date: Option<NaiveDate> = row.get("actual_date")?;
    if actual_date.is_some() != (status == DeadlineStatus::ActualRecorded) {
        return Err(RepoError::InvalidData(format!(
            "status `{status_text}` disagrees with actual_date in deadline_instances"
        )));
    }

    Ok(DeadlineInstance {
        template_id: parse_uuid(&template_text, "deadline_instances.template_id")?,
        sequence_index: parse_index(
            row.get("sequence_index")?,
            "deadline_instances.sequence_index",
        )?,
        computed_date: row.get("computed_date")?,
        actual_date,
        status,
    })
}

fn reference_to_db(reference: &Reference) -> (&'static str, Option<&str>, Option<u32>) {
    match reference {
        Reference::Anchor(event_id) => ("anchor", Some(event_id.as_str()), None),
        Reference::PriorDeadline(index) => ("prior_deadline", None, Some(*index)),
    }
}

fn parse_reference(
    kind: &str,
    anchor: Option<String>,
    index: Option<i64>,
) -> RepoResult<Reference> {
    match (kind, anchor, index) {
        ("anchor", Some(event_id), None) => Ok(Reference::Anchor(event_id)),
        ("prior_deadline", None, Some(index)) => Ok(Reference::PriorDeadline(parse_index(
            index,
            "deadline_templates.reference_index",
        )?)),
        (other, _, _) => Err(RepoError::InvalidData(format!(
            "inconsistent reference of kind `{other}` in deadline_templates"
        ))),
    }
}

fn offset_unit_to_db(unit: OffsetUnit) -> &'static str {
    match unit {
        OffsetUnit::Days => "days",
        OffsetUnit::Months => "months",
    }
}

fn parse_offset_unit(value: &str) -> Option<OffsetUnit> {
    match value {
        "days" => Some(OffsetUnit::Days),
        "months" => Some(OffsetUnit::Months),
        _ => None,
    }
}

fn category_to_db(category: DeadlineCategory) -> &'static str {
    match category {
        DeadlineCategory::Acceptance => "acceptance",
        DeadlineCategory::Start => "start",
        DeadlineCategory::ProgressReport => "progress_report",
        DeadlineCategory::FinalPayment => "final_payment",
        DeadlineCategory::Reporting => "reporting",
        DeadlineCategory::Communication => "communication",
        DeadlineCategory::Extension => "extension",
        DeadlineCategory::ProjectClosure => "project_closure",
    }
}

fn parse_category(value: &str) -> Option<DeadlineCategory> {
    match value {
        "acceptance" => Some(DeadlineCategory::Acceptance),
        "start" => Some(DeadlineCategory::Start),
        "progress_report" => Some(DeadlineCategory::ProgressReport),
        "final_payment" => Some(DeadlineCategory::FinalPayment),
        "reporting" => Some(DeadlineCategory::Reporting),
        "communication" => Some(DeadlineCategory::Communication),
        "extension" => Some(DeadlineCategory::Extension),
        "project_closure" => Some(DeadlineCategory::ProjectClosure),
        _ => None,
    }
}

fn priority_to_db(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
        Priority::Critical => "critical",
    }
}

fn parse_priority(value: &str) -> Option<Priority> {
    match value {
        "low" => Some(Priority::Low),
        "medium" => Some(Priority::Medium),
        "high" => Some(Priority::High),
        "critical" => Some(Priority::Critical),
        _ => None,
    }
}

fn status_to_db(status: DeadlineStatus) -> &'static str {
    match status {
        DeadlineStatus::Planned => "planned",
        DeadlineStatus::ActualRecorded => "actual_recorded",
        DeadlineStatus::Overdue => "overdue",
    }
}

fn parse_status(value: &str) -> Option<DeadlineStatus> {
    match value {
        "planned" => Some(DeadlineStatus::Planned),
        "actual_recorded" => Some(DeadlineStatus::ActualRecorded),
        "overdue" => Some(DeadlineStatus::Overdue),
        _ => None,
    }
}
