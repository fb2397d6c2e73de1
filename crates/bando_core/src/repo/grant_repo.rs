//! Grant/project repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the grant, project and anchor records the deadline engine's
//!   foreign keys depend on.
//! - Own grant-level planned anchor dates and project-level actual anchor dates.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Deleting a project cascades to its anchor overrides, deadline instances
//!   and recorded actuals.

use crate::db::ensure_schema_ready;
use crate::model::anchor::{AnchorEvent, AnchorOverride};
use crate::model::grant::{Grant, GrantId, Project, ProjectId};
use crate::repo::error::{bool_to_int, parse_uuid, RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

/// Repository interface for grant-side records.
pub trait GrantRepository {
    fn create_grant(&self, grant: &Grant) -> RepoResult<GrantId>;
    fn get_grant(&self, id: GrantId) -> RepoResult<Option<Grant>>;
    fn create_project(&self, project: &Project) -> RepoResult<ProjectId>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    /// Deletes a project together with everything scheduled for it.
    fn delete_project(&self, id: ProjectId) -> RepoResult<()>;
    /// Adds a non-standard entry to the anchor catalog.
    fn create_anchor_event(&self, event: &AnchorEvent) -> RepoResult<()>;
    /// Sets (or replaces) the planned date of an anchor for a whole grant.
    fn set_grant_anchor_default(
        &self,
        grant_id: GrantId,
        event_id: &str,
        planned_date: NaiveDate,
    ) -> RepoResult<()>;
    /// Sets (or replaces) a project's actual date for an anchor.
    fn set_project_anchor_actual(
        &self,
        project_id: ProjectId,
        event_id: &str,
        actual_date: NaiveDate,
    ) -> RepoResult<()>;
    /// Anchors with a grant planned date or project actual date, by event id.
    fn list_anchor_overrides(&self, project_id: ProjectId) -> RepoResult<Vec<AnchorOverride>>;
}

/// SQLite-backed grant repository.
pub struct SqliteGrantRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGrantRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    fn ensure_exists(&self, table: &'static str, entity: &'static str, id: &str) -> RepoResult<()> {
        let exists: bool = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1);"),
            [id],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(RepoError::not_found(entity, id))
        }
    }
}

impl GrantRepository for SqliteGrantRepository<'_> {
    fn create_grant(&self, grant: &Grant) -> RepoResult<GrantId> {
        grant.validate()?;
        self.conn.execute(
            "INSERT INTO grants (id, code, name, funding_body) VALUES (?1, ?2, ?3, ?4);",
            params![
                grant.id.to_string(),
                grant.code.as_str(),
                grant.name.as_str(),
                grant.funding_body.as_deref(),
            ],
        )?;
        Ok(grant.id)
    }

    fn get_grant(&self, id: GrantId) -> RepoResult<Option<Grant>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, code, name, funding_body FROM grants WHERE id = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>("id")?,
                        row.get::<_, String>("code")?,
                        row.get::<_, String>("name")?,
                        row.get::<_, Option<String>>("funding_body")?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id_text, code, name, funding_body)| {
            let grant = Grant {
                id: parse_uuid(&id_text, "grants.id")?,
                code,
                name,
                funding_body,
            };
            grant.validate()?;
            Ok(grant)
        })
        .transpose()
    }

    fn create_project(&self, project: &Project) -> RepoResult<ProjectId> {
        project.validate()?;
        self.ensure_exists("grants", "grant", &project.grant_id.to_string())?;
        self.conn.execute(
            "INSERT INTO projects (id, grant_id, title, client_name) VALUES (?1, ?2, ?3, ?4);",
            params![
                project.id.to_string(),
                project.grant_id.to_string(),
                project.title.as_str(),
                project.client_name.as_deref(),
            ],
        )?;
        Ok(project.id)
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, grant_id, title, client_name FROM projects WHERE id = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>("id")?,
                        row.get::<_, String>("grant_id")?,
                        row.get::<_, String>("title")?,
                        row.get::<_, Option<String>>("client_name")?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id_text, grant_text, title, client_name)| {
            Ok(Project {
                id: parse_uuid(&id_text, "projects.id")?,
                grant_id: parse_uuid(&grant_text, "projects.grant_id")?,
                title,
                client_name,
            })
        })
        .transpose()
    }

    fn delete_project(&self, id: ProjectId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("project", id));
        }
        Ok(())
    }

    fn create_anchor_event(&self, event: &AnchorEvent) -> RepoResult<()> {
        event.validate()?;
        self.conn.execute(
            "INSERT INTO anchor_events (id, name, description, is_standard)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                event.id.as_str(),
                event.name.as_str(),
                event.description.as_deref(),
                bool_to_int(event.is_standard),
            ],
        )?;
        Ok(())
    }

    fn set_grant_anchor_default(
        &self,
        grant_id: GrantId,
        event_id: &str,
        planned_date: NaiveDate,
    ) -> RepoResult<()> {
        self.ensure_exists("grants", "grant", &grant_id.to_string())?;
        self.ensure_exists("anchor_events", "anchor event", event_id)?;
        self.conn.execute(
            "INSERT INTO grant_anchor_defaults (grant_id, event_id, planned_date)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (grant_id, event_id) DO UPDATE SET planned_date = excluded.planned_date;",
            params![grant_id.to_string(), event_id, planned_date],
        )?;
        Ok(())
    }

    fn set_project_anchor_actual(
        &self,
        project_id: ProjectId,
        event_id: &str,
        actual_date: NaiveDate,
    ) -> RepoResult<()> {
        self.ensure_exists("projects", "project", &project_id.to_string())?;
        self.ensure_exists("anchor_events", "anchor event", event_id)?;
        self.conn.execute(
            "INSERT INTO project_anchor_overrides (project_id, event_id, actual_date)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (project_id, event_id) DO UPDATE SET actual_date = excluded.actual_date;",
            params![project_id.to_string(), event_id, actual_date],
        )?;
        Ok(())
    }

    fn list_anchor_overrides(&self, project_id: ProjectId) -> RepoResult<Vec<AnchorOverride>> {
        let project = self
            .get_project(project_id)?
            .ok_or_else(|| RepoError::not_found("project", project_id))?;

        let mut stmt = self.conn.prepare(
            "SELECT e.id AS event_id, d.planned_date, o.actual_date
             FROM anchor_events e
             LEFT JOIN grant_anchor_defaults d
               ON d.event_id = e.id AND d.grant_id = ?1
             LEFT JOIN project_anchor_overrides o
               ON o.event_id = e.id AND o.project_id = ?2
             WHERE d.planned_date IS NOT NULL OR o.actual_date IS NOT NULL
             ORDER BY e.id ASC;",
        )?;
        let rows = stmt.query_map(
            params![project.grant_id.to_string(), project_id.to_string()],
            |row| {
                Ok(AnchorOverride {
                    event_id: row.get("event_id")?,
                    planned_date: row.get("planned_date")?,
                    actual_date: row.get("actual_date")?,
                })
            },
        )?;

        let mut overrides = Vec::new();
        for row in rows {
            overrides.push(row?);
        }
        Ok(overrides)
    }
}
