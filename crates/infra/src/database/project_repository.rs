//! SQLite-backed implementation of the `ProjectDirectory` port.
//!
//! Phases are stored as one JSON column on the project row and only ever
//! replaced as a whole list, which is what makes the copy-modify-writeback
//! contract atomic.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use crewplan_core::scheduling::ports::ProjectDirectory as ProjectDirectoryPort;
use crewplan_domain::types::{Project, ProjectPhase};
use crewplan_domain::{Result as DomainResult, ScheduleError};
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;

use super::manager::DbManager;
use super::{date_from_sql, date_to_sql, json_from_sql};
use crate::errors::{map_join_error, InfraError};

/// SQLite-backed project directory.
pub struct SqliteProjectDirectory {
    db: Arc<DbManager>,
}

impl SqliteProjectDirectory {
    /// Create a new directory backed by the shared `DbManager`.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert a project record with its embedded phase list.
    pub async fn insert_project(&self, project: &Project) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let project = project.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let phases_json = serde_json::to_string(&project.phases).map_err(|err| {
                ScheduleError::Persistence(format!("cannot serialize phase list: {err}"))
            })?;
            conn.execute(
                "INSERT INTO projects (id, name, status, start_date, end_date, phases_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    project.id,
                    project.name,
                    project.status,
                    date_to_sql(project.start_date),
                    date_to_sql(project.end_date),
                    phases_json,
                    project.created_at,
                    project.updated_at,
                ],
            )
            .map_err(sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl ProjectDirectoryPort for SqliteProjectDirectory {
    async fn get_project(&self, project_id: &str) -> DomainResult<Option<Project>> {
        let db = Arc::clone(&self.db);
        let project_id = project_id.to_owned();

        task::spawn_blocking(move || -> DomainResult<Option<Project>> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT id, name, status, start_date, end_date, phases_json, created_at, updated_at
                 FROM projects WHERE id = ?1",
                params![project_id],
                map_project_row,
            )
            .optional()
            .map_err(sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn replace_phases(
        &self,
        project_id: &str,
        phases: Vec<ProjectPhase>,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let project_id = project_id.to_owned();
        let phases_json = serde_json::to_string(&phases).map_err(|err| {
            ScheduleError::Persistence(format!("cannot serialize phase list: {err}"))
        })?;

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let changed = conn
                .execute(
                    "UPDATE projects SET phases_json = ?1, updated_at = ?2 WHERE id = ?3",
                    params![phases_json, Utc::now().timestamp(), project_id],
                )
                .map_err(sql_error)?;
            if changed == 0 {
                return Err(ScheduleError::NotFound(format!(
                    "project {project_id} not found"
                )));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_project_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    let start_date = date_from_sql(row.get(3)?, 3)?;
    let end_date = date_from_sql(row.get(4)?, 4)?;
    let phases: Vec<ProjectPhase> = json_from_sql(row.get(5)?, 5)?;

    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        status: row.get(2)?,
        start_date,
        end_date,
        phases,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn sql_error(err: rusqlite::Error) -> ScheduleError {
    InfraError::from(err).into()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample(id: &str) -> Project {
        Project {
            id: id.to_owned(),
            name: format!("Project {id}"),
            status: "on going".into(),
            start_date: date(2024, 1, 1),
            end_date: date(2024, 12, 31),
            phases: vec![ProjectPhase {
                id: "design".into(),
                name: "Design".into(),
                start_date: date(2024, 1, 1),
                end_date: date(2024, 3, 1),
                members: 0,
                number_of_tasks: 0,
                completion_rate: 0,
            }],
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
        }
    }

    async fn setup_directory() -> (SqliteProjectDirectory, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("projects.db");

        let manager = Arc::new(DbManager::new(&db_path, 4).expect("db manager created"));
        manager.run_migrations().expect("migrations run");

        (SqliteProjectDirectory::new(manager), temp_dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn inserts_and_fetches_project_with_phases() {
        let (directory, _dir) = setup_directory().await;
        directory.insert_project(&sample("p-1")).await.expect("inserted");

        let fetched = directory
            .get_project("p-1")
            .await
            .expect("fetched")
            .expect("present");
        assert_eq!(fetched.status, "on going");
        assert_eq!(fetched.phases.len(), 1);
        assert_eq!(fetched.phases[0].id, "design");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replace_phases_rewrites_whole_list() {
        let (directory, _dir) = setup_directory().await;
        directory.insert_project(&sample("p-1")).await.expect("inserted");

        let mut phases = directory
            .get_project("p-1")
            .await
            .expect("fetched")
            .expect("present")
            .phases;
        phases[0].members = 3;
        phases.push(ProjectPhase {
            id: "build".into(),
            name: "Build".into(),
            start_date: date(2024, 3, 1),
            end_date: date(2024, 6, 1),
            members: 0,
            number_of_tasks: 0,
            completion_rate: 0,
        });

        directory
            .replace_phases("p-1", phases)
            .await
            .expect("replaced");

        let fetched = directory
            .get_project("p-1")
            .await
            .expect("fetched")
            .expect("present");
        assert_eq!(fetched.phases.len(), 2);
        assert_eq!(fetched.phases[0].members, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replacing_phases_on_missing_project_is_not_found() {
        let (directory, _dir) = setup_directory().await;

        let err = directory
            .replace_phases("ghost", Vec::new())
            .await
            .expect_err("must fail");
        assert!(matches!(err, ScheduleError::NotFound(_)));
    }
}
