//! SQLite-backed implementation of the `TaskStore` port.
//!
//! The engine consumes tasks read-only; the cascade removal that
//! accompanies an allocation delete runs inside the allocation
//! repository's batch transaction.

use std::sync::Arc;

use async_trait::async_trait;
use crewplan_core::scheduling::ports::TaskStore as TaskStorePort;
use crewplan_domain::types::Task;
use crewplan_domain::{Result as DomainResult, ScheduleError};
use rusqlite::{params, Row};
use tokio::task;

use super::manager::DbManager;
use super::{date_from_sql, date_to_sql};
use crate::errors::{map_join_error, InfraError};

/// SQLite-backed task store.
pub struct SqliteTaskStore {
    db: Arc<DbManager>,
}

impl SqliteTaskStore {
    /// Create a new store backed by the shared `DbManager`.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert a task record (the task lifecycle itself is owned by the
    /// adjacent subsystem; this exists for seeding and tests).
    pub async fn insert_task(&self, task: &Task) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let task = task.clone();

        tokio::task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO tasks (id, employee_id, project_id, phase_id, title, status,
                                    estimated_hours, actual_hours, task_date, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    task.id,
                    task.employee_id,
                    task.project_id,
                    task.phase_id,
                    task.title,
                    task.status,
                    task.estimated_hours,
                    task.actual_hours,
                    date_to_sql(task.task_date),
                    task.created_at,
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
impl TaskStorePort for SqliteTaskStore {
    async fn count_tasks(&self, project_id: &str, phase_id: &str) -> DomainResult<u32> {
        let db = Arc::clone(&self.db);
        let project_id = project_id.to_owned();
        let phase_id = phase_id.to_owned();

        task::spawn_blocking(move || -> DomainResult<u32> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE project_id = ?1 AND phase_id = ?2",
                params![project_id, phase_id],
                |row| row.get(0),
            )
            .map_err(sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn count_tasks_by_status(
        &self,
        project_id: &str,
        phase_id: &str,
        status: &str,
    ) -> DomainResult<u32> {
        let db = Arc::clone(&self.db);
        let project_id = project_id.to_owned();
        let phase_id = phase_id.to_owned();
        let status = status.to_owned();

        task::spawn_blocking(move || -> DomainResult<u32> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT COUNT(*) FROM tasks
                 WHERE project_id = ?1 AND phase_id = ?2 AND status = ?3",
                params![project_id, phase_id, status],
                |row| row.get(0),
            )
            .map_err(sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn completed_tasks_for_employee(&self, employee_id: &str) -> DomainResult<Vec<Task>> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_owned();

        task::spawn_blocking(move || -> DomainResult<Vec<Task>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, employee_id, project_id, phase_id, title, status,
                            estimated_hours, actual_hours, task_date, created_at
                     FROM tasks
                     WHERE employee_id = ?1 AND status = 'completed'
                     ORDER BY task_date ASC",
                )
                .map_err(sql_error)?;
            let rows = stmt
                .query_map(params![employee_id], map_task_row)
                .map_err(sql_error)?;
            rows.collect::<rusqlite::Result<Vec<Task>>>().map_err(sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_task_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let task_date = date_from_sql(row.get(8)?, 8)?;

    Ok(Task {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        project_id: row.get(2)?,
        phase_id: row.get(3)?,
        title: row.get(4)?,
        status: row.get(5)?,
        estimated_hours: row.get(6)?,
        actual_hours: row.get(7)?,
        task_date,
        created_at: row.get(9)?,
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

    fn sample(id: &str, status: &str, actual_hours: f64) -> Task {
        Task {
            id: id.to_owned(),
            employee_id: "e-1".into(),
            project_id: "p-1".into(),
            phase_id: "build".into(),
            title: format!("task {id}"),
            status: status.to_owned(),
            estimated_hours: 8.0,
            actual_hours,
            task_date: date(2024, 1, 10),
            created_at: 1_700_000_000,
        }
    }

    async fn setup_store() -> (SqliteTaskStore, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("tasks.db");

        let manager = Arc::new(DbManager::new(&db_path, 4).expect("db manager created"));
        manager.run_migrations().expect("migrations run");

        (SqliteTaskStore::new(manager), temp_dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn counts_tasks_by_phase_and_status() {
        let (store, _dir) = setup_store().await;
        store.insert_task(&sample("t-1", "completed", 8.0)).await.expect("inserted");
        store.insert_task(&sample("t-2", "pending", 0.0)).await.expect("inserted");
        store.insert_task(&sample("t-3", "completed", 4.0)).await.expect("inserted");

        assert_eq!(store.count_tasks("p-1", "build").await.expect("counted"), 3);
        assert_eq!(
            store
                .count_tasks_by_status("p-1", "build", "completed")
                .await
                .expect("counted"),
            2
        );
        assert_eq!(store.count_tasks("p-1", "design").await.expect("counted"), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lists_only_completed_tasks_for_employee() {
        let (store, _dir) = setup_store().await;
        store.insert_task(&sample("t-1", "completed", 8.0)).await.expect("inserted");
        store.insert_task(&sample("t-2", "rejected", 2.0)).await.expect("inserted");

        let completed = store
            .completed_tasks_for_employee("e-1")
            .await
            .expect("listed");
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, "t-1");
        assert_eq!(completed[0].task_date, date(2024, 1, 10));
    }
}
