//! SQLite-backed implementation of the `EmployeeDirectory` port.
//!
//! Reads employee records and writes back the denormalized utilization
//! cache. The `assigned` flag is flipped transactionally by the allocation
//! repository's batch apply; the inherent [`SqliteEmployeeDirectory::set_assigned`]
//! exists for the surrounding directory layer.

use std::sync::Arc;

use async_trait::async_trait;
use crewplan_core::scheduling::ports::EmployeeDirectory as EmployeeDirectoryPort;
use crewplan_domain::types::Employee;
use crewplan_domain::{Result as DomainResult, ScheduleError, UtilizationTable};
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;

use super::json_from_sql;
use super::manager::DbManager;
use crate::errors::{map_join_error, InfraError};

/// SQLite-backed employee directory.
pub struct SqliteEmployeeDirectory {
    db: Arc<DbManager>,
}

impl SqliteEmployeeDirectory {
    /// Create a new directory backed by the shared `DbManager`.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert an employee record.
    pub async fn insert_employee(&self, employee: &Employee) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let employee = employee.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let utilization_json = serde_json::to_string(&employee.utilization)
                .unwrap_or_else(|_| "{}".into());
            conn.execute(
                "INSERT INTO employees (id, full_name, email, position, assigned, utilization_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    employee.id,
                    employee.full_name,
                    employee.email,
                    employee.position,
                    employee.assigned,
                    utilization_json,
                ],
            )
            .map_err(sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    /// Update the `assigned` flag directly.
    pub async fn set_assigned(&self, employee_id: &str, assigned: bool) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_owned();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let changed = conn
                .execute(
                    "UPDATE employees SET assigned = ?1 WHERE id = ?2",
                    params![assigned, employee_id],
                )
                .map_err(sql_error)?;
            if changed == 0 {
                return Err(ScheduleError::NotFound(format!(
                    "employee {employee_id} not found"
                )));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl EmployeeDirectoryPort for SqliteEmployeeDirectory {
    async fn employee_exists(&self, employee_id: &str) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_owned();

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            let found: Option<i32> = conn
                .query_row(
                    "SELECT 1 FROM employees WHERE id = ?1",
                    params![employee_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_error)?;
            Ok(found.is_some())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_employee(&self, employee_id: &str) -> DomainResult<Option<Employee>> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_owned();

        task::spawn_blocking(move || -> DomainResult<Option<Employee>> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT id, full_name, email, position, assigned, utilization_json
                 FROM employees WHERE id = ?1",
                params![employee_id],
                map_employee_row,
            )
            .optional()
            .map_err(sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save_utilization(
        &self,
        employee_id: &str,
        table: &UtilizationTable,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_owned();
        let utilization_json = serde_json::to_string(table).map_err(|err| {
            ScheduleError::Persistence(format!("cannot serialize utilization table: {err}"))
        })?;

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let changed = conn
                .execute(
                    "UPDATE employees SET utilization_json = ?1 WHERE id = ?2",
                    params![utilization_json, employee_id],
                )
                .map_err(sql_error)?;
            if changed == 0 {
                return Err(ScheduleError::NotFound(format!(
                    "employee {employee_id} not found"
                )));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_employee_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    let assigned: bool = row.get::<_, i64>(4)? != 0;
    let utilization: UtilizationTable = json_from_sql(row.get(5)?, 5)?;

    Ok(Employee {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        position: row.get(3)?,
        assigned,
        utilization,
    })
}

fn sql_error(err: rusqlite::Error) -> ScheduleError {
    InfraError::from(err).into()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn sample(id: &str) -> Employee {
        Employee {
            id: id.to_owned(),
            full_name: "Dana Mercer".into(),
            email: "dana@example.test".into(),
            position: "engineer".into(),
            assigned: false,
            utilization: UtilizationTable::new(),
        }
    }

    async fn setup_directory() -> (SqliteEmployeeDirectory, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("employees.db");

        let manager = Arc::new(DbManager::new(&db_path, 4).expect("db manager created"));
        manager.run_migrations().expect("migrations run");

        (SqliteEmployeeDirectory::new(manager), temp_dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn inserts_and_finds_employee() {
        let (directory, _dir) = setup_directory().await;
        directory.insert_employee(&sample("e-1")).await.expect("inserted");

        assert!(directory.employee_exists("e-1").await.expect("checked"));
        assert!(!directory.employee_exists("ghost").await.expect("checked"));

        let fetched = directory
            .get_employee("e-1")
            .await
            .expect("fetched")
            .expect("present");
        assert_eq!(fetched.full_name, "Dana Mercer");
        assert!(!fetched.assigned);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn assigned_flag_round_trips() {
        let (directory, _dir) = setup_directory().await;
        directory.insert_employee(&sample("e-1")).await.expect("inserted");

        directory.set_assigned("e-1", true).await.expect("updated");
        let fetched = directory
            .get_employee("e-1")
            .await
            .expect("fetched")
            .expect("present");
        assert!(fetched.assigned);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn utilization_cache_round_trips() {
        let (directory, _dir) = setup_directory().await;
        directory.insert_employee(&sample("e-1")).await.expect("inserted");

        let mut table = UtilizationTable::new();
        let mut month = crewplan_domain::MonthUtilization::default();
        month.set_week(1, 50.0);
        table.entry(2024).or_default().insert("01".into(), month);

        directory
            .save_utilization("e-1", &table)
            .await
            .expect("saved");

        let fetched = directory
            .get_employee("e-1")
            .await
            .expect("fetched")
            .expect("present");
        assert_eq!(fetched.utilization[&2024]["01"].week1, 50.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn saving_utilization_for_missing_employee_is_not_found() {
        let (directory, _dir) = setup_directory().await;

        let err = directory
            .save_utilization("ghost", &UtilizationTable::new())
            .await
            .expect_err("must fail");
        assert!(matches!(err, ScheduleError::NotFound(_)));
    }
}
