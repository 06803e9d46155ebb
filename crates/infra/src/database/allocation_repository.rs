//! SQLite-backed implementation of the `AllocationRepository` port.
//!
//! Read paths are plain indexed queries. The write path is
//! [`SqliteAllocationRepository::apply`]: an entire
//! [`AllocationWriteBatch`] — row mutations, phase member deltas, the
//! assignment flag, and task cascades — executes inside one transaction, so
//! a failure anywhere rolls back everything including the aggregates.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use crewplan_core::completion_rate;
use crewplan_core::scheduling::ports::AllocationRepository as AllocationRepositoryPort;
use crewplan_domain::types::{Allocation, AllocationWriteBatch, ProjectPhase, TaskCascade};
use crewplan_domain::{Result as DomainResult, ScheduleError};
use rusqlite::{params, OptionalExtension, Row, ToSql, Transaction};
use tokio::task;
use tracing::warn;

use super::manager::DbManager;
use super::{date_from_sql, date_to_sql, json_from_sql};
use crate::errors::{map_join_error, InfraError};

/// SQLite-backed allocation repository.
pub struct SqliteAllocationRepository {
    db: Arc<DbManager>,
}

impl SqliteAllocationRepository {
    /// Create a new repository backed by the shared `DbManager`.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AllocationRepositoryPort for SqliteAllocationRepository {
    async fn get_allocation(&self, id: &str) -> DomainResult<Option<Allocation>> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();

        task::spawn_blocking(move || -> DomainResult<Option<Allocation>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&id];
            let rows = query_allocations(&conn, ALLOCATION_SELECT_BY_ID, &params)
                .map_err(sql_error)?;
            Ok(rows.into_iter().next())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_overlapping(
        &self,
        employee_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<&str>,
    ) -> DomainResult<Vec<Allocation>> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_owned();
        let start = date_to_sql(start);
        let end = date_to_sql(end);
        let exclude_id = exclude_id.map(str::to_owned);

        task::spawn_blocking(move || -> DomainResult<Vec<Allocation>> {
            let conn = db.get_connection()?;
            let rows = match &exclude_id {
                Some(excluded) => {
                    let params: [&dyn ToSql; 4] = [&employee_id, &start, &end, excluded];
                    query_allocations(&conn, ALLOCATION_SELECT_OVERLAPPING_EXCLUDING, &params)
                }
                None => {
                    let params: [&dyn ToSql; 3] = [&employee_id, &start, &end];
                    query_allocations(&conn, ALLOCATION_SELECT_OVERLAPPING, &params)
                }
            }
            .map_err(sql_error)?;
            Ok(rows)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_existing(
        &self,
        employee_id: &str,
        project_id: &str,
        normalized_phase_ids: &str,
    ) -> DomainResult<Option<Allocation>> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_owned();
        let project_id = project_id.to_owned();
        let normalized = normalized_phase_ids.to_owned();

        task::spawn_blocking(move || -> DomainResult<Option<Allocation>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 3] = [&employee_id, &project_id, &normalized];
            let rows = query_allocations(&conn, ALLOCATION_SELECT_DUPLICATE, &params)
                .map_err(sql_error)?;
            Ok(rows.into_iter().next())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_employee_allocations(
        &self,
        employee_id: &str,
        project_statuses: Option<&[&str]>,
    ) -> DomainResult<Vec<Allocation>> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_owned();
        let statuses_json = project_statuses
            .map(|statuses| serde_json::to_string(statuses).unwrap_or_else(|_| "[]".into()));

        task::spawn_blocking(move || -> DomainResult<Vec<Allocation>> {
            let conn = db.get_connection()?;
            let rows = match &statuses_json {
                Some(statuses) => {
                    let params: [&dyn ToSql; 2] = [&employee_id, statuses];
                    query_allocations(&conn, ALLOCATION_SELECT_FOR_EMPLOYEE_ACTIVE, &params)
                }
                None => {
                    let params: [&dyn ToSql; 1] = [&employee_id];
                    query_allocations(&conn, ALLOCATION_SELECT_FOR_EMPLOYEE, &params)
                }
            }
            .map_err(sql_error)?;
            Ok(rows)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_project_allocations(&self, project_id: &str) -> DomainResult<Vec<Allocation>> {
        let db = Arc::clone(&self.db);
        let project_id = project_id.to_owned();

        task::spawn_blocking(move || -> DomainResult<Vec<Allocation>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&project_id];
            query_allocations(&conn, ALLOCATION_SELECT_FOR_PROJECT, &params).map_err(sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_phase_allocations(
        &self,
        project_id: &str,
        phase_id: &str,
    ) -> DomainResult<Vec<Allocation>> {
        let db = Arc::clone(&self.db);
        let project_id = project_id.to_owned();
        let phase_id = phase_id.to_owned();

        task::spawn_blocking(move || -> DomainResult<Vec<Allocation>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 2] = [&project_id, &phase_id];
            query_allocations(&conn, ALLOCATION_SELECT_FOR_PHASE, &params).map_err(sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn count_employee_allocations(&self, employee_id: &str) -> DomainResult<i64> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_owned();

        task::spawn_blocking(move || -> DomainResult<i64> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT COUNT(*) FROM allocations WHERE employee_id = ?1",
                params![employee_id],
                |row| row.get(0),
            )
            .map_err(sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn apply(&self, batch: AllocationWriteBatch) -> DomainResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(sql_error)?;
            apply_batch(&tx, &batch)?;
            tx.commit().map_err(sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

/// Execute every mutation of a batch against an open transaction. Any error
/// aborts the caller's transaction, which rolls back on drop.
fn apply_batch(tx: &Transaction<'_>, batch: &AllocationWriteBatch) -> DomainResult<()> {
    for id in &batch.deletes {
        tx.execute("DELETE FROM allocations WHERE id = ?1", params![id])
            .map_err(sql_error)?;
    }
    for row in &batch.updates {
        let changed = write_allocation(tx, UPDATE_ALLOCATION_SQL, row)?;
        if changed == 0 {
            warn!(allocation_id = %row.id, "update targeted a missing allocation row");
        }
    }
    for row in &batch.inserts {
        write_allocation(tx, INSERT_ALLOCATION_SQL, row)?;
    }

    for cascade in &batch.task_cascades {
        cascade_tasks(tx, cascade)?;
    }

    sync_project_aggregates(tx, batch)?;

    if let Some(change) = &batch.assigned {
        let changed = tx
            .execute(
                "UPDATE employees SET assigned = ?1 WHERE id = ?2",
                params![change.assigned, change.employee_id],
            )
            .map_err(sql_error)?;
        if changed == 0 {
            warn!(employee_id = %change.employee_id, "assigned flag targeted a missing employee row");
        }
    }

    Ok(())
}

/// Remove the tasks depending on a deleted allocation.
fn cascade_tasks(tx: &Transaction<'_>, cascade: &TaskCascade) -> DomainResult<usize> {
    let phases_json =
        serde_json::to_string(&cascade.phase_ids).unwrap_or_else(|_| "[]".into());
    tx.execute(
        "DELETE FROM tasks
         WHERE employee_id = ?1 AND project_id = ?2
           AND phase_id IN (SELECT value FROM json_each(?3))",
        params![cascade.employee_id, cascade.project_id, phases_json],
    )
    .map_err(sql_error)
}

/// Rewrite the phase list of every project the batch touches: member deltas
/// (floored at zero) plus a full completion-rate recompute for phases whose
/// tasks were cascaded away. Each list is read, copied, modified, and
/// written back whole.
fn sync_project_aggregates(tx: &Transaction<'_>, batch: &AllocationWriteBatch) -> DomainResult<()> {
    #[derive(Default)]
    struct ProjectTouch {
        deltas: Vec<(String, i32)>,
        recompute: BTreeSet<String>,
    }

    let mut touched: BTreeMap<String, ProjectTouch> = BTreeMap::new();
    for delta in &batch.member_deltas {
        touched
            .entry(delta.project_id.clone())
            .or_default()
            .deltas
            .push((delta.phase_id.clone(), delta.delta));
    }
    for cascade in &batch.task_cascades {
        let touch = touched.entry(cascade.project_id.clone()).or_default();
        touch.recompute.extend(cascade.phase_ids.iter().cloned());
    }

    for (project_id, touch) in touched {
        let phases_json: Option<String> = tx
            .query_row(
                "SELECT phases_json FROM projects WHERE id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_error)?;
        let Some(phases_json) = phases_json else {
            warn!(%project_id, "project row missing, skipping aggregate update");
            continue;
        };

        let mut phases: Vec<ProjectPhase> =
            serde_json::from_str(&phases_json).map_err(|err| {
                ScheduleError::Persistence(format!(
                    "corrupt phase list on project {project_id}: {err}"
                ))
            })?;

        for (phase_id, delta) in &touch.deltas {
            let Some(phase) = phases.iter_mut().find(|p| &p.id == phase_id) else {
                warn!(%project_id, %phase_id, "member delta for unknown phase");
                continue;
            };
            let next = i64::from(phase.members) + i64::from(*delta);
            if next < 0 {
                warn!(%project_id, %phase_id, "member count floored at zero");
            }
            phase.members = next.max(0) as u32;
        }

        for phase_id in &touch.recompute {
            let Some(phase) = phases.iter_mut().find(|p| &p.id == phase_id) else {
                continue;
            };
            let total: u32 = tx
                .query_row(
                    "SELECT COUNT(*) FROM tasks WHERE project_id = ?1 AND phase_id = ?2",
                    params![project_id, phase_id],
                    |row| row.get(0),
                )
                .map_err(sql_error)?;
            let completed: u32 = tx
                .query_row(
                    "SELECT COUNT(*) FROM tasks
                     WHERE project_id = ?1 AND phase_id = ?2 AND status = 'completed'",
                    params![project_id, phase_id],
                    |row| row.get(0),
                )
                .map_err(sql_error)?;
            phase.number_of_tasks = total;
            phase.completion_rate = completion_rate(completed, total);
        }

        let rewritten = serde_json::to_string(&phases).map_err(|err| {
            ScheduleError::Persistence(format!(
                "cannot serialize phase list for project {project_id}: {err}"
            ))
        })?;
        tx.execute(
            "UPDATE projects SET phases_json = ?1, updated_at = ?2 WHERE id = ?3",
            params![rewritten, Utc::now().timestamp(), project_id],
        )
        .map_err(sql_error)?;
    }

    Ok(())
}

const ALLOCATION_SELECT_BY_ID: &str = "SELECT
        id, employee_id, project_id, phases_json,
        start_date, end_date, hours_week, status,
        charge_out_rate, charge_type, can_override, normalized_phase_ids,
        created_at, updated_at
    FROM allocations
    WHERE id = ?1";

const ALLOCATION_SELECT_OVERLAPPING: &str = "SELECT
        id, employee_id, project_id, phases_json,
        start_date, end_date, hours_week, status,
        charge_out_rate, charge_type, can_override, normalized_phase_ids,
        created_at, updated_at
    FROM allocations
    WHERE employee_id = ?1 AND start_date < ?3 AND ?2 < end_date
    ORDER BY start_date ASC";

const ALLOCATION_SELECT_OVERLAPPING_EXCLUDING: &str = "SELECT
        id, employee_id, project_id, phases_json,
        start_date, end_date, hours_week, status,
        charge_out_rate, charge_type, can_override, normalized_phase_ids,
        created_at, updated_at
    FROM allocations
    WHERE employee_id = ?1 AND start_date < ?3 AND ?2 < end_date AND id != ?4
    ORDER BY start_date ASC";

const ALLOCATION_SELECT_DUPLICATE: &str = "SELECT
        id, employee_id, project_id, phases_json,
        start_date, end_date, hours_week, status,
        charge_out_rate, charge_type, can_override, normalized_phase_ids,
        created_at, updated_at
    FROM allocations
    WHERE employee_id = ?1 AND project_id = ?2 AND normalized_phase_ids = ?3
    LIMIT 1";

const ALLOCATION_SELECT_FOR_EMPLOYEE: &str = "SELECT
        id, employee_id, project_id, phases_json,
        start_date, end_date, hours_week, status,
        charge_out_rate, charge_type, can_override, normalized_phase_ids,
        created_at, updated_at
    FROM allocations
    WHERE employee_id = ?1
    ORDER BY start_date ASC";

const ALLOCATION_SELECT_FOR_EMPLOYEE_ACTIVE: &str = "SELECT
        a.id, a.employee_id, a.project_id, a.phases_json,
        a.start_date, a.end_date, a.hours_week, a.status,
        a.charge_out_rate, a.charge_type, a.can_override, a.normalized_phase_ids,
        a.created_at, a.updated_at
    FROM allocations a
    JOIN projects p ON p.id = a.project_id
    WHERE a.employee_id = ?1
      AND p.status IN (SELECT value FROM json_each(?2))
    ORDER BY a.start_date ASC";

const ALLOCATION_SELECT_FOR_PROJECT: &str = "SELECT
        id, employee_id, project_id, phases_json,
        start_date, end_date, hours_week, status,
        charge_out_rate, charge_type, can_override, normalized_phase_ids,
        created_at, updated_at
    FROM allocations
    WHERE project_id = ?1
    ORDER BY start_date ASC";

const ALLOCATION_SELECT_FOR_PHASE: &str = "SELECT
        id, employee_id, project_id, phases_json,
        start_date, end_date, hours_week, status,
        charge_out_rate, charge_type, can_override, normalized_phase_ids,
        created_at, updated_at
    FROM allocations
    WHERE project_id = ?1
      AND EXISTS (SELECT 1 FROM json_each(phases_json) WHERE value = ?2)
    ORDER BY start_date ASC";

const INSERT_ALLOCATION_SQL: &str = "INSERT INTO allocations (
        id, employee_id, project_id, phases_json,
        start_date, end_date, hours_week, status,
        charge_out_rate, charge_type, can_override, normalized_phase_ids,
        created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

const UPDATE_ALLOCATION_SQL: &str = "UPDATE allocations SET
        employee_id = ?2, project_id = ?3, phases_json = ?4,
        start_date = ?5, end_date = ?6, hours_week = ?7, status = ?8,
        charge_out_rate = ?9, charge_type = ?10, can_override = ?11,
        normalized_phase_ids = ?12, created_at = ?13, updated_at = ?14
    WHERE id = ?1";

/// Bind a full allocation row against the shared insert/update column
/// order (`?1` is the id).
fn write_allocation(
    tx: &Transaction<'_>,
    sql: &str,
    row: &Allocation,
) -> DomainResult<usize> {
    let phases_json = serde_json::to_string(&row.phases).unwrap_or_else(|_| "[]".into());
    tx.execute(
        sql,
        params![
            row.id,
            row.employee_id,
            row.project_id,
            phases_json,
            date_to_sql(row.start),
            date_to_sql(row.end),
            row.hours_week,
            row.status,
            row.charge_out_rate,
            row.charge_type,
            row.can_override,
            row.normalized_phase_ids,
            row.created_at,
            row.updated_at,
        ],
    )
    .map_err(sql_error)
}

fn query_allocations(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> rusqlite::Result<Vec<Allocation>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map_allocation_row)?;
    rows.collect()
}

fn map_allocation_row(row: &Row<'_>) -> rusqlite::Result<Allocation> {
    let phases: Vec<String> = json_from_sql(row.get(3)?, 3)?;
    let start = date_from_sql(row.get(4)?, 4)?;
    let end = date_from_sql(row.get(5)?, 5)?;
    let can_override: bool = row.get::<_, i64>(10)? != 0;

    Ok(Allocation {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        project_id: row.get(2)?,
        phases,
        start,
        end,
        hours_week: row.get(6)?,
        status: row.get(7)?,
        charge_out_rate: row.get(8)?,
        charge_type: row.get(9)?,
        can_override,
        normalized_phase_ids: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn sql_error(err: rusqlite::Error) -> ScheduleError {
    InfraError::from(err).into()
}
