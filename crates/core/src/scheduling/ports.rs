//! Port interfaces for the allocation engine
//!
//! Adapters implement these against the shared store; services receive them
//! by explicit constructor injection.

use async_trait::async_trait;
use chrono::NaiveDate;
use crewplan_domain::types::{Allocation, AllocationWriteBatch, Employee, Project, ProjectPhase, Task};
use crewplan_domain::{Result, UtilizationTable};

/// Persistence port for allocations and their aggregate side effects.
#[async_trait]
pub trait AllocationRepository: Send + Sync {
    /// Fetch a single allocation by id.
    async fn get_allocation(&self, id: &str) -> Result<Option<Allocation>>;

    /// Return every allocation of `employee_id` whose `[start, end)` window
    /// intersects the given half-open window, excluding `exclude_id` when
    /// given. Backed by the store's range index over
    /// `(employee_id, start, end)`.
    async fn find_overlapping(
        &self,
        employee_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<&str>,
    ) -> Result<Vec<Allocation>>;

    /// Duplicate-booking lookup keyed on the normalized phase set.
    async fn find_existing(
        &self,
        employee_id: &str,
        project_id: &str,
        normalized_phase_ids: &str,
    ) -> Result<Option<Allocation>>;

    /// Allocations held by one employee, optionally restricted to projects
    /// whose status is in `project_statuses`.
    async fn get_employee_allocations(
        &self,
        employee_id: &str,
        project_statuses: Option<&[&str]>,
    ) -> Result<Vec<Allocation>>;

    /// Allocations referencing one project.
    async fn get_project_allocations(&self, project_id: &str) -> Result<Vec<Allocation>>;

    /// Allocations whose phase set contains `phase_id` within one project.
    async fn get_phase_allocations(
        &self,
        project_id: &str,
        phase_id: &str,
    ) -> Result<Vec<Allocation>>;

    /// Number of live allocations held by one employee.
    async fn count_employee_allocations(&self, employee_id: &str) -> Result<i64>;

    /// Apply a write batch in one all-or-nothing transaction. Any failure
    /// rolls back every row the batch touched, including aggregates.
    async fn apply(&self, batch: AllocationWriteBatch) -> Result<()>;
}

/// Lookup and write-back port for the employee directory.
///
/// The `assigned` flag itself is flipped transactionally through
/// [`AllocationWriteBatch`]; this port covers the read side plus the
/// utilization cache.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    /// Whether an employee with this id exists.
    async fn employee_exists(&self, employee_id: &str) -> Result<bool>;

    /// Fetch an employee record.
    async fn get_employee(&self, employee_id: &str) -> Result<Option<Employee>>;

    /// Replace the employee's cached utilization table wholesale.
    async fn save_utilization(&self, employee_id: &str, table: &UtilizationTable) -> Result<()>;
}

/// Read/replace port for project records and their embedded phase lists.
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    /// Fetch a project (status plus embedded phases).
    async fn get_project(&self, project_id: &str) -> Result<Option<Project>>;

    /// Replace the project's whole phase list. Phases are never mutated in
    /// place; callers read, copy, modify, and write back.
    async fn replace_phases(&self, project_id: &str, phases: Vec<ProjectPhase>) -> Result<()>;
}

/// Read-only port over the adjacent task subsystem.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Total tasks recorded against `(project_id, phase_id)`.
    async fn count_tasks(&self, project_id: &str, phase_id: &str) -> Result<u32>;

    /// Tasks with the given status against `(project_id, phase_id)`.
    async fn count_tasks_by_status(
        &self,
        project_id: &str,
        phase_id: &str,
        status: &str,
    ) -> Result<u32>;

    /// Completed tasks logged by one employee, for utilization rollups.
    async fn completed_tasks_for_employee(&self, employee_id: &str) -> Result<Vec<Task>>;
}
