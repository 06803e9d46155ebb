//! In-memory port implementations for engine tests
//!
//! Provides a deterministic store backing all four engine ports, so the
//! orchestration services can be exercised without a database. Write
//! batches mutate the shared state the way the SQLite adapter would,
//! including member-count floors and task cascades.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use crewplan_core::scheduling::ports::{
    AllocationRepository, EmployeeDirectory, ProjectDirectory, TaskStore,
};
use crewplan_domain::types::{
    Allocation, AllocationWriteBatch, Employee, Project, ProjectPhase, Task,
};
use crewplan_domain::{Result as DomainResult, UtilizationTable};

#[derive(Default)]
struct State {
    allocations: Vec<Allocation>,
    employees: HashMap<String, Employee>,
    projects: HashMap<String, Project>,
    tasks: Vec<Task>,
    phase_members: HashMap<(String, String), u32>,
}

/// Shared in-memory store implementing every engine port.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn seed_employee(&self, id: &str) {
        self.lock().employees.insert(
            id.to_owned(),
            Employee {
                id: id.to_owned(),
                full_name: format!("Employee {id}"),
                email: format!("{id}@example.test"),
                position: "engineer".into(),
                assigned: false,
                utilization: UtilizationTable::new(),
            },
        );
    }

    pub fn seed_project(&self, id: &str, status: &str, phases: Vec<ProjectPhase>) {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        self.lock().projects.insert(
            id.to_owned(),
            Project {
                id: id.to_owned(),
                name: format!("Project {id}"),
                status: status.to_owned(),
                start_date: date,
                end_date: date,
                phases,
                created_at: 0,
                updated_at: 0,
            },
        );
    }

    pub fn seed_allocation(&self, allocation: Allocation) {
        let mut state = self.lock();
        for phase in &allocation.phases {
            *state
                .phase_members
                .entry((allocation.project_id.clone(), phase.clone()))
                .or_insert(0) += 1;
        }
        state.allocations.push(allocation);
    }

    pub fn seed_task(&self, task: Task) {
        self.lock().tasks.push(task);
    }

    pub fn allocation(&self, id: &str) -> Option<Allocation> {
        self.lock().allocations.iter().find(|a| a.id == id).cloned()
    }

    pub fn allocations_for(&self, employee_id: &str) -> Vec<Allocation> {
        self.lock()
            .allocations
            .iter()
            .filter(|a| a.employee_id == employee_id)
            .cloned()
            .collect()
    }

    pub fn members_of(&self, project_id: &str, phase_id: &str) -> u32 {
        self.lock()
            .phase_members
            .get(&(project_id.to_owned(), phase_id.to_owned()))
            .copied()
            .unwrap_or(0)
    }

    pub fn assigned(&self, employee_id: &str) -> bool {
        self.lock()
            .employees
            .get(employee_id)
            .map(|e| e.assigned)
            .unwrap_or(false)
    }

    pub fn utilization_of(&self, employee_id: &str) -> Option<UtilizationTable> {
        self.lock()
            .employees
            .get(employee_id)
            .map(|e| e.utilization.clone())
    }

    pub fn task_count(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        self.lock().projects.get(id).cloned()
    }
}

#[async_trait]
impl AllocationRepository for InMemoryStore {
    async fn get_allocation(&self, id: &str) -> DomainResult<Option<Allocation>> {
        Ok(self.allocation(id))
    }

    async fn find_overlapping(
        &self,
        employee_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<&str>,
    ) -> DomainResult<Vec<Allocation>> {
        Ok(self
            .lock()
            .allocations
            .iter()
            .filter(|a| a.employee_id == employee_id)
            .filter(|a| exclude_id != Some(a.id.as_str()))
            .filter(|a| a.overlaps(start, end))
            .cloned()
            .collect())
    }

    async fn find_existing(
        &self,
        employee_id: &str,
        project_id: &str,
        normalized_phase_ids: &str,
    ) -> DomainResult<Option<Allocation>> {
        Ok(self
            .lock()
            .allocations
            .iter()
            .find(|a| {
                a.employee_id == employee_id
                    && a.project_id == project_id
                    && a.normalized_phase_ids == normalized_phase_ids
            })
            .cloned())
    }

    async fn get_employee_allocations(
        &self,
        employee_id: &str,
        project_statuses: Option<&[&str]>,
    ) -> DomainResult<Vec<Allocation>> {
        let state = self.lock();
        Ok(state
            .allocations
            .iter()
            .filter(|a| a.employee_id == employee_id)
            .filter(|a| match project_statuses {
                None => true,
                Some(statuses) => state
                    .projects
                    .get(&a.project_id)
                    .map(|p| statuses.contains(&p.status.as_str()))
                    .unwrap_or(false),
            })
            .cloned()
            .collect())
    }

    async fn get_project_allocations(&self, project_id: &str) -> DomainResult<Vec<Allocation>> {
        Ok(self
            .lock()
            .allocations
            .iter()
            .filter(|a| a.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn get_phase_allocations(
        &self,
        project_id: &str,
        phase_id: &str,
    ) -> DomainResult<Vec<Allocation>> {
        Ok(self
            .lock()
            .allocations
            .iter()
            .filter(|a| a.project_id == project_id && a.phases.iter().any(|p| p == phase_id))
            .cloned()
            .collect())
    }

    async fn count_employee_allocations(&self, employee_id: &str) -> DomainResult<i64> {
        Ok(self
            .lock()
            .allocations
            .iter()
            .filter(|a| a.employee_id == employee_id)
            .count() as i64)
    }

    async fn apply(&self, batch: AllocationWriteBatch) -> DomainResult<()> {
        let mut state = self.lock();

        for id in &batch.deletes {
            state.allocations.retain(|a| &a.id != id);
        }
        for update in &batch.updates {
            if let Some(slot) = state.allocations.iter_mut().find(|a| a.id == update.id) {
                *slot = update.clone();
            }
        }
        for insert in &batch.inserts {
            state.allocations.push(insert.clone());
        }
        for delta in &batch.member_deltas {
            let entry = state
                .phase_members
                .entry((delta.project_id.clone(), delta.phase_id.clone()))
                .or_insert(0);
            *entry = entry.saturating_add_signed(delta.delta);
        }
        if let Some(change) = &batch.assigned {
            if let Some(employee) = state.employees.get_mut(&change.employee_id) {
                employee.assigned = change.assigned;
            }
        }
        for cascade in &batch.task_cascades {
            state.tasks.retain(|t| {
                !(t.employee_id == cascade.employee_id
                    && t.project_id == cascade.project_id
                    && cascade.phase_ids.iter().any(|p| p == &t.phase_id))
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmployeeDirectory for InMemoryStore {
    async fn employee_exists(&self, employee_id: &str) -> DomainResult<bool> {
        Ok(self.lock().employees.contains_key(employee_id))
    }

    async fn get_employee(&self, employee_id: &str) -> DomainResult<Option<Employee>> {
        Ok(self.lock().employees.get(employee_id).cloned())
    }

    async fn save_utilization(
        &self,
        employee_id: &str,
        table: &UtilizationTable,
    ) -> DomainResult<()> {
        if let Some(employee) = self.lock().employees.get_mut(employee_id) {
            employee.utilization = table.clone();
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectDirectory for InMemoryStore {
    async fn get_project(&self, project_id: &str) -> DomainResult<Option<Project>> {
        Ok(self.lock().projects.get(project_id).cloned())
    }

    async fn replace_phases(
        &self,
        project_id: &str,
        phases: Vec<ProjectPhase>,
    ) -> DomainResult<()> {
        if let Some(project) = self.lock().projects.get_mut(project_id) {
            project.phases = phases;
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn count_tasks(&self, project_id: &str, phase_id: &str) -> DomainResult<u32> {
        Ok(self
            .lock()
            .tasks
            .iter()
            .filter(|t| t.project_id == project_id && t.phase_id == phase_id)
            .count() as u32)
    }

    async fn count_tasks_by_status(
        &self,
        project_id: &str,
        phase_id: &str,
        status: &str,
    ) -> DomainResult<u32> {
        Ok(self
            .lock()
            .tasks
            .iter()
            .filter(|t| t.project_id == project_id && t.phase_id == phase_id && t.status == status)
            .count() as u32)
    }

    async fn completed_tasks_for_employee(&self, employee_id: &str) -> DomainResult<Vec<Task>> {
        Ok(self
            .lock()
            .tasks
            .iter()
            .filter(|t| t.employee_id == employee_id && t.is_completed())
            .cloned()
            .collect())
    }
}
