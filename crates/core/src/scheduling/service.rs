//! Allocation store orchestration - core business logic
//!
//! `AllocationService` is the only write surface for allocations. Every
//! mutation runs the same pipeline: validate, detect overlaps, gate them
//! through the override policy, plan the conflict rewrites, then hand a
//! single [`AllocationWriteBatch`] to the repository, which applies it in
//! one all-or-nothing transaction.
//!
//! Known gap, kept deliberately: the overlap read and the batch write are
//! two sequential steps with no per-employee lock between them, so two
//! concurrent updates to the same employee's schedule can both observe "no
//! conflict" before either commits. Closing it requires a serialized
//! per-employee write or an immediate-mode transaction around the read.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use crewplan_domain::constants::{ACTIVE_PROJECT_STATUSES, DEFAULT_ALLOCATION_STATUS};
use crewplan_domain::types::allocation::normalized_phase_ids;
use crewplan_domain::types::{
    Allocation, AllocationDraft, AllocationUpdate, AllocationWriteBatch, AssignedFlagChange,
    TaskCascade,
};
use crewplan_domain::{Result, ScheduleError};
use tracing::{debug, info};
use uuid::Uuid;

use super::ports::{AllocationRepository, EmployeeDirectory};
use super::resolver::ResolutionPlan;
use super::{overlap, policy, resolver};

/// Transactional CRUD orchestration for allocations.
pub struct AllocationService {
    allocations: Arc<dyn AllocationRepository>,
    employees: Arc<dyn EmployeeDirectory>,
}

impl AllocationService {
    /// Create a new service over the given ports.
    pub fn new(
        allocations: Arc<dyn AllocationRepository>,
        employees: Arc<dyn EmployeeDirectory>,
    ) -> Self {
        Self { allocations, employees }
    }

    /// Book an employee onto a project for a date range.
    ///
    /// Fails with `Validation` for an empty or malformed phase set, a
    /// non-positive window, or negative weekly hours; `NotFound` when the
    /// employee does not resolve; `Conflict` when an equivalent booking
    /// already exists or an overlapping allocation refuses override.
    pub async fn create_allocation(&self, draft: AllocationDraft) -> Result<Allocation> {
        validate_phases(&draft.phases)?;
        validate_window(draft.start, draft.end)?;
        validate_hours(draft.hours_week)?;

        if !self.employees.employee_exists(&draft.employee_id).await? {
            return Err(ScheduleError::NotFound(format!(
                "employee {} not found",
                draft.employee_id
            )));
        }

        let normalized = normalized_phase_ids(&draft.phases);
        if let Some(existing) = self
            .allocations
            .find_existing(&draft.employee_id, &draft.project_id, &normalized)
            .await?
        {
            return Err(ScheduleError::Conflict {
                message: "an equivalent allocation already exists for this employee, project, and phase set".into(),
                blocking_ids: vec![existing.id],
            });
        }

        let conflicts = overlap::detect_conflicts(
            self.allocations.as_ref(),
            &draft.employee_id,
            draft.start,
            draft.end,
            None,
        )
        .await?;
        let decision = policy::ensure_overridable(&conflicts, draft.start, draft.end)?;
        debug!(
            conflicts = conflicts.len(),
            would_delete = decision.would_delete.len(),
            would_modify = decision.would_modify.len(),
            "resolved override gate for create"
        );

        let now = Utc::now().timestamp();
        let plan = resolver::plan_resolution(&conflicts, draft.start, draft.end, now);

        let allocation = Allocation {
            id: Uuid::new_v4().to_string(),
            employee_id: draft.employee_id,
            project_id: draft.project_id,
            normalized_phase_ids: normalized,
            phases: draft.phases,
            start: draft.start,
            end: draft.end,
            hours_week: draft.hours_week,
            status: draft
                .status
                .unwrap_or_else(|| DEFAULT_ALLOCATION_STATUS.to_owned()),
            charge_out_rate: draft.charge_out_rate,
            charge_type: draft.charge_type,
            can_override: draft.can_override,
            created_at: now,
            updated_at: now,
        };

        let mut batch = AllocationWriteBatch::default();
        extend_batch_with_plan(&mut batch, plan);
        for phase in &allocation.phases {
            batch.push_member_delta(&allocation.project_id, phase, 1);
        }
        batch.assigned = Some(AssignedFlagChange {
            employee_id: allocation.employee_id.clone(),
            assigned: true,
        });
        batch.inserts.push(allocation.clone());

        self.allocations.apply(batch).await?;

        info!(
            allocation_id = %allocation.id,
            employee_id = %allocation.employee_id,
            project_id = %allocation.project_id,
            "allocation created"
        );
        Ok(allocation)
    }

    /// Apply a partial update, rescheduling conflicting bookings when the
    /// window moves.
    pub async fn update_allocation(
        &self,
        id: &str,
        updates: AllocationUpdate,
    ) -> Result<Allocation> {
        let existing = self
            .allocations
            .get_allocation(id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound(format!("allocation {id} not found")))?;

        let now = Utc::now().timestamp();
        let mut batch = AllocationWriteBatch::default();
        let mut next = existing.clone();

        if let Some(phases) = updates.phases {
            validate_phases(&phases)?;
            let (added, removed) = phase_set_difference(&existing.phases, &phases);
            for phase in &added {
                batch.push_member_delta(&existing.project_id, phase, 1);
            }
            for phase in &removed {
                batch.push_member_delta(&existing.project_id, phase, -1);
            }
            next.normalized_phase_ids = normalized_phase_ids(&phases);
            next.phases = phases;
        }

        if let Some(start) = updates.start {
            next.start = start;
        }
        if let Some(end) = updates.end {
            next.end = end;
        }
        if let Some(hours_week) = updates.hours_week {
            validate_hours(hours_week)?;
            next.hours_week = hours_week;
        }
        if let Some(status) = updates.status {
            next.status = status;
        }
        if let Some(rate) = updates.charge_out_rate {
            next.charge_out_rate = rate;
        }
        if let Some(charge_type) = updates.charge_type {
            next.charge_type = charge_type;
        }
        if let Some(can_override) = updates.can_override {
            next.can_override = can_override;
        }

        let window_moved = next.start != existing.start || next.end != existing.end;
        if window_moved {
            validate_window(next.start, next.end)?;

            let conflicts = overlap::detect_conflicts(
                self.allocations.as_ref(),
                &next.employee_id,
                next.start,
                next.end,
                Some(id),
            )
            .await?;
            let decision = policy::ensure_overridable(&conflicts, next.start, next.end)?;
            debug!(
                allocation_id = %id,
                conflicts = conflicts.len(),
                would_delete = decision.would_delete.len(),
                would_modify = decision.would_modify.len(),
                "resolved override gate for update"
            );

            let plan = resolver::plan_resolution(&conflicts, next.start, next.end, now);
            extend_batch_with_plan(&mut batch, plan);

            // The resolver only rewrites other rows; re-check the surviving
            // window before committing anything.
            validate_window(next.start, next.end)?;
        }

        next.updated_at = now;
        batch.updates.push(next.clone());

        self.allocations.apply(batch).await?;

        info!(
            allocation_id = %id,
            employee_id = %next.employee_id,
            window_moved,
            "allocation updated"
        );
        Ok(next)
    }

    /// Delete a booking, cascading its dependent tasks and unwinding the
    /// aggregates it contributed to.
    pub async fn delete_allocation(&self, id: &str) -> Result<()> {
        let existing = self
            .allocations
            .get_allocation(id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound(format!("allocation {id} not found")))?;

        // Count before deleting: this row still counts itself.
        let remaining = self
            .allocations
            .count_employee_allocations(&existing.employee_id)
            .await?;

        let mut batch = AllocationWriteBatch::default();
        for phase in &existing.phases {
            batch.push_member_delta(&existing.project_id, phase, -1);
        }
        batch.task_cascades.push(TaskCascade {
            employee_id: existing.employee_id.clone(),
            project_id: existing.project_id.clone(),
            phase_ids: existing.phases.clone(),
        });
        if remaining == 1 {
            batch.assigned = Some(AssignedFlagChange {
                employee_id: existing.employee_id.clone(),
                assigned: false,
            });
        }
        batch.deletes.push(existing.id.clone());

        self.allocations.apply(batch).await?;

        info!(
            allocation_id = %id,
            employee_id = %existing.employee_id,
            last_allocation = (remaining == 1),
            "allocation deleted"
        );
        Ok(())
    }

    /// Fetch a single allocation.
    pub async fn get_allocation(&self, id: &str) -> Result<Option<Allocation>> {
        self.allocations.get_allocation(id).await
    }

    /// Allocations held by one employee. With `active_only`, restricted to
    /// projects whose status is in the active set.
    pub async fn get_employee_allocations(
        &self,
        employee_id: &str,
        active_only: bool,
    ) -> Result<Vec<Allocation>> {
        let statuses = active_only.then_some(&ACTIVE_PROJECT_STATUSES[..]);
        self.allocations
            .get_employee_allocations(employee_id, statuses)
            .await
    }

    /// Allocations referencing one project.
    pub async fn get_project_allocations(&self, project_id: &str) -> Result<Vec<Allocation>> {
        self.allocations.get_project_allocations(project_id).await
    }

    /// Allocations whose phase set contains `phase_id` within one project.
    pub async fn get_phase_allocations(
        &self,
        project_id: &str,
        phase_id: &str,
    ) -> Result<Vec<Allocation>> {
        self.allocations
            .get_phase_allocations(project_id, phase_id)
            .await
    }

    /// Duplicate-booking guard: an existing allocation matching the
    /// normalized form of `phases` for the same employee and project.
    pub async fn find_existing_allocation(
        &self,
        employee_id: &str,
        project_id: &str,
        phases: &[String],
    ) -> Result<Option<Allocation>> {
        let normalized = normalized_phase_ids(phases);
        self.allocations
            .find_existing(employee_id, project_id, &normalized)
            .await
    }
}

/// Fold a resolution plan into the pending batch, including the member
/// deltas its row changes imply.
fn extend_batch_with_plan(batch: &mut AllocationWriteBatch, plan: ResolutionPlan) {
    for removed in plan.removed {
        for phase in &removed.phases {
            batch.push_member_delta(&removed.project_id, phase, -1);
        }
        batch.deletes.push(removed.id);
    }
    for tail in plan.remainders {
        for phase in &tail.phases {
            batch.push_member_delta(&tail.project_id, phase, 1);
        }
        batch.inserts.push(tail);
    }
    batch.updates.extend(plan.trimmed);
}

/// Order-independent symmetric difference: `(added, removed)` going from
/// `old` to `new`.
fn phase_set_difference(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old_set: BTreeSet<&str> = old.iter().map(String::as_str).collect();
    let new_set: BTreeSet<&str> = new.iter().map(String::as_str).collect();

    let added = new_set
        .difference(&old_set)
        .map(|s| (*s).to_owned())
        .collect();
    let removed = old_set
        .difference(&new_set)
        .map(|s| (*s).to_owned())
        .collect();
    (added, removed)
}

fn validate_phases(phases: &[String]) -> Result<()> {
    if phases.is_empty() {
        return Err(ScheduleError::Validation(
            "phases must be a non-empty set of identifiers".into(),
        ));
    }
    if phases.iter().any(|p| p.trim().is_empty()) {
        return Err(ScheduleError::Validation(
            "phase identifiers must be non-empty".into(),
        ));
    }
    let unique: BTreeSet<&str> = phases.iter().map(String::as_str).collect();
    if unique.len() != phases.len() {
        return Err(ScheduleError::Validation(
            "phases must not contain duplicate identifiers".into(),
        ));
    }
    Ok(())
}

fn validate_window(start: chrono::NaiveDate, end: chrono::NaiveDate) -> Result<()> {
    if end <= start {
        return Err(ScheduleError::Validation(format!(
            "allocation end ({end}) must be after start ({start})"
        )));
    }
    Ok(())
}

fn validate_hours(hours_week: f64) -> Result<()> {
    if hours_week < 0.0 || !hours_week.is_finite() {
        return Err(ScheduleError::Validation(format!(
            "weekly hours must be non-negative, got {hours_week}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_validation_rejects_empty_and_duplicates() {
        assert!(validate_phases(&[]).is_err());
        assert!(validate_phases(&["design".into(), "design".into()]).is_err());
        assert!(validate_phases(&["  ".into()]).is_err());
        assert!(validate_phases(&["design".into(), "build".into()]).is_ok());
    }

    #[test]
    fn symmetric_difference_is_order_independent() {
        let old = vec!["design".to_owned(), "build".to_owned()];
        let new = vec!["qa".to_owned(), "design".to_owned()];

        let (added, removed) = phase_set_difference(&old, &new);
        assert_eq!(added, vec!["qa".to_owned()]);
        assert_eq!(removed, vec!["build".to_owned()]);

        let (added_rev, removed_rev) = phase_set_difference(&new, &old);
        assert_eq!(added_rev, vec!["build".to_owned()]);
        assert_eq!(removed_rev, vec!["qa".to_owned()]);
    }

    #[test]
    fn window_validation_requires_end_after_start() {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert!(validate_window(start, start).is_err());
        assert!(validate_window(start, start + chrono::Duration::days(1)).is_ok());
    }
}
