//! Project phase aggregate sync
//!
//! Two counters live on every phase and are deliberately maintained by
//! different strategies: `members` moves by +1/-1 deltas inside allocation
//! write batches (O(1), no cross-phase races), while `number_of_tasks` and
//! `completion_rate` are recomputed wholesale from the task set on every
//! affecting mutation. The two are never reconciled against each other.
//!
//! Phase lists are replaced as a whole (read, copy, modify, write back);
//! nothing mutates a phase in place.

use std::sync::Arc;

use crewplan_domain::constants::TASK_STATUS_COMPLETED;
use crewplan_domain::types::ProjectPhase;
use crewplan_domain::{Result, ScheduleError};
use tracing::info;

use crate::scheduling::ports::{ProjectDirectory, TaskStore};

/// Full recompute of a phase completion percentage from task counts.
///
/// `round(100 * completed / total)`, or 0 when the phase has no tasks.
pub fn completion_rate(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let rate = (f64::from(completed) / f64::from(total)) * 100.0;
    // completed <= total keeps this within 0..=100.
    rate.round() as u8
}

/// Keeps phase task rollups consistent with the live task set.
pub struct PhaseAggregateService {
    projects: Arc<dyn ProjectDirectory>,
    tasks: Arc<dyn TaskStore>,
}

impl PhaseAggregateService {
    /// Create a new service over the given ports.
    pub fn new(projects: Arc<dyn ProjectDirectory>, tasks: Arc<dyn TaskStore>) -> Self {
        Self { projects, tasks }
    }

    /// Recompute `number_of_tasks` and `completion_rate` for one phase from
    /// the current task set and write the whole phase list back.
    ///
    /// Called by the adjacent task subsystem after task create/update/delete;
    /// allocation deletion runs the same recompute inside its own
    /// transaction for the phases whose tasks were cascaded away.
    pub async fn sync_phase_progress(
        &self,
        project_id: &str,
        phase_id: &str,
    ) -> Result<ProjectPhase> {
        let project = self
            .projects
            .get_project(project_id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound(format!("project {project_id} not found")))?;

        let mut phases = project.phases;
        let index = phases
            .iter()
            .position(|p| p.id == phase_id)
            .ok_or_else(|| {
                ScheduleError::NotFound(format!(
                    "phase {phase_id} not found on project {project_id}"
                ))
            })?;

        let total = self.tasks.count_tasks(project_id, phase_id).await?;
        let completed = self
            .tasks
            .count_tasks_by_status(project_id, phase_id, TASK_STATUS_COMPLETED)
            .await?;

        phases[index].number_of_tasks = total;
        phases[index].completion_rate = completion_rate(completed, total);
        let synced = phases[index].clone();

        self.projects.replace_phases(project_id, phases).await?;

        info!(
            project_id,
            phase_id,
            total_tasks = total,
            completion_rate = synced.completion_rate,
            "phase progress synced"
        );
        Ok(synced)
    }
}
