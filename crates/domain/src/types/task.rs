//! Task types
//!
//! Tasks are owned by an adjacent subsystem; the engine consumes them
//! read-only for phase completion and utilization figures, and cascades
//! their deletion when the owning allocation is removed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A unit of logged work against one allocation's employee/project/phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub employee_id: String,
    pub project_id: String,
    pub phase_id: String,
    pub title: String,
    /// `pending`, `in-progress`, `completed`, or `rejected`.
    pub status: String,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    /// The day the work was logged for; utilization buckets derive from
    /// this date, not from the allocation's window.
    pub task_date: NaiveDate,
    pub created_at: i64,
}

impl Task {
    /// Whether this task counts toward completion and utilization rollups.
    pub fn is_completed(&self) -> bool {
        self.status == crate::constants::TASK_STATUS_COMPLETED
    }
}
