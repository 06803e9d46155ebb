//! Write-batch types
//!
//! A write batch describes every row mutation one engine operation performs:
//! the triggering insert/update, conflict-resolution rewrites, aggregate
//! deltas, and task cascades. The persistence adapter applies a batch inside
//! a single transaction so no partial application is ever observable.

use serde::{Deserialize, Serialize};

use super::allocation::Allocation;

/// Incremental adjustment to one phase's member count.
///
/// Member counts are maintained purely by deltas (+1/-1), never recounted
/// from a full scan, so concurrent writes touching disjoint phases cannot
/// double count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseMemberDelta {
    pub project_id: String,
    pub phase_id: String,
    pub delta: i32,
}

/// Pending change to an employee's `assigned` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedFlagChange {
    pub employee_id: String,
    pub assigned: bool,
}

/// Cascade removal of the tasks that depend on a deleted allocation.
///
/// Tasks are keyed by `(employee, project, phase)`, so the cascade names the
/// deleted allocation's coordinates rather than an allocation id. Each named
/// phase also gets its completion rate recomputed from the surviving tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCascade {
    pub employee_id: String,
    pub project_id: String,
    pub phase_ids: Vec<String>,
}

/// Every mutation one allocation-store operation performs, applied
/// atomically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationWriteBatch {
    /// New rows: the triggering create plus any split remainders.
    pub inserts: Vec<Allocation>,
    /// Full-row rewrites: the triggering update plus trimmed conflicts.
    pub updates: Vec<Allocation>,
    /// Removed rows: the triggering delete plus subsumed conflicts.
    pub deletes: Vec<String>,
    /// Member-count adjustments for every phase the batch touches.
    pub member_deltas: Vec<PhaseMemberDelta>,
    /// Assignment-flag flip, when the batch changes live-allocation count
    /// across the 0/1 boundary.
    pub assigned: Option<AssignedFlagChange>,
    /// Task cascades for explicitly deleted allocations.
    pub task_cascades: Vec<TaskCascade>,
}

impl AllocationWriteBatch {
    /// Whether the batch carries no work at all.
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
            && self.updates.is_empty()
            && self.deletes.is_empty()
            && self.member_deltas.is_empty()
            && self.assigned.is_none()
            && self.task_cascades.is_empty()
    }

    /// Add a member delta, merging with an existing entry for the same
    /// phase.
    pub fn push_member_delta(&mut self, project_id: &str, phase_id: &str, delta: i32) {
        if let Some(existing) = self
            .member_deltas
            .iter_mut()
            .find(|d| d.project_id == project_id && d.phase_id == phase_id)
        {
            existing.delta += delta;
            return;
        }
        self.member_deltas.push(PhaseMemberDelta {
            project_id: project_id.to_owned(),
            phase_id: phase_id.to_owned(),
            delta,
        });
    }
}
