//! Conflict resolution planning
//!
//! Given a pre-validated (all-overridable) conflict set and the new window
//! `[ns, ne)`, each conflict `[cs, ce)` falls into exactly one case at day
//! granularity, with a one-day buffer so no two resulting windows touch:
//!
//! - **Subsumed** (`cs >= ns && ce <= ne`): the conflict is deleted.
//! - **Contains** (`cs < ns && ce > ne`): the conflict keeps `[cs, ns-1d]`
//!   and a clone covering `[ne+1d, ce]` is created. A side whose window
//!   would be degenerate (`start >= end`) is omitted.
//! - **Overlaps-start** (`cs < ns`, not Contains): end trimmed to `ns-1d`,
//!   or the row is deleted if that window is degenerate.
//! - **Overlaps-end** (`ce > ne`, not Contains): start trimmed to `ne+1d`,
//!   or the row is deleted if degenerate.
//!
//! The planner is pure; the resulting mutations execute together with the
//! triggering write inside the store's single transaction.

use chrono::{Duration, NaiveDate};
use crewplan_domain::constants::RESOLUTION_BUFFER_DAYS;
use crewplan_domain::types::Allocation;
use uuid::Uuid;

/// How one conflicting allocation is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictCase {
    Subsumed,
    Contains,
    OverlapsStart,
    OverlapsEnd,
}

/// Classify one overlapping conflict against the new window.
///
/// Callers must only pass genuinely overlapping windows; the four cases
/// partition that space.
pub fn classify(
    conflict_start: NaiveDate,
    conflict_end: NaiveDate,
    new_start: NaiveDate,
    new_end: NaiveDate,
) -> ConflictCase {
    if conflict_start >= new_start && conflict_end <= new_end {
        ConflictCase::Subsumed
    } else if conflict_start < new_start && conflict_end > new_end {
        ConflictCase::Contains
    } else if conflict_start < new_start {
        ConflictCase::OverlapsStart
    } else {
        ConflictCase::OverlapsEnd
    }
}

/// Planned rewrites for a conflict set.
#[derive(Debug, Clone, Default)]
pub struct ResolutionPlan {
    /// Conflict rows surviving with a trimmed window (full-row rewrites).
    pub trimmed: Vec<Allocation>,
    /// Fresh rows covering the far side of a split conflict.
    pub remainders: Vec<Allocation>,
    /// Conflict rows removed entirely.
    pub removed: Vec<Allocation>,
}

impl ResolutionPlan {
    /// Whether the plan rewrites anything at all.
    pub fn is_empty(&self) -> bool {
        self.trimmed.is_empty() && self.remainders.is_empty() && self.removed.is_empty()
    }
}

/// Plan the rewrite of every conflict so `[new_start, new_end)` becomes
/// exclusively available. `now` stamps clones created for split conflicts.
pub fn plan_resolution(
    conflicts: &[Allocation],
    new_start: NaiveDate,
    new_end: NaiveDate,
    now: i64,
) -> ResolutionPlan {
    let buffer = Duration::days(RESOLUTION_BUFFER_DAYS);
    let left_end = new_start - buffer;
    let right_start = new_end + buffer;

    let mut plan = ResolutionPlan::default();

    for conflict in conflicts {
        match classify(conflict.start, conflict.end, new_start, new_end) {
            ConflictCase::Subsumed => plan.removed.push(conflict.clone()),
            ConflictCase::Contains => {
                let keep_left = conflict.start < left_end;
                let keep_right = right_start < conflict.end;
                match (keep_left, keep_right) {
                    (true, true) => {
                        let mut left = conflict.clone();
                        left.end = left_end;
                        left.updated_at = now;
                        plan.remainders
                            .push(clone_tail(conflict, right_start, now));
                        plan.trimmed.push(left);
                    }
                    (true, false) => {
                        let mut left = conflict.clone();
                        left.end = left_end;
                        left.updated_at = now;
                        plan.trimmed.push(left);
                    }
                    (false, true) => {
                        let mut right = conflict.clone();
                        right.start = right_start;
                        right.updated_at = now;
                        plan.trimmed.push(right);
                    }
                    (false, false) => plan.removed.push(conflict.clone()),
                }
            }
            ConflictCase::OverlapsStart => {
                if conflict.start < left_end {
                    let mut trimmed = conflict.clone();
                    trimmed.end = left_end;
                    trimmed.updated_at = now;
                    plan.trimmed.push(trimmed);
                } else {
                    plan.removed.push(conflict.clone());
                }
            }
            ConflictCase::OverlapsEnd => {
                if right_start < conflict.end {
                    let mut trimmed = conflict.clone();
                    trimmed.start = right_start;
                    trimmed.updated_at = now;
                    plan.trimmed.push(trimmed);
                } else {
                    plan.removed.push(conflict.clone());
                }
            }
        }
    }

    plan
}

/// Clone the far side of a split conflict: same booking fields, fresh
/// identity and timestamps, window `[right_start, original end]`.
fn clone_tail(conflict: &Allocation, right_start: NaiveDate, now: i64) -> Allocation {
    let mut tail = conflict.clone();
    tail.id = Uuid::new_v4().to_string();
    tail.start = right_start;
    tail.created_at = now;
    tail.updated_at = now;
    tail
}
