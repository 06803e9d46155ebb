//! Override policy evaluation
//!
//! Classifies a detected conflict set before any mutation is planned. The
//! aggregate override permission holds only when every individual conflict
//! carries `can_override = true`; a single blocking row fails the whole
//! write. This evaluator never mutates state.

use chrono::NaiveDate;
use crewplan_domain::types::Allocation;
use crewplan_domain::{Result, ScheduleError};

/// Outcome of gating a conflict set against a new window.
#[derive(Debug, Clone, Default)]
pub struct OverrideDecision {
    /// Conflicts whose window is fully contained in the new one; resolving
    /// them removes the row entirely.
    pub would_delete: Vec<String>,
    /// Conflicts that would survive in trimmed or split form.
    pub would_modify: Vec<String>,
    /// Conflicts that refuse to be overridden; non-empty blocks the write.
    pub blocking_ids: Vec<String>,
}

impl OverrideDecision {
    /// Whether every conflict may be overridden.
    pub fn can_override(&self) -> bool {
        self.blocking_ids.is_empty()
    }
}

/// Partition `conflicts` relative to the new `[start, end)` window and
/// collect the ids of rows that refuse override.
pub fn evaluate(conflicts: &[Allocation], start: NaiveDate, end: NaiveDate) -> OverrideDecision {
    let mut decision = OverrideDecision::default();

    for conflict in conflicts {
        if !conflict.can_override {
            decision.blocking_ids.push(conflict.id.clone());
        }
        if conflict.start >= start && conflict.end <= end {
            decision.would_delete.push(conflict.id.clone());
        } else {
            decision.would_modify.push(conflict.id.clone());
        }
    }

    decision
}

/// Gate a conflict set: `Ok` when all conflicts are overridable, otherwise a
/// [`ScheduleError::Conflict`] carrying the blocking ids for manual
/// resolution.
pub fn ensure_overridable(
    conflicts: &[Allocation],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<OverrideDecision> {
    let decision = evaluate(conflicts, start, end);
    if decision.can_override() {
        return Ok(decision);
    }
    Err(ScheduleError::Conflict {
        message: format!(
            "{} overlapping allocation(s) cannot be overridden",
            decision.blocking_ids.len()
        ),
        blocking_ids: decision.blocking_ids,
    })
}
