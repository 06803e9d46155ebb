//! Domain constants
//!
//! Centralized location for domain-level constants used throughout the
//! engine.

/// Project statuses whose allocations count as "active" for filtered
/// employee-allocation reads.
pub const ACTIVE_PROJECT_STATUSES: [&str; 2] = ["on going", "completed"];

/// Task status that contributes to phase completion and utilization figures.
pub const TASK_STATUS_COMPLETED: &str = "completed";

/// Default status stamped on newly created allocations.
pub const DEFAULT_ALLOCATION_STATUS: &str = "active";

/// Day buffer inserted between a resolved conflict and the new window so no
/// two windows for the same employee ever touch.
pub const RESOLUTION_BUFFER_DAYS: i64 = 1;

/// Utilization buckets above this week-of-month index are dropped.
pub const MAX_UTILIZATION_WEEK: u32 = 4;
