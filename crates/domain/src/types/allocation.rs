//! Allocation types
//!
//! An allocation books one employee onto one project (and a subset of its
//! phases) for a date range with a weekly-hour commitment. Allocations are
//! created, updated, and deleted only through the allocation store, which
//! keeps the per-employee no-overlap invariant.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A persisted booking of an employee against a project.
///
/// `start`/`end` form a half-open day window (`start < end` always holds for
/// live rows). `phases` is semantically a set; `normalized_phase_ids` is its
/// canonical sorted serialization and serves as the duplicate-detection key
/// for `(employee_id, project_id)` pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: String,
    pub employee_id: String,
    pub project_id: String,
    pub phases: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub hours_week: f64,
    pub status: String,
    pub charge_out_rate: f64,
    pub charge_type: String,
    /// Whether a conflicting write may trim, split, or delete this row.
    /// Set from the caller's authority level; consumed here, never computed.
    pub can_override: bool,
    pub normalized_phase_ids: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Allocation {
    /// Number of days covered by the `[start, end]` range.
    pub fn duration_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Whether this allocation's window intersects the given half-open
    /// window.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start < end && start < self.end
    }
}

/// Input for creating a new allocation. The store assigns the id,
/// timestamps, and normalized phase key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationDraft {
    pub employee_id: String,
    pub project_id: String,
    pub phases: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub hours_week: f64,
    pub status: Option<String>,
    pub charge_out_rate: f64,
    pub charge_type: String,
    pub can_override: bool,
}

/// Partial update for an existing allocation. `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationUpdate {
    pub phases: Option<Vec<String>>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub hours_week: Option<f64>,
    pub status: Option<String>,
    pub charge_out_rate: Option<f64>,
    pub charge_type: Option<String>,
    pub can_override: Option<bool>,
}

impl AllocationUpdate {
    /// Whether the update changes the date window at all.
    pub fn touches_window(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

/// Canonical serialized form of a phase set.
///
/// Sorted and JSON-serialized so two allocations carrying the same phases in
/// any order produce byte-identical keys.
pub fn normalized_phase_ids(phases: &[String]) -> String {
    let mut sorted: Vec<&str> = phases.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    serde_json::to_string(&sorted).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn normalized_phase_ids_is_order_independent() {
        let a = normalized_phase_ids(&["design".into(), "build".into()]);
        let b = normalized_phase_ids(&["build".into(), "design".into()]);
        assert_eq!(a, b);
        assert_eq!(a, r#"["build","design"]"#);
    }

    #[test]
    fn overlaps_uses_half_open_windows() {
        let allocation = Allocation {
            id: "a-1".into(),
            employee_id: "e-1".into(),
            project_id: "p-1".into(),
            phases: vec!["design".into()],
            start: date(2024, 1, 10),
            end: date(2024, 1, 20),
            hours_week: 40.0,
            status: "active".into(),
            charge_out_rate: 100.0,
            charge_type: "hourly".into(),
            can_override: true,
            normalized_phase_ids: normalized_phase_ids(&["design".into()]),
            created_at: 0,
            updated_at: 0,
        };

        assert!(allocation.overlaps(date(2024, 1, 15), date(2024, 1, 25)));
        assert!(allocation.overlaps(date(2024, 1, 1), date(2024, 1, 11)));
        // Touching at the boundary is not an overlap for half-open windows.
        assert!(!allocation.overlaps(date(2024, 1, 20), date(2024, 1, 25)));
        assert!(!allocation.overlaps(date(2024, 1, 1), date(2024, 1, 10)));
    }
}
