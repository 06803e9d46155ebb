//! Overlap detection (read-only)
//!
//! Date windows are half-open: `[s1, e1)` and `[s2, e2)` overlap iff
//! `s1 < e2 && s2 < e1`. The detector itself does no filtering beyond the
//! predicate; the repository's range index does the heavy lifting.

use chrono::NaiveDate;
use crewplan_domain::types::Allocation;
use crewplan_domain::Result;

use super::ports::AllocationRepository;

/// Pure half-open interval intersection test.
pub fn windows_overlap(
    s1: NaiveDate,
    e1: NaiveDate,
    s2: NaiveDate,
    e2: NaiveDate,
) -> bool {
    s1 < e2 && s2 < e1
}

/// Find every allocation of `employee_id` conflicting with the given
/// window, excluding `exclude_id` (the row being updated) when given.
///
/// The range query narrows candidates; the pure predicate is authoritative.
pub async fn detect_conflicts(
    repository: &dyn AllocationRepository,
    employee_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    exclude_id: Option<&str>,
) -> Result<Vec<Allocation>> {
    let mut conflicts = repository
        .find_overlapping(employee_id, start, end, exclude_id)
        .await?;
    conflicts.retain(|conflict| windows_overlap(conflict.start, conflict.end, start, end));
    Ok(conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn overlapping_windows_are_detected() {
        assert!(windows_overlap(
            date(2024, 1, 1),
            date(2024, 1, 31),
            date(2024, 1, 15),
            date(2024, 2, 15),
        ));
    }

    #[test]
    fn touching_windows_do_not_overlap() {
        assert!(!windows_overlap(
            date(2024, 1, 1),
            date(2024, 1, 15),
            date(2024, 1, 15),
            date(2024, 1, 31),
        ));
    }

    #[test]
    fn contained_window_overlaps() {
        assert!(windows_overlap(
            date(2024, 1, 10),
            date(2024, 1, 12),
            date(2024, 1, 1),
            date(2024, 1, 31),
        ));
    }
}
