//! Employee types
//!
//! The engine only touches two denormalized facets of an employee record:
//! the `assigned` flag and the cached utilization table. Everything else
//! (name, role, contact details) belongs to the surrounding directory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Utilization percentages for the four tracked weeks of one month.
///
/// Weeks beyond the fourth are dropped by the aggregator, a documented
/// limitation inherited from the booking system this engine replaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthUtilization {
    pub week1: f64,
    pub week2: f64,
    pub week3: f64,
    pub week4: f64,
}

impl MonthUtilization {
    /// Set the percentage for a 1-based week index. Indices above 4 are
    /// ignored.
    pub fn set_week(&mut self, week: u32, percentage: f64) {
        match week {
            1 => self.week1 = percentage,
            2 => self.week2 = percentage,
            3 => self.week3 = percentage,
            4 => self.week4 = percentage,
            _ => {}
        }
    }

    /// Read the percentage for a 1-based week index.
    pub fn week(&self, week: u32) -> Option<f64> {
        match week {
            1 => Some(self.week1),
            2 => Some(self.week2),
            3 => Some(self.week3),
            4 => Some(self.week4),
            _ => None,
        }
    }
}

/// Denormalized utilization cache: `year -> zero-padded month -> weeks`.
///
/// Rebuilt wholesale by the utilization aggregator and written back onto the
/// employee record.
pub type UtilizationTable = BTreeMap<i32, BTreeMap<String, MonthUtilization>>;

/// An employee as seen by the allocation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub position: String,
    /// True iff the employee currently holds at least one live allocation.
    pub assigned: bool,
    #[serde(default)]
    pub utilization: UtilizationTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_indices_above_four_are_ignored() {
        let mut month = MonthUtilization::default();
        month.set_week(2, 75.5);
        month.set_week(5, 99.0);

        assert_eq!(month.week(2), Some(75.5));
        assert_eq!(month.week(5), None);
        assert_eq!(month.week4, 0.0);
    }
}
