//! Utilization aggregation
//!
//! Rebuilds one employee's utilization table from scratch:
//! `year -> month -> week_of_month(1..=4) -> percentage`, where the
//! percentage compares actually logged completed-task hours against
//! allocated hours for that week.
//!
//! Allocated hours are produced by striding each allocation's window in
//! 7-day steps from its start and spreading `hours_week` evenly across
//! `ceil(duration_days / 7)` weeks. Actual hours come from completed tasks,
//! bucketed by the task's own date. Weeks are Monday-aligned from the week
//! containing the 1st of the month; buckets past week 4 are dropped, and a
//! month only materializes once a completed task lands in it.
//!
//! The recompute loads the employee's full allocation and task history, so
//! treat it as an on-demand batch operation rather than something to run on
//! every task write.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use crewplan_domain::constants::MAX_UTILIZATION_WEEK;
use crewplan_domain::types::{Allocation, Task};
use crewplan_domain::{Result, ScheduleError, UtilizationTable};
use tracing::info;

use crate::scheduling::ports::{AllocationRepository, EmployeeDirectory, TaskStore};

/// Number of weekly buckets an allocation's hours are spread across:
/// `ceil(duration_days / 7)`, floored at one bucket.
pub fn weeks_spanned(start: NaiveDate, end: NaiveDate) -> i64 {
    let days = (end - start).num_days();
    ((days + 6) / 7).max(1)
}

/// 1-based week of month, Monday-aligned from the week containing the 1st.
///
/// The 1st of the month always lands in week 1; week 2 starts on the first
/// Monday strictly after the 1st.
pub fn week_of_month(date: NaiveDate) -> u32 {
    let first = date.with_day(1).unwrap_or(date);
    let first_weekday = i64::from(first.weekday().number_from_monday());
    let weekday = i64::from(date.weekday().number_from_monday());
    let day_of_month = i64::from(date.day());

    let numerator = day_of_month + first_weekday - weekday;
    ((numerator + 6) / 7) as u32
}

#[derive(Debug, Default, Clone, Copy)]
struct BucketTotals {
    actual: f64,
    allocated: f64,
}

/// Build the utilization table for one employee from their allocations and
/// completed tasks. Pure; persistence happens in the service.
pub fn build_utilization(allocations: &[Allocation], tasks: &[Task]) -> UtilizationTable {
    // Spread every allocation's weekly hours across its weekly buckets.
    let mut allocated: BTreeMap<(i32, u32, u32), f64> = BTreeMap::new();
    for allocation in allocations {
        let weeks = weeks_spanned(allocation.start, allocation.end);
        let hours_per_week = allocation.hours_week / weeks as f64;

        let mut current = allocation.start;
        while current < allocation.end {
            let key = (current.year(), current.month(), week_of_month(current));
            *allocated.entry(key).or_insert(0.0) += hours_per_week;
            current += Duration::days(7);
        }
    }

    // Buckets materialize where completed work was logged; the bucket's
    // allocated figure is looked up from the allocation spread.
    let mut buckets: BTreeMap<(i32, u32, u32), BucketTotals> = BTreeMap::new();
    for task in tasks.iter().filter(|t| t.is_completed()) {
        let key = (
            task.task_date.year(),
            task.task_date.month(),
            week_of_month(task.task_date),
        );
        let entry = buckets.entry(key).or_insert_with(|| BucketTotals {
            actual: 0.0,
            allocated: allocated.get(&key).copied().unwrap_or(0.0),
        });
        entry.actual += task.actual_hours;
    }

    let mut table = UtilizationTable::new();
    for ((year, month, week), totals) in buckets {
        if week > MAX_UTILIZATION_WEEK {
            continue;
        }
        let month_entry = table
            .entry(year)
            .or_default()
            .entry(format!("{month:02}"))
            .or_default();

        let percentage = if totals.allocated > 0.0 {
            ((totals.actual / totals.allocated) * 100.0).min(100.0)
        } else {
            0.0
        };
        month_entry.set_week(week, (percentage * 10.0).round() / 10.0);
    }
    table
}

/// Recomputes and caches employee utilization tables.
pub struct UtilizationService {
    allocations: Arc<dyn AllocationRepository>,
    employees: Arc<dyn EmployeeDirectory>,
    tasks: Arc<dyn TaskStore>,
}

impl UtilizationService {
    /// Create a new service over the given ports.
    pub fn new(
        allocations: Arc<dyn AllocationRepository>,
        employees: Arc<dyn EmployeeDirectory>,
        tasks: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            allocations,
            employees,
            tasks,
        }
    }

    /// Rebuild the employee's utilization table from scratch and write it
    /// back onto the employee record.
    pub async fn recalculate_for_employee(&self, employee_id: &str) -> Result<UtilizationTable> {
        if !self.employees.employee_exists(employee_id).await? {
            return Err(ScheduleError::NotFound(format!(
                "employee {employee_id} not found"
            )));
        }

        let allocations = self
            .allocations
            .get_employee_allocations(employee_id, None)
            .await?;
        let tasks = self.tasks.completed_tasks_for_employee(employee_id).await?;

        let table = build_utilization(&allocations, &tasks);
        self.employees.save_utilization(employee_id, &table).await?;

        info!(
            employee_id,
            allocations = allocations.len(),
            completed_tasks = tasks.len(),
            years = table.len(),
            "utilization recalculated"
        );
        Ok(table)
    }
}
