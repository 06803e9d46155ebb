//! Project and phase types
//!
//! Phases are embedded in their owning project and mutated only as a whole
//! replacement list (read, copy, modify, write back), which keeps the
//! atomic-replace contract explicit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A named sub-interval of a project's plan.
///
/// `members` counts the live allocations referencing this phase and is
/// maintained incrementally; it never goes negative. `completion_rate` and
/// `number_of_tasks` are recomputed wholesale from the task set on every
/// affecting mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPhase {
    pub id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub members: u32,
    #[serde(default)]
    pub number_of_tasks: u32,
    #[serde(default)]
    pub completion_rate: u8,
}

/// A project as seen by the allocation engine: status plus the embedded
/// phase list. The full project record (budget, client, pause history) is
/// owned by the surrounding layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub phases: Vec<ProjectPhase>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Project {
    /// Find an embedded phase by id.
    pub fn phase(&self, phase_id: &str) -> Option<&ProjectPhase> {
        self.phases.iter().find(|p| p.id == phase_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_lookup_by_id() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let project = Project {
            id: "p-1".into(),
            name: "Atlas".into(),
            status: "on going".into(),
            start_date: date,
            end_date: date,
            phases: vec![ProjectPhase {
                id: "design".into(),
                name: "Design".into(),
                start_date: date,
                end_date: date,
                members: 0,
                number_of_tasks: 0,
                completion_rate: 0,
            }],
            created_at: 0,
            updated_at: 0,
        };

        assert!(project.phase("design").is_some());
        assert!(project.phase("build").is_none());
    }
}
