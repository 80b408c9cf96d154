//! Multi-select filtering over the canonical task populations.
//!
//! Gates run in a fixed order per population: type, status, subtype (scan
//! only), free text. Counts are computed over the unfiltered data so option
//! badges always describe the whole dataset.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::status::TaskStatus;
use crate::task::{CanonicalTask, TaskType};
use crate::view::{TaskPopulations, sort_by_recency};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub statuses: BTreeSet<TaskStatus>,
    #[serde(default)]
    pub types: BTreeSet<TaskType>,
    #[serde(default)]
    pub subtypes: BTreeSet<String>,
}

impl FilterState {
    /// Flip membership of `status`; returns whether it is now selected.
    pub fn toggle_status(&mut self, status: TaskStatus) -> bool {
        toggle(&mut self.statuses, status)
    }

    pub fn toggle_type(&mut self, task_type: TaskType) -> bool {
        toggle(&mut self.types, task_type)
    }

    pub fn toggle_subtype(&mut self, subtype: impl Into<String>) -> bool {
        toggle(&mut self.subtypes, subtype.into())
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        !self.query.trim().is_empty()
            || !self.statuses.is_empty()
            || !self.types.is_empty()
            || !self.subtypes.is_empty()
    }

    /// Type gate. An excluded population contributes no rows at all.
    pub fn admits_type(&self, task_type: TaskType) -> bool {
        self.types.is_empty() || self.types.contains(&task_type)
    }

    fn admits_status(&self, task: &CanonicalTask) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&task.status)
    }

    // Selecting any subtype narrows the scan population to archive/restore
    // rows, so plain scans drop out as soon as the subtype set is non-empty.
    fn admits_subtype(&self, task: &CanonicalTask) -> bool {
        if task.task_type != TaskType::Scan {
            return true;
        }
        match task.subtype.as_deref() {
            Some(subtype) => self.subtypes.is_empty() || self.subtypes.contains(subtype),
            None => self.subtypes.is_empty(),
        }
    }

    fn admits_text(task: &CanonicalTask, needle: &str) -> bool {
        needle.is_empty() || task.search_text().to_lowercase().contains(needle)
    }

    /// Filter each population, then merge and order by recency.
    pub fn apply(&self, populations: &TaskPopulations) -> FilteredTasks {
        let needle = self.query.trim().to_lowercase();
        let mut tasks = Vec::new();
        for task_type in TaskType::ALL {
            if !self.admits_type(task_type) {
                continue;
            }
            tasks.extend(
                populations
                    .population(task_type)
                    .iter()
                    .filter(|task| self.admits_status(task))
                    .filter(|task| self.admits_subtype(task))
                    .filter(|task| Self::admits_text(task, &needle))
                    .cloned(),
            );
        }
        sort_by_recency(&mut tasks);

        FilteredTasks {
            tasks,
            counts: TaskCounts::from_populations(populations),
        }
    }
}

fn toggle<T: Ord>(set: &mut BTreeSet<T>, value: T) -> bool {
    if set.remove(&value) {
        false
    } else {
        set.insert(value);
        true
    }
}

/// Badge counts per filter dimension, independent of the active filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    /// Keyed by normalized status string; unmapped raw statuses appear verbatim.
    pub status: BTreeMap<String, usize>,
    pub types: BTreeMap<TaskType, usize>,
    /// Archive/restore scan kinds only.
    pub subtypes: BTreeMap<String, usize>,
}

impl TaskCounts {
    pub fn from_populations(populations: &TaskPopulations) -> Self {
        let mut counts = Self::default();
        for task_type in TaskType::ALL {
            let population = populations.population(task_type);
            counts.types.insert(task_type, population.len());
            for task in population {
                *counts
                    .status
                    .entry(task.status.as_str().to_string())
                    .or_default() += 1;
            }
        }
        for subtype in populations.scan.iter().filter_map(|t| t.subtype.as_deref()) {
            *counts.subtypes.entry(subtype.to_string()).or_default() += 1;
        }
        counts
    }

    pub fn status_count(&self, status: &TaskStatus) -> usize {
        self.status.get(status.as_str()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilteredTasks {
    pub tasks: Vec<CanonicalTask>,
    pub counts: TaskCounts,
}
