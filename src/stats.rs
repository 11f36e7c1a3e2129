// src/stats.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{Priority, Task, TaskStatus};

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct PriorityBreakdown {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

/// Summary counts over a set of tasks, as shown on the dashboard.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub overdue: u64,
    pub by_priority: PriorityBreakdown,
    pub by_category: BTreeMap<String, u64>,
    /// Percentage rounded to one decimal.
    pub completion_rate: f64,
    /// Open tasks due between now and seven days from now.
    pub due_this_week: u64,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let week_ahead = now + Duration::days(7);
        let mut stats = TaskStats::default();

        for task in tasks {
            stats.total += 1;
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
            }
            match task.priority {
                Priority::High => stats.by_priority.high += 1,
                Priority::Medium => stats.by_priority.medium += 1,
                Priority::Low => stats.by_priority.low += 1,
            }
            if task.is_overdue(now) {
                stats.overdue += 1;
            }
            if let Some(due) = task.due_date {
                if task.status != TaskStatus::Completed && due >= now && due <= week_ahead {
                    stats.due_this_week += 1;
                }
            }
            *stats.by_category.entry(task.category.clone()).or_insert(0) += 1;
        }

        if stats.total > 0 {
            let rate = stats.completed as f64 / stats.total as f64 * 100.0;
            stats.completion_rate = (rate * 10.0).round() / 10.0;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(
        status: TaskStatus,
        priority: Priority,
        category: &str,
        due_in_days: Option<i64>,
        now: DateTime<Utc>,
    ) -> Task {
        let mut task = Task::new("u1", "t", now);
        task.set_status(status, now);
        task.priority = priority;
        task.category = category.to_string();
        task.due_date = due_in_days.map(|d| now + Duration::days(d));
        task
    }

    #[test]
    fn empty_set_is_all_zero() {
        let stats = TaskStats::from_tasks(&[], Utc::now());
        assert_eq!(stats, TaskStats::default());
        assert_eq!(stats.completion_rate, 0.0);
    }

    #[test]
    fn counts_and_breakdowns() {
        let now = Utc::now();
        let tasks = vec![
            task(TaskStatus::Pending, Priority::High, "Work", Some(-1), now),
            task(TaskStatus::InProgress, Priority::Medium, "Work", Some(3), now),
            task(TaskStatus::Completed, Priority::Low, "Home", Some(2), now),
            task(TaskStatus::Pending, Priority::Medium, "General", Some(10), now),
            task(TaskStatus::Pending, Priority::Medium, "General", None, now),
            task(TaskStatus::Completed, Priority::High, "Home", Some(-5), now),
        ];
        let stats = TaskStats::from_tasks(&tasks, now);

        assert_eq!(stats.total, 6);
        assert_eq!((stats.pending, stats.in_progress, stats.completed), (3, 1, 2));
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.due_this_week, 1);
        assert_eq!(
            stats.by_priority,
            PriorityBreakdown {
                high: 2,
                medium: 3,
                low: 1
            }
        );
        assert_eq!(stats.by_category.get("Work"), Some(&2));
        assert_eq!(stats.by_category.get("Home"), Some(&2));
        assert_eq!(stats.by_category.get("General"), Some(&2));
        assert_eq!(stats.completion_rate, 33.3);
    }

    #[test]
    fn serializes_camel_case() {
        let now = Utc::now();
        let done = task(TaskStatus::Completed, Priority::Low, "Home", None, now);
        let stats = TaskStats::from_tasks(&[done], now);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["inProgress"], 0);
        assert_eq!(json["completionRate"], 100.0);
        assert_eq!(json["byPriority"]["low"], 1);
        assert_eq!(json["byCategory"]["Home"], 1);
        assert_eq!(json["dueThisWeek"], 0);
    }
}
