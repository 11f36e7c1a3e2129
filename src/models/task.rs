use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Low" => Some(Priority::Low),
            "Medium" => Some(Priority::Medium),
            "High" => Some(Priority::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(TaskStatus::Pending),
            "In Progress" => Some(TaskStatus::InProgress),
            "Completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

pub const DEFAULT_CATEGORY: &str = "General";

/// A task as stored in the `tasks` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    /// Set for team tasks; personal tasks leave it empty.
    pub team_id: Option<String>,
    pub assigned_to: Option<String>,
    /// The creator and owner.
    pub user_id: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(user_id: &str, title: &str, now: DateTime<Utc>) -> Self {
        Task {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: String::new(),
            category: DEFAULT_CATEGORY.to_string(),
            priority: Priority::default(),
            status: TaskStatus::default(),
            due_date: None,
            team_id: None,
            assigned_to: None,
            user_id: user_id.to_string(),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Changes the status and keeps `completed_at` in step with it: stamped
    /// on the way into Completed, cleared on the way out.
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        self.status = status;
        if status == TaskStatus::Completed {
            if self.completed_at.is_none() {
                self.completed_at = Some(now);
            }
        } else {
            self.completed_at = None;
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => self.status != TaskStatus::Completed && due < now,
            None => false,
        }
    }

    pub fn into_view(self, now: DateTime<Utc>) -> TaskView {
        let is_overdue = self.is_overdue(now);
        TaskView {
            task: self,
            is_overdue,
        }
    }
}

/// API representation of a task, carrying the derived `isOverdue` flag.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub is_overdue: bool,
}
