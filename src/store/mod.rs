//! Persistence seams. Handlers talk to these traits; `mongo` provides the
//! production adapters and `memory` backs the tests.

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::models::{Invitation, Priority, Task, TaskStatus, Team, TeamMember, User};

#[cfg(test)]
pub mod memory;
pub mod mongo;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("document encoding error: {0}")]
    Encoding(#[from] mongodb::bson::ser::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: &User) -> StoreResult<()>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>>;

    /// `email` must already be normalised.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Missing ids are skipped.
    async fn find_many(&self, ids: &[String]) -> StoreResult<Vec<User>>;

    /// Returns false when the user no longer exists.
    async fn replace(&self, user: &User) -> StoreResult<bool>;

    async fn delete(&self, id: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert(&self, task: &Task) -> StoreResult<()>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Task>>;

    /// Returns false when the task no longer exists.
    async fn replace(&self, task: &Task) -> StoreResult<bool>;

    async fn delete(&self, id: &str) -> StoreResult<bool>;

    async fn find(
        &self,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Option<Pagination>,
    ) -> StoreResult<Vec<Task>>;

    async fn count(&self, filter: &TaskFilter) -> StoreResult<u64>;

    /// Removes every personal (team-less) task owned by `user_id`.
    async fn delete_personal(&self, user_id: &str) -> StoreResult<u64>;
}

/// Team persistence. Membership and invitation changes are single
/// conditional updates so the embedded lists never race into duplicates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn insert(&self, team: &Team) -> StoreResult<()>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Team>>;

    async fn find_by_code(&self, code: &str) -> StoreResult<Option<Team>>;

    async fn code_exists(&self, code: &str) -> StoreResult<bool>;

    /// Teams the user belongs to, newest first.
    async fn list_for_member(&self, user_id: &str) -> StoreResult<Vec<Team>>;

    async fn set_team_code(&self, team_id: &str, code: &str) -> StoreResult<bool>;

    /// Returns false when the team is gone or the user is already a member.
    async fn add_member(&self, team_id: &str, member: &TeamMember) -> StoreResult<bool>;

    async fn add_invitation(&self, team_id: &str, invitation: &Invitation) -> StoreResult<bool>;

    async fn remove_invitation(&self, team_id: &str, token: &str) -> StoreResult<bool>;

    /// Moves the invitation identified by `token` into the member list.
    /// Returns false when the invitation is gone or the user already joined.
    async fn accept_invitation(
        &self,
        team_id: &str,
        token: &str,
        member: &TeamMember,
    ) -> StoreResult<bool>;

    /// Drops invitations created before `cutoff`. True when any were dropped.
    async fn prune_invitations(&self, team_id: &str, cutoff: DateTime<Utc>) -> StoreResult<bool>;

    /// Removes the user from every team they belong to.
    async fn remove_member_everywhere(&self, user_id: &str) -> StoreResult<u64>;
}

/// Which slice of the task collection a query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskScope {
    /// The user's own tasks outside any team.
    Personal { user_id: String },
    /// Every task the user created, team or not.
    CreatedBy { user_id: String },
    /// A team's tasks, optionally narrowed to an assignee or creator.
    Team {
        team_id: String,
        assigned_to: Option<String>,
        created_by: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    pub scope: TaskScope,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl TaskFilter {
    pub fn new(scope: TaskScope) -> Self {
        TaskFilter {
            scope,
            status: None,
            priority: None,
            category: None,
            search: None,
        }
    }

    /// Case-insensitive matcher for the search term, special characters
    /// taken literally.
    pub fn search_regex(&self) -> Option<Regex> {
        self.search.as_ref().and_then(|term| {
            RegexBuilder::new(&regex::escape(term))
                .case_insensitive(true)
                .build()
                .ok()
        })
    }

    pub fn matches(&self, task: &Task) -> bool {
        let in_scope = match &self.scope {
            TaskScope::Personal { user_id } => task.user_id == *user_id && task.team_id.is_none(),
            TaskScope::CreatedBy { user_id } => task.user_id == *user_id,
            TaskScope::Team {
                team_id,
                assigned_to,
                created_by,
            } => {
                task.team_id.as_deref() == Some(team_id.as_str())
                    && assigned_to
                        .as_ref()
                        .map_or(true, |a| task.assigned_to.as_deref() == Some(a.as_str()))
                    && created_by.as_ref().map_or(true, |c| task.user_id == *c)
            }
        };
        if !in_scope {
            return false;
        }
        if self.status.map_or(false, |s| s != task.status) {
            return false;
        }
        if self.priority.map_or(false, |p| p != task.priority) {
            return false;
        }
        if self.category.as_ref().map_or(false, |c| *c != task.category) {
            return false;
        }
        match self.search_regex() {
            Some(re) => {
                re.is_match(&task.title)
                    || re.is_match(&task.description)
                    || re.is_match(&task.category)
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    DueDate,
    Priority,
    Title,
    Status,
}

impl SortField {
    pub fn document_key(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
            SortField::DueDate => "dueDate",
            SortField::Priority => "priority",
            SortField::Title => "title",
            SortField::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSort {
    pub field: SortField,
    pub descending: bool,
}

impl Default for TaskSort {
    fn default() -> Self {
        TaskSort {
            field: SortField::CreatedAt,
            descending: true,
        }
    }
}

impl TaskSort {
    /// Parses `createdAt` / `-createdAt` style sort keys.
    pub fn parse(value: &str) -> Option<Self> {
        let (descending, key) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        let field = match key {
            "createdAt" => SortField::CreatedAt,
            "updatedAt" => SortField::UpdatedAt,
            "dueDate" => SortField::DueDate,
            "priority" => SortField::Priority,
            "title" => SortField::Title,
            "status" => SortField::Status,
            _ => return None,
        };
        Some(TaskSort { field, descending })
    }

    /// Orders two tasks the way the document store does for the same key.
    /// Enum fields compare by their stored string.
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let ordering = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::DueDate => a.due_date.cmp(&b.due_date),
            SortField::Priority => a.priority.as_str().cmp(b.priority.as_str()),
            SortField::Title => a.title.cmp(&b.title),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        };
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based.
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    pub fn skip(&self) -> u64 {
        (self.page.saturating_sub(1)).saturating_mul(self.limit)
    }

    pub fn pages(&self, total: u64) -> u64 {
        if self.limit == 0 {
            0
        } else {
            total.div_ceil(self.limit)
        }
    }
}
