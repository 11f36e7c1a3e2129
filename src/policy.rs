//! Who may do what with a task or a team.
//!
//! Personal tasks belong to their creator alone. Team tasks are readable and
//! editable by every member of the team, but only the member who created one
//! may delete it. Everything here is pure: callers load the task and its team
//! and map a [`Denial`] onto a response.

use crate::error::ApiError;
use crate::models::{Task, Team};
use crate::store::TaskScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    View,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Reported as a plain 404 so personal tasks don't leak their existence.
    Hidden,
    Forbidden(&'static str),
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Hidden => ApiError::not_found("Task not found"),
            Denial::Forbidden(message) => ApiError::forbidden(message),
        }
    }
}

/// `team` must be the team named by `task.team_id`, when there is one.
pub fn authorize_task(
    action: TaskAction,
    task: &Task,
    user_id: &str,
    team: Option<&Team>,
) -> Result<(), Denial> {
    if task.team_id.is_none() {
        return if task.user_id == user_id {
            Ok(())
        } else {
            Err(Denial::Hidden)
        };
    }

    let is_member = team.map_or(false, |t| t.is_member(user_id));
    match action {
        TaskAction::View | TaskAction::Update if is_member => Ok(()),
        TaskAction::View | TaskAction::Update => {
            Err(Denial::Forbidden("Not authorized to access this task"))
        }
        TaskAction::Delete if !is_member => {
            Err(Denial::Forbidden("Not authorized to access this task"))
        }
        TaskAction::Delete if task.user_id != user_id => {
            Err(Denial::Forbidden("Only the task creator can delete this task"))
        }
        TaskAction::Delete => Ok(()),
    }
}

pub fn authorize_team_task_creation(team: &Team, user_id: &str) -> Result<(), Denial> {
    if team.is_member(user_id) {
        Ok(())
    } else {
        Err(Denial::Forbidden("Not authorized to create tasks in this team"))
    }
}

/// Assignees must belong to the task's team; personal tasks take none.
pub fn validate_assignee(team: Option<&Team>, assignee: &str) -> Result<(), ApiError> {
    match team {
        Some(team) if team.is_member(assignee) => Ok(()),
        Some(_) => Err(ApiError::invalid(
            "assignedTo",
            "Assignee must be a member of the same team",
        )),
        None => Err(ApiError::invalid(
            "assignedTo",
            "Only team tasks can be assigned",
        )),
    }
}

pub fn authorize_team_view(team: &Team, user_id: &str) -> Result<(), Denial> {
    if team.is_member(user_id) {
        Ok(())
    } else {
        Err(Denial::Forbidden("Not authorized"))
    }
}

pub fn authorize_invite(team: &Team, user_id: &str) -> Result<(), Denial> {
    if team.is_admin(user_id) {
        Ok(())
    } else {
        Err(Denial::Forbidden("Not authorized to invite members"))
    }
}

/// Narrowing applied to a team listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    AssignedToMe,
    CreatedByMe,
}

impl ListFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "assigned" => Some(ListFilter::AssignedToMe),
            "created" => Some(ListFilter::CreatedByMe),
            _ => None,
        }
    }
}

/// Scope for a task listing. Without a team the listing is personal and the
/// sub-filter is meaningless; with one the caller must be a member.
pub fn list_scope(
    user_id: &str,
    team: Option<&Team>,
    filter: Option<ListFilter>,
) -> Result<TaskScope, Denial> {
    let team = match team {
        None => {
            return Ok(TaskScope::Personal {
                user_id: user_id.to_string(),
            })
        }
        Some(team) => team,
    };
    if !team.is_member(user_id) {
        return Err(Denial::Forbidden("Not authorized to view this team's tasks"));
    }
    let me = Some(user_id.to_string());
    Ok(TaskScope::Team {
        team_id: team.id.clone(),
        assigned_to: if filter == Some(ListFilter::AssignedToMe) { me.clone() } else { None },
        created_by: if filter == Some(ListFilter::CreatedByMe) { me } else { None },
    })
}
