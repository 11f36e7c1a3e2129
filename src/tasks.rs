// src/tasks.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use log::info;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::error::ApiError;
use crate::models::{Priority, Task, TaskStatus, TaskView, Team, DEFAULT_CATEGORY};
use crate::policy::{
    authorize_task, authorize_team_task_creation, list_scope, validate_assignee, ListFilter,
    TaskAction,
};
use crate::stats::TaskStats;
use crate::store::{Pagination, TaskFilter, TaskScope, TaskSort};
use crate::validation::{nullable, parse_due_date, parse_id, Validator};

const DEFAULT_LIMIT: u64 = 100;
const MAX_LIMIT: u64 = 100;

const TITLE_MAX: usize = 200;
const DESCRIPTION_MAX: usize = 1000;
const CATEGORY_MAX: usize = 50;

const PRIORITY_MESSAGE: &str = "Priority must be Low, Medium, or High";
const STATUS_MESSAGE: &str = "Status must be Pending, In Progress, or Completed";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub team_id: Option<String>,
    pub filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub team_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<String>,
    pub team_id: Option<String>,
    pub assigned_to: Option<String>,
}

/// Partial update. `dueDate` and `assignedTo` may be sent as `null` to clear
/// them. A task never moves between teams.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub assigned_to: Option<Option<String>>,
}

/// Treats blank strings the same as an absent field.
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_enum<T>(
    v: &mut Validator,
    field: &str,
    value: Option<&str>,
    parse: fn(&str) -> Option<T>,
    message: &str,
) -> Option<T> {
    let raw = present(value)?;
    let parsed = parse(raw);
    v.check(parsed.is_some(), field, message);
    parsed
}

fn parse_priority(v: &mut Validator, value: Option<&str>) -> Option<Priority> {
    parse_enum(v, "priority", value, Priority::parse, PRIORITY_MESSAGE)
}

fn parse_status(v: &mut Validator, value: Option<&str>) -> Option<TaskStatus> {
    parse_enum(v, "status", value, TaskStatus::parse, STATUS_MESSAGE)
}

fn check_lengths(v: &mut Validator, description: Option<&str>, category: Option<&str>) {
    v.max_len(
        "description",
        description,
        DESCRIPTION_MAX,
        "Description cannot exceed 1000 characters",
    );
    v.max_len("category", category, CATEGORY_MAX, "Category cannot exceed 50 characters");
}

fn parse_due(v: &mut Validator, value: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = present(value)?;
    let parsed = parse_due_date(raw);
    v.check(parsed.is_some(), "dueDate", "Due date must be a valid date");
    parsed
}

fn parse_positive(value: Option<&str>, default: u64) -> u64 {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

async fn find_team(data: &AppState, team_id: &str) -> Result<Team, ApiError> {
    let id = parse_id(team_id, "teamId", "Invalid team ID")?;
    data.teams
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team not found"))
}

/// The task's own team, if it has one and the team still exists.
async fn team_of(data: &AppState, task: &Task) -> Result<Option<Team>, ApiError> {
    match task.team_id.as_deref() {
        Some(team_id) => Ok(data.teams.find_by_id(team_id).await?),
        None => Ok(None),
    }
}

async fn load_task(data: &AppState, raw_id: &str) -> Result<Task, ApiError> {
    let id = parse_id(raw_id, "id", "Invalid task ID")?;
    data.tasks
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))
}

fn task_response(message: Option<&str>, task: Task) -> serde_json::Value {
    let mut body = serde_json::json!({
        "success": true,
        "data": { "task": task.into_view(Utc::now()) },
    });
    if let Some(message) = message {
        body["message"] = serde_json::Value::from(message);
    }
    body
}

// GET /api/tasks
pub async fn get_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<TaskQuery>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req, &data).await?;

    let mut v = Validator::new();
    let status = parse_status(&mut v, query.status.as_deref());
    let priority = parse_priority(&mut v, query.priority.as_deref());
    let sort = match present(query.sort.as_deref()) {
        Some(raw) => {
            let sort = TaskSort::parse(raw);
            v.check(sort.is_some(), "sort", "Unsupported sort field");
            sort.unwrap_or_default()
        }
        None => TaskSort::default(),
    };
    v.finish()?;

    let team = match present(query.team_id.as_deref()) {
        Some(team_id) => Some(find_team(&data, team_id).await?),
        None => None,
    };
    let list_filter = query.filter.as_deref().and_then(ListFilter::parse);
    let scope = list_scope(&user_id, team.as_ref(), list_filter)?;

    let mut filter = TaskFilter::new(scope);
    filter.status = status;
    filter.priority = priority;
    filter.category = present(query.category.as_deref()).map(str::to_string);
    filter.search = present(query.search.as_deref()).map(str::to_string);

    let page = Pagination {
        page: parse_positive(query.page.as_deref(), 1),
        limit: parse_positive(query.limit.as_deref(), DEFAULT_LIMIT).min(MAX_LIMIT),
    };

    let total = data.tasks.count(&filter).await?;
    let tasks = data.tasks.find(&filter, sort, Some(page)).await?;
    let now = Utc::now();
    let tasks: Vec<TaskView> = tasks.into_iter().map(|t| t.into_view(now)).collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": tasks.len(),
        "total": total,
        "page": page.page,
        "pages": page.pages(total),
        "data": { "tasks": tasks },
    })))
}

// POST /api/tasks
pub async fn create_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req, &data).await?;
    let now = Utc::now();

    let mut v = Validator::new();
    v.required_text(
        "title",
        body.title.as_deref(),
        TITLE_MAX,
        "Task title is required",
        "Title cannot exceed 200 characters",
    );
    check_lengths(&mut v, body.description.as_deref(), body.category.as_deref());
    let priority = parse_priority(&mut v, body.priority.as_deref());
    let status = parse_status(&mut v, body.status.as_deref());
    let due_date = parse_due(&mut v, body.due_date.as_deref());
    if let Some(due) = due_date {
        v.check(due >= now, "dueDate", "Due date cannot be in the past");
    }
    v.finish()?;

    let team = match present(body.team_id.as_deref()) {
        Some(team_id) => {
            let team = find_team(&data, team_id).await?;
            authorize_team_task_creation(&team, &user_id)?;
            Some(team)
        }
        None => None,
    };
    let assignee = present(body.assigned_to.as_deref());
    if let Some(assignee) = assignee {
        validate_assignee(team.as_ref(), assignee)?;
    }

    let mut task = Task::new(&user_id, body.title.as_deref().unwrap_or_default().trim(), now);
    task.description = body.description.as_deref().unwrap_or_default().trim().to_string();
    task.category = present(body.category.as_deref())
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string();
    task.priority = priority.unwrap_or_default();
    task.set_status(status.unwrap_or_default(), now);
    task.due_date = due_date;
    task.team_id = team.map(|t| t.id);
    task.assigned_to = assignee.map(str::to_string);

    data.tasks.insert(&task).await?;
    info!("Task {} created by {}", task.id, user_id);

    Ok(HttpResponse::Created().json(task_response(Some("Task created successfully"), task)))
}

// GET /api/tasks/{id}
pub async fn get_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req, &data).await?;
    let task = load_task(&data, &path).await?;
    let team = team_of(&data, &task).await?;
    authorize_task(TaskAction::View, &task, &user_id, team.as_ref())?;

    Ok(HttpResponse::Ok().json(task_response(None, task)))
}

// PUT /api/tasks/{id}
pub async fn update_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req, &data).await?;
    let mut task = load_task(&data, &path).await?;
    let team = team_of(&data, &task).await?;
    authorize_task(TaskAction::Update, &task, &user_id, team.as_ref())?;

    let mut v = Validator::new();
    if body.title.is_some() {
        v.required_text(
            "title",
            body.title.as_deref(),
            TITLE_MAX,
            "Task title cannot be empty",
            "Title cannot exceed 200 characters",
        );
    }
    check_lengths(&mut v, body.description.as_deref(), body.category.as_deref());
    let priority = parse_priority(&mut v, body.priority.as_deref());
    let status = parse_status(&mut v, body.status.as_deref());
    let due_date = match &body.due_date {
        Some(Some(raw)) => Some(parse_due(&mut v, Some(raw.as_str()))),
        Some(None) => Some(None),
        None => None,
    };
    v.finish()?;

    let assignee = match &body.assigned_to {
        Some(value) => match present(value.as_deref()) {
            Some(assignee) => {
                validate_assignee(team.as_ref(), assignee)?;
                Some(Some(assignee.to_string()))
            }
            None => Some(None),
        },
        None => None,
    };

    let now = Utc::now();
    if let Some(title) = body.title.as_deref() {
        task.title = title.trim().to_string();
    }
    if let Some(description) = body.description.as_deref() {
        task.description = description.trim().to_string();
    }
    if let Some(category) = body.category.as_deref() {
        task.category = present(Some(category)).unwrap_or(DEFAULT_CATEGORY).to_string();
    }
    if let Some(priority) = priority {
        task.priority = priority;
    }
    if let Some(status) = status {
        task.set_status(status, now);
    }
    if let Some(due_date) = due_date {
        task.due_date = due_date;
    }
    if let Some(assignee) = assignee {
        task.assigned_to = assignee;
    }
    task.updated_at = now;

    if !data.tasks.replace(&task).await? {
        return Err(ApiError::not_found("Task not found"));
    }

    Ok(HttpResponse::Ok().json(task_response(Some("Task updated successfully"), task)))
}

// DELETE /api/tasks/{id}
pub async fn delete_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req, &data).await?;
    let task = load_task(&data, &path).await?;
    let team = team_of(&data, &task).await?;
    authorize_task(TaskAction::Delete, &task, &user_id, team.as_ref())?;

    data.tasks.delete(&task.id).await?;
    info!("Task {} deleted by {}", task.id, user_id);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Task deleted successfully",
        "data": {},
    })))
}

// GET /api/tasks/stats
pub async fn get_task_stats(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<StatsQuery>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req, &data).await?;

    let scope = match present(query.team_id.as_deref()) {
        Some(team_id) => {
            let team = find_team(&data, team_id).await?;
            list_scope(&user_id, Some(&team), None)?
        }
        None => TaskScope::CreatedBy { user_id },
    };
    let tasks = data
        .tasks
        .find(&TaskFilter::new(scope), TaskSort::default(), None)
        .await?;
    let stats = TaskStats::from_tasks(&tasks, Utc::now());

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": { "stats": stats },
    })))
}
