// src/teams.rs

use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::{authenticated_user, current_user};
use crate::error::ApiError;
use crate::invitation::{
    expiry_cutoff, find_acceptable, generate_invite_token, generate_team_code,
    has_live_invitation, invitation_email,
};
use crate::models::{
    Invitation, MemberView, PendingInvitation, Team, TeamMember, TeamRole, TeamView, UserSummary,
};
use crate::policy::{authorize_invite, authorize_team_view};
use crate::validation::{is_valid_email, normalize_email, parse_id, Validator};

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTeamRequest {
    pub team_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteRequest {
    pub token: Option<String>,
    pub team_id: Option<String>,
}

async fn load_team(data: &AppState, raw_id: &str) -> Result<Team, ApiError> {
    let id = parse_id(raw_id, "teamId", "Invalid team ID")?;
    data.teams
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team not found"))
}

/// Name and email for every member of `teams`, in one lookup.
async fn member_summaries(
    data: &AppState,
    teams: &[Team],
) -> Result<HashMap<String, UserSummary>, ApiError> {
    let mut ids: Vec<String> = teams
        .iter()
        .flat_map(|t| t.members.iter().map(|m| m.user.clone()))
        .collect();
    ids.sort();
    ids.dedup();
    let users = data.users.find_many(&ids).await?;
    Ok(users.into_iter().map(|u| (u.id.clone(), u.summary())).collect())
}

// Members whose account is gone are left out.
fn member_views(team: &Team, users: &HashMap<String, UserSummary>) -> Vec<MemberView> {
    team.members
        .iter()
        .filter_map(|m| {
            users.get(&m.user).map(|user| MemberView {
                user: user.clone(),
                role: m.role,
                joined_at: m.joined_at,
            })
        })
        .collect()
}

fn team_view(
    team: Team,
    users: &HashMap<String, UserSummary>,
    viewer: &str,
    cutoff: DateTime<Utc>,
) -> TeamView {
    let members = member_views(&team, users);
    let pending_invitations = if team.is_admin(viewer) {
        Some(
            team.live_invitations(cutoff)
                .map(|i| PendingInvitation {
                    email: i.email.clone(),
                    role: i.role,
                    created_at: i.created_at,
                })
                .collect(),
        )
    } else {
        None
    };
    TeamView {
        id: team.id,
        name: team.name,
        description: team.description,
        team_code: team.team_code,
        owner: team.owner,
        members,
        pending_invitations,
        created_at: team.created_at,
        updated_at: team.updated_at,
    }
}

async fn single_team_view(
    data: &AppState,
    team: Team,
    viewer: &str,
) -> Result<TeamView, ApiError> {
    let users = member_summaries(data, std::slice::from_ref(&team)).await?;
    let cutoff = expiry_cutoff(Utc::now(), data.config.invitation_ttl_days);
    Ok(team_view(team, &users, viewer, cutoff))
}

// GET /api/teams
pub async fn get_teams(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req, &data).await?;
    let teams = data.teams.list_for_member(&user_id).await?;
    let users = member_summaries(&data, &teams).await?;
    let cutoff = expiry_cutoff(Utc::now(), data.config.invitation_ttl_days);
    let teams: Vec<TeamView> = teams
        .into_iter()
        .map(|team| team_view(team, &users, &user_id, cutoff))
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": teams.len(),
        "data": { "teams": teams },
    })))
}

// POST /api/teams
pub async fn create_team(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<CreateTeamRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req, &data).await?;

    let mut v = Validator::new();
    v.required_text(
        "name",
        body.name.as_deref(),
        50,
        "Team name is required",
        "Team name cannot exceed 50 characters",
    );
    v.max_len(
        "description",
        body.description.as_deref(),
        500,
        "Description cannot exceed 500 characters",
    );
    v.finish()?;

    let code = generate_team_code(data.teams.as_ref()).await?;
    let team = Team::new(
        body.name.as_deref().unwrap_or_default().trim(),
        body.description.as_deref().unwrap_or_default().trim(),
        &user_id,
        code,
        Utc::now(),
    );
    data.teams.insert(&team).await?;
    info!("Team {} created by {}", team.id, user_id);

    let team = single_team_view(&data, team, &user_id).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Team created successfully",
        "data": { "team": team },
    })))
}

// POST /api/teams/join
pub async fn join_team(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<JoinTeamRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req, &data).await?;

    let code = body.team_code.as_deref().map(str::trim).unwrap_or_default();
    if code.is_empty() {
        return Err(ApiError::bad_request("Please provide a team code"));
    }
    let team = data
        .teams
        .find_by_code(code)
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid Team Code"))?;

    const ALREADY_MEMBER: &str = "You are already a member of this team";
    if team.is_member(&user_id) {
        return Err(ApiError::bad_request(ALREADY_MEMBER));
    }
    let member = TeamMember::new(&user_id, TeamRole::Member, Utc::now());
    // Loses the race against a concurrent join of the same user.
    if !data.teams.add_member(&team.id, &member).await? {
        return Err(ApiError::bad_request(ALREADY_MEMBER));
    }
    info!("User {} joined team {} by code", user_id, team.id);

    let team = load_team(&data, &team.id).await?;
    let team = single_team_view(&data, team, &user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Joined team successfully",
        "data": { "team": team },
    })))
}

// POST /api/teams/{id}/invite
pub async fn invite_member(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<InviteRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req, &data).await?;
    let mut team = load_team(&data, &path).await?;
    authorize_invite(&team, &user_id)?;

    let mut v = Validator::new();
    match body.email.as_deref().map(str::trim) {
        Some(e) if !e.is_empty() => {
            v.check(is_valid_email(e), "email", "Please provide a valid email")
        }
        _ => v.error("email", "Email is required"),
    }
    let role = match body.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => {
            let role = TeamRole::parse(raw);
            v.check(role.is_some(), "role", "Role must be Admin or Member");
            role.unwrap_or(TeamRole::Member)
        }
        None => TeamRole::Member,
    };
    v.finish()?;

    let email = normalize_email(body.email.as_deref().unwrap_or_default());
    if let Some(existing) = data.users.find_by_email(&email).await? {
        if team.is_member(&existing.id) {
            return Err(ApiError::bad_request("User is already a member"));
        }
    }

    let now = Utc::now();
    let cutoff = expiry_cutoff(now, data.config.invitation_ttl_days);
    if data.teams.prune_invitations(&team.id, cutoff).await? {
        info!("Pruned expired invitations from team {}", team.id);
    }
    if has_live_invitation(&team, &email, cutoff) {
        return Err(ApiError::bad_request("User already invited"));
    }

    let team_code = match team.team_code.clone() {
        Some(code) => code,
        None => {
            let code = generate_team_code(data.teams.as_ref()).await?;
            data.teams.set_team_code(&team.id, &code).await?;
            team.team_code = Some(code.clone());
            code
        }
    };

    let invitation = Invitation {
        email,
        token: generate_invite_token(),
        role,
        invited_by: user_id.clone(),
        created_at: now,
    };
    if !data.teams.add_invitation(&team.id, &invitation).await? {
        return Err(ApiError::not_found("Team not found"));
    }

    let message = invitation_email(&team, &team_code, &invitation, &data.config.frontend_origin);
    if let Err(err) = data.mailer.send(&message).await {
        warn!(
            "Invitation to {} for team {} not delivered, withdrawing it: {}",
            invitation.email, team.id, err
        );
        data.teams.remove_invitation(&team.id, &invitation.token).await?;
        return Err(ApiError::Email(err));
    }
    info!("User {} invited {} to team {}", user_id, invitation.email, team.id);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Invitation email sent",
    })))
}

// POST /api/teams/accept-invite
pub async fn accept_invite(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<AcceptInviteRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = authenticated_user(&req, &data).await?;
    let user_id = user.id.clone();

    let filled = |field: &Option<String>| field.as_deref().map_or(false, |t| !t.trim().is_empty());
    let mut v = Validator::new();
    v.check(filled(&body.token), "token", "Invitation token is required");
    v.check(filled(&body.team_id), "teamId", "Team ID is required");
    v.finish()?;

    let team = load_team(&data, body.team_id.as_deref().unwrap_or_default()).await?;
    if team.is_member(&user_id) {
        return Err(ApiError::bad_request("You are already a member of this team"));
    }

    let token = body.token.as_deref().unwrap_or_default().trim();
    let cutoff = expiry_cutoff(Utc::now(), data.config.invitation_ttl_days);
    let invitation = find_acceptable(&team, token, &user.email, cutoff)
        .ok_or_else(|| ApiError::bad_request("Invalid or expired invitation"))?;

    let member = TeamMember::new(&user_id, invitation.role, Utc::now());
    if !data.teams.accept_invitation(&team.id, token, &member).await? {
        return Err(ApiError::bad_request("Invalid or expired invitation"));
    }
    info!("User {} accepted an invitation to team {}", user_id, team.id);

    let team = load_team(&data, &team.id).await?;
    let team = single_team_view(&data, team, &user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Joined team successfully",
        "data": { "team": team },
    })))
}

// GET /api/teams/{id}/members
pub async fn get_team_members(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = current_user(&req, &data).await?;
    let team = load_team(&data, &path).await?;
    authorize_team_view(&team, &user_id)?;

    let users = member_summaries(&data, std::slice::from_ref(&team)).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": { "members": member_views(&team, &users) },
    })))
}
