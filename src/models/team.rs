use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserSummary;

/// Roles for a user within a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamRole {
    Admin,
    Member,
}

impl TeamRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Admin" => Some(TeamRole::Admin),
            "Member" => Some(TeamRole::Member),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub user: String,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

impl TeamMember {
    pub fn new(user: &str, role: TeamRole, now: DateTime<Utc>) -> Self {
        TeamMember {
            user: user.to_string(),
            role,
            joined_at: now,
        }
    }
}

/// A pending offer for an email address to join the team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub email: String,
    pub token: String,
    pub role: TeamRole,
    pub invited_by: String,
    pub created_at: DateTime<Utc>,
}

/// A team as stored in the `teams` collection, members and invitations
/// embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Teams created before join codes existed have none until their next
    /// invitation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_code: Option<String>,
    pub owner: String,
    #[serde(default)]
    pub members: Vec<TeamMember>,
    #[serde(default)]
    pub invitations: Vec<Invitation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    /// A new team whose creator is its first Admin.
    pub fn new(
        name: &str,
        description: &str,
        owner: &str,
        team_code: String,
        now: DateTime<Utc>,
    ) -> Self {
        Team {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            team_code: Some(team_code),
            owner: owner.to_string(),
            members: vec![TeamMember::new(owner, TeamRole::Admin, now)],
            invitations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn member(&self, user_id: &str) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.user == user_id)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.member(user_id).is_some()
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.member(user_id).map_or(false, |m| m.role == TeamRole::Admin)
    }

    /// Invitations created at or after `cutoff`.
    pub fn live_invitations(&self, cutoff: DateTime<Utc>) -> impl Iterator<Item = &Invitation> {
        self.invitations.iter().filter(move |i| i.created_at >= cutoff)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub user: UserSummary,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInvitation {
    pub email: String,
    pub role: TeamRole,
    pub created_at: DateTime<Utc>,
}

/// API representation of a team. Invitation tokens never leave the server;
/// admins see the pending addresses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamView {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub team_code: Option<String>,
    pub owner: String,
    pub members: Vec<MemberView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_invitations: Option<Vec<PendingInvitation>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
