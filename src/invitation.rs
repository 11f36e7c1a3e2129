//! Team codes, invitation tokens, and the rules for consuming an invitation.
//!
//! An invitation is created by a team admin and then either accepted (it
//! leaves the list and the invitee joins the members), removed because the
//! email could not be delivered, or left to expire. Joining with the team
//! code bypasses invitations entirely.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use rand::{rngs::OsRng, Rng, RngCore};

use crate::error::ApiError;
use crate::mail::EmailMessage;
use crate::models::{Invitation, Team};
use crate::store::TeamStore;

const TEAM_CODE_ATTEMPTS: usize = 50;
const TOKEN_BYTES: usize = 20;

pub fn random_team_code<R: Rng>(rng: &mut R) -> String {
    rng.gen_range(100_000..1_000_000).to_string()
}

/// Draws codes until one is unused.
pub async fn generate_team_code(teams: &dyn TeamStore) -> Result<String, ApiError> {
    for attempt in 1..=TEAM_CODE_ATTEMPTS {
        let code = random_team_code(&mut rand::thread_rng());
        if !teams.code_exists(&code).await? {
            return Ok(code);
        }
        debug!("Team code collision on attempt {}", attempt);
    }
    warn!("No free team code after {} attempts", TEAM_CODE_ATTEMPTS);
    Err(ApiError::internal("Could not allocate a team code"))
}

/// 20 random bytes, hex encoded.
pub fn generate_invite_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Invitations created before this instant have expired.
pub fn expiry_cutoff(now: DateTime<Utc>, ttl_days: i64) -> DateTime<Utc> {
    now - Duration::days(ttl_days)
}

/// The invitation `email` may accept with `token`, if any. Both must match
/// and the invitation must still be live.
pub fn find_acceptable<'a>(
    team: &'a Team,
    token: &str,
    email: &str,
    cutoff: DateTime<Utc>,
) -> Option<&'a Invitation> {
    team.live_invitations(cutoff)
        .find(|i| i.token == token && i.email.eq_ignore_ascii_case(email))
}

pub fn has_live_invitation(team: &Team, email: &str, cutoff: DateTime<Utc>) -> bool {
    team.live_invitations(cutoff)
        .any(|i| i.email.eq_ignore_ascii_case(email))
}

pub fn accept_link(frontend_origin: &str, team_id: &str, token: &str) -> String {
    format!(
        "{}/accept-invite?token={}&teamId={}",
        frontend_origin.trim_end_matches('/'),
        token,
        team_id
    )
}

pub fn invitation_email(
    team: &Team,
    team_code: &str,
    invitation: &Invitation,
    frontend_origin: &str,
) -> EmailMessage {
    let body = format!(
        "Hello,\n\n\
         You have been invited to join the \"{name}\" workspace on TaskNest.\n\n\
         To accept this invitation, open the link below while logged in:\n\
         {link}\n\n\
         Or join from the Teams dashboard with \"Join Team\" and this Team Code:\n\n\
         {code}\n\n\
         Best regards,\nThe TaskNest Team",
        name = team.name,
        link = accept_link(frontend_origin, &team.id, &invitation.token),
        code = team_code,
    );
    EmailMessage {
        to: invitation.email.clone(),
        subject: format!("Invitation to join {} on TaskNest", team.name),
        body,
    }
}
