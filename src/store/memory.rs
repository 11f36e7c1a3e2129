// In-memory stores for exercising handlers without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::{Invitation, Task, Team, TeamMember, User};
use crate::store::{
    Pagination, StoreResult, TaskFilter, TaskSort, TaskStore, TeamStore, UserStore,
};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: &User) -> StoreResult<()> {
        self.users.write().await.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.values().find(|u| u.email == email).cloned())
    }

    async fn find_many(&self, ids: &[String]) -> StoreResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn replace(&self, user: &User) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.users.write().await.remove(id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert(&self, task: &Task) -> StoreResult<()> {
        self.tasks.write().await.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Task>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn replace(&self, task: &Task) -> StoreResult<bool> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.tasks.write().await.remove(id).is_some())
    }

    async fn find(
        &self,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Option<Pagination>,
    ) -> StoreResult<Vec<Task>> {
        let mut found: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        found.sort_by(|a, b| sort.compare(a, b));
        Ok(match page {
            Some(page) => found
                .into_iter()
                .skip(usize::try_from(page.skip()).unwrap_or(usize::MAX))
                .take(usize::try_from(page.limit).unwrap_or(usize::MAX))
                .collect(),
            None => found,
        })
    }

    async fn count(&self, filter: &TaskFilter) -> StoreResult<u64> {
        let tasks = self.tasks.read().await;
        Ok(tasks.values().filter(|t| filter.matches(t)).count() as u64)
    }

    async fn delete_personal(&self, user_id: &str) -> StoreResult<u64> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, t| !(t.user_id == user_id && t.team_id.is_none()));
        Ok((before - tasks.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryTeamStore {
    teams: RwLock<HashMap<String, Team>>,
}

#[async_trait]
impl TeamStore for MemoryTeamStore {
    async fn insert(&self, team: &Team) -> StoreResult<()> {
        self.teams.write().await.insert(team.id.clone(), team.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Team>> {
        Ok(self.teams.read().await.get(id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> StoreResult<Option<Team>> {
        Ok(self
            .teams
            .read()
            .await
            .values()
            .find(|t| t.team_code.as_deref() == Some(code))
            .cloned())
    }

    async fn code_exists(&self, code: &str) -> StoreResult<bool> {
        Ok(self.find_by_code(code).await?.is_some())
    }

    async fn list_for_member(&self, user_id: &str) -> StoreResult<Vec<Team>> {
        let mut teams: Vec<Team> = self
            .teams
            .read()
            .await
            .values()
            .filter(|t| t.is_member(user_id))
            .cloned()
            .collect();
        teams.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(teams)
    }

    async fn set_team_code(&self, team_id: &str, code: &str) -> StoreResult<bool> {
        let mut teams = self.teams.write().await;
        Ok(match teams.get_mut(team_id) {
            Some(team) => {
                team.team_code = Some(code.to_string());
                team.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn add_member(&self, team_id: &str, member: &TeamMember) -> StoreResult<bool> {
        let mut teams = self.teams.write().await;
        Ok(match teams.get_mut(team_id) {
            Some(team) if !team.is_member(&member.user) => {
                team.members.push(member.clone());
                team.updated_at = Utc::now();
                true
            }
            _ => false,
        })
    }

    async fn add_invitation(&self, team_id: &str, invitation: &Invitation) -> StoreResult<bool> {
        let mut teams = self.teams.write().await;
        Ok(match teams.get_mut(team_id) {
            Some(team) => {
                team.invitations.push(invitation.clone());
                team.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn remove_invitation(&self, team_id: &str, token: &str) -> StoreResult<bool> {
        let mut teams = self.teams.write().await;
        Ok(match teams.get_mut(team_id) {
            Some(team) => {
                let before = team.invitations.len();
                team.invitations.retain(|i| i.token != token);
                team.invitations.len() != before
            }
            None => false,
        })
    }

    async fn accept_invitation(
        &self,
        team_id: &str,
        token: &str,
        member: &TeamMember,
    ) -> StoreResult<bool> {
        let mut teams = self.teams.write().await;
        let team = match teams.get_mut(team_id) {
            Some(team) => team,
            None => return Ok(false),
        };
        if team.is_member(&member.user) || !team.invitations.iter().any(|i| i.token == token) {
            return Ok(false);
        }
        team.invitations.retain(|i| i.token != token);
        team.members.push(member.clone());
        team.updated_at = Utc::now();
        Ok(true)
    }

    async fn prune_invitations(&self, team_id: &str, cutoff: DateTime<Utc>) -> StoreResult<bool> {
        let mut teams = self.teams.write().await;
        Ok(match teams.get_mut(team_id) {
            Some(team) => {
                let before = team.invitations.len();
                team.invitations.retain(|i| i.created_at >= cutoff);
                team.invitations.len() != before
            }
            None => false,
        })
    }

    async fn remove_member_everywhere(&self, user_id: &str) -> StoreResult<u64> {
        let mut teams = self.teams.write().await;
        let mut touched = 0;
        for team in teams.values_mut() {
            if team.is_member(user_id) {
                team.members.retain(|m| m.user != user_id);
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TeamRole;
    use chrono::Duration;

    fn invitation(email: &str, created_at: DateTime<Utc>) -> Invitation {
        Invitation {
            email: email.to_string(),
            token: format!("{:0>40}", email.len()),
            role: TeamRole::Member,
            invited_by: "owner".to_string(),
            created_at,
        }
    }

    #[actix_web::test]
    async fn pruning_reports_whether_anything_was_dropped() {
        let store = MemoryTeamStore::default();
        let now = Utc::now();
        let team = Team::new("Platform", "", "owner", "123456".to_string(), now);
        store.insert(&team).await.unwrap();
        let ages = [("a@example.com", 30), ("bb@example.com", 20), ("ccc@example.com", 1)];
        for (email, age) in ages {
            let invite = invitation(email, now - Duration::days(age));
            assert!(store.add_invitation(&team.id, &invite).await.unwrap());
        }

        let cutoff = now - Duration::days(7);
        assert!(store.prune_invitations(&team.id, cutoff).await.unwrap());
        assert!(!store.prune_invitations(&team.id, cutoff).await.unwrap());
        assert!(!store.prune_invitations("missing", cutoff).await.unwrap());

        let team = store.find_by_id(&team.id).await.unwrap().unwrap();
        assert_eq!(team.invitations.len(), 1);
        assert_eq!(team.invitations[0].email, "ccc@example.com");
    }
}
