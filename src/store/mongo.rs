// src/store/mongo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use log::{debug, info};
use mongodb::bson::{doc, to_bson, Bson, Document};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};

use crate::models::{Invitation, Task, Team, TeamMember, User};
use crate::store::{
    Pagination, StoreResult, TaskFilter, TaskScope, TaskSort, TaskStore, TeamStore, UserStore,
};

/// Creates the unique indexes the stores rely on. Safe to run on every boot.
pub async fn ensure_indexes(db: &Database) -> StoreResult<()> {
    let users = db.collection::<Document>("users");
    users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    let teams = db.collection::<Document>("teams");
    teams
        .create_index(
            IndexModel::builder()
                .keys(doc! { "teamCode": 1 })
                .options(IndexOptions::builder().unique(true).sparse(true).build())
                .build(),
        )
        .await?;
    teams
        .create_index(IndexModel::builder().keys(doc! { "members.user": 1 }).build())
        .await?;

    let tasks = db.collection::<Document>("tasks");
    for keys in [
        doc! { "userId": 1, "createdAt": -1 },
        doc! { "teamId": 1 },
        doc! { "assignedTo": 1 },
    ] {
        tasks.create_index(IndexModel::builder().keys(keys).build()).await?;
    }

    info!("MongoDB indexes ensured");
    Ok(())
}

// ─── USERS ─────────────────────────────────────────────────────────────────────

pub struct MongoUserStore {
    users: Collection<User>,
}

impl MongoUserStore {
    pub fn new(db: &Database) -> Self {
        MongoUserStore {
            users: db.collection::<User>("users"),
        }
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn insert(&self, user: &User) -> StoreResult<()> {
        self.users.insert_one(user).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.find_one(doc! { "email": email }).await?)
    }

    async fn find_many(&self, ids: &[String]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self.users.find(doc! { "_id": { "$in": ids.to_vec() } }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn replace(&self, user: &User) -> StoreResult<bool> {
        let res = self.users.replace_one(doc! { "_id": &user.id }, user).await?;
        Ok(res.matched_count == 1)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let res = self.users.delete_one(doc! { "_id": id }).await?;
        Ok(res.deleted_count == 1)
    }
}

// ─── TASKS ─────────────────────────────────────────────────────────────────────

pub struct MongoTaskStore {
    tasks: Collection<Task>,
}

impl MongoTaskStore {
    pub fn new(db: &Database) -> Self {
        MongoTaskStore {
            tasks: db.collection::<Task>("tasks"),
        }
    }
}

/// Translates a task filter into a query document.
pub fn task_filter_document(filter: &TaskFilter) -> Document {
    let mut query = match &filter.scope {
        // `null` matches both a missing and an explicitly empty teamId.
        TaskScope::Personal { user_id } => doc! { "userId": user_id, "teamId": Bson::Null },
        TaskScope::CreatedBy { user_id } => doc! { "userId": user_id },
        TaskScope::Team {
            team_id,
            assigned_to,
            created_by,
        } => {
            let mut query = doc! { "teamId": team_id };
            if let Some(assignee) = assigned_to {
                query.insert("assignedTo", assignee);
            }
            if let Some(creator) = created_by {
                query.insert("userId", creator);
            }
            query
        }
    };

    if let Some(status) = filter.status {
        query.insert("status", status.as_str());
    }
    if let Some(priority) = filter.priority {
        query.insert("priority", priority.as_str());
    }
    if let Some(category) = &filter.category {
        query.insert("category", category);
    }
    if let Some(search) = &filter.search {
        let pattern = regex::escape(search);
        query.insert(
            "$or",
            ["title", "description", "category"]
                .iter()
                .map(|field| doc! { *field: { "$regex": &pattern, "$options": "i" } })
                .collect::<Vec<_>>(),
        );
    }
    query
}

fn sort_document(sort: TaskSort) -> Document {
    let direction = if sort.descending { -1 } else { 1 };
    doc! { sort.field.document_key(): direction }
}

#[async_trait]
impl TaskStore for MongoTaskStore {
    async fn insert(&self, task: &Task) -> StoreResult<()> {
        self.tasks.insert_one(task).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Task>> {
        Ok(self.tasks.find_one(doc! { "_id": id }).await?)
    }

    async fn replace(&self, task: &Task) -> StoreResult<bool> {
        let res = self.tasks.replace_one(doc! { "_id": &task.id }, task).await?;
        Ok(res.matched_count == 1)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let res = self.tasks.delete_one(doc! { "_id": id }).await?;
        Ok(res.deleted_count == 1)
    }

    async fn find(
        &self,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Option<Pagination>,
    ) -> StoreResult<Vec<Task>> {
        let query = task_filter_document(filter);
        debug!("Task query: {:?}", query);
        let cursor = match page {
            Some(page) => {
                self.tasks
                    .find(query)
                    .sort(sort_document(sort))
                    .skip(page.skip())
                    .limit(i64::try_from(page.limit).unwrap_or(i64::MAX))
                    .await?
            }
            None => self.tasks.find(query).sort(sort_document(sort)).await?,
        };
        Ok(cursor.try_collect().await?)
    }

    async fn count(&self, filter: &TaskFilter) -> StoreResult<u64> {
        Ok(self.tasks.count_documents(task_filter_document(filter)).await?)
    }

    async fn delete_personal(&self, user_id: &str) -> StoreResult<u64> {
        let res = self
            .tasks
            .delete_many(doc! { "userId": user_id, "teamId": Bson::Null })
            .await?;
        Ok(res.deleted_count)
    }
}

// ─── TEAMS ─────────────────────────────────────────────────────────────────────

pub struct MongoTeamStore {
    teams: Collection<Team>,
}

impl MongoTeamStore {
    pub fn new(db: &Database) -> Self {
        MongoTeamStore {
            teams: db.collection::<Team>("teams"),
        }
    }
}

fn touched() -> StoreResult<Bson> {
    Ok(to_bson(&Utc::now())?)
}

#[async_trait]
impl TeamStore for MongoTeamStore {
    async fn insert(&self, team: &Team) -> StoreResult<()> {
        self.teams.insert_one(team).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Team>> {
        Ok(self.teams.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_code(&self, code: &str) -> StoreResult<Option<Team>> {
        Ok(self.teams.find_one(doc! { "teamCode": code }).await?)
    }

    async fn code_exists(&self, code: &str) -> StoreResult<bool> {
        Ok(self.teams.count_documents(doc! { "teamCode": code }).limit(1).await? > 0)
    }

    async fn list_for_member(&self, user_id: &str) -> StoreResult<Vec<Team>> {
        let cursor = self
            .teams
            .find(doc! { "members.user": user_id })
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_team_code(&self, team_id: &str, code: &str) -> StoreResult<bool> {
        let res = self
            .teams
            .update_one(
                doc! { "_id": team_id },
                doc! { "$set": { "teamCode": code, "updatedAt": touched()? } },
            )
            .await?;
        Ok(res.matched_count == 1)
    }

    async fn add_member(&self, team_id: &str, member: &TeamMember) -> StoreResult<bool> {
        let res = self
            .teams
            .update_one(
                doc! { "_id": team_id, "members.user": { "$ne": &member.user } },
                doc! {
                    "$push": { "members": to_bson(member)? },
                    "$set": { "updatedAt": touched()? },
                },
            )
            .await?;
        Ok(res.modified_count == 1)
    }

    async fn add_invitation(&self, team_id: &str, invitation: &Invitation) -> StoreResult<bool> {
        let res = self
            .teams
            .update_one(
                doc! { "_id": team_id },
                doc! {
                    "$push": { "invitations": to_bson(invitation)? },
                    "$set": { "updatedAt": touched()? },
                },
            )
            .await?;
        Ok(res.modified_count == 1)
    }

    async fn remove_invitation(&self, team_id: &str, token: &str) -> StoreResult<bool> {
        let res = self
            .teams
            .update_one(
                doc! { "_id": team_id },
                doc! { "$pull": { "invitations": { "token": token } } },
            )
            .await?;
        Ok(res.modified_count == 1)
    }

    async fn accept_invitation(
        &self,
        team_id: &str,
        token: &str,
        member: &TeamMember,
    ) -> StoreResult<bool> {
        let res = self
            .teams
            .update_one(
                doc! {
                    "_id": team_id,
                    "invitations.token": token,
                    "members.user": { "$ne": &member.user },
                },
                doc! {
                    "$pull": { "invitations": { "token": token } },
                    "$push": { "members": to_bson(member)? },
                    "$set": { "updatedAt": touched()? },
                },
            )
            .await?;
        Ok(res.modified_count == 1)
    }

    async fn prune_invitations(&self, team_id: &str, cutoff: DateTime<Utc>) -> StoreResult<bool> {
        let res = self
            .teams
            .update_one(
                doc! { "_id": team_id },
                doc! { "$pull": { "invitations": { "createdAt": { "$lt": to_bson(&cutoff)? } } } },
            )
            .await?;
        // One document at most, however many invitations the $pull removed.
        Ok(res.modified_count > 0)
    }

    async fn remove_member_everywhere(&self, user_id: &str) -> StoreResult<u64> {
        let res = self
            .teams
            .update_many(
                doc! { "members.user": user_id },
                doc! { "$pull": { "members": { "user": user_id } } },
            )
            .await?;
        Ok(res.modified_count)
    }
}
