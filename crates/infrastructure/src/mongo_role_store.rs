use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use bson::doc;
use bson::oid::ObjectId;
use futures::TryStreamExt;
use mongodb::Collection;
use serde::{Deserialize, Serialize};
use tracing::warn;

use rolemend_application::{InsertOutcome, NewRoleAssignment, RoleStore};
use rolemend_core::{AppError, AppResult, TeamId, UserId};
use rolemend_domain::{ROLE_SCOPE, RoleAssignment, TeamRole};

use crate::mongo_connection::MongoConnection;

const USER_ROLES_COLLECTION: &str = "user_roles";

/// Role record document as stored in the `user_roles` collection.
#[derive(Debug, Serialize, Deserialize)]
struct RoleDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    user_id: String,
    team_id: String,
    role_name: String,
    scope: String,
    is_active: bool,
    created_by: String,
    created_at: bson::DateTime,
}

/// MongoDB-backed role store over the canonical `user_roles` collection.
#[derive(Clone)]
pub struct MongoRoleStore {
    collection: Collection<RoleDocument>,
}

impl MongoRoleStore {
    /// Creates the store over an established connection.
    #[must_use]
    pub fn new(connection: &MongoConnection) -> Self {
        Self {
            collection: connection.database().collection(USER_ROLES_COLLECTION),
        }
    }

    fn active_filter(user_id: &UserId, team_id: &TeamId) -> bson::Document {
        doc! {
            "user_id": user_id.as_str(),
            "team_id": team_id.as_str(),
            "scope": ROLE_SCOPE,
            "is_active": true,
        }
    }
}

#[async_trait]
impl RoleStore for MongoRoleStore {
    fn label(&self) -> &'static str {
        "document"
    }

    async fn find_active_roles(
        &self,
        user_id: &UserId,
        team_id: &TeamId,
    ) -> AppResult<BTreeSet<TeamRole>> {
        let mut cursor = self
            .collection
            .find(Self::active_filter(user_id, team_id))
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to query document roles: {error}"))
            })?;

        let mut roles = BTreeSet::new();
        while let Some(document) = cursor.try_next().await.map_err(|error| {
            AppError::Internal(format!("failed to read document role cursor: {error}"))
        })? {
            match TeamRole::from_str(document.role_name.as_str()) {
                Ok(role) => {
                    roles.insert(role);
                }
                Err(_) => warn!(
                    user_id = document.user_id,
                    team_id = document.team_id,
                    role_name = document.role_name,
                    "ignoring role record with unknown role value"
                ),
            }
        }

        Ok(roles)
    }

    async fn insert_role(&self, assignment: &NewRoleAssignment) -> AppResult<InsertOutcome> {
        let mut filter = Self::active_filter(&assignment.user_id, &assignment.team_id);
        filter.insert("role_name", assignment.role.as_str());
        let duplicate = self.collection.find_one(filter).await.map_err(|error| {
            AppError::Internal(format!("failed to check for duplicate role: {error}"))
        })?;
        if duplicate.is_some() {
            return Ok(InsertOutcome::AlreadyActive);
        }

        let document = RoleDocument {
            id: None,
            user_id: assignment.user_id.as_str().to_owned(),
            team_id: assignment.team_id.as_str().to_owned(),
            role_name: assignment.role.as_str().to_owned(),
            scope: ROLE_SCOPE.to_owned(),
            is_active: true,
            created_by: assignment.source_tag.clone(),
            created_at: bson::DateTime::now(),
        };
        let inserted = self.collection.insert_one(document).await.map_err(|error| {
            AppError::Internal(format!("failed to insert document role: {error}"))
        })?;

        let record_id = inserted
            .inserted_id
            .as_object_id()
            .map(|object_id| object_id.to_hex());
        Ok(InsertOutcome::Inserted { record_id })
    }

    async fn deactivate_role(
        &self,
        user_id: &UserId,
        team_id: &TeamId,
        role: TeamRole,
    ) -> AppResult<()> {
        let mut filter = Self::active_filter(user_id, team_id);
        filter.insert("role_name", role.as_str());
        // Matching zero documents is the idempotent no-op case.
        self.collection
            .update_many(filter, doc! { "$set": { "is_active": false } })
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to deactivate document role: {error}"))
            })?;

        Ok(())
    }

    async fn list_active_assignments(&self) -> AppResult<Vec<RoleAssignment>> {
        let mut cursor = self
            .collection
            .find(doc! { "scope": ROLE_SCOPE, "is_active": true })
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list active document roles: {error}"))
            })?;

        let mut assignments = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(|error| {
            AppError::Internal(format!("failed to read document role cursor: {error}"))
        })? {
            let role = match TeamRole::from_str(document.role_name.as_str()) {
                Ok(role) => role,
                Err(_) => {
                    warn!(
                        user_id = document.user_id,
                        team_id = document.team_id,
                        role_name = document.role_name,
                        "ignoring role record with unknown role value"
                    );
                    continue;
                }
            };
            assignments.push(RoleAssignment {
                user_id: UserId::new(document.user_id)?,
                team_id: TeamId::new(document.team_id)?,
                role,
                active: document.is_active,
                source_tag: document.created_by,
                created_at: document.created_at.to_chrono(),
            });
        }

        Ok(assignments)
    }
}
