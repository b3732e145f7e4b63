use async_trait::async_trait;
use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::Collection;
use tracing::warn;

use rolemend_application::TeamSource;
use rolemend_core::{AppError, AppResult, TeamId, UserId};
use rolemend_domain::Team;

use crate::mongo_connection::MongoConnection;

const TEAMS_COLLECTION: &str = "teams";

/// Team snapshot source backed by the canonical `teams` collection.
///
/// Malformed documents (missing identifier or creator) are logged and
/// skipped; only a failure to read the collection itself is fatal to the
/// run.
#[derive(Clone)]
pub struct MongoTeamSource {
    collection: Collection<Document>,
}

impl MongoTeamSource {
    /// Creates the source over an established connection.
    #[must_use]
    pub fn new(connection: &MongoConnection) -> Self {
        Self {
            collection: connection.database().collection(TEAMS_COLLECTION),
        }
    }

    fn parse_team(document: &Document) -> AppResult<Team> {
        let id = document
            .get_object_id("_id")
            .map(|object_id| object_id.to_hex())
            .or_else(|_| document.get_str("_id").map(str::to_owned))
            .map_err(|_| AppError::Validation("team document has no usable _id".to_owned()))?;
        let created_by = document.get_str("created_by").map_err(|_| {
            AppError::Validation(format!("team '{id}' has no created_by value"))
        })?;

        let mut member_ids = Vec::new();
        if let Ok(members) = document.get_array("member_ids") {
            for member in members {
                if let Some(member_id) = member.as_str() {
                    member_ids.push(UserId::new(member_id)?);
                }
            }
        }

        Ok(Team::new(TeamId::new(id)?, UserId::new(created_by)?, member_ids))
    }
}

#[async_trait]
impl TeamSource for MongoTeamSource {
    async fn list_teams(&self) -> AppResult<Vec<Team>> {
        let mut cursor = self.collection.find(doc! {}).await.map_err(|error| {
            AppError::Connectivity(format!("failed to read teams collection: {error}"))
        })?;

        let mut teams = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(|error| {
            AppError::Connectivity(format!("failed to read teams cursor: {error}"))
        })? {
            match Self::parse_team(&document) {
                Ok(team) => teams.push(team),
                Err(error) => warn!(error = %error, "skipping malformed team document"),
            }
        }

        Ok(teams)
    }
}
