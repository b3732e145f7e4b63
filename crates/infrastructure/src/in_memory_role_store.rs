use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use rolemend_application::{
    InsertOutcome, NewRoleAssignment, RelationalRoleStore, RoleStore, TeamTransaction,
};
use rolemend_core::{AppResult, TeamId, UserId};
use rolemend_domain::{RoleAssignment, TeamRole};

type RoleKey = (UserId, TeamId, TeamRole);

#[derive(Debug, Clone)]
struct StoredRecord {
    active: bool,
    source_tag: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    records: RwLock<BTreeMap<RoleKey, StoredRecord>>,
}

/// In-memory role store implementation.
///
/// Implements both store ports so it can stand in for either side in tests;
/// its transaction buffers writes and applies them only on commit.
#[derive(Debug, Clone)]
pub struct InMemoryRoleStore {
    label: &'static str,
    state: Arc<InMemoryState>,
}

impl InMemoryRoleStore {
    /// Creates an empty store with the given report label.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            state: Arc::new(InMemoryState::default()),
        }
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    fn label(&self) -> &'static str {
        self.label
    }

    async fn find_active_roles(
        &self,
        user_id: &UserId,
        team_id: &TeamId,
    ) -> AppResult<BTreeSet<TeamRole>> {
        let records = self.state.records.read().await;
        Ok(records
            .iter()
            .filter(|((stored_user, stored_team, _), record)| {
                stored_user == user_id && stored_team == team_id && record.active
            })
            .map(|((_, _, role), _)| *role)
            .collect())
    }

    async fn insert_role(&self, assignment: &NewRoleAssignment) -> AppResult<InsertOutcome> {
        let key = (
            assignment.user_id.clone(),
            assignment.team_id.clone(),
            assignment.role,
        );
        let mut records = self.state.records.write().await;
        if records.get(&key).is_some_and(|record| record.active) {
            return Ok(InsertOutcome::AlreadyActive);
        }

        records.insert(
            key,
            StoredRecord {
                active: true,
                source_tag: assignment.source_tag.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(InsertOutcome::Inserted { record_id: None })
    }

    async fn deactivate_role(
        &self,
        user_id: &UserId,
        team_id: &TeamId,
        role: TeamRole,
    ) -> AppResult<()> {
        let mut records = self.state.records.write().await;
        if let Some(record) = records.get_mut(&(user_id.clone(), team_id.clone(), role)) {
            record.active = false;
        }
        Ok(())
    }

    async fn list_active_assignments(&self) -> AppResult<Vec<RoleAssignment>> {
        let records = self.state.records.read().await;
        Ok(records
            .iter()
            .filter(|(_, record)| record.active)
            .map(|((user_id, team_id, role), record)| RoleAssignment {
                user_id: user_id.clone(),
                team_id: team_id.clone(),
                role: *role,
                active: record.active,
                source_tag: record.source_tag.clone(),
                created_at: record.created_at,
            })
            .collect())
    }
}

#[async_trait]
impl RelationalRoleStore for InMemoryRoleStore {
    async fn begin_team_transaction(&self) -> AppResult<Box<dyn TeamTransaction>> {
        Ok(Box::new(InMemoryTeamTransaction {
            state: self.state.clone(),
            buffered: Vec::new(),
        }))
    }
}

enum BufferedWrite {
    Insert(RoleKey, String),
    Deactivate(RoleKey),
}

struct InMemoryTeamTransaction {
    state: Arc<InMemoryState>,
    buffered: Vec<BufferedWrite>,
}

#[async_trait]
impl TeamTransaction for InMemoryTeamTransaction {
    async fn insert_role(&mut self, assignment: &NewRoleAssignment) -> AppResult<InsertOutcome> {
        let key = (
            assignment.user_id.clone(),
            assignment.team_id.clone(),
            assignment.role,
        );
        let committed_active = self
            .state
            .records
            .read()
            .await
            .get(&key)
            .is_some_and(|record| record.active);
        let buffered_insert = self
            .buffered
            .iter()
            .any(|write| matches!(write, BufferedWrite::Insert(buffered, _) if buffered == &key));
        if committed_active || buffered_insert {
            return Ok(InsertOutcome::AlreadyActive);
        }

        self.buffered
            .push(BufferedWrite::Insert(key, assignment.source_tag.clone()));
        Ok(InsertOutcome::Inserted { record_id: None })
    }

    async fn deactivate_role(
        &mut self,
        user_id: &UserId,
        team_id: &TeamId,
        role: TeamRole,
    ) -> AppResult<()> {
        self.buffered.push(BufferedWrite::Deactivate((
            user_id.clone(),
            team_id.clone(),
            role,
        )));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let mut records = self.state.records.write().await;
        for write in self.buffered {
            match write {
                BufferedWrite::Insert(key, source_tag) => {
                    records.insert(
                        key,
                        StoredRecord {
                            active: true,
                            source_tag,
                            created_at: Utc::now(),
                        },
                    );
                }
                BufferedWrite::Deactivate(key) => {
                    if let Some(record) = records.get_mut(&key) {
                        record.active = false;
                    }
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rolemend_application::{
        InsertOutcome, NewRoleAssignment, RelationalRoleStore, RoleStore,
    };
    use rolemend_core::{AppResult, TeamId, UserId};
    use rolemend_domain::{SYSTEM_SOURCE_TAG, TeamRole};

    use super::InMemoryRoleStore;

    fn assignment(user: &str, team: &str, role: TeamRole) -> AppResult<NewRoleAssignment> {
        Ok(NewRoleAssignment {
            user_id: UserId::new(user)?,
            team_id: TeamId::new(team)?,
            role,
            source_tag: SYSTEM_SOURCE_TAG.to_owned(),
            document_record_id: None,
        })
    }

    #[tokio::test]
    async fn repeated_insert_reports_already_active() -> AppResult<()> {
        let store = InMemoryRoleStore::new("document");
        let new_role = assignment("u1", "t1", TeamRole::Owner)?;

        let first = store.insert_role(&new_role).await?;
        let second = store.insert_role(&new_role).await?;

        assert!(matches!(first, InsertOutcome::Inserted { .. }));
        assert_eq!(second, InsertOutcome::AlreadyActive);
        assert_eq!(store.list_active_assignments().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn deactivation_is_idempotent() -> AppResult<()> {
        let store = InMemoryRoleStore::new("document");
        let user_id = UserId::new("u1")?;
        let team_id = TeamId::new("t1")?;
        store
            .insert_role(&assignment("u1", "t1", TeamRole::Member)?)
            .await?;

        store
            .deactivate_role(&user_id, &team_id, TeamRole::Member)
            .await?;
        store
            .deactivate_role(&user_id, &team_id, TeamRole::Member)
            .await?;

        assert!(store.find_active_roles(&user_id, &team_id).await?.is_empty());
        assert!(store.list_active_assignments().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn uncommitted_transaction_leaves_store_untouched() -> AppResult<()> {
        let store = InMemoryRoleStore::new("relational");
        let mut transaction = store.begin_team_transaction().await?;
        transaction
            .insert_role(&assignment("u1", "t1", TeamRole::Owner)?)
            .await?;
        transaction.rollback().await?;

        assert!(store.list_active_assignments().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn committed_transaction_applies_buffered_writes() -> AppResult<()> {
        let store = InMemoryRoleStore::new("relational");
        let user_id = UserId::new("u1")?;
        let team_id = TeamId::new("t1")?;
        store
            .insert_role(&assignment("u1", "t1", TeamRole::Admin)?)
            .await?;

        let mut transaction = store.begin_team_transaction().await?;
        transaction
            .insert_role(&assignment("u1", "t1", TeamRole::Member)?)
            .await?;
        transaction
            .deactivate_role(&user_id, &team_id, TeamRole::Admin)
            .await?;
        transaction.commit().await?;

        let active = store.find_active_roles(&user_id, &team_id).await?;
        assert_eq!(active, [TeamRole::Member].into());
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_insert_inside_transaction_is_a_skip() -> AppResult<()> {
        let store = InMemoryRoleStore::new("relational");
        let mut transaction = store.begin_team_transaction().await?;
        let new_role = assignment("u1", "t1", TeamRole::Owner)?;

        transaction.insert_role(&new_role).await?;
        let second = transaction.insert_role(&new_role).await?;
        transaction.commit().await?;

        assert_eq!(second, InsertOutcome::AlreadyActive);
        assert_eq!(store.list_active_assignments().await?.len(), 1);
        Ok(())
    }
}
