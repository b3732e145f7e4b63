use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::warn;

use rolemend_application::{
    InsertOutcome, NewRoleAssignment, RelationalRoleStore, RoleStore, TeamTransaction,
};
use rolemend_core::{AppError, AppResult, TeamId, UserId};
use rolemend_domain::{ROLE_SCOPE, RoleAssignment, TeamRole};

/// PostgreSQL-backed role store over the synchronized `user_role_records`
/// table.
///
/// Rows keep the originating document-store record id in `mongo_id` and a
/// sync marker, matching the layout the synchronization job writes.
#[derive(Clone)]
pub struct PostgresRoleStore {
    pool: PgPool,
}

impl PostgresRoleStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RoleRecordRow {
    user_id: String,
    team_id: String,
    role_name: String,
    is_active: bool,
    created_by: String,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl RoleStore for PostgresRoleStore {
    fn label(&self) -> &'static str {
        "relational"
    }

    async fn find_active_roles(
        &self,
        user_id: &UserId,
        team_id: &TeamId,
    ) -> AppResult<BTreeSet<TeamRole>> {
        let role_names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT role_name
            FROM user_role_records
            WHERE user_id = $1
                AND team_id = $2
                AND scope = $3
                AND is_active = TRUE
            "#,
        )
        .bind(user_id.as_str())
        .bind(team_id.as_str())
        .bind(ROLE_SCOPE)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to query relational roles: {error}")))?;

        let mut roles = BTreeSet::new();
        for role_name in role_names {
            match TeamRole::from_str(role_name.as_str()) {
                Ok(role) => {
                    roles.insert(role);
                }
                Err(_) => warn!(
                    user_id = user_id.as_str(),
                    team_id = team_id.as_str(),
                    role_name,
                    "ignoring role record with unknown role value"
                ),
            }
        }

        Ok(roles)
    }

    async fn insert_role(&self, assignment: &NewRoleAssignment) -> AppResult<InsertOutcome> {
        let mut transaction = self.begin_team_transaction().await?;
        let outcome = transaction.insert_role(assignment).await?;
        transaction.commit().await?;
        Ok(outcome)
    }

    async fn deactivate_role(
        &self,
        user_id: &UserId,
        team_id: &TeamId,
        role: TeamRole,
    ) -> AppResult<()> {
        // Updating zero rows is the idempotent no-op case.
        sqlx::query(
            r#"
            UPDATE user_role_records
            SET is_active = FALSE
            WHERE user_id = $1
                AND team_id = $2
                AND scope = $3
                AND role_name = $4
                AND is_active = TRUE
            "#,
        )
        .bind(user_id.as_str())
        .bind(team_id.as_str())
        .bind(ROLE_SCOPE)
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to deactivate relational role: {error}"))
        })?;

        Ok(())
    }

    async fn list_active_assignments(&self) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, RoleRecordRow>(
            r#"
            SELECT user_id, team_id, role_name, is_active, created_by, created_at
            FROM user_role_records
            WHERE scope = $1
                AND is_active = TRUE
            ORDER BY team_id, user_id, role_name
            "#,
        )
        .bind(ROLE_SCOPE)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list active relational roles: {error}"))
        })?;

        let mut assignments = Vec::with_capacity(rows.len());
        for row in rows {
            let role = match TeamRole::from_str(row.role_name.as_str()) {
                Ok(role) => role,
                Err(_) => {
                    warn!(
                        user_id = row.user_id,
                        team_id = row.team_id,
                        role_name = row.role_name,
                        "ignoring role record with unknown role value"
                    );
                    continue;
                }
            };
            assignments.push(RoleAssignment {
                user_id: UserId::new(row.user_id)?,
                team_id: TeamId::new(row.team_id)?,
                role,
                active: row.is_active,
                source_tag: row.created_by,
                created_at: row.created_at,
            });
        }

        Ok(assignments)
    }
}

#[async_trait]
impl RelationalRoleStore for PostgresRoleStore {
    async fn begin_team_transaction(&self) -> AppResult<Box<dyn TeamTransaction>> {
        let transaction = self.pool.begin().await.map_err(|error| {
            AppError::Transaction(format!("failed to begin team transaction: {error}"))
        })?;
        Ok(Box::new(PostgresTeamTransaction { transaction }))
    }
}

/// One team's all-or-nothing write scope. sqlx rolls the underlying
/// transaction back when it is dropped uncommitted, so every early exit
/// path releases cleanly.
struct PostgresTeamTransaction {
    transaction: Transaction<'static, Postgres>,
}

#[async_trait]
impl TeamTransaction for PostgresTeamTransaction {
    async fn insert_role(&mut self, assignment: &NewRoleAssignment) -> AppResult<InsertOutcome> {
        let duplicates = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM user_role_records
            WHERE user_id = $1
                AND team_id = $2
                AND scope = $3
                AND role_name = $4
                AND is_active = TRUE
            "#,
        )
        .bind(assignment.user_id.as_str())
        .bind(assignment.team_id.as_str())
        .bind(ROLE_SCOPE)
        .bind(assignment.role.as_str())
        .fetch_one(&mut *self.transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to check for duplicate role: {error}"))
        })?;

        if duplicates > 0 {
            return Ok(InsertOutcome::AlreadyActive);
        }

        let record_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO user_role_records (
                mongo_id, user_id, team_id, role_name, scope,
                is_active, created_at, created_by, sync_status, last_sync_at
            )
            VALUES ($1, $2, $3, $4, $5, TRUE, now(), $6, 'SYNCED', now())
            RETURNING id
            "#,
        )
        .bind(assignment.document_record_id.as_deref())
        .bind(assignment.user_id.as_str())
        .bind(assignment.team_id.as_str())
        .bind(assignment.role.as_str())
        .bind(ROLE_SCOPE)
        .bind(assignment.source_tag.as_str())
        .fetch_one(&mut *self.transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to insert relational role: {error}"))
        })?;

        Ok(InsertOutcome::Inserted {
            record_id: Some(record_id.to_string()),
        })
    }

    async fn deactivate_role(
        &mut self,
        user_id: &UserId,
        team_id: &TeamId,
        role: TeamRole,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE user_role_records
            SET is_active = FALSE
            WHERE user_id = $1
                AND team_id = $2
                AND scope = $3
                AND role_name = $4
                AND is_active = TRUE
            "#,
        )
        .bind(user_id.as_str())
        .bind(team_id.as_str())
        .bind(ROLE_SCOPE)
        .bind(role.as_str())
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to deactivate relational role: {error}"))
        })?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.transaction.commit().await.map_err(|error| {
            AppError::Transaction(format!("failed to commit team transaction: {error}"))
        })
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.transaction.rollback().await.map_err(|error| {
            AppError::Transaction(format!("failed to roll back team transaction: {error}"))
        })
    }
}
