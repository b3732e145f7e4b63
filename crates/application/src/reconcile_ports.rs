//! Ports the reconciliation core depends on.
//!
//! Two concrete role-store bindings exist (document store and relational
//! store); the planner and applier only ever see these traits.

use std::collections::BTreeSet;

use async_trait::async_trait;

use rolemend_core::{AppResult, TeamId, UserId};
use rolemend_domain::{RoleAssignment, Team, TeamRole};

/// Input payload for creating a role record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoleAssignment {
    /// User the role is granted to.
    pub user_id: UserId,
    /// Team the role is scoped to.
    pub team_id: TeamId,
    /// Role level to grant.
    pub role: TeamRole,
    /// Who the record is attributed to.
    pub source_tag: String,
    /// Identifier of the matching document-store record, when that insert
    /// already happened. The relational copy keeps this linkage column.
    pub document_record_id: Option<String>,
}

/// Outcome of an idempotent insert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new active record was created.
    Inserted {
        /// Store-assigned identifier of the new record, when the store has
        /// one to report.
        record_id: Option<String>,
    },
    /// An active record for the triple already exists; nothing was written.
    AlreadyActive,
}

/// Uniform capability over one role store.
///
/// Inserts never create duplicates: a duplicate active (user, team, role)
/// triple is reported as [`InsertOutcome::AlreadyActive`] (or as a
/// `Conflict` error, which callers also treat as a skip). Deactivation is an
/// idempotent no-op on an already-inactive record.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Short store name used in logs and error context.
    fn label(&self) -> &'static str;

    /// Returns the roles currently active for the user on the team.
    async fn find_active_roles(
        &self,
        user_id: &UserId,
        team_id: &TeamId,
    ) -> AppResult<BTreeSet<TeamRole>>;

    /// Creates an active role record unless one already exists.
    async fn insert_role(&self, assignment: &NewRoleAssignment) -> AppResult<InsertOutcome>;

    /// Flips a role record inactive; no-op when already inactive.
    async fn deactivate_role(
        &self,
        user_id: &UserId,
        team_id: &TeamId,
        role: TeamRole,
    ) -> AppResult<()>;

    /// Returns every currently active role record in the store.
    async fn list_active_assignments(&self) -> AppResult<Vec<RoleAssignment>>;
}

/// Write operations scoped to one team's relational transaction.
///
/// Dropping an uncommitted transaction rolls it back.
#[async_trait]
pub trait TeamTransaction: Send {
    /// Creates an active role record inside the transaction unless one
    /// already exists.
    async fn insert_role(&mut self, assignment: &NewRoleAssignment) -> AppResult<InsertOutcome>;

    /// Flips a role record inactive inside the transaction.
    async fn deactivate_role(
        &mut self,
        user_id: &UserId,
        team_id: &TeamId,
        role: TeamRole,
    ) -> AppResult<()>;

    /// Commits every buffered write.
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// Discards every buffered write.
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// A role store whose writes can be scoped to a per-team transaction.
/// Implemented by the relational binding only.
#[async_trait]
pub trait RelationalRoleStore: RoleStore {
    /// Opens the all-or-nothing write scope for one team.
    async fn begin_team_transaction(&self) -> AppResult<Box<dyn TeamTransaction>>;
}

/// Produces the team snapshot a run reconciles against.
#[async_trait]
pub trait TeamSource: Send + Sync {
    /// Returns every current team; finite and restartable per run.
    async fn list_teams(&self) -> AppResult<Vec<Team>>;
}

/// Boundary collaborator asked exactly once before the first live write.
/// Never consulted in dry-run mode.
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    /// Returns whether the operator approved the live run.
    async fn confirm(&self) -> AppResult<bool>;
}
