use std::sync::Arc;

use tracing::{info, warn};

use rolemend_domain::{ChangeAction, MembershipIndex, RoleAssignment, RoleChange, StoreSet};

use super::RunMode;
use crate::reconcile_ports::{RelationalRoleStore, RoleStore};

/// Outcome of the stale-role pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OrphanSummary {
    /// Orphaned role records flipped inactive (or that would be in
    /// dry-run).
    pub deactivated: u64,
    /// Records whose deactivation failed, plus stores that could not be
    /// listed at all.
    pub errors: u64,
}

/// Second pass: deactivates active role records whose (user, team) pair no
/// longer corresponds to any current membership.
///
/// Runs after all per-team reconciliation. Teams absent from the snapshot
/// have no members, so every one of their still-active roles is an orphan.
/// Already-inactive records are never listed, hence never re-emitted.
pub struct StaleRoleDeactivator {
    document: Arc<dyn RoleStore>,
    relational: Arc<dyn RelationalRoleStore>,
}

impl StaleRoleDeactivator {
    /// Creates the pass over the two store bindings.
    #[must_use]
    pub fn new(document: Arc<dyn RoleStore>, relational: Arc<dyn RelationalRoleStore>) -> Self {
        Self {
            document,
            relational,
        }
    }

    /// Pure planning step: the deactivations required to clear every active
    /// assignment not present in the membership index, in deterministic
    /// (team, user, role) order.
    #[must_use]
    pub fn plan_orphans(
        assignments: &[RoleAssignment],
        index: &MembershipIndex,
        stores: StoreSet,
    ) -> Vec<RoleChange> {
        let mut changes: Vec<RoleChange> = assignments
            .iter()
            .filter(|assignment| {
                assignment.active && !index.contains(&assignment.team_id, &assignment.user_id)
            })
            .map(|assignment| RoleChange {
                user_id: assignment.user_id.clone(),
                team_id: assignment.team_id.clone(),
                role: assignment.role,
                action: ChangeAction::Deactivate,
                stores,
            })
            .collect();
        changes.sort_by(|left, right| {
            (&left.team_id, &left.user_id, left.role).cmp(&(
                &right.team_id,
                &right.user_id,
                right.role,
            ))
        });
        changes
    }

    /// Runs the pass over both stores. Per-record failures are logged with
    /// full context and counted; they never stop the rest of the pass.
    pub async fn run(&self, index: &MembershipIndex, mode: RunMode) -> OrphanSummary {
        let mut summary = OrphanSummary::default();
        let relational: Arc<dyn RoleStore> = self.relational.clone();

        let passes = [
            (&self.document, StoreSet::DOCUMENT),
            (&relational, StoreSet::RELATIONAL),
        ];
        for (store, mask) in passes {
            let assignments = match store.list_active_assignments().await {
                Ok(assignments) => assignments,
                Err(error) => {
                    warn!(
                        store = store.label(),
                        error = %error,
                        "failed to list active roles; skipping orphan pass for this store"
                    );
                    summary.errors += 1;
                    continue;
                }
            };

            let orphans = Self::plan_orphans(&assignments, index, mask);
            info!(
                store = store.label(),
                active = assignments.len(),
                orphaned = orphans.len(),
                "computed orphaned role records"
            );

            for orphan in orphans {
                if mode == RunMode::DryRun {
                    summary.deactivated += 1;
                    continue;
                }
                match store
                    .deactivate_role(&orphan.user_id, &orphan.team_id, orphan.role)
                    .await
                {
                    Ok(()) => summary.deactivated += 1,
                    Err(error) => {
                        warn!(
                            store = store.label(),
                            team_id = %orphan.team_id,
                            user_id = %orphan.user_id,
                            role = orphan.role.as_str(),
                            error = %error,
                            "failed to deactivate orphaned role"
                        );
                        summary.errors += 1;
                    }
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use rolemend_core::{AppResult, TeamId, UserId};
    use rolemend_domain::{
        MembershipIndex, RoleAssignment, StoreSet, SYSTEM_SOURCE_TAG, Team, TeamRole,
    };

    use super::StaleRoleDeactivator;

    fn assignment(user: &str, team: &str, role: TeamRole, active: bool) -> AppResult<RoleAssignment> {
        Ok(RoleAssignment {
            user_id: UserId::new(user)?,
            team_id: TeamId::new(team)?,
            role,
            active,
            source_tag: SYSTEM_SOURCE_TAG.to_owned(),
            created_at: Utc::now(),
        })
    }

    #[test]
    fn vanished_team_roles_are_all_orphans() -> AppResult<()> {
        let current = Team::new(TeamId::new("t1")?, UserId::new("u1")?, vec![]);
        let index = MembershipIndex::from_teams(std::slice::from_ref(&current));
        let assignments = vec![
            assignment("u1", "t1", TeamRole::Owner, true)?,
            assignment("u1", "t2", TeamRole::Owner, true)?,
            assignment("u2", "t2", TeamRole::Member, true)?,
        ];

        let orphans =
            StaleRoleDeactivator::plan_orphans(&assignments, &index, StoreSet::DOCUMENT);
        assert_eq!(orphans.len(), 2);
        assert!(orphans.iter().all(|orphan| orphan.team_id.as_str() == "t2"));
        Ok(())
    }

    #[test]
    fn inactive_records_are_never_re_emitted() -> AppResult<()> {
        let index = MembershipIndex::from_teams(&[]);
        let assignments = vec![assignment("u1", "t2", TeamRole::Member, false)?];

        let orphans =
            StaleRoleDeactivator::plan_orphans(&assignments, &index, StoreSet::DOCUMENT);
        assert!(orphans.is_empty());
        Ok(())
    }

    #[test]
    fn orphans_sort_by_team_then_user_then_role() -> AppResult<()> {
        let index = MembershipIndex::from_teams(&[]);
        let assignments = vec![
            assignment("u2", "t2", TeamRole::Member, true)?,
            assignment("u1", "t2", TeamRole::Member, true)?,
            assignment("u1", "t2", TeamRole::Owner, true)?,
            assignment("u1", "t1", TeamRole::Admin, true)?,
        ];

        let orphans =
            StaleRoleDeactivator::plan_orphans(&assignments, &index, StoreSet::DOCUMENT);
        let order: Vec<(&str, &str, TeamRole)> = orphans
            .iter()
            .map(|orphan| (orphan.team_id.as_str(), orphan.user_id.as_str(), orphan.role))
            .collect();
        assert_eq!(
            order,
            vec![
                ("t1", "u1", TeamRole::Admin),
                ("t2", "u1", TeamRole::Owner),
                ("t2", "u1", TeamRole::Member),
                ("t2", "u2", TeamRole::Member),
            ]
        );
        Ok(())
    }
}
