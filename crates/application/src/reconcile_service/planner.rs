use std::collections::{BTreeMap, BTreeSet};

use rolemend_core::UserId;
use rolemend_domain::{ChangeAction, ChangePlan, RoleChange, StoreSet, Team, TeamRole};

/// Currently active roles per user, gathered from both stores before
/// planning.
#[derive(Debug, Default, Clone)]
pub struct ExistingRoles {
    /// Active roles per user in the document store.
    pub document: BTreeMap<UserId, BTreeSet<TeamRole>>,
    /// Active roles per user in the relational store.
    pub relational: BTreeMap<UserId, BTreeSet<TeamRole>>,
}

impl ExistingRoles {
    fn document_has(&self, user_id: &UserId, role: TeamRole) -> bool {
        self.document
            .get(user_id)
            .is_some_and(|roles| roles.contains(&role))
    }

    fn relational_has(&self, user_id: &UserId, role: TeamRole) -> bool {
        self.relational
            .get(user_id)
            .is_some_and(|roles| roles.contains(&role))
    }
}

/// Pure decision function: diffs a team's desired role sets against the
/// active records of both stores and produces the team's change plan.
///
/// No side effects, which is what lets dry-run and live mode share one
/// computation. Output order is deterministic: creator first, then members
/// in their given order; owner, admin, member within a user.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleReconciler;

impl RoleReconciler {
    /// Computes the change plan for one team.
    #[must_use]
    pub fn plan(&self, team: &Team, existing: &ExistingRoles) -> ChangePlan {
        let mut plan = ChangePlan::empty(team.id().clone());

        for user in team.users() {
            let desired = TeamRole::desired_for(user.kind);

            for role in TeamRole::ORDERED.iter().copied() {
                let in_document = existing.document_has(&user.user_id, role);
                let in_relational = existing.relational_has(&user.user_id, role);

                if desired.contains(&role) {
                    let stores = StoreSet {
                        document: !in_document,
                        relational: !in_relational,
                    };
                    if stores.is_empty() {
                        plan.skipped += 1;
                        continue;
                    }
                    plan.entries.push(RoleChange {
                        user_id: user.user_id.clone(),
                        team_id: team.id().clone(),
                        role,
                        action: ChangeAction::Insert,
                        stores,
                    });
                } else {
                    // Only non-creator members can reach this branch, and
                    // only when they wrongly hold owner or admin.
                    let stores = StoreSet {
                        document: in_document,
                        relational: in_relational,
                    };
                    if stores.is_empty() {
                        continue;
                    }
                    plan.entries.push(RoleChange {
                        user_id: user.user_id.clone(),
                        team_id: team.id().clone(),
                        role,
                        action: ChangeAction::Deactivate,
                        stores,
                    });
                }
            }
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use rolemend_core::{AppResult, TeamId, UserId};
    use rolemend_domain::{ChangeAction, StoreSet, Team, TeamRole};

    use super::{ExistingRoles, RoleReconciler};

    fn team_of_two() -> AppResult<Team> {
        Ok(Team::new(
            TeamId::new("t1")?,
            UserId::new("u1")?,
            vec![UserId::new("u1")?, UserId::new("u2")?],
        ))
    }

    #[test]
    fn empty_stores_yield_full_insert_plan() -> AppResult<()> {
        let team = team_of_two()?;
        let plan = RoleReconciler.plan(&team, &ExistingRoles::default());

        assert_eq!(plan.insert_count(), 4);
        assert_eq!(plan.deactivate_count(), 0);
        assert_eq!(plan.skipped, 0);

        // Creator first with owner, admin, member; then the plain member.
        let order: Vec<(&str, TeamRole)> = plan
            .entries
            .iter()
            .map(|entry| (entry.user_id.as_str(), entry.role))
            .collect();
        assert_eq!(
            order,
            vec![
                ("u1", TeamRole::Owner),
                ("u1", TeamRole::Admin),
                ("u1", TeamRole::Member),
                ("u2", TeamRole::Member),
            ]
        );
        assert!(plan.entries.iter().all(|entry| entry.stores == StoreSet::BOTH));
        Ok(())
    }

    #[test]
    fn correct_state_yields_empty_plan() -> AppResult<()> {
        let team = team_of_two()?;
        let mut existing = ExistingRoles::default();
        let creator_roles: BTreeSet<TeamRole> =
            [TeamRole::Owner, TeamRole::Admin, TeamRole::Member].into();
        let member_roles: BTreeSet<TeamRole> = [TeamRole::Member].into();
        for store in [&mut existing.document, &mut existing.relational] {
            store.insert(UserId::new("u1")?, creator_roles.clone());
            store.insert(UserId::new("u2")?, member_roles.clone());
        }

        let plan = RoleReconciler.plan(&team, &existing);
        assert!(plan.is_empty());
        assert_eq!(plan.skipped, 4);
        Ok(())
    }

    #[test]
    fn wrongful_admin_for_member_is_deactivated() -> AppResult<()> {
        let team = team_of_two()?;
        let mut existing = ExistingRoles::default();
        existing
            .document
            .insert(UserId::new("u2")?, [TeamRole::Admin].into());
        existing
            .relational
            .insert(UserId::new("u2")?, [TeamRole::Admin].into());

        let plan = RoleReconciler.plan(&team, &existing);
        let deactivations: Vec<_> = plan
            .entries
            .iter()
            .filter(|entry| entry.action == ChangeAction::Deactivate)
            .collect();

        assert_eq!(deactivations.len(), 1);
        assert_eq!(deactivations[0].user_id.as_str(), "u2");
        assert_eq!(deactivations[0].role, TeamRole::Admin);
        assert_eq!(deactivations[0].stores, StoreSet::BOTH);
        // The missing member role is still inserted.
        assert_eq!(plan.insert_count(), 4);
        Ok(())
    }

    #[test]
    fn partial_presence_targets_only_the_lagging_store() -> AppResult<()> {
        let team = Team::new(TeamId::new("t1")?, UserId::new("u1")?, vec![]);
        let mut existing = ExistingRoles::default();
        let mut document_roles = BTreeMap::new();
        document_roles.insert(
            UserId::new("u1")?,
            BTreeSet::from([TeamRole::Owner, TeamRole::Admin, TeamRole::Member]),
        );
        existing.document = document_roles;

        let plan = RoleReconciler.plan(&team, &existing);
        assert_eq!(plan.insert_count(), 3);
        assert!(
            plan.entries
                .iter()
                .all(|entry| entry.stores == StoreSet::RELATIONAL)
        );
        assert_eq!(plan.skipped, 0);
        Ok(())
    }
}
