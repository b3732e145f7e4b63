//! Teams and the membership index used by the orphan pass.

use std::collections::HashSet;

use rolemend_core::{TeamId, UserId};
use serde::{Deserialize, Serialize};

use crate::role::MembershipKind;

/// A team snapshot with its creator and current member list.
///
/// Immutable input for a run; the creator is implicitly a member even when
/// absent from the member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    id: TeamId,
    created_by: UserId,
    member_ids: Vec<UserId>,
}

/// A user of a team together with their membership kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamUser {
    /// User identifier.
    pub user_id: UserId,
    /// Whether the user created the team.
    pub kind: MembershipKind,
}

impl Team {
    /// Creates a team snapshot. Identifier validation happens in
    /// [`TeamId::new`] and [`UserId::new`], so construction itself cannot
    /// fail.
    #[must_use]
    pub fn new(id: TeamId, created_by: UserId, member_ids: Vec<UserId>) -> Self {
        Self {
            id,
            created_by,
            member_ids,
        }
    }

    /// Returns the team identifier.
    #[must_use]
    pub fn id(&self) -> &TeamId {
        &self.id
    }

    /// Returns the creator's user identifier.
    #[must_use]
    pub fn created_by(&self) -> &UserId {
        &self.created_by
    }

    /// Returns the member list in its given order.
    #[must_use]
    pub fn member_ids(&self) -> &[UserId] {
        &self.member_ids
    }

    /// Iterates every user of the team exactly once: the creator first, then
    /// the members in their given order, with duplicates dropped.
    #[must_use]
    pub fn users(&self) -> Vec<TeamUser> {
        let mut seen = HashSet::new();
        let mut users = Vec::with_capacity(self.member_ids.len() + 1);

        seen.insert(self.created_by.clone());
        users.push(TeamUser {
            user_id: self.created_by.clone(),
            kind: MembershipKind::Creator,
        });

        for member_id in &self.member_ids {
            if seen.insert(member_id.clone()) {
                users.push(TeamUser {
                    user_id: member_id.clone(),
                    kind: MembershipKind::Member,
                });
            }
        }

        users
    }
}

/// Index of every current (team, user) membership pair.
///
/// Built from the full team snapshot before the orphan pass: any active role
/// record whose pair is absent here belongs to a vanished membership. A team
/// missing from the snapshot contributes no pairs, so all of its roles are
/// orphans.
#[derive(Debug, Default, Clone)]
pub struct MembershipIndex {
    pairs: HashSet<(TeamId, UserId)>,
}

impl MembershipIndex {
    /// Builds the index from a team snapshot.
    #[must_use]
    pub fn from_teams(teams: &[Team]) -> Self {
        let mut pairs = HashSet::new();
        for team in teams {
            for user in team.users() {
                pairs.insert((team.id().clone(), user.user_id));
            }
        }

        Self { pairs }
    }

    /// Returns whether the user is currently a member of the team.
    #[must_use]
    pub fn contains(&self, team_id: &TeamId, user_id: &UserId) -> bool {
        self.pairs
            .contains(&(team_id.clone(), user_id.clone()))
    }

    /// Returns the number of indexed membership pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns whether the index holds no pairs at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rolemend_core::{AppResult, TeamId, UserId};

    use super::{MembershipIndex, Team};
    use crate::role::MembershipKind;

    fn team(id: &str, creator: &str, members: &[&str]) -> AppResult<Team> {
        let member_ids = members
            .iter()
            .map(|member| UserId::new(*member))
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Team::new(TeamId::new(id)?, UserId::new(creator)?, member_ids))
    }

    #[test]
    fn creator_listed_first_without_duplicates() -> AppResult<()> {
        let team = team("t1", "u1", &["u1", "u2", "u2", "u3"])?;
        let users = team.users();

        assert_eq!(users.len(), 3);
        assert_eq!(users[0].user_id.as_str(), "u1");
        assert_eq!(users[0].kind, MembershipKind::Creator);
        assert_eq!(users[1].user_id.as_str(), "u2");
        assert_eq!(users[1].kind, MembershipKind::Member);
        assert_eq!(users[2].user_id.as_str(), "u3");
        Ok(())
    }

    #[test]
    fn creator_counts_even_when_not_listed_as_member() -> AppResult<()> {
        let team = team("t1", "u1", &["u2"])?;
        let index = MembershipIndex::from_teams(std::slice::from_ref(&team));

        assert!(index.contains(team.id(), team.created_by()));
        assert_eq!(index.len(), 2);
        Ok(())
    }

    #[test]
    fn vanished_team_has_no_membership_pairs() -> AppResult<()> {
        let index = MembershipIndex::from_teams(&[]);
        assert!(!index.contains(&TeamId::new("t2")?, &UserId::new("u1")?));
        assert!(index.is_empty());
        Ok(())
    }
}
