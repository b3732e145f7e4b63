//! Change plans computed before any store write.

use rolemend_core::{TeamId, UserId};
use serde::{Deserialize, Serialize};

use crate::role::TeamRole;

/// The two kinds of mutation a plan may carry. Nothing is ever deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    /// Create a new active role record.
    Insert,
    /// Flip an existing record inactive.
    Deactivate,
}

/// Which store(s) a change applies to.
///
/// Plans are computed per store independently; a role missing from both
/// stores yields one logical change targeting both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSet {
    /// The change applies to the document store.
    pub document: bool,
    /// The change applies to the relational store.
    pub relational: bool,
}

impl StoreSet {
    /// A mask covering both stores.
    pub const BOTH: Self = Self {
        document: true,
        relational: true,
    };

    /// A mask covering only the document store.
    pub const DOCUMENT: Self = Self {
        document: true,
        relational: false,
    };

    /// A mask covering only the relational store.
    pub const RELATIONAL: Self = Self {
        document: false,
        relational: true,
    };

    /// Returns whether the mask covers no store at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.document && !self.relational
    }
}

/// One planned mutation for one (user, team, role) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChange {
    /// User the change concerns.
    pub user_id: UserId,
    /// Team the change is scoped to.
    pub team_id: TeamId,
    /// Role level the change concerns.
    pub role: TeamRole,
    /// Insert or deactivate.
    pub action: ChangeAction,
    /// Store(s) that need the change.
    pub stores: StoreSet,
}

/// The ordered set of changes computed for one team.
///
/// Pure data: a plan touches no store until it is applied, which is what
/// makes dry-run and live mode share the identical computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePlan {
    /// Team the plan was computed for.
    pub team_id: TeamId,
    /// Planned changes in deterministic order: creator first, then members
    /// in their given order; owner, admin, member within a user.
    pub entries: Vec<RoleChange>,
    /// Roles already active and desired in both stores; nothing to do, but
    /// counted for the report.
    pub skipped: u32,
}

impl ChangePlan {
    /// Creates an empty plan for a team.
    #[must_use]
    pub fn empty(team_id: TeamId) -> Self {
        Self {
            team_id,
            entries: Vec::new(),
            skipped: 0,
        }
    }

    /// Returns whether the plan carries no mutation at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of planned inserts.
    #[must_use]
    pub fn insert_count(&self) -> u32 {
        self.count(ChangeAction::Insert)
    }

    /// Returns the number of planned deactivations.
    #[must_use]
    pub fn deactivate_count(&self) -> u32 {
        self.count(ChangeAction::Deactivate)
    }

    fn count(&self, action: ChangeAction) -> u32 {
        u32::try_from(
            self.entries
                .iter()
                .filter(|entry| entry.action == action)
                .count(),
        )
        .unwrap_or(u32::MAX)
    }
}
