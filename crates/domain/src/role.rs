//! Team role levels and recorded role assignments.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rolemend_core::{AppError, TeamId, UserId};
use serde::{Deserialize, Serialize};

/// Scope value recorded on every team-level role record.
pub const ROLE_SCOPE: &str = "TEAM";

/// Source tag recorded on role records created by the reconciliation pass.
pub const SYSTEM_SOURCE_TAG: &str = "system";

/// Permission level a user holds on a specific team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    /// Full control of the team; held only by the team's creator.
    Owner,
    /// Administrative control; held only by the team's creator.
    Admin,
    /// Ordinary membership; held by every current member.
    Member,
}

impl TeamRole {
    /// Fixed processing order: owner, then admin, then member.
    pub const ORDERED: &'static [Self] = &[Self::Owner, Self::Admin, Self::Member];

    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Returns the complete role set a user should hold for their
    /// membership kind. Any active role outside this set is wrongful and
    /// must be deactivated.
    #[must_use]
    pub fn desired_for(kind: MembershipKind) -> &'static [Self] {
        match kind {
            MembershipKind::Creator => &[Self::Owner, Self::Admin, Self::Member],
            MembershipKind::Member => &[Self::Member],
        }
    }
}

impl FromStr for TeamRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            _ => Err(AppError::Validation(format!(
                "unknown team role value '{value}'"
            ))),
        }
    }
}

/// How a user relates to a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipKind {
    /// The user created the team.
    Creator,
    /// The user is an ordinary member.
    Member,
}

/// A role record as persisted by a backing store.
///
/// At most one assignment exists per (user, team, role) in each store.
/// Assignments are never deleted; deactivation flips the active flag and the
/// record is retained for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// User the role is granted to.
    pub user_id: UserId,
    /// Team the role is scoped to.
    pub team_id: TeamId,
    /// Granted role level.
    pub role: TeamRole,
    /// Whether the record currently confers permission.
    pub active: bool,
    /// Who created the record (operator tag or `system`).
    pub source_tag: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{MembershipKind, TeamRole};

    #[test]
    fn role_roundtrip_storage_value() {
        for role in TeamRole::ORDERED {
            let restored = TeamRole::from_str(role.as_str());
            assert_eq!(restored.ok(), Some(*role));
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let parsed = TeamRole::from_str("superuser");
        assert!(parsed.is_err());
    }

    #[test]
    fn creator_is_owner_admin_and_member() {
        assert_eq!(
            TeamRole::desired_for(MembershipKind::Creator),
            &[TeamRole::Owner, TeamRole::Admin, TeamRole::Member]
        );
    }

    #[test]
    fn plain_member_holds_member_only() {
        assert_eq!(
            TeamRole::desired_for(MembershipKind::Member),
            &[TeamRole::Member]
        );
    }
}
