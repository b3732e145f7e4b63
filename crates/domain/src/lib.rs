//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod plan;
mod role;
mod team;

pub use plan::{ChangeAction, ChangePlan, RoleChange, StoreSet};
pub use role::{
    MembershipKind, ROLE_SCOPE, RoleAssignment, SYSTEM_SOURCE_TAG, TeamRole,
};
pub use team::{MembershipIndex, Team, TeamUser};
