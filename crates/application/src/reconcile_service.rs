//! The reconciliation core: planner, applier, orphan pass and runner.

mod applier;
mod orphans;
mod planner;
mod report;
mod runner;


pub use applier::ChangeApplier;
pub use orphans::{OrphanSummary, StaleRoleDeactivator};
pub use planner::{ExistingRoles, RoleReconciler};
pub use report::{RunReport, TeamResult};
pub use runner::{ReconciliationRunner, RunPhase};

/// Whether a run simulates or applies its change plans.
///
/// Both modes share the identical planning computation; dry-run only skips
/// the store writes and the confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Record every planned change without touching either store.
    DryRun,
    /// Apply plans to both stores.
    Live,
}

impl RunMode {
    /// Returns a stable display value for logs and reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DryRun => "dry-run",
            Self::Live => "live",
        }
    }
}
