use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use rolemend_core::AppResult;
use rolemend_domain::{MembershipIndex, Team};

use super::RunMode;
use super::applier::ChangeApplier;
use super::orphans::StaleRoleDeactivator;
use super::planner::{ExistingRoles, RoleReconciler};
use super::report::{RunReport, TeamResult};
use crate::reconcile_ports::{ConfirmationGate, RelationalRoleStore, RoleStore, TeamSource};

/// Phases a reconciliation run moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Nothing has happened yet.
    Init,
    /// Per-team plans are being computed and applied.
    ProcessingTeams,
    /// The stale-role pass is running.
    DeactivatingOrphans,
    /// Results are being aggregated.
    Reporting,
    /// The run completed orchestration, possibly with per-team failures.
    Done,
    /// The operator declined the live confirmation; nothing was written.
    Aborted,
}

impl RunPhase {
    /// Returns a stable display value for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ProcessingTeams => "processing-teams",
            Self::DeactivatingOrphans => "deactivating-orphans",
            Self::Reporting => "reporting",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

/// Orchestrates one correction pass: team source → planner → applier per
/// team, then the stale-role pass, aggregated into a [`RunReport`].
///
/// Per-team failures never fail the run; only an unreadable team source (or
/// a store that cannot be established at all, which the caller hits before
/// building the runner) is fatal.
pub struct ReconciliationRunner {
    team_source: Arc<dyn TeamSource>,
    document: Arc<dyn RoleStore>,
    relational: Arc<dyn RelationalRoleStore>,
    gate: Arc<dyn ConfirmationGate>,
    mode: RunMode,
}

impl ReconciliationRunner {
    /// Wires the runner from its collaborators.
    #[must_use]
    pub fn new(
        team_source: Arc<dyn TeamSource>,
        document: Arc<dyn RoleStore>,
        relational: Arc<dyn RelationalRoleStore>,
        gate: Arc<dyn ConfirmationGate>,
        mode: RunMode,
    ) -> Self {
        Self {
            team_source,
            document,
            relational,
            gate,
            mode,
        }
    }

    /// Executes the full pass and returns the audit report.
    pub async fn run(&self) -> AppResult<RunReport> {
        let mut report = RunReport::new(self.mode);
        info!(mode = self.mode.as_str(), phase = report.phase.as_str(), "run starting");

        let mut teams = self.team_source.list_teams().await?;
        teams.sort_by(|left, right| left.id().cmp(right.id()));
        let index = MembershipIndex::from_teams(&teams);
        info!(
            teams = teams.len(),
            memberships = index.len(),
            "loaded team snapshot"
        );

        if self.mode == RunMode::Live && !self.gate.confirm().await? {
            info!("operator declined confirmation; nothing was written");
            report.phase = RunPhase::Aborted;
            return Ok(report);
        }

        report.phase = RunPhase::ProcessingTeams;
        let applier = ChangeApplier::new(self.document.clone(), self.relational.clone());
        for team in &teams {
            report.teams.push(self.process_team(&applier, team).await);
        }

        report.phase = RunPhase::DeactivatingOrphans;
        debug!(phase = report.phase.as_str(), "per-team processing complete");
        let deactivator =
            StaleRoleDeactivator::new(self.document.clone(), self.relational.clone());
        report.orphans = deactivator.run(&index, self.mode).await;

        report.phase = RunPhase::Reporting;
        info!(
            teams = report.teams.len(),
            failed = report.failed_team_count(),
            inserted = report.total_inserted(),
            skipped = report.total_skipped(),
            deactivated = report.total_deactivated(),
            orphans_deactivated = report.orphans.deactivated,
            orphan_errors = report.orphans.errors,
            "run complete"
        );
        report.phase = RunPhase::Done;
        Ok(report)
    }

    /// Plans and applies one team. Any failure, including a failure to read
    /// the team's existing roles, is caught here and recorded in the team's
    /// result.
    async fn process_team(&self, applier: &ChangeApplier, team: &Team) -> TeamResult {
        let existing = match self.gather_existing_roles(team).await {
            Ok(existing) => existing,
            Err(error) => {
                return TeamResult::failure(
                    team.id().clone(),
                    format!("failed to read existing roles: {error}"),
                );
            }
        };

        let plan = RoleReconciler.plan(team, &existing);
        debug!(
            team_id = %team.id(),
            planned = plan.entries.len(),
            skipped = plan.skipped,
            "computed change plan"
        );
        applier.apply(&plan, self.mode).await
    }

    /// Queries both stores for every user named by the team.
    async fn gather_existing_roles(&self, team: &Team) -> AppResult<ExistingRoles> {
        let mut document = BTreeMap::new();
        let mut relational = BTreeMap::new();

        for user in team.users() {
            let document_roles = self
                .document
                .find_active_roles(&user.user_id, team.id())
                .await?;
            let relational_roles = self
                .relational
                .find_active_roles(&user.user_id, team.id())
                .await?;
            document.insert(user.user_id.clone(), document_roles);
            relational.insert(user.user_id, relational_roles);
        }

        Ok(ExistingRoles {
            document,
            relational,
        })
    }
}
