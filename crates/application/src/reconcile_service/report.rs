use rolemend_core::TeamId;

use super::orphans::OrphanSummary;
use super::runner::RunPhase;
use super::RunMode;

/// Outcome of applying one team's change plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamResult {
    /// Team the result belongs to.
    pub team_id: TeamId,
    /// Role records created (or that would be in dry-run).
    pub inserted: u32,
    /// Roles already correct in both stores.
    pub skipped: u32,
    /// Role records flipped inactive.
    pub deactivated: u32,
    /// Whether the team's changes failed and were rolled back on the
    /// relational side.
    pub failed: bool,
    /// Failure context for manual remediation.
    pub error_detail: Option<String>,
}

impl TeamResult {
    /// Creates an empty result for a team.
    #[must_use]
    pub fn new(team_id: TeamId) -> Self {
        Self {
            team_id,
            inserted: 0,
            skipped: 0,
            deactivated: 0,
            failed: false,
            error_detail: None,
        }
    }

    /// Creates a failed result carrying the error detail.
    #[must_use]
    pub fn failure(team_id: TeamId, detail: impl Into<String>) -> Self {
        let mut result = Self::new(team_id);
        result.failed = true;
        result.error_detail = Some(detail.into());
        result
    }
}

/// Aggregated audit trail of one reconciliation run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Mode the run executed in.
    pub mode: RunMode,
    /// Final phase the run reached.
    pub phase: RunPhase,
    /// Per-team results in processing order (ascending team id).
    pub teams: Vec<TeamResult>,
    /// Outcome of the stale-role pass.
    pub orphans: OrphanSummary,
}

impl RunReport {
    /// Creates an empty report for a run that has not processed anything.
    #[must_use]
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            phase: RunPhase::Init,
            teams: Vec::new(),
            orphans: OrphanSummary::default(),
        }
    }

    /// Total roles inserted across all teams.
    #[must_use]
    pub fn total_inserted(&self) -> u64 {
        self.teams.iter().map(|team| u64::from(team.inserted)).sum()
    }

    /// Total roles skipped across all teams.
    #[must_use]
    pub fn total_skipped(&self) -> u64 {
        self.teams.iter().map(|team| u64::from(team.skipped)).sum()
    }

    /// Total roles deactivated across all teams, excluding the orphan pass.
    #[must_use]
    pub fn total_deactivated(&self) -> u64 {
        self.teams
            .iter()
            .map(|team| u64::from(team.deactivated))
            .sum()
    }

    /// Number of teams whose changes failed.
    #[must_use]
    pub fn failed_team_count(&self) -> usize {
        self.teams.iter().filter(|team| team.failed).count()
    }
}
