use std::sync::Arc;

use tracing::warn;

use rolemend_core::AppError;
use rolemend_domain::{ChangeAction, ChangePlan, RoleChange, SYSTEM_SOURCE_TAG};

use super::RunMode;
use super::report::TeamResult;
use crate::reconcile_ports::{
    InsertOutcome, NewRoleAssignment, RelationalRoleStore, RoleStore, TeamTransaction,
};

/// Executes one team's change plan against both stores, or only counts it in
/// dry-run mode.
///
/// Live application writes the document store first, then the relational
/// store inside a single per-team transaction. A relational failure rolls
/// that transaction back in full; document-store writes that already
/// happened are not compensated, which leaves the stores divergent for the
/// team until a later run converges them.
pub struct ChangeApplier {
    document: Arc<dyn RoleStore>,
    relational: Arc<dyn RelationalRoleStore>,
}

/// What happened to one plan entry across both stores.
#[derive(Debug, Default, Clone)]
struct EntryOutcome {
    document_record_id: Option<String>,
    inserted_somewhere: bool,
}

impl ChangeApplier {
    /// Creates an applier over the two store bindings.
    #[must_use]
    pub fn new(document: Arc<dyn RoleStore>, relational: Arc<dyn RelationalRoleStore>) -> Self {
        Self {
            document,
            relational,
        }
    }

    /// Applies (or, in dry-run mode, records) the plan and returns the
    /// team's result. Never returns an error: failures are captured in the
    /// result so the run can continue with the next team.
    pub async fn apply(&self, plan: &ChangePlan, mode: RunMode) -> TeamResult {
        match mode {
            RunMode::DryRun => Self::simulate(plan),
            RunMode::Live => self.apply_live(plan).await,
        }
    }

    /// Dry-run: every planned entry is counted, zero store calls are made.
    fn simulate(plan: &ChangePlan) -> TeamResult {
        let mut result = TeamResult::new(plan.team_id.clone());
        result.inserted = plan.insert_count();
        result.deactivated = plan.deactivate_count();
        result.skipped = plan.skipped;
        result
    }

    async fn apply_live(&self, plan: &ChangePlan) -> TeamResult {
        let mut result = TeamResult::new(plan.team_id.clone());
        result.skipped = plan.skipped;
        if plan.entries.is_empty() {
            return result;
        }
        let mut outcomes = vec![EntryOutcome::default(); plan.entries.len()];

        // Document store first. A hard failure here fails the whole team
        // before any relational write happens.
        for (entry, outcome) in plan.entries.iter().zip(outcomes.iter_mut()) {
            if !entry.stores.document {
                continue;
            }
            if let Err(error) = self.apply_document_entry(entry, outcome).await {
                return Self::fail(result, self.document.label(), entry, &error);
            }
        }

        // Relational store, all-or-nothing for this team.
        let mut transaction = match self.relational.begin_team_transaction().await {
            Ok(transaction) => transaction,
            Err(error) => {
                return Self::fail(result, self.relational.label(), plan.entries.first(), &error);
            }
        };

        for (entry, outcome) in plan.entries.iter().zip(outcomes.iter_mut()) {
            if !entry.stores.relational {
                continue;
            }
            if let Err(error) =
                Self::apply_relational_entry(transaction.as_mut(), entry, outcome).await
            {
                if let Err(rollback_error) = transaction.rollback().await {
                    warn!(
                        team_id = %plan.team_id,
                        error = %rollback_error,
                        "failed to roll back relational transaction"
                    );
                }
                let error = AppError::Transaction(error.to_string());
                return Self::fail(result, self.relational.label(), entry, &error);
            }
        }

        if let Err(error) = transaction.commit().await {
            return Self::fail(result, self.relational.label(), plan.entries.first(), &error);
        }

        // Counting is per logical change, not per store: an insert counts
        // once even when both stores needed it, and counts as a skip when
        // every targeted store already had the role active.
        for (entry, outcome) in plan.entries.iter().zip(outcomes.iter()) {
            match entry.action {
                ChangeAction::Insert => {
                    if outcome.inserted_somewhere {
                        result.inserted += 1;
                    } else {
                        result.skipped += 1;
                    }
                }
                ChangeAction::Deactivate => result.deactivated += 1,
            }
        }

        result
    }

    async fn apply_document_entry(
        &self,
        entry: &RoleChange,
        outcome: &mut EntryOutcome,
    ) -> Result<(), AppError> {
        match entry.action {
            ChangeAction::Insert => {
                match self.document.insert_role(&Self::assignment(entry, None)).await {
                    Ok(InsertOutcome::Inserted { record_id }) => {
                        outcome.inserted_somewhere = true;
                        outcome.document_record_id = record_id;
                        Ok(())
                    }
                    Ok(InsertOutcome::AlreadyActive) | Err(AppError::Conflict(_)) => Ok(()),
                    Err(error) => Err(error),
                }
            }
            ChangeAction::Deactivate => {
                self.document
                    .deactivate_role(&entry.user_id, &entry.team_id, entry.role)
                    .await
            }
        }
    }

    async fn apply_relational_entry(
        transaction: &mut dyn TeamTransaction,
        entry: &RoleChange,
        outcome: &mut EntryOutcome,
    ) -> Result<(), AppError> {
        match entry.action {
            ChangeAction::Insert => {
                let assignment = Self::assignment(entry, outcome.document_record_id.clone());
                match transaction.insert_role(&assignment).await {
                    Ok(InsertOutcome::Inserted { .. }) => {
                        outcome.inserted_somewhere = true;
                        Ok(())
                    }
                    Ok(InsertOutcome::AlreadyActive) | Err(AppError::Conflict(_)) => Ok(()),
                    Err(error) => Err(error),
                }
            }
            ChangeAction::Deactivate => {
                transaction
                    .deactivate_role(&entry.user_id, &entry.team_id, entry.role)
                    .await
            }
        }
    }

    fn assignment(entry: &RoleChange, document_record_id: Option<String>) -> NewRoleAssignment {
        NewRoleAssignment {
            user_id: entry.user_id.clone(),
            team_id: entry.team_id.clone(),
            role: entry.role,
            source_tag: SYSTEM_SOURCE_TAG.to_owned(),
            document_record_id,
        }
    }

    fn fail<'entry>(
        mut result: TeamResult,
        store: &str,
        entry: impl Into<Option<&'entry RoleChange>>,
        error: &AppError,
    ) -> TeamResult {
        let context = entry
            .into()
            .map(|entry| {
                format!(
                    "{store} store, user '{}', role '{}': {error}",
                    entry.user_id,
                    entry.role.as_str()
                )
            })
            .unwrap_or_else(|| format!("{store} store: {error}"));

        warn!(
            team_id = %result.team_id,
            store,
            error = %error,
            "team changes failed; continuing with the next team"
        );
        result.failed = true;
        result.error_detail = Some(context);
        result
    }
}
