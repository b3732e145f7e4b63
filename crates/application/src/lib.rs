//! Reconciliation services and ports.

#![forbid(unsafe_code)]

mod reconcile_ports;
mod reconcile_service;

pub use reconcile_ports::{
    ConfirmationGate, InsertOutcome, NewRoleAssignment, RelationalRoleStore, RoleStore,
    TeamSource, TeamTransaction,
};
pub use reconcile_service::{
    ChangeApplier, ExistingRoles, OrphanSummary, ReconciliationRunner, RoleReconciler, RunMode,
    RunPhase, RunReport, StaleRoleDeactivator, TeamResult,
};
