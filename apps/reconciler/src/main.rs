//! Rolemend team-role reconciliation CLI.

#![forbid(unsafe_code)]

mod reconciler_config;

use std::sync::Arc;

use clap::Parser;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rolemend_application::{ReconciliationRunner, RunMode, RunPhase, RunReport};
use rolemend_core::{AppError, AppResult};
use rolemend_infrastructure::{
    ConsoleConfirmationGate, MongoConnection, MongoRoleStore, MongoTeamSource, PostgresRoleStore,
};

use reconciler_config::ReconcilerConfig;

/// Reconciles team role records across the document and relational stores.
#[derive(Debug, Parser)]
#[command(name = "rolemend", version, about)]
struct Args {
    /// Compute and report every change without writing to either store.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let mode = if args.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Live
    };
    let config = ReconcilerConfig::load()?;

    info!(mode = mode.as_str(), "rolemend starting");
    let mongo = MongoConnection::connect(&config.mongo_uri, &config.mongo_db_name).await?;
    let pool = connect_pool(&config).await?;
    info!(
        host = config.pg_host,
        database = config.pg_db_name,
        "connected to PostgreSQL"
    );

    let runner = ReconciliationRunner::new(
        Arc::new(MongoTeamSource::new(&mongo)),
        Arc::new(MongoRoleStore::new(&mongo)),
        Arc::new(PostgresRoleStore::new(pool)),
        Arc::new(ConsoleConfirmationGate),
        mode,
    );

    let report = runner.run().await?;
    print_report(&report);
    Ok(())
}

async fn connect_pool(config: &ReconcilerConfig) -> AppResult<PgPool> {
    let options = PgConnectOptions::new()
        .host(config.pg_host.as_str())
        .port(config.pg_port)
        .database(config.pg_db_name.as_str())
        .username(config.pg_user.as_str())
        .password(config.pg_password.as_str());

    PgPoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|error| {
            AppError::Connectivity(format!("failed to connect to PostgreSQL: {error}"))
        })
}

/// Prints the audit trail: one line per team, the orphan pass, and totals.
/// The format is identical in dry-run mode so the trail is reproducible
/// without side effects.
fn print_report(report: &RunReport) {
    if report.mode == RunMode::DryRun {
        println!("--- dry-run: no changes were made ---");
    }
    if report.phase == RunPhase::Aborted {
        println!("aborted by operator before any write");
        return;
    }

    for team in &report.teams {
        let mut line = format!(
            "team {}: inserted={} skipped={} deactivated={}",
            team.team_id, team.inserted, team.skipped, team.deactivated
        );
        if team.failed {
            line.push_str(" FAILED");
            if let Some(detail) = &team.error_detail {
                line.push_str(": ");
                line.push_str(detail);
            }
        }
        println!("{line}");
    }

    println!(
        "orphan pass: deactivated={} errors={}",
        report.orphans.deactivated, report.orphans.errors
    );
    println!(
        "totals: teams={} failed={} inserted={} skipped={} deactivated={}",
        report.teams.len(),
        report.failed_team_count(),
        report.total_inserted(),
        report.total_skipped(),
        report.total_deactivated(),
    );
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
