// src/bin/admin.rs
//
// Operational commands run against the same database and providers as the server.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use serde::Serialize;
use uuid::Uuid;

use benefits_admin::api::auth::{CreateUserRequest, create_user};
use benefits_admin::config::Config;
use benefits_admin::models::Role;
use benefits_admin::registry::RegistryQuery;
use benefits_admin::services::{commissions, registry_sync, webhooks};
use benefits_admin::{AppState, db, worker};

#[derive(Debug, Parser)]
#[command(name = "benefits-admin", version, about = "Benefits back-office operations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending database migrations.
    Migrate,
    /// Create a login (headquarters or unit).
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long, env = "ADMIN_PASSWORD")]
        password: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "headquarters")]
        role: Role,
        #[arg(long)]
        unit_id: Option<Uuid>,
    },
    /// Send one beneficiary's enrollment to the registry now.
    SendEnrollment { beneficiary_id: Uuid },
    /// Re-send failed registry enrollments.
    RetryRegistry {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Re-apply stored webhook events that were never processed.
    ReprocessWebhooks {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Compute commissions for a month (YYYY-MM).
    ComputeCommissions { month: String },
    /// Look beneficiaries up in the registry.
    QueryRegistry {
        #[arg(long)]
        cpf: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Run a single worker pass and exit.
    Reconcile,
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let pool = db::connect(&config.database_url)
        .await
        .context("Failed to connect to DB")?;

    if let Command::Migrate = cli.command {
        db::migrate(&pool).await.context("Failed to run migrations")?;
        log::info!("migrations applied");
        return Ok(());
    }

    let state = AppState::new(pool, config).context("Failed to build HTTP client")?;

    match cli.command {
        Command::Migrate => {}
        Command::CreateUser {
            email,
            password,
            name,
            role,
            unit_id,
        } => {
            let user = create_user(
                &state,
                &CreateUserRequest {
                    email,
                    password,
                    name,
                    role,
                    unit_id,
                },
            )
            .await?;
            print(&user)?;
        }
        Command::SendEnrollment { beneficiary_id } => {
            print(&registry_sync::send_enrollment(&state, beneficiary_id).await?)?;
        }
        Command::RetryRegistry { limit } => {
            print(&registry_sync::retry_failed(&state, limit).await?)?;
        }
        Command::ReprocessWebhooks { limit } => {
            print(&webhooks::reprocess_pending(&state, limit).await?)?;
        }
        Command::ComputeCommissions { month } => {
            let month = commissions::parse_reference_month(&month)?;
            print(&commissions::compute_for_month(&state.pool, month).await?)?;
        }
        Command::QueryRegistry {
            cpf,
            from,
            to,
            offset,
            limit,
        } => {
            let page = state
                .registry
                .query_beneficiaries(&RegistryQuery {
                    cpf,
                    from,
                    to,
                    offset,
                    limit,
                })
                .await?;
            print(&page)?;
        }
        Command::Reconcile => worker::run_once(&state).await,
    }

    Ok(())
}
