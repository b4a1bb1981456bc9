use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::error::PaymentsError;
use crate::repository::PaymentRepository;
use crate::router::{PaymentsState, payments_router};

#[derive(Debug, Parser)]
#[command(name = "payments-api", version, about = "User balances and an idempotent transaction ledger over PostgreSQL")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Wait for the database, migrate, then serve HTTP (default).
    Serve,
    /// Wait for the database and apply pending migrations.
    Migrate,
    /// Create the application role and database as the cluster superuser.
    Provision,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }
}

pub async fn run(command: Command, cfg: &Config) -> Result<(), PaymentsError> {
    match command {
        Command::Serve => serve(cfg).await,
        Command::Migrate => migrate(cfg).await,
        Command::Provision => {
            let report = db::provision(cfg).await?;
            info!(
                role_created = report.role_created,
                database_created = report.database_created,
                "provisioning finished"
            );
            Ok(())
        }
    }
}

pub async fn migrate(cfg: &Config) -> Result<(), PaymentsError> {
    let pool = db::wait_until_ready(cfg).await?;
    let result = db::run_migrations(&pool).await;
    pool.close().await;
    result
}

/// Nothing is bound until the database answers and migrations are in.
pub async fn serve(cfg: &Config) -> Result<(), PaymentsError> {
    let pool = db::wait_until_ready(cfg).await?;
    if cfg.run_migrations {
        db::run_migrations(&pool).await?;
    }

    let state = PaymentsState::new(PaymentRepository::new(pool.clone()));
    let app = payments_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.app_port));
    let listener = TcpListener::bind(addr).await?;
    info!(service = %cfg.service_name, "HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("database pool closed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
