//! Idempotent creation of the application role and database.
//!
//! Runs as the cluster superuser against the maintenance database. Every step
//! checks the catalog first, so running it against an already provisioned
//! cluster only resets the role password and reapplies ownership and grants.
//! The first failing statement aborts the sequence.

use crate::config::Config;
use crate::db::postgres::{PgPool, admin_connect_options, open_pool, retry_until_ready};
use crate::error::PaymentsError;
use tracing::info;

/// Role and database the application runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionPlan {
    pub role: String,
    pub password: String,
    pub database: String,
}

impl ProvisionPlan {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            role: cfg.db_user.clone(),
            password: cfg.db_password.clone(),
            database: cfg.db_name.clone(),
        }
    }

    /// Statements to run given what the catalog already holds.
    pub fn statements(&self, role_exists: bool, database_exists: bool) -> Vec<String> {
        let role = quote_ident(&self.role);
        let database = quote_ident(&self.database);
        let password = quote_literal(&self.password);

        let mut stmts = Vec::with_capacity(4);
        if role_exists {
            stmts.push(format!("ALTER ROLE {role} WITH LOGIN PASSWORD {password}"));
        } else {
            stmts.push(format!("CREATE ROLE {role} WITH LOGIN PASSWORD {password}"));
        }
        if !database_exists {
            stmts.push(format!("CREATE DATABASE {database} OWNER {role}"));
        }
        stmts.push(format!("ALTER DATABASE {database} OWNER TO {role}"));
        stmts.push(format!(
            "GRANT ALL PRIVILEGES ON DATABASE {database} TO {role}"
        ));
        stmts
    }
}

/// Outcome of one provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionReport {
    pub role_created: bool,
    pub database_created: bool,
}

/// Connect as the superuser (waiting for the server) and provision.
pub async fn provision(cfg: &Config) -> Result<ProvisionReport, PaymentsError> {
    let options = admin_connect_options(cfg)?;
    let pool = retry_until_ready(cfg, || open_pool(options.clone(), 1)).await?;
    let report = provision_with(&pool, &ProvisionPlan::from_config(cfg)).await;
    pool.close().await;
    report
}

pub async fn provision_with(
    pool: &PgPool,
    plan: &ProvisionPlan,
) -> Result<ProvisionReport, PaymentsError> {
    let role_exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_roles WHERE rolname = $1)")
            .bind(&plan.role)
            .fetch_one(pool)
            .await?;
    let database_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_database WHERE datname = $1)",
    )
    .bind(&plan.database)
    .fetch_one(pool)
    .await?;

    // DDL with identifiers cannot take bind parameters; values are quoted instead.
    for stmt in plan.statements(role_exists, database_exists) {
        sqlx::raw_sql(&stmt).execute(pool).await?;
    }

    info!(
        role = %plan.role,
        database = %plan.database,
        role_created = !role_exists,
        database_created = !database_exists,
        "database provisioned"
    );

    Ok(ProvisionReport {
        role_created: !role_exists,
        database_created: !database_exists,
    })
}

/// Quote an SQL identifier, doubling embedded double quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote an SQL string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
