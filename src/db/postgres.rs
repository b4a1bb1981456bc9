use crate::config::Config;
use crate::error::PaymentsError;
use backon::{ConstantBuilder, Retryable};
use log::LevelFilter;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

pub type PgPool = Pool<Postgres>;

/// Ordered schema migrations bundled from `migrations/`.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect options for the application role.
///
/// Statements are logged at INFO in debug mode so they show up under the default filter.
pub fn connect_options(cfg: &Config) -> Result<PgConnectOptions, PaymentsError> {
    let opts = PgConnectOptions::from_str(cfg.db_dsn()?.as_str())?;
    Ok(with_statement_logging(opts, cfg.debug))
}

/// Connect options for the cluster superuser, used for provisioning.
pub fn admin_connect_options(cfg: &Config) -> Result<PgConnectOptions, PaymentsError> {
    let opts = PgConnectOptions::from_str(cfg.admin_dsn()?.as_str())?;
    Ok(with_statement_logging(opts, cfg.debug))
}

fn with_statement_logging(opts: PgConnectOptions, debug: bool) -> PgConnectOptions {
    let level = if debug {
        LevelFilter::Info
    } else {
        LevelFilter::Debug
    };
    opts.log_statements(level)
}

/// Open a pool without waiting for the server.
pub async fn connect(cfg: &Config) -> Result<PgPool, PaymentsError> {
    open_pool(connect_options(cfg)?, cfg.db_max_connections).await
}

/// Block until the database accepts connections, then hand back the pool.
///
/// Retries [`connect`] at a fixed interval, `db_wait_attempts` times at most.
pub async fn wait_until_ready(cfg: &Config) -> Result<PgPool, PaymentsError> {
    retry_until_ready(cfg, || connect(cfg)).await
}

pub(crate) async fn open_pool(
    options: PgConnectOptions,
    max_connections: u32,
) -> Result<PgPool, PaymentsError> {
    let pool = pool_options(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Only database errors are retried; a bad DSN fails on the first attempt.
pub(crate) async fn retry_until_ready<F, Fut>(cfg: &Config, open: F) -> Result<PgPool, PaymentsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PgPool, PaymentsError>>,
{
    let policy = ConstantBuilder::default()
        .with_delay(cfg.db_wait_interval())
        .with_max_times(cfg.db_wait_attempts);

    let pool = open
        .retry(policy)
        .when(|err: &PaymentsError| {
            matches!(
                err,
                PaymentsError::DatabaseError(e) if !matches!(e, sqlx::Error::Configuration(_))
            )
        })
        .notify(|err: &PaymentsError, after: Duration| {
            warn!(
                host = %cfg.db_host,
                port = cfg.db_port,
                error = %err,
                "database not ready; retrying in {:?}",
                after
            );
        })
        .await?;

    info!(host = %cfg.db_host, port = cfg.db_port, "database is ready");
    Ok(pool)
}

fn pool_options(max_connections: u32) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(ACQUIRE_TIMEOUT)
}

/// Apply every pending migration.
pub async fn run_migrations(pool: &PgPool) -> Result<(), PaymentsError> {
    MIGRATOR.run(pool).await?;
    info!(count = MIGRATOR.iter().count(), "migrations applied");
    Ok(())
}
