//! Database module: row models, connection handling, migrations and provisioning.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and conversions to API types
//! - `postgres.rs`: pool setup, readiness wait, bundled migrations
//! - `provision.rs`: idempotent role/database bootstrap run as the superuser

pub mod models;
pub mod postgres;
pub mod provision;

pub use models::{BalanceHistoryRecord, TransactionRecord, UserRecord};
pub use postgres::{MIGRATOR, PgPool, connect, run_migrations, wait_until_ready};
pub use provision::{ProvisionPlan, ProvisionReport, provision};
