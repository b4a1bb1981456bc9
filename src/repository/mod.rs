//! Storage seam between the HTTP handlers and PostgreSQL.

pub mod payment;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

use crate::db::{TransactionRecord, UserRecord};
use crate::error::PaymentsError;
use crate::types::{TransactionCreate, UserCreate};

pub use payment::{PaymentRepository, next_balance};

/// Users, balances and the transaction ledger.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Store a new user. Fails with [`PaymentsError::UserExists`] on any clash.
    async fn create_user(&self, data: UserCreate) -> Result<UserRecord, PaymentsError>;

    /// Balance now, or as of `ts` when a snapshot at or before it exists.
    /// `None` when the user is unknown.
    async fn get_user_balance(
        &self,
        user_id: &str,
        ts: Option<DateTime<FixedOffset>>,
    ) -> Result<Option<Decimal>, PaymentsError>;

    /// Apply a transaction once per `uid`; replays return the stored row.
    async fn add_transaction(
        &self,
        data: TransactionCreate,
    ) -> Result<TransactionRecord, PaymentsError>;

    /// Look a transaction up by its client `uid`.
    async fn get_transaction(&self, uid: &str)
    -> Result<Option<TransactionRecord>, PaymentsError>;
}
