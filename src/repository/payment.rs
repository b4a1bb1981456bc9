use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::PaymentStore;
use crate::db::{BalanceHistoryRecord, PgPool, TransactionRecord, UserRecord};
use crate::error::PaymentsError;
use crate::security;
use crate::types::{TransactionCreate, TransactionKind, UserCreate};

const USER_COLUMNS: &str =
    "id, email, name, hashed_password, full_name, balance, is_active, created_at, updated_at";
const TRANSACTION_COLUMNS: &str = "id, uid, user_id, type, amount, created_at";

/// Balance after applying `amount` of `kind` to `balance`.
pub fn next_balance(balance: Decimal, kind: &str, amount: Decimal) -> Result<Decimal, PaymentsError> {
    match kind.parse::<TransactionKind>()? {
        TransactionKind::Deposit => Ok(balance + amount),
        TransactionKind::Withdraw => {
            if balance < amount {
                return Err(PaymentsError::payment("Insufficient funds"));
            }
            Ok(balance - amount)
        }
    }
}

/// PostgreSQL-backed [`PaymentStore`].
#[derive(Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_transaction(&self, uid: &str) -> Result<Option<TransactionRecord>, sqlx::Error> {
        sqlx::query_as::<_, TransactionRecord>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE uid = $1"
        ))
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn create_user(&self, data: UserCreate) -> Result<UserRecord, PaymentsError> {
        let existing: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE name = $1")
            .bind(&data.name)
            .fetch_optional(&self.pool)
            .await
            .map_err(user_insert_error)?;
        if existing.is_some() {
            return Err(PaymentsError::UserExists(
                "User with this username already exists".to_string(),
            ));
        }

        let hashed_password = match data.password {
            Some(password) => Some(
                tokio::task::spawn_blocking(move || security::hash_password(&password))
                    .await
                    .map_err(|e| PaymentsError::PasswordHash(e.to_string()))??,
            ),
            None => None,
        };
        let id = data.id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let user = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            INSERT INTO users (id, email, name, hashed_password, full_name, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(data.email)
        .bind(&data.name)
        .bind(hashed_password)
        .bind(data.full_name)
        .bind(data.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(user_insert_error)?;

        info!(user_id = %user.id, name = %user.name, "user created");
        Ok(user)
    }

    async fn get_user_balance(
        &self,
        user_id: &str,
        ts: Option<DateTime<FixedOffset>>,
    ) -> Result<Option<Decimal>, PaymentsError> {
        let db_error = |e: sqlx::Error| {
            error!(user_id, error = %e, "balance lookup failed");
            PaymentsError::DatabaseError(e)
        };

        if let Some(ts) = ts {
            let snapshot = sqlx::query_as::<_, BalanceHistoryRecord>(
                r#"
                SELECT id, user_id, balance, created_at FROM balance_history
                WHERE user_id = $1 AND created_at <= $2
                ORDER BY created_at DESC
                LIMIT 1
                "#,
            )
            .bind(user_id)
            .bind(ts.with_timezone(&Utc))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

            if let Some(snapshot) = snapshot {
                debug!(user_id, at = %snapshot.created_at, "balance from history");
                return Ok(Some(snapshot.balance));
            }
        }

        sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn add_transaction(
        &self,
        data: TransactionCreate,
    ) -> Result<TransactionRecord, PaymentsError> {
        if let Some(existing) = self.find_transaction(&data.uid).await.map_err(|e| {
            PaymentsError::payment(format!("Error while fetching transaction: {e}"))
        })? {
            debug!(uid = %data.uid, "transaction already applied");
            return Ok(existing);
        }

        let processing_error = |e: sqlx::Error| {
            PaymentsError::payment(format!(
                "An error occurred while processing the transaction: {e}"
            ))
        };

        let mut tx = self.pool.begin().await.map_err(processing_error)?;

        // Row lock serializes concurrent movements on the same user.
        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM users WHERE id = $1 FOR UPDATE")
                .bind(&data.user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| PaymentsError::payment(format!("Error while fetching user: {e}")))?;
        let Some(balance) = balance else {
            return Err(PaymentsError::payment("User not found"));
        };

        let new_balance = next_balance(balance, &data.kind, data.amount)?;
        let created_at = data.created_at.with_timezone(&Utc);

        let inserted = sqlx::query_as::<_, TransactionRecord>(&format!(
            r#"
            INSERT INTO transactions (id, uid, user_id, type, amount, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (uid) DO NOTHING
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&data.uid)
        .bind(&data.user_id)
        .bind(&data.kind)
        .bind(data.amount)
        .bind(created_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(processing_error)?;

        let Some(inserted) = inserted else {
            // Lost a race with a request carrying the same uid.
            tx.rollback().await.map_err(|e| {
                PaymentsError::payment(format!("An error occurred during rollback: {e}"))
            })?;
            return self
                .find_transaction(&data.uid)
                .await
                .map_err(processing_error)?
                .ok_or_else(|| PaymentsError::payment("Transaction failed"));
        };

        sqlx::query("UPDATE users SET balance = $1 WHERE id = $2")
            .bind(new_balance)
            .bind(&data.user_id)
            .execute(&mut *tx)
            .await
            .map_err(processing_error)?;

        sqlx::query(
            "INSERT INTO balance_history (id, user_id, balance, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&data.user_id)
        .bind(new_balance)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(processing_error)?;

        tx.commit().await.map_err(processing_error)?;

        info!(
            uid = %inserted.uid,
            user_id = %inserted.user_id,
            kind = %inserted.kind,
            amount = %inserted.amount,
            balance = %new_balance,
            "transaction applied"
        );
        Ok(inserted)
    }

    async fn get_transaction(
        &self,
        uid: &str,
    ) -> Result<Option<TransactionRecord>, PaymentsError> {
        self.find_transaction(uid).await.map_err(|e| {
            error!(uid, error = %e, "transaction lookup failed");
            PaymentsError::payment("Error while getting transaction")
        })
    }
}

/// Constraint violations mean the user clashes with a stored one; anything else is infrastructure.
fn user_insert_error(e: sqlx::Error) -> PaymentsError {
    match e {
        sqlx::Error::Database(_) => {
            PaymentsError::UserExists("User with this information already exists".to_string())
        }
        other => PaymentsError::DatabaseError(other),
    }
}
