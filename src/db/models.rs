use crate::types::{Transaction, UserResponse};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row of `users`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct UserRecord {
    pub id: String,
    pub email: Option<String>,
    pub name: String,
    #[serde(skip_serializing)]
    pub hashed_password: Option<String>,
    pub full_name: Option<String>,
    pub balance: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of `transactions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct TransactionRecord {
    pub id: String,
    pub uid: String,
    pub user_id: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Row of `balance_history`: the balance right after one transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct BalanceHistoryRecord {
    pub id: String,
    pub user_id: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for UserResponse {
    fn from(u: UserRecord) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            full_name: u.full_name,
            is_active: u.is_active,
        }
    }
}

impl From<TransactionRecord> for Transaction {
    fn from(t: TransactionRecord) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            uid: t.uid,
            kind: t.kind,
            amount: t.amount,
            created_at: t.created_at,
        }
    }
}
