use chrono::{DateTime, FixedOffset, Local, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use super::timestamp;
use super::validation::{
    PASSWORD_MIN_LEN, Shape, USERNAME_MAX_LEN, USERNAME_MIN_LEN, check_amount, check_length,
    check_shape, is_valid_email, validate_password_strength, validate_username_alphanumeric,
};
use crate::error::{FieldError, PaymentsError};

/// Request payloads checked after deserialization.
pub trait Validate {
    /// Keys that must be present in the JSON object.
    const REQUIRED_FIELDS: &'static [&'static str];

    /// Fields whose JSON value has the wrong type, in declaration order.
    fn type_errors(object: &Map<String, Value>) -> Vec<FieldError>;

    fn validate(&self) -> Vec<FieldError>;
}

/// Body of `POST /api/user/`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_active() -> bool {
    true
}

impl Validate for UserCreate {
    const REQUIRED_FIELDS: &'static [&'static str] = &["name"];

    fn type_errors(object: &Map<String, Value>) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_shape(&mut errors, object, "id", Shape::Str, true);
        check_shape(&mut errors, object, "email", Shape::Str, true);
        check_shape(&mut errors, object, "name", Shape::Str, false);
        check_shape(&mut errors, object, "full_name", Shape::Str, true);
        check_shape(&mut errors, object, "is_active", Shape::Bool, false);
        check_shape(&mut errors, object, "password", Shape::Str, true);
        errors
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if let Some(id) = &self.id {
            check_length(&mut errors, "id", id, Some(1), Some(100));
        }
        if let Some(email) = &self.email {
            check_length(&mut errors, "email", email, None, Some(100));
            if !is_valid_email(email) {
                errors.push(FieldError::body(
                    "email",
                    "value_error",
                    "value is not a valid email address",
                ));
            }
        }

        let before = errors.len();
        check_length(
            &mut errors,
            "name",
            &self.name,
            Some(USERNAME_MIN_LEN),
            Some(USERNAME_MAX_LEN),
        );
        if errors.len() == before
            && let Err(msg) = validate_username_alphanumeric(&self.name)
        {
            errors.push(FieldError::body("name", "value_error", msg));
        }

        if let Some(full_name) = &self.full_name {
            check_length(&mut errors, "full_name", full_name, None, Some(100));
        }

        if let Some(password) = &self.password {
            let before = errors.len();
            check_length(&mut errors, "password", password, Some(PASSWORD_MIN_LEN), None);
            if errors.len() == before
                && let Err(msg) = validate_password_strength(password)
            {
                errors.push(FieldError::body("password", "value_error", msg));
            }
        }

        errors
    }
}

/// Public view of a user; never includes the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: Option<String>,
    pub name: String,
    pub full_name: Option<String>,
    pub is_active: bool,
}

/// Body of `PUT /api/transaction/`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionCreate {
    pub uid: String,
    pub user_id: String,
    pub amount: Decimal,
    #[serde(default = "local_now", deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<FixedOffset>,
    #[serde(rename = "type")]
    pub kind: String,
}

fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

impl Validate for TransactionCreate {
    const REQUIRED_FIELDS: &'static [&'static str] = &["uid", "user_id", "amount", "type"];

    fn type_errors(object: &Map<String, Value>) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_shape(&mut errors, object, "uid", Shape::Str, false);
        check_shape(&mut errors, object, "user_id", Shape::Str, false);
        check_shape(&mut errors, object, "amount", Shape::Decimal, false);
        check_shape(&mut errors, object, "created_at", Shape::Timestamp, false);
        check_shape(&mut errors, object, "type", Shape::Str, false);
        errors
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_length(&mut errors, "uid", &self.uid, Some(1), Some(100));
        check_length(&mut errors, "user_id", &self.user_id, Some(1), Some(100));
        check_amount(&mut errors, "amount", self.amount);
        check_length(&mut errors, "type", &self.kind, Some(1), Some(10));
        errors
    }
}

/// Direction of a ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

impl FromStr for TransactionKind {
    type Err = PaymentsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(Self::Deposit),
            "WITHDRAW" => Ok(Self::Withdraw),
            _ => Err(PaymentsError::payment("Invalid transaction type")),
        }
    }
}

/// A stored transaction as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub uid: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBalance {
    pub balance: Decimal,
}

/// Query string of `GET /api/user/{user_id}/balance/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BalanceQuery {
    /// Report the balance as it was at this instant. Naive values are UTC.
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub ts: Option<DateTime<FixedOffset>>,
}
