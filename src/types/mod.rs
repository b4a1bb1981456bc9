//! Wire types for the HTTP API and the rules that validate them.

pub mod schemas;
pub mod timestamp;
pub mod validation;

pub use schemas::{
    BalanceQuery, Transaction, TransactionCreate, TransactionKind, UserBalance, UserCreate,
    UserResponse, Validate,
};
