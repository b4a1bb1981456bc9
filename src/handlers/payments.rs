use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use tracing::debug;

use crate::error::{FieldError, PaymentsError};
use crate::middleware::ValidatedJson;
use crate::router::PaymentsState;
use crate::types::{
    BalanceQuery, Transaction, TransactionCreate, UserBalance, UserCreate, UserResponse,
};

/// POST /api/user/
pub async fn create_user(
    State(state): State<PaymentsState>,
    ValidatedJson(data): ValidatedJson<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), PaymentsError> {
    let user = state.store.create_user(data).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/user/{user_id}/balance/?ts=<rfc3339>
pub async fn get_user_balance(
    State(state): State<PaymentsState>,
    Path(user_id): Path<String>,
    query: Result<Query<BalanceQuery>, QueryRejection>,
) -> Result<Json<UserBalance>, PaymentsError> {
    let Query(query) = query.map_err(|rejection| {
        PaymentsError::Validation(vec![FieldError::query(
            "ts",
            "datetime_parsing",
            rejection.body_text(),
        )])
    })?;

    let balance = state
        .store
        .get_user_balance(&user_id, query.ts)
        .await?
        .ok_or_else(|| PaymentsError::not_found("User not found"))?;
    Ok(Json(UserBalance { balance }))
}

/// PUT /api/transaction/
pub async fn add_transaction(
    State(state): State<PaymentsState>,
    ValidatedJson(data): ValidatedJson<TransactionCreate>,
) -> Result<Json<Transaction>, PaymentsError> {
    let uid = data.uid.clone();
    let transaction = state.store.add_transaction(data).await.inspect_err(|e| {
        if let PaymentsError::Payment(msg) = e {
            debug!("uid={uid}; payment refused: {msg}");
        }
    })?;
    Ok(Json(transaction.into()))
}

/// POST /api/transaction/{transaction_id}
///
/// The path segment is the client `uid` the transaction was submitted with.
pub async fn get_transaction(
    State(state): State<PaymentsState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<Transaction>, PaymentsError> {
    let transaction = state
        .store
        .get_transaction(&transaction_id)
        .await
        .map_err(|e| match e {
            PaymentsError::Payment(msg) => PaymentsError::Unprocessable(msg),
            other => other,
        })?
        .ok_or_else(|| PaymentsError::not_found("Transaction not found"))?;
    Ok(Json(transaction.into()))
}
