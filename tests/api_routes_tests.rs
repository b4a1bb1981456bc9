use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use chrono::{DateTime, FixedOffset, Utc};
use payments_api::db::{TransactionRecord, UserRecord};
use payments_api::repository::{PaymentStore, next_balance};
use payments_api::types::{TransactionCreate, UserCreate};
use payments_api::{PaymentsError, PaymentsState, payments_router};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// uid that makes the in-memory store fail lookups.
const BROKEN_UID: &str = "error_id";

#[derive(Default)]
struct Ledger {
    users: Vec<UserRecord>,
    transactions: Vec<TransactionRecord>,
    history: Vec<(String, DateTime<Utc>, Decimal)>,
}

#[derive(Default)]
struct MemoryStore {
    ledger: Mutex<Ledger>,
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn create_user(&self, data: UserCreate) -> Result<UserRecord, PaymentsError> {
        let mut ledger = self.ledger.lock().unwrap();
        if ledger.users.iter().any(|u| u.name == data.name) {
            return Err(PaymentsError::UserExists(
                "User with this username already exists".to_string(),
            ));
        }
        let hashed_password = data
            .password
            .as_deref()
            .map(payments_api::security::hash_password)
            .transpose()?;
        let now = Utc::now();
        let user = UserRecord {
            id: data.id.unwrap_or_else(|| format!("test_id_{}", ledger.users.len() + 1)),
            email: data.email,
            name: data.name,
            hashed_password,
            full_name: data.full_name,
            balance: Decimal::ZERO,
            is_active: data.is_active,
            created_at: now,
            updated_at: now,
        };
        ledger.users.push(user.clone());
        Ok(user)
    }

    async fn get_user_balance(
        &self,
        user_id: &str,
        ts: Option<DateTime<FixedOffset>>,
    ) -> Result<Option<Decimal>, PaymentsError> {
        let ledger = self.ledger.lock().unwrap();
        if let Some(ts) = ts {
            let snapshot = ledger
                .history
                .iter()
                .filter(|(uid, at, _)| uid == user_id && *at <= ts.with_timezone(&Utc))
                .max_by_key(|(_, at, _)| *at)
                .map(|(_, _, balance)| *balance);
            if snapshot.is_some() {
                return Ok(snapshot);
            }
        }
        Ok(ledger
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.balance))
    }

    async fn add_transaction(
        &self,
        data: TransactionCreate,
    ) -> Result<TransactionRecord, PaymentsError> {
        let mut ledger = self.ledger.lock().unwrap();
        if let Some(existing) = ledger.transactions.iter().find(|t| t.uid == data.uid) {
            return Ok(existing.clone());
        }
        let Some(user) = ledger.users.iter_mut().find(|u| u.id == data.user_id) else {
            return Err(PaymentsError::payment("User not found"));
        };
        let balance = next_balance(user.balance, &data.kind, data.amount)?;
        user.balance = balance;

        let created_at = data.created_at.with_timezone(&Utc);
        let record = TransactionRecord {
            id: format!("tx_{}", ledger.transactions.len() + 1),
            uid: data.uid,
            user_id: data.user_id.clone(),
            kind: data.kind,
            amount: data.amount,
            created_at,
        };
        ledger.history.push((data.user_id, created_at, balance));
        ledger.transactions.push(record.clone());
        Ok(record)
    }

    async fn get_transaction(
        &self,
        uid: &str,
    ) -> Result<Option<TransactionRecord>, PaymentsError> {
        if uid == BROKEN_UID {
            return Err(PaymentsError::payment("Mock payment error"));
        }
        let ledger = self.ledger.lock().unwrap();
        Ok(ledger.transactions.iter().find(|t| t.uid == uid).cloned())
    }
}

fn app() -> Router {
    payments_router(PaymentsState::from_arc(Arc::new(MemoryStore::default())))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(builder.body(body).expect("failed to build request"))
        .await
        .expect("request failed");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body was not json")
    };
    (status, value)
}

async fn create_john(app: &Router) {
    let (status, _) = send(
        app,
        "POST",
        "/api/user/",
        Some(json!({"id": "user_1", "name": "JohnDoe"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

fn deposit(uid: &str, amount: &str, created_at: &str) -> Value {
    json!({
        "uid": uid,
        "user_id": "user_1",
        "amount": amount,
        "created_at": created_at,
        "type": "DEPOSIT"
    })
}

#[tokio::test]
async fn create_user_without_password_echoes_id_and_name() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/user/",
        Some(json!({"id": "curl_test_user_1", "name": "JohnDoe", "email": null, "full_name": null, "password": null})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "curl_test_user_1");
    assert_eq!(body["name"], "JohnDoe");
    assert_eq!(body["is_active"], true);
}

#[tokio::test]
async fn create_user_with_password_never_returns_hash() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/user/",
        Some(json!({
            "email": "a@b.com",
            "name": "JohnDoe",
            "full_name": "John Jr Doe",
            "password": "TEST_aB3!xyzQ9#k"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "a@b.com");
    assert_eq!(body["full_name"], "John Jr Doe");
    assert!(body.get("hashed_password").is_none());
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn duplicate_user_name_conflicts() {
    let app = app();
    create_john(&app).await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/user/",
        Some(json!({"name": "JohnDoe"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({"detail": "User with this username already exists"}));
}

#[tokio::test]
async fn create_user_with_invalid_data_lists_missing_name() {
    let app = app();
    let (status, body) = send(&app, "POST", "/api/user/", Some(json!({"invalid": "data"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<&str> = body["detail"]
        .as_array()
        .expect("detail is a list")
        .iter()
        .map(|e| e["loc"][1].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
}

#[tokio::test]
async fn weak_password_is_unprocessable() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/user/",
        Some(json!({"name": "JohnDoe", "password": "password123!"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["detail"][0]["msg"],
        "Password must contain at least one uppercase letter"
    );
}

#[tokio::test]
async fn balance_of_unknown_user_is_not_found() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/user/ghost/balance/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "User not found"}));
}

#[tokio::test]
async fn deposit_then_replay_is_applied_once() {
    let app = app();
    create_john(&app).await;

    let payload = deposit("user_1_t_1", "10.99", "2024-08-31T01:05:35+00:00");
    let (status, first) = send(&app, "PUT", "/api/transaction/", Some(payload.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["uid"], "user_1_t_1");
    assert_eq!(first["user_id"], "user_1");
    assert_eq!(first["type"], "DEPOSIT");
    assert_eq!(first["amount"], "10.99");
    assert_eq!(first["created_at"], "2024-08-31T01:05:35Z");

    let (status, replay) = send(&app, "PUT", "/api/transaction/", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay, first);

    let (status, body) = send(&app, "GET", "/api/user/user_1/balance/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"balance": "10.99"}));
}

#[tokio::test]
async fn overdraft_and_unknown_type_conflict() {
    let app = app();
    create_john(&app).await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/transaction/",
        Some(json!({"uid": "w1", "user_id": "user_1", "amount": "1.00", "type": "WITHDRAW"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({"detail": "Insufficient funds"}));

    let (status, body) = send(
        &app,
        "PUT",
        "/api/transaction/",
        Some(json!({"uid": "r1", "user_id": "user_1", "amount": "1.00", "type": "REFUND"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({"detail": "Invalid transaction type"}));
}

#[tokio::test]
async fn transaction_for_unknown_user_conflicts() {
    let app = app();
    let (status, body) = send(
        &app,
        "PUT",
        "/api/transaction/",
        Some(deposit("t1", "5.00", "2024-08-31T01:05:35Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({"detail": "User not found"}));
}

#[tokio::test]
async fn transaction_amount_is_validated() {
    let app = app();
    create_john(&app).await;
    let (status, body) = send(
        &app,
        "PUT",
        "/api/transaction/",
        Some(deposit("t1", "0.001", "2024-08-31T01:05:35Z")),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"][0]["loc"], json!(["body", "amount"]));
}

#[tokio::test]
async fn balance_as_of_timestamp_uses_history() {
    let app = app();
    create_john(&app).await;

    for (uid, amount, at) in [
        ("t1", "10.00", "2024-01-01T00:00:00Z"),
        ("t2", "5.50", "2024-02-01T00:00:00Z"),
    ] {
        let (status, _) = send(&app, "PUT", "/api/transaction/", Some(deposit(uid, amount, at))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(
        &app,
        "GET",
        "/api/user/user_1/balance/?ts=2024-01-15T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(body, json!({"balance": "10.00"}));

    // Before any snapshot the current balance is reported.
    let (_, body) = send(
        &app,
        "GET",
        "/api/user/user_1/balance/?ts=2023-12-31T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(body, json!({"balance": "15.50"}));
}

#[tokio::test]
async fn malformed_timestamp_is_unprocessable() {
    let app = app();
    create_john(&app).await;
    let (status, body) = send(&app, "GET", "/api/user/user_1/balance/?ts=yesterday", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"][0]["loc"], json!(["query", "ts"]));
}

#[tokio::test]
async fn get_transaction_by_uid() {
    let app = app();
    create_john(&app).await;
    send(
        &app,
        "PUT",
        "/api/transaction/",
        Some(deposit("existing_id", "10.99", "2024-08-31T01:05:35Z")),
    )
    .await;

    let (status, body) = send(&app, "POST", "/api/transaction/existing_id", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uid"], "existing_id");

    let (status, body) = send(&app, "POST", "/api/transaction/non_existing_id", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "Transaction not found"}));

    let (status, body) = send(&app, "POST", &format!("/api/transaction/{BROKEN_UID}"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, json!({"detail": "Mock payment error"}));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/nothing-here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "Not Found"}));
}

#[tokio::test]
async fn naive_timestamps_are_read_as_utc() {
    let app = app();
    create_john(&app).await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/transaction/",
        Some(deposit("t1", "10.00", "2024-01-01T00:00:00")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created_at"], "2024-01-01T00:00:00Z");

    send(
        &app,
        "PUT",
        "/api/transaction/",
        Some(deposit("t2", "5.50", "2024-02-01")),
    )
    .await;

    let (status, body) = send(
        &app,
        "GET",
        "/api/user/user_1/balance/?ts=2024-01-15T00:00:00",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"balance": "10.00"}));
}

#[tokio::test]
async fn mistyped_fields_are_named_in_the_error() {
    let app = app();
    create_john(&app).await;
    let (status, body) = send(
        &app,
        "PUT",
        "/api/transaction/",
        Some(json!({
            "uid": "t1",
            "user_id": "user_1",
            "amount": "ten",
            "created_at": "sometime",
            "type": "DEPOSIT"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body,
        json!({"detail": [
            {"loc": ["body", "amount"], "msg": "Input should be a valid decimal", "type": "decimal_parsing"},
            {"loc": ["body", "created_at"], "msg": "Input should be a valid datetime or date", "type": "datetime_from_date_parsing"}
        ]})
    );
}
