use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use std::sync::Arc;

use crate::error::PaymentsError;
use crate::handlers::payments::{add_transaction, create_user, get_transaction, get_user_balance};
use crate::middleware::access_log;
use crate::repository::PaymentStore;

/// Shared handler state.
#[derive(Clone)]
pub struct PaymentsState {
    pub store: Arc<dyn PaymentStore>,
}

impl PaymentsState {
    pub fn new(store: impl PaymentStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn from_arc(store: Arc<dyn PaymentStore>) -> Self {
        Self { store }
    }
}

fn api_router() -> Router<PaymentsState> {
    Router::new()
        .route("/user/", post(create_user))
        .route("/user/{user_id}/balance/", get(get_user_balance))
        .route("/transaction/", put(add_transaction))
        .route("/transaction/{transaction_id}", post(get_transaction))
}

pub fn payments_router(state: PaymentsState) -> Router {
    Router::new()
        .nest("/api", api_router())
        .fallback(|| async { PaymentsError::not_found("Not Found") })
        .layer(middleware::from_fn(access_log))
        .with_state(state)
}
