pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod repository;
pub mod router;
pub mod security;
pub mod types;

pub use error::PaymentsError;
pub use repository::{PaymentRepository, PaymentStore};
pub use router::{PaymentsState, payments_router};
