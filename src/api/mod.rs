//! # HTTP API
//!
//! Builds the axum router in front of the [`WalletService`].
//!
//! ## Endpoints
//!
//! | Method | Path                         | Description                   |
//! |--------|------------------------------|-------------------------------|
//! | GET    | `/health`                    | Liveness probe                |
//! | POST   | `/api/v1/wallet`             | Deposit or withdraw           |
//! | GET    | `/api/v1/wallets/:wallet_id` | Balance of a wallet           |
//!
//! ## Status Codes
//!
//! | Outcome                                  | Status |
//! |------------------------------------------|--------|
//! | Deposit that created the wallet          | 201    |
//! | Any other success                        | 200    |
//! | Malformed body or path, invalid amount   | 400    |
//! | Wallet not found                         | 404    |
//! | Insufficient funds                       | 409    |
//! | Retries exhausted, storage or deadline   | 503    |

mod dto;
mod error;

pub use dto::{BalanceResponse, ErrorResponse, OperationRequest};
pub use error::ApiError;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower_http::trace::TraceLayer;

use crate::core::{BalanceStore, RetryPolicy, WalletService};
use crate::types::{OperationType, WalletId};

/// Shared application state available to all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Wallet operations with retry
    pub service: WalletService<dyn BalanceStore>,
    /// Deadline given to each request from its arrival
    pub request_timeout: Duration,
}

impl AppState {
    /// Create state over any balance store
    pub fn new(
        store: Arc<dyn BalanceStore>,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            service: WalletService::new(store, policy),
            request_timeout,
        }
    }
}

/// Builds the axum [`Router`] with all API routes and request tracing
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/wallet", post(operation_handler))
        .route("/api/v1/wallets/:wallet_id", get(balance_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn operation_handler(
    State(state): State<AppState>,
    payload: Result<Json<OperationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BalanceResponse>), ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "malformed operation request");
        ApiError::Malformed(rejection.body_text())
    })?;

    let deadline = Some(Instant::now() + state.request_timeout);

    match request.operation_type {
        OperationType::Deposit => {
            let update = state
                .service
                .deposit(request.wallet_id, request.amount, deadline)
                .await?;
            let status = if update.created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            Ok((
                status,
                Json(BalanceResponse {
                    balance: update.balance,
                }),
            ))
        }
        OperationType::Withdraw => {
            let balance = state
                .service
                .withdraw(request.wallet_id, request.amount, deadline)
                .await?;
            Ok((StatusCode::OK, Json(BalanceResponse { balance })))
        }
    }
}

async fn balance_handler(
    State(state): State<AppState>,
    wallet_id: Result<Path<WalletId>, PathRejection>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let Path(wallet_id) =
        wallet_id.map_err(|rejection| ApiError::Malformed(rejection.body_text()))?;

    let balance = state.service.get_balance(wallet_id).await?;
    Ok(Json(BalanceResponse { balance }))
}
