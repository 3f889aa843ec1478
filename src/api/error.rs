//! Mapping of wallet errors to HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::dto::ErrorResponse;
use crate::types::{ErrorClass, WalletError};

/// Error returned by the API handlers
#[derive(Debug)]
pub enum ApiError {
    /// Body or path could not be parsed
    Malformed(String),
    /// The wallet service failed
    Wallet(WalletError),
}

impl From<WalletError> for ApiError {
    fn from(error: WalletError) -> Self {
        ApiError::Wallet(error)
    }
}

impl ApiError {
    /// HTTP status of this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Malformed(_) => StatusCode::BAD_REQUEST,
            ApiError::Wallet(WalletError::WalletNotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Wallet(WalletError::InsufficientFunds { .. }) => StatusCode::CONFLICT,
            ApiError::Wallet(error) if error.class() == ErrorClass::Validation => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Wallet(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Malformed(message) => ErrorResponse {
                error: message,
                balance: None,
            },
            ApiError::Wallet(error) => ErrorResponse {
                balance: Some(error.balance_snapshot()),
                error: error.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}
