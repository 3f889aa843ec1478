//! Request and response bodies of the HTTP API

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{OperationType, WalletId};

/// Body of `POST /api/v1/wallet`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    pub wallet_id: WalletId,
    pub operation_type: OperationType,
    /// Decimal string, e.g. `"100.50"`
    pub amount: Decimal,
}

/// Successful response carrying the wallet balance
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}

/// Error response
///
/// `balance` is the balance reported with the failure and is left out for
/// malformed requests.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,
}
