use axum::{
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::EscrowError;
use crate::models::{CurrencyCode, EscrowRole};
use crate::services::EscrowService;

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Clone)]
pub struct ApiState {
    pub escrow_service: Arc<EscrowService>,
    pub admin_api_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BeginEscrowRequest {
    pub user_id: String,
    pub coin: String,
    pub role: EscrowRole,
}

#[derive(Debug, Deserialize)]
pub struct SubmitTxHashRequest {
    pub tx_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct RaiseDisputeRequest {
    #[serde(default)]
    pub reason: String,
}

pub async fn begin_escrow(
    State(state): State<ApiState>,
    Json(request): Json<BeginEscrowRequest>,
) -> impl IntoResponse {
    let coin = match request.coin.parse::<CurrencyCode>() {
        Ok(coin) => coin,
        Err(e) => return error_response(e),
    };

    match state
        .escrow_service
        .begin_escrow(&request.user_id, coin, request.role)
        .await
    {
        Ok(tx) => (StatusCode::CREATED, Json(tx)).into_response(),
        Err(e) => {
            tracing::error!("Error opening escrow for user {}: {}", request.user_id, e);
            error_response(e)
        }
    }
}

pub async fn get_transaction(
    State(state): State<ApiState>,
    Path(transaction_id): Path<String>,
) -> impl IntoResponse {
    match state.escrow_service.transaction(&transaction_id) {
        Ok(tx) => (StatusCode::OK, Json(tx)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn submit_tx_hash(
    State(state): State<ApiState>,
    Path(transaction_id): Path<String>,
    Json(request): Json<SubmitTxHashRequest>,
) -> impl IntoResponse {
    let outcome = match state
        .escrow_service
        .submit_tx_hash(&transaction_id, &request.tx_hash)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Error verifying transaction {}: {}", transaction_id, e);
            return error_response(e);
        }
    };

    match state.escrow_service.transaction(&transaction_id) {
        Ok(tx) => (StatusCode::OK, Json(serde_json::json!({
            "outcome": outcome,
            "transaction": tx,
        }))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn raise_dispute(
    State(state): State<ApiState>,
    Path(transaction_id): Path<String>,
    Json(request): Json<RaiseDisputeRequest>,
) -> impl IntoResponse {
    match state
        .escrow_service
        .raise_dispute(&transaction_id, &request.reason)
        .await
    {
        Ok(dispute) => (StatusCode::CREATED, Json(dispute)).into_response(),
        Err(e) => {
            tracing::error!("Error raising dispute on {}: {}", transaction_id, e);
            error_response(e)
        }
    }
}

pub async fn get_history(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match state.escrow_service.history(&user_id) {
        Ok(history) => (StatusCode::OK, Json(history)).into_response(),
        Err(e) => {
            tracing::error!("Error getting history for user {}: {}", user_id, e);
            error_response(e)
        }
    }
}

pub async fn get_pool_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(coin): Path<String>,
) -> impl IntoResponse {
    if let Err(e) = require_admin(&state, &headers) {
        return error_response(e);
    }

    match coin
        .parse::<CurrencyCode>()
        .and_then(|coin| state.escrow_service.pool_status(coin))
    {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn fail_transaction(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(transaction_id): Path<String>,
) -> impl IntoResponse {
    if let Err(e) = require_admin(&state, &headers) {
        return error_response(e);
    }

    match state.escrow_service.fail_transaction(&transaction_id) {
        Ok(tx) => (StatusCode::OK, Json(tx)).into_response(),
        Err(e) => {
            tracing::error!("Error failing transaction {}: {}", transaction_id, e);
            error_response(e)
        }
    }
}

pub async fn resolve_dispute(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(dispute_id): Path<String>,
) -> impl IntoResponse {
    if let Err(e) = require_admin(&state, &headers) {
        return error_response(e);
    }

    match state.escrow_service.resolve_dispute(&dispute_id) {
        Ok(dispute) => (StatusCode::OK, Json(dispute)).into_response(),
        Err(e) => {
            tracing::error!("Error resolving dispute {}: {}", dispute_id, e);
            error_response(e)
        }
    }
}

fn require_admin(state: &ApiState, headers: &HeaderMap) -> Result<(), EscrowError> {
    let Some(expected) = state.admin_api_token.as_deref() else {
        return Ok(());
    };

    match headers.get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        Some(token) if token == expected => Ok(()),
        _ => Err(EscrowError::Unauthorized),
    }
}

fn error_response(e: EscrowError) -> Response {
    let status = match &e {
        EscrowError::UnsupportedCurrency(_)
        | EscrowError::EmptyTxHash
        | EscrowError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        EscrowError::NotFound { .. } => StatusCode::NOT_FOUND,
        EscrowError::AlreadyAttached { .. } | EscrowError::InvalidTransition { .. } => {
            StatusCode::CONFLICT
        }
        EscrowError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        EscrowError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EscrowError::Unauthorized => StatusCode::UNAUTHORIZED,
        EscrowError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(serde_json::json!({
        "error": e.to_string()
    }))).into_response()
}
