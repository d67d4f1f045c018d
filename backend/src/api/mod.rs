pub mod escrow;

use axum::{
    routing::{get, post},
    Router,
};

pub use escrow::ApiState;

pub fn router(state: ApiState) -> Router {
    Router::new()
        // Escrow sessions
        .route("/api/escrows", post(escrow::begin_escrow))
        .route("/api/escrows/:transaction_id", get(escrow::get_transaction))
        .route("/api/escrows/:transaction_id/tx-hash", post(escrow::submit_tx_hash))
        .route("/api/escrows/:transaction_id/disputes", post(escrow::raise_dispute))
        .route("/api/users/:user_id/escrows", get(escrow::get_history))

        // Operator
        .route("/api/wallets/:coin", get(escrow::get_pool_status))
        .route("/api/escrows/:transaction_id/fail", post(escrow::fail_transaction))
        .route("/api/disputes/:dispute_id/resolve", post(escrow::resolve_dispute))

        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CurrencyCode, VerificationOutcome};
    use crate::services::{ChainVerifier, EscrowService, LogNotifier, WalletPool};
    use crate::storage::{DbManager, LedgerStore};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    struct AlwaysConfirmed;

    #[async_trait]
    impl ChainVerifier for AlwaysConfirmed {
        async fn check_status(&self, _coin: CurrencyCode, _tx_hash: &str) -> VerificationOutcome {
            VerificationOutcome::Confirmed
        }
    }

    fn test_app(admin_api_token: Option<&str>) -> (TempDir, Router) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("escrow.db");
        let db = Arc::new(DbManager::new(db_path.to_str().unwrap()).unwrap());
        let pool = WalletPool::new(HashMap::from([(
            CurrencyCode::Btc,
            vec!["bc1q-a".to_string(), "bc1q-b".to_string()],
        )]))
        .unwrap();

        let service = EscrowService::new(
            Arc::new(pool),
            Arc::new(LedgerStore::new(db)),
            Arc::new(AlwaysConfirmed),
            Arc::new(LogNotifier),
            Duration::ZERO,
        );

        let state = ApiState {
            escrow_service: Arc::new(service),
            admin_api_token: admin_api_token.map(str::to_string),
        };
        (dir, router(state))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("x-admin-token", token);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_escrow_flow_over_http() {
        let (_dir, app) = test_app(None);

        let (status, tx) = send(
            &app,
            "POST",
            "/api/escrows",
            Some(json!({"user_id": "42", "coin": "btc", "role": "buyer"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(tx["wallet_address"], "bc1q-a");
        assert_eq!(tx["status"], "pending");
        assert_eq!(tx["coin"], "BTC");
        let id = tx["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/escrows/{}/tx-hash", id),
            Some(json!({"tx_hash": "abc123"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "confirmed");
        assert_eq!(body["transaction"]["status"], "confirmed");

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/escrows/{}/tx-hash", id),
            Some(json!({"tx_hash": "def456"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("abc123"));

        let (status, dispute) = send(
            &app,
            "POST",
            &format!("/api/escrows/{}/disputes", id),
            Some(json!({"reason": "no funds received"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(dispute["status"], "open");
        assert_eq!(dispute["transaction_id"], id.as_str());

        let (status, history) = send(&app, "GET", "/api/users/42/escrows", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (_dir, app) = test_app(None);

        let (status, _) = send(
            &app,
            "POST",
            "/api/escrows",
            Some(json!({"user_id": "42", "coin": "doge", "role": "buyer"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "GET", "/api/escrows/missing", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            "POST",
            "/api/escrows/missing/disputes",
            Some(json!({})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_operator_routes_require_token() {
        let (_dir, app) = test_app(Some("s3cret"));

        let (status, _) = send(&app, "GET", "/api/wallets/BTC", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, "GET", "/api/wallets/BTC", None, Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, "GET", "/api/wallets/BTC", None, Some("s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pool_size"], 2);
        assert_eq!(body["cursor"], 0);

        let (status, _) = send(&app, "POST", "/api/disputes/missing/resolve", None, Some("s3cret")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
