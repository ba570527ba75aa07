//! HTTP route table.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers, middleware, state::AppState};

/// Build the full router: public routes, session-authenticated routes, and shared layers.
pub fn build_router(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        // Tudos
        .route("/api/v1/tudos", post(handlers::tudos::create_tudo))
        .route("/api/v1/tudos/{id}", get(handlers::tudos::get_tudo))
        .route(
            "/api/v1/tudos/{id}/transactions",
            get(handlers::tudos::list_tudo_transactions),
        )
        .route("/api/v1/tudos/topup", post(handlers::tudos::topup_tudo))
        .route("/api/v1/tudos/withdraw", post(handlers::tudos::withdraw_tudo))
        // Wallet
        .route("/api/v1/wallet/balance", get(handlers::wallet::get_balance))
        .route(
            "/api/v1/wallet/transactions",
            get(handlers::wallet::list_transactions),
        )
        .route("/api/v1/wallet/fund", post(handlers::wallet::fund_wallet))
        .route(
            "/api/v1/wallet/transfer",
            post(handlers::wallet::transfer_to_wallet),
        )
        .route(
            "/api/v1/wallet/bank-transfer",
            post(handlers::wallet::transfer_to_bank),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/webhooks/payments",
            post(handlers::payments::receive_payment_webhook),
        )
        .route("/api/v1/tudos/contribute", post(handlers::tudos::contribute))
        .merge(authenticated_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::Config,
        db,
        services::{
            banking::testing::RecordingBank, notification_service::Notifier,
            payment_webhook_service::testing::paystack_signature,
        },
    };

    fn app() -> Router {
        let (notifier, _receiver) = Notifier::channel(8);
        build_router(AppState {
            pool: db::lazy_pool(),
            config: Arc::new(Config::for_tests()),
            notifier,
            bank: Arc::new(RecordingBank::accepting()),
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unsigned_webhook_is_forbidden() {
        let response = app()
            .oneshot(
                Request::post("/api/v1/webhooks/payments")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"event":"charge.success","data":{}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"]["code"], "invalid_signature");
    }

    #[tokio::test]
    async fn wrong_paystack_signature_is_forbidden() {
        let body = r#"{"event":"charge.success","data":{}}"#;
        let response = app()
            .oneshot(
                Request::post("/api/v1/webhooks/payments")
                    .header("x-paystack-signature", paystack_signature("not-the-key", body.as_bytes()))
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn signed_non_charge_event_is_acknowledged() {
        let body = json!({"event": "transfer.success", "data": {"reference": "abc"}}).to_string();
        let signature = paystack_signature(&Config::for_tests().paystack_secret_key, body.as_bytes());

        let response = app()
            .oneshot(
                Request::post("/api/v1/webhooks/payments")
                    .header("x-paystack-signature", signature)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ignored");
    }

    #[tokio::test]
    async fn wrong_flutterwave_hash_is_forbidden() {
        let response = app()
            .oneshot(
                Request::post("/api/v1/webhooks/payments")
                    .header("verif-hash", "guess")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn wallet_routes_require_a_session() {
        for uri in ["/api/v1/wallet/balance", "/api/v1/wallet/transactions"] {
            let response = app()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn withdraw_rejects_non_bearer_credentials() {
        let response = app()
            .oneshot(
                Request::post("/api/v1/tudos/withdraw")
                    .header("Authorization", "Basic dXNlcjpwYXNz")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "unauthorized");
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let response = app()
            .oneshot(Request::get("/api/v1/accounts").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
