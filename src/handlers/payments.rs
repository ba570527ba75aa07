//! Payment gateway webhook.
//!
//! `POST /api/v1/webhooks/payments` receives both Paystack and Flutterwave deliveries.
//! The raw body is kept as bytes because the Paystack signature covers it exactly.

use crate::{
    error::AppError,
    models::payment::WebhookAck,
    services::payment_webhook_service,
    state::AppState,
};
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};

/// # Response
///
/// - **200 OK**: `{"status": "processed" | "duplicate" | "ignored", ...}`
/// - **403**: signature missing or wrong
/// - **409**: the tudo is locked by a withdrawal; the gateway should retry
/// - **5xx**: reconciliation failed and was rolled back; the gateway should retry
pub async fn receive_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let ack = payment_webhook_service::receive(
        &state.pool,
        &state.notifier,
        &state.config,
        &headers,
        &body,
    )
    .await?;
    Ok(Json(ack))
}
