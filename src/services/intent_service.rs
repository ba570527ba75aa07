//! Payment intents - checkout metadata recorded before the client pays.
//!
//! Flutterwave webhooks only carry the transaction reference, so the metadata the
//! ledger needs (which tudo, which wallet, ...) is stored here at initiation and read
//! back when the webhook arrives. Paystack intents are recorded too, which keeps one
//! audit trail of every checkout the API started.

use chrono::{Duration, Utc};

use crate::{
    db::DbPool,
    error::AppError,
    models::payment::{Gateway, InitiatedPayment, PaymentIntent, PaymentIntentRecord},
};

/// Fresh checkout reference.
pub fn new_reference() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Store `intent` under a new reference and return what the client needs for checkout.
pub async fn record_intent(
    pool: &DbPool,
    gateway: Gateway,
    amount: i64,
    currency: &str,
    intent: PaymentIntent,
    ttl_secs: i64,
) -> Result<InitiatedPayment, AppError> {
    let reference = new_reference();
    let expires_at = Utc::now() + Duration::seconds(ttl_secs);

    sqlx::query(
        r#"
        INSERT INTO payment_intents (reference, gateway, amount, currency, metadata, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(&reference)
    .bind(gateway.as_str())
    .bind(amount)
    .bind(currency)
    .bind(serde_json::to_value(&intent)?)
    .bind(expires_at)
    .execute(pool)
    .await?;

    tracing::info!(
        %reference,
        %gateway,
        transaction_type = %intent.transaction_type(),
        amount,
        "payment intent recorded"
    );

    Ok(InitiatedPayment {
        reference,
        gateway,
        amount,
        currency: currency.to_string(),
        metadata: intent,
    })
}

/// Unconsumed, unexpired intent for `reference`.
pub async fn find_active(
    pool: &DbPool,
    reference: &str,
) -> Result<Option<PaymentIntentRecord>, AppError> {
    let record = sqlx::query_as::<_, PaymentIntentRecord>(
        r#"
        SELECT reference, gateway, amount, currency, metadata
        FROM payment_intents
        WHERE reference = $1 AND consumed_at IS NULL AND expires_at > NOW()
        "#,
    )
    .bind(reference)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Mark an intent as used. Returns false if there was nothing to consume.
pub async fn mark_consumed(pool: &DbPool, reference: &str) -> Result<bool, AppError> {
    let updated = sqlx::query(
        "UPDATE payment_intents SET consumed_at = NOW() WHERE reference = $1 AND consumed_at IS NULL",
    )
    .bind(reference)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(updated > 0)
}

/// Delete intents that expired without being paid.
pub async fn purge_expired(pool: &DbPool) -> Result<u64, AppError> {
    let deleted = sqlx::query(
        "DELETE FROM payment_intents WHERE consumed_at IS NULL AND expires_at <= NOW()",
    )
    .execute(pool)
    .await?
    .rows_affected();

    Ok(deleted)
}
