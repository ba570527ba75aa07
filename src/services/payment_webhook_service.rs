//! Payment webhook verification and normalisation.
//!
//! One endpoint receives deliveries from both gateways. The gateway is recognised by
//! its signature header:
//!
//! - Paystack: `x-paystack-signature` = hex(HMAC-SHA512(secret key, raw body))
//! - Flutterwave: `verif-hash` = the shared secret configured on the dashboard
//!
//! Verified deliveries are normalised into a [`PaymentEvent`] and handed to
//! [`reconciliation::reconcile`]. Authentic deliveries the ledger does not act on are
//! acknowledged as ignored so the gateway stops retrying them.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::payment::{
        CardAuthorization, Gateway, PaymentEvent, PaymentIntent, PaymentIntentRecord, TransactionType,
        WebhookAck,
    },
    services::{
        intent_service,
        notification_service::Notifier,
        reconciliation::{self, Outcome},
    },
};

type HmacSha512 = Hmac<Sha512>;

pub const PAYSTACK_SIGNATURE_HEADER: &str = "x-paystack-signature";
pub const FLUTTERWAVE_HASH_HEADER: &str = "verif-hash";

/// A verified delivery, either something to apply or something to acknowledge and drop.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Actionable(T),
    Ignored(String),
}

/// A successful Flutterwave charge before its intent has been looked up.
#[derive(Debug, Clone, PartialEq)]
pub struct FlutterwaveCharge {
    pub reference: String,
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub customer_email: Option<String>,
}

/// Handle one webhook delivery end to end.
pub async fn receive(
    pool: &DbPool,
    notifier: &Notifier,
    config: &Config,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<WebhookAck, AppError> {
    let gateway = detect_and_verify(headers, body, config)?;

    let parsed = match gateway {
        Gateway::Paystack => parse_paystack(body)?,
        Gateway::Flutterwave => match parse_flutterwave(body)? {
            Parsed::Actionable(charge) => resolve_flutterwave(pool, charge).await?,
            Parsed::Ignored(reason) => Parsed::Ignored(reason),
        },
    };

    let event = match parsed {
        Parsed::Actionable(event) => event,
        Parsed::Ignored(reason) => {
            tracing::info!(%gateway, %reason, "webhook ignored");
            return Ok(WebhookAck::Ignored { reason });
        }
    };

    match reconciliation::reconcile(pool, notifier, &event).await? {
        Outcome::Applied(transaction_type) => {
            // The ledger is already committed; a stale intent only lingers until the sweep
            if let Err(e) = intent_service::mark_consumed(pool, &event.reference).await {
                tracing::error!(reference = %event.reference, "failed to mark intent consumed: {e}");
            }
            Ok(WebhookAck::Processed { transaction_type })
        }
        Outcome::Duplicate => Ok(WebhookAck::Duplicate {
            reference: event.reference,
        }),
    }
}

/// Identify the gateway from its signature header and verify the delivery.
///
/// # Errors
///
/// `InvalidSignature` (403) when neither header is present or the one present does not match.
pub fn detect_and_verify(headers: &HeaderMap, body: &[u8], config: &Config) -> Result<Gateway, AppError> {
    if let Some(signature) = header_str(headers, PAYSTACK_SIGNATURE_HEADER) {
        let signature = hex::decode(signature.trim()).map_err(|_| AppError::InvalidSignature)?;
        let mut mac = HmacSha512::new_from_slice(config.paystack_secret_key.as_bytes())
            .map_err(|_| AppError::InvalidSignature)?;
        mac.update(body);
        // verify_slice compares in constant time
        mac.verify_slice(&signature)
            .map_err(|_| AppError::InvalidSignature)?;
        return Ok(Gateway::Paystack);
    }

    if let Some(hash) = header_str(headers, FLUTTERWAVE_HASH_HEADER) {
        if !config.flutterwave_hash.is_empty()
            && bool::from(hash.as_bytes().ct_eq(config.flutterwave_hash.as_bytes()))
        {
            return Ok(Gateway::Flutterwave);
        }
        return Err(AppError::InvalidSignature);
    }

    Err(AppError::InvalidSignature)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct PaystackCharge {
    reference: String,
    amount: i64,
    #[serde(default)]
    fees: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    customer: Option<Customer>,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    authorization: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    #[serde(default)]
    email: Option<String>,
}

/// Normalise a Paystack delivery.
///
/// Only `charge.success` is actionable. Paystack sends metadata as an empty string when
/// the checkout had none; that, and metadata without a known `transaction_type`, is ignored.
pub fn parse_paystack(body: &[u8]) -> Result<Parsed<PaymentEvent>, AppError> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed Paystack payload: {e}")))?;

    if envelope.event != "charge.success" {
        return Ok(Parsed::Ignored(format!("unhandled Paystack event '{}'", envelope.event)));
    }

    let charge: PaystackCharge = serde_json::from_value(envelope.data)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed Paystack charge: {e}")))?;

    let intent = match intent_from_metadata(&charge.metadata)? {
        Parsed::Actionable(intent) => intent,
        Parsed::Ignored(reason) => return Ok(Parsed::Ignored(reason)),
    };

    // Bank and USSD charges come with a partial authorization; only full card ones are kept
    let authorization = charge
        .authorization
        .and_then(|value| serde_json::from_value::<CardAuthorization>(value).ok());

    Ok(Parsed::Actionable(PaymentEvent {
        gateway: Gateway::Paystack,
        reference: charge.reference,
        amount: charge.amount,
        fees: charge.fees.unwrap_or(0),
        currency: charge.currency.unwrap_or_else(|| "NGN".to_string()),
        customer_email: charge.customer.and_then(|c| c.email),
        intent,
        authorization,
    }))
}

fn intent_from_metadata(metadata: &Value) -> Result<Parsed<PaymentIntent>, AppError> {
    let Value::Object(fields) = metadata else {
        return Ok(Parsed::Ignored("charge has no metadata".to_string()));
    };

    let known_type = fields
        .get("transaction_type")
        .cloned()
        .and_then(|t| serde_json::from_value::<TransactionType>(t).ok());
    let Some(transaction_type) = known_type else {
        return Ok(Parsed::Ignored("charge metadata has no known transaction_type".to_string()));
    };

    serde_json::from_value(metadata.clone())
        .map(Parsed::Actionable)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed {transaction_type} metadata: {e}")))
}

/// Normalise a Flutterwave delivery.
///
/// Accepts the v3 envelope `{"event", "data": {"tx_ref", ...}}` and the legacy flat
/// `{"txRef", ...}` body. Amounts arrive in major units and are converted to minor units.
pub fn parse_flutterwave(body: &[u8]) -> Result<Parsed<FlutterwaveCharge>, AppError> {
    let root: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed Flutterwave payload: {e}")))?;

    let (charge, reference_key) = match root.get("data") {
        Some(data) if data.is_object() => (data, "tx_ref"),
        _ => (&root, "txRef"),
    };

    let Some(reference) = charge.get(reference_key).and_then(Value::as_str) else {
        let event = root.get("event").and_then(Value::as_str).unwrap_or("unknown");
        return Ok(Parsed::Ignored(format!("Flutterwave '{event}' event has no transaction reference")));
    };

    let status = charge.get("status").and_then(Value::as_str).unwrap_or_default();
    if !matches!(status.to_ascii_lowercase().as_str(), "successful" | "success") {
        return Ok(Parsed::Ignored(format!("Flutterwave charge {reference} is '{status}'")));
    }

    let amount = charge
        .get("amount")
        .and_then(major_to_minor)
        .ok_or_else(|| AppError::InvalidRequest("Flutterwave charge has no valid amount".to_string()))?;

    Ok(Parsed::Actionable(FlutterwaveCharge {
        reference: reference.to_string(),
        amount,
        currency: charge
            .get("currency")
            .and_then(Value::as_str)
            .unwrap_or("NGN")
            .to_string(),
        customer_email: charge
            .pointer("/customer/email")
            .and_then(Value::as_str)
            .map(str::to_string),
    }))
}

/// `123.45` or `"123.45"` to `12345`.
fn major_to_minor(value: &Value) -> Option<i64> {
    let major = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !major.is_finite() || major <= 0.0 {
        return None;
    }
    Some((major * 100.0).round() as i64)
}

/// Attach the recorded intent to a Flutterwave charge.
async fn resolve_flutterwave(
    pool: &DbPool,
    charge: FlutterwaveCharge,
) -> Result<Parsed<PaymentEvent>, AppError> {
    let Some(record) = intent_service::find_active(pool, &charge.reference).await? else {
        tracing::warn!(reference = %charge.reference, "no active payment intent for Flutterwave charge");
        return Ok(Parsed::Ignored(format!(
            "no active payment intent for {}",
            charge.reference
        )));
    };

    if let Some(reason) = foreign_intent(&record) {
        tracing::warn!(reference = %record.reference, gateway = %record.gateway, "{reason}");
        return Ok(Parsed::Ignored(reason));
    }

    if record.amount != charge.amount || record.currency != charge.currency {
        tracing::warn!(
            reference = %charge.reference,
            expected = record.amount,
            expected_currency = %record.currency,
            charged = charge.amount,
            charged_currency = %charge.currency,
            "Flutterwave charge differs from intent"
        );
    }

    Ok(Parsed::Actionable(flutterwave_event(charge, record.intent()?)))
}

/// A Paystack checkout intent is settled by Paystack's own webhook, never by Flutterwave.
fn foreign_intent(record: &PaymentIntentRecord) -> Option<String> {
    (record.gateway != Gateway::Flutterwave.as_str()).then(|| {
        format!(
            "payment intent {} was opened on {}",
            record.reference, record.gateway
        )
    })
}

fn flutterwave_event(charge: FlutterwaveCharge, intent: PaymentIntent) -> PaymentEvent {
    PaymentEvent {
        gateway: Gateway::Flutterwave,
        reference: charge.reference,
        amount: charge.amount,
        fees: 0,
        currency: charge.currency,
        customer_email: charge.customer_email,
        intent,
        authorization: None,
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Signature Paystack would send for `body` under `secret`.
    pub fn paystack_signature(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::testing::paystack_signature;
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;
    use uuid::Uuid;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn paystack_body(event: &str, metadata: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "event": event,
            "data": {
                "reference": "ref-123",
                "amount": 500000,
                "fees": 7500,
                "currency": "NGN",
                "status": "success",
                "customer": { "email": "chidi@example.com" },
                "metadata": metadata,
                "authorization": {
                    "authorization_code": "AUTH_abc",
                    "bin": "408408",
                    "last4": "4081",
                    "exp_month": "12",
                    "exp_year": "2030",
                    "card_type": "visa ",
                    "bank": "TEST BANK",
                    "reusable": true
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn valid_paystack_signature_is_accepted() {
        let config = Config::for_tests();
        let body = br#"{"event":"charge.success"}"#;
        let signature = paystack_signature(&config.paystack_secret_key, body);

        let gateway = detect_and_verify(&headers(PAYSTACK_SIGNATURE_HEADER, &signature), body, &config).unwrap();
        assert_eq!(gateway, Gateway::Paystack);
    }

    #[test]
    fn tampered_paystack_body_is_rejected() {
        let config = Config::for_tests();
        let signature = paystack_signature(&config.paystack_secret_key, b"original");

        let result = detect_and_verify(&headers(PAYSTACK_SIGNATURE_HEADER, &signature), b"tampered", &config);
        assert!(matches!(result, Err(AppError::InvalidSignature)));
    }

    #[test]
    fn non_hex_paystack_signature_is_rejected() {
        let config = Config::for_tests();
        let result = detect_and_verify(&headers(PAYSTACK_SIGNATURE_HEADER, "not-hex"), b"{}", &config);
        assert!(matches!(result, Err(AppError::InvalidSignature)));
    }

    #[test]
    fn flutterwave_hash_must_match_exactly() {
        let config = Config::for_tests();
        assert_eq!(
            detect_and_verify(&headers(FLUTTERWAVE_HASH_HEADER, "flw-shared-hash"), b"{}", &config).unwrap(),
            Gateway::Flutterwave
        );
        assert!(detect_and_verify(&headers(FLUTTERWAVE_HASH_HEADER, "flw-shared-has"), b"{}", &config).is_err());
    }

    #[test]
    fn flutterwave_hash_of_same_length_or_longer_is_rejected() {
        let config = Config::for_tests();
        for guess in ["flw-shared-hasx", "FLW-SHARED-HASH", "flw-shared-hash-extended"] {
            let result = detect_and_verify(&headers(FLUTTERWAVE_HASH_HEADER, guess), b"{}", &config);
            assert!(matches!(result, Err(AppError::InvalidSignature)), "{guess}");
        }
    }

    #[test]
    fn flutterwave_is_refused_when_no_hash_is_configured() {
        let config = Config {
            flutterwave_hash: String::new(),
            ..Config::for_tests()
        };
        let result = detect_and_verify(&headers(FLUTTERWAVE_HASH_HEADER, "anything"), b"{}", &config);
        assert!(matches!(result, Err(AppError::InvalidSignature)));
    }

    #[test]
    fn unsigned_delivery_is_rejected() {
        let result = detect_and_verify(&HeaderMap::new(), b"{}", &Config::for_tests());
        assert!(matches!(result, Err(AppError::InvalidSignature)));
    }

    #[test]
    fn paystack_contribution_is_normalised() {
        let body = paystack_body(
            "charge.success",
            json!({
                "transaction_type": "TUDO_CONTRIBUTION",
                "tudo_code": "a8Fk29LmQz",
                "contributor_name": "Chidi",
                "contributor_email": "chidi@example.com",
                "amount": 500000
            }),
        );

        let Parsed::Actionable(event) = parse_paystack(&body).unwrap() else {
            panic!("expected an actionable charge");
        };
        assert_eq!(event.reference, "ref-123");
        assert_eq!(event.amount, 500_000);
        assert_eq!(event.fees, 7_500);
        assert_eq!(event.transaction_type(), TransactionType::TudoContribution);
        assert_eq!(event.customer_email.as_deref(), Some("chidi@example.com"));
        assert_eq!(event.authorization.unwrap().authorization_code, "AUTH_abc");
    }

    #[test]
    fn paystack_string_metadata_is_ignored() {
        let parsed = parse_paystack(&paystack_body("charge.success", json!(""))).unwrap();
        assert!(matches!(parsed, Parsed::Ignored(_)));
    }

    #[test]
    fn paystack_unknown_transaction_type_is_ignored() {
        let parsed = parse_paystack(&paystack_body(
            "charge.success",
            json!({ "transaction_type": "LOTTERY" }),
        ))
        .unwrap();
        assert!(matches!(parsed, Parsed::Ignored(_)));
    }

    #[test]
    fn paystack_non_charge_events_are_ignored() {
        let body = br#"{"event":"transfer.success","data":{"reference":"t-1","recipient":{}}}"#;
        assert!(matches!(parse_paystack(body).unwrap(), Parsed::Ignored(_)));
    }

    #[test]
    fn paystack_known_type_with_missing_fields_is_a_bad_request() {
        let result = parse_paystack(&paystack_body(
            "charge.success",
            json!({ "transaction_type": "FUND_WALLET" }),
        ));
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }

    #[test]
    fn flutterwave_v3_envelope_is_parsed() {
        let body = serde_json::to_vec(&json!({
            "event": "charge.completed",
            "data": {
                "tx_ref": "9b2f0f7e",
                "amount": 5000.5,
                "currency": "USD",
                "status": "successful",
                "customer": { "email": "guest@example.com" }
            }
        }))
        .unwrap();

        let Parsed::Actionable(charge) = parse_flutterwave(&body).unwrap() else {
            panic!("expected an actionable charge");
        };
        assert_eq!(charge.reference, "9b2f0f7e");
        assert_eq!(charge.amount, 500_050);
        assert_eq!(charge.currency, "USD");
        assert_eq!(charge.customer_email.as_deref(), Some("guest@example.com"));
    }

    #[test]
    fn flutterwave_legacy_body_is_parsed() {
        let body = br#"{"txRef":"legacy-1","amount":"100","currency":"NGN","status":"success"}"#;
        let Parsed::Actionable(charge) = parse_flutterwave(body).unwrap() else {
            panic!("expected an actionable charge");
        };
        assert_eq!(charge.reference, "legacy-1");
        assert_eq!(charge.amount, 10_000);
    }

    #[test]
    fn flutterwave_failed_charge_is_ignored() {
        let body = br#"{"event":"charge.completed","data":{"tx_ref":"r","amount":10,"status":"failed"}}"#;
        assert!(matches!(parse_flutterwave(body).unwrap(), Parsed::Ignored(_)));
    }

    #[test]
    fn flutterwave_float_amounts_round_to_nearest_minor_unit() {
        assert_eq!(major_to_minor(&json!(19.99)), Some(1_999));
        assert_eq!(major_to_minor(&json!(0.1)), Some(10));
        assert_eq!(major_to_minor(&json!(-5)), None);
    }

    #[test]
    fn flutterwave_event_carries_the_recorded_intent() {
        let charge = FlutterwaveCharge {
            reference: "r-1".to_string(),
            amount: 10_000,
            currency: "NGN".to_string(),
            customer_email: None,
        };
        let intent = PaymentIntent::FundWallet {
            wallet_id: Uuid::new_v4(),
        };

        let event = flutterwave_event(charge, intent.clone());
        assert_eq!(event.gateway, Gateway::Flutterwave);
        assert_eq!(event.fees, 0);
        assert_eq!(event.intent, intent);
    }

    fn intent_record(gateway: Gateway) -> PaymentIntentRecord {
        PaymentIntentRecord {
            reference: "r-1".to_string(),
            gateway: gateway.as_str().to_string(),
            amount: 10_000,
            currency: "NGN".to_string(),
            metadata: json!({ "transaction_type": "ADDED_CARD" }),
        }
    }

    #[test]
    fn flutterwave_cannot_settle_a_paystack_intent() {
        assert_eq!(foreign_intent(&intent_record(Gateway::Flutterwave)), None);
        assert_eq!(
            foreign_intent(&intent_record(Gateway::Paystack)).as_deref(),
            Some("payment intent r-1 was opened on paystack")
        );
    }
}
