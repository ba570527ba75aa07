//! Payment gateway models.
//!
//! A checkout is described by a [`PaymentIntent`], recorded before the client is sent
//! to the gateway. When the gateway's webhook arrives it is normalised into a
//! [`PaymentEvent`] which reconciliation applies to the ledger.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment gateway a charge came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gateway {
    Paystack,
    Flutterwave,
}

impl Gateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gateway::Paystack => "paystack",
            Gateway::Flutterwave => "flutterwave",
        }
    }
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gateway {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paystack" => Ok(Gateway::Paystack),
            "flutterwave" => Ok(Gateway::Flutterwave),
            other => Err(format!("unknown gateway: {other}")),
        }
    }
}

/// What a charge pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    TudoContribution,
    TudoTopup,
    GroupTudoContribution,
    LockedSavings,
    TargetedSavings,
    PeriodicSavings,
    SavingsTopup,
    AddedCard,
    FundWallet,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::TudoContribution => "TUDO_CONTRIBUTION",
            TransactionType::TudoTopup => "TUDO_TOPUP",
            TransactionType::GroupTudoContribution => "GROUP_TUDO_CONTRIBUTION",
            TransactionType::LockedSavings => "LOCKED_SAVINGS",
            TransactionType::TargetedSavings => "TARGETED_SAVINGS",
            TransactionType::PeriodicSavings => "PERIODIC_SAVINGS",
            TransactionType::SavingsTopup => "SAVINGS_TOPUP",
            TransactionType::AddedCard => "ADDED_CARD",
            TransactionType::FundWallet => "FUND_WALLET",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed checkout metadata, tagged by `transaction_type`.
///
/// This is exactly what travels in Paystack's `metadata` object and what is stored in
/// `payment_intents.metadata` for Flutterwave, which does not echo metadata back.
///
/// # JSON Example
///
/// ```json
/// {
///   "transaction_type": "TUDO_CONTRIBUTION",
///   "tudo_code": "a8Fk29LmQz",
///   "contributor_name": "Chidi",
///   "contributor_email": "chidi@example.com"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transaction_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentIntent {
    TudoContribution {
        tudo_code: String,
        contributor_name: String,
        contributor_email: String,
    },
    TudoTopup {
        tudo_id: Uuid,
    },
    GroupTudoContribution {
        group_tudo_id: Uuid,
        contributor_id: Uuid,
    },
    LockedSavings {
        #[serde(default)]
        is_scheduled: bool,
    },
    TargetedSavings {
        #[serde(default)]
        is_scheduled: bool,
    },
    PeriodicSavings {
        #[serde(default)]
        is_scheduled: bool,
    },
    SavingsTopup {
        savings_id: Uuid,
    },
    /// Card-verification charge; the wallet is found by the customer's e-mail.
    AddedCard,
    FundWallet {
        wallet_id: Uuid,
    },
}

impl PaymentIntent {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            PaymentIntent::TudoContribution { .. } => TransactionType::TudoContribution,
            PaymentIntent::TudoTopup { .. } => TransactionType::TudoTopup,
            PaymentIntent::GroupTudoContribution { .. } => TransactionType::GroupTudoContribution,
            PaymentIntent::LockedSavings { .. } => TransactionType::LockedSavings,
            PaymentIntent::TargetedSavings { .. } => TransactionType::TargetedSavings,
            PaymentIntent::PeriodicSavings { .. } => TransactionType::PeriodicSavings,
            PaymentIntent::SavingsTopup { .. } => TransactionType::SavingsTopup,
            PaymentIntent::AddedCard => TransactionType::AddedCard,
            PaymentIntent::FundWallet { .. } => TransactionType::FundWallet,
        }
    }
}

/// Reusable card authorization returned by Paystack on a successful card charge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CardAuthorization {
    pub authorization_code: String,
    #[serde(default)]
    pub card_type: String,
    /// First six digits of the card number
    #[serde(default, rename = "bin")]
    pub first_six: String,
    #[serde(default, rename = "last4")]
    pub last_four: String,
    #[serde(default)]
    pub exp_month: String,
    #[serde(default)]
    pub exp_year: String,
    #[serde(default, rename = "bank")]
    pub card_bank: String,
    #[serde(default)]
    pub reusable: bool,
}

/// A successful charge, normalised across gateways.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEvent {
    pub gateway: Gateway,
    pub reference: String,
    /// Amount charged, in minor units
    pub amount: i64,
    /// Gateway fees, in minor units. Always 0 for Flutterwave.
    pub fees: i64,
    pub currency: String,
    pub customer_email: Option<String>,
    pub intent: PaymentIntent,
    pub authorization: Option<CardAuthorization>,
}

impl PaymentEvent {
    pub fn transaction_type(&self) -> TransactionType {
        self.intent.transaction_type()
    }
}

/// Active row of `payment_intents`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentIntentRecord {
    pub reference: String,
    pub gateway: String,
    pub amount: i64,
    pub currency: String,
    pub metadata: serde_json::Value,
}

impl PaymentIntentRecord {
    /// Decode the stored metadata back into a typed intent.
    pub fn intent(&self) -> Result<PaymentIntent, serde_json::Error> {
        serde_json::from_value(self.metadata.clone())
    }
}

/// Response for endpoints that start a checkout.
///
/// The client passes `reference` and `metadata` to the gateway's checkout. Paystack
/// echoes `metadata` back in its webhook; Flutterwave is matched by `reference` alone.
///
/// # JSON Example
///
/// ```json
/// {
///   "reference": "9b2f0f7e-5a3c-4c55-9d0e-6f1c2f0d8a11",
///   "gateway": "flutterwave",
///   "amount": 500000,
///   "currency": "NGN",
///   "metadata": { "transaction_type": "TUDO_CONTRIBUTION", "tudo_code": "a8Fk29LmQz", ... }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct InitiatedPayment {
    pub reference: String,
    pub gateway: Gateway,
    pub amount: i64,
    pub currency: String,
    pub metadata: PaymentIntent,
}

/// What the webhook endpoint did with a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookAck {
    /// Ledger updated for this transaction type
    Processed { transaction_type: TransactionType },
    /// Reference was already reconciled; nothing changed
    Duplicate { reference: String },
    /// Delivery was authentic but not something the ledger acts on
    Ignored { reason: String },
}
