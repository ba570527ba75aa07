//! Tudo (funding goal) data models and API request/response types.
//!
//! This module defines:
//! - `Tudo`: Database entity for a funding goal
//! - `TudoContribution` / `TudoWithdrawal`: money in and money out of a tudo
//! - Request bodies for creating, contributing to, topping up and withdrawing from tudos
//! - `TudoTransactionEntry`: one row of the merged transaction history

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a tudo.
///
/// ```text
/// RUNNING --target reached / deadline--> COMPLETED --withdraw--> PROCESSING_WITHDRAWAL
///                                            ^                        |        |
///                                            +------ transfer failed -+        +-- transfer ok --> PAID
/// ```
///
/// A failed withdrawal on a tudo whose deadline has not passed and target is not met goes
/// back to RUNNING instead (see `withdrawal_service::next_status_after_withdrawal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TudoStatus {
    Running,
    Completed,
    Paid,
    ProcessingWithdrawal,
}

impl TudoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TudoStatus::Running => "RUNNING",
            TudoStatus::Completed => "COMPLETED",
            TudoStatus::Paid => "PAID",
            TudoStatus::ProcessingWithdrawal => "PROCESSING_WITHDRAWAL",
        }
    }
}

impl fmt::Display for TudoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TudoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(TudoStatus::Running),
            "COMPLETED" => Ok(TudoStatus::Completed),
            "PAID" => Ok(TudoStatus::Paid),
            "PROCESSING_WITHDRAWAL" => Ok(TudoStatus::ProcessingWithdrawal),
            other => Err(format!("unknown tudo status: {other}")),
        }
    }
}

/// Supported currencies (ISO 4217). Amounts are always in the minor unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    #[serde(rename = "NGN")]
    Ngn,
    #[serde(rename = "USD")]
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Ngn => "NGN",
            Currency::Usd => "USD",
        }
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NGN" => Ok(Currency::Ngn),
            "USD" => Ok(Currency::Usd),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

/// Represents a tudo record from the database.
///
/// # Amounts
///
/// `amount` is the target. `amount_generated` only grows (contributions and top-ups);
/// `amount_withdrawn` grows by the gross amount of each successful withdrawal, so
/// `amount_generated - amount_withdrawn` is what can still be withdrawn.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Tudo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goal_name: String,
    pub goal_description: Option<String>,
    pub amount: i64,
    pub amount_generated: i64,
    pub amount_withdrawn: i64,
    pub currency: String,
    pub status: String,

    /// Public code contributors use to find the tudo.
    pub share_code: String,

    pub duration_days: i32,
    pub completion_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tudo {
    /// Parsed status. Rows are constrained by a CHECK, so unknown values only appear if the
    /// schema drifts; they are treated as RUNNING.
    pub fn status(&self) -> TudoStatus {
        self.status.parse().unwrap_or(TudoStatus::Running)
    }

    pub fn currency(&self) -> Currency {
        self.currency.parse().unwrap_or_default()
    }

    pub fn withdrawable(&self) -> i64 {
        self.amount_generated - self.amount_withdrawn
    }
}

/// Request body for creating a tudo.
///
/// # JSON Example
///
/// ```json
/// {
///   "goal_name": "New laptop",
///   "amount": 45000000,
///   "currency": "NGN",
///   "duration_days": 60
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateTudoRequest {
    pub goal_name: String,

    #[serde(default)]
    pub goal_description: Option<String>,

    /// Target amount in minor units
    pub amount: i64,

    #[serde(default)]
    pub currency: Currency,

    /// One of 30, 60 or 90
    pub duration_days: i32,
}

/// Response body for tudo endpoints.
#[derive(Debug, Serialize)]
pub struct TudoResponse {
    pub id: Uuid,
    pub goal_name: String,
    pub goal_description: Option<String>,
    pub amount: i64,
    pub amount_generated: i64,
    pub amount_withdrawn: i64,
    pub amount_withdrawable: i64,
    pub currency: String,
    pub status: String,
    pub share_code: String,
    pub completion_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<Tudo> for TudoResponse {
    fn from(tudo: Tudo) -> Self {
        Self {
            id: tudo.id,
            amount_withdrawable: tudo.withdrawable(),
            goal_name: tudo.goal_name,
            goal_description: tudo.goal_description,
            amount: tudo.amount,
            amount_generated: tudo.amount_generated,
            amount_withdrawn: tudo.amount_withdrawn,
            currency: tudo.currency,
            status: tudo.status,
            share_code: tudo.share_code,
            completion_date: tudo.completion_date,
            created_at: tudo.created_at,
        }
    }
}

/// Whether a contribution came from a third party or the owner topping up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributionType {
    UserContribution,
    TopUp,
}

impl ContributionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionType::UserContribution => "USERCONTRIBUTION",
            ContributionType::TopUp => "TOPUP",
        }
    }
}

/// Status written on reconciled contributions.
///
/// Rows only reach the ledger once the gateway confirmed the charge; the column also
/// admits PENDING and FAILED for checkouts tracked outside this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Success,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Success => "SUCCESS",
        }
    }
}

/// A reconciled payment into a tudo.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct TudoContribution {
    pub id: Uuid,
    pub tudo_id: Uuid,
    pub contributor_name: String,
    pub contributor_email: String,
    pub amount: i64,
    pub currency: String,
    pub reference: String,
    pub contribution_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A completed payout from a tudo to a bank account.
///
/// `amount` is the net sent to the bank; `service_charge` is what was kept.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct TudoWithdrawal {
    pub id: Uuid,
    pub tudo_id: Uuid,
    pub user_id: Uuid,
    pub bank_account_id: Uuid,
    pub amount: i64,
    pub service_charge: i64,
    pub currency: String,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// Where a contributor pays. `local` goes to Paystack, `international` to Flutterwave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContributionScope {
    Local,
    #[default]
    International,
}

/// Public request to start a contribution checkout.
///
/// # JSON Example
///
/// ```json
/// {
///   "tudo_code": "a8Fk29LmQz",
///   "amount": 500000,
///   "contributor_name": "Chidi",
///   "contributor_email": "chidi@example.com",
///   "scope": "local"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct ContributeRequest {
    pub tudo_code: String,
    pub amount: i64,

    #[serde(default)]
    pub contributor_name: Option<String>,

    #[serde(default)]
    pub contributor_email: Option<String>,

    #[serde(default)]
    pub scope: ContributionScope,
}

/// Owner request to top up their own tudo.
#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub tudo_id: Uuid,
    pub topup_amount: i64,
}

/// Request to withdraw a completed tudo to one of the caller's bank accounts.
#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub tudo_id: Uuid,
    pub bank_account_id: Uuid,
}

/// Response for a successful withdrawal.
///
/// # JSON Example
///
/// ```json
/// {
///   "reference": "tudo-3f9c1a2b7d4e1700000000",
///   "target_amount": 1000000,
///   "amount_generated": 1200000,
///   "amount_withdrawable": 1200000,
///   "net_amt_withdrawn": 1140000,
///   "service_charge": 60000
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct WithdrawalSummary {
    pub reference: String,
    pub target_amount: i64,
    pub amount_generated: i64,
    /// Gross amount taken out of the tudo
    pub amount_withdrawable: i64,
    /// Amount sent to the bank
    pub net_amt_withdrawn: i64,
    pub service_charge: i64,
}

/// Filter for the tudo transaction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionFilter {
    All,
    Contributions,
    TopUps,
    Withdrawals,
    /// Unrecognised filter; yields an empty history
    Unknown,
}

impl TransactionFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::to_lowercase).as_deref() {
            None | Some("all") => TransactionFilter::All,
            Some("contributions") => TransactionFilter::Contributions,
            Some("topups") => TransactionFilter::TopUps,
            Some("withdrawals") => TransactionFilter::Withdrawals,
            Some(_) => TransactionFilter::Unknown,
        }
    }

    pub fn includes_contributions(&self) -> bool {
        matches!(
            self,
            TransactionFilter::All | TransactionFilter::Contributions | TransactionFilter::TopUps
        )
    }

    pub fn includes_withdrawals(&self) -> bool {
        matches!(self, TransactionFilter::All | TransactionFilter::Withdrawals)
    }
}

/// Query string for `GET /api/v1/tudos/{id}/transactions`.
#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// One entry in a tudo's merged contribution/withdrawal history.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TudoTransactionEntry {
    Contribution {
        reference: String,
        contributor_name: String,
        contribution_type: String,
        amount: i64,
        currency: String,
        created_at: DateTime<Utc>,
    },
    Withdrawal {
        reference: String,
        amount: i64,
        service_charge: i64,
        currency: String,
        created_at: DateTime<Utc>,
    },
}

impl TudoTransactionEntry {
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            TudoTransactionEntry::Contribution { created_at, .. }
            | TudoTransactionEntry::Withdrawal { created_at, .. } => *created_at,
        }
    }
}

impl From<TudoContribution> for TudoTransactionEntry {
    fn from(c: TudoContribution) -> Self {
        TudoTransactionEntry::Contribution {
            reference: c.reference,
            contributor_name: c.contributor_name,
            contribution_type: c.contribution_type,
            amount: c.amount,
            currency: c.currency,
            created_at: c.created_at,
        }
    }
}

impl From<TudoWithdrawal> for TudoTransactionEntry {
    fn from(w: TudoWithdrawal) -> Self {
        TudoTransactionEntry::Withdrawal {
            reference: w.reference,
            amount: w.amount,
            service_charge: w.service_charge,
            currency: w.currency,
            created_at: w.created_at,
        }
    }
}
