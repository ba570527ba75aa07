//! Wallet ledger models.
//!
//! Every user has at most one wallet. Each balance change is mirrored by a row in
//! `wallet_transactions`; a wallet-to-wallet transfer writes a DEBIT and a CREDIT
//! under the same reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Balance in minor units. Never negative (CHECK constraint).
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletEntryType {
    Debit,
    Credit,
}

impl WalletEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletEntryType::Debit => "DEBIT",
            WalletEntryType::Credit => "CREDIT",
        }
    }
}

/// What caused a wallet movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletTrigger {
    /// Funded through a gateway checkout
    TopUp,
    /// Card-verification charge credited back to the wallet
    AddedCard,
    WalletTransfer,
    BankWithdrawal,
}

impl WalletTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletTrigger::TopUp => "TOP_UP",
            WalletTrigger::AddedCard => "ADDED_CARD",
            WalletTrigger::WalletTransfer => "WALLET_TRANSFER",
            WalletTrigger::BankWithdrawal => "BANK_WITHDRAWAL",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub amount: i64,
    pub reference: String,
    pub transaction_type: String,
    pub transaction_trigger: String,
    pub created_at: DateTime<Utc>,
}

/// `GET /api/v1/wallet/balance` response.
#[derive(Debug, Serialize)]
pub struct WalletBalanceResponse {
    pub id: Uuid,
    pub balance: i64,
}

impl From<Wallet> for WalletBalanceResponse {
    fn from(wallet: Wallet) -> Self {
        Self {
            id: wallet.id,
            balance: wallet.balance,
        }
    }
}

/// # JSON Example
///
/// ```json
/// { "beneficiary_email": "tola@example.com", "transfer_amount": 250000 }
/// ```
#[derive(Debug, Deserialize)]
pub struct WalletTransferRequest {
    pub beneficiary_email: String,
    pub transfer_amount: i64,
}

/// # JSON Example
///
/// ```json
/// { "bank_code": "000013", "bank_account_no": "0123456789", "transfer_amount": 250000 }
/// ```
#[derive(Debug, Deserialize)]
pub struct BankTransferRequest {
    pub bank_code: String,
    pub bank_account_no: String,
    pub transfer_amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct FundWalletRequest {
    pub amount: i64,
}

/// Result of a wallet debit (to another wallet or to a bank).
#[derive(Debug, Serialize)]
pub struct TransferReceipt {
    pub reference: String,
    pub amount_transfered: i64,
    pub my_wallet_balance: i64,
}
