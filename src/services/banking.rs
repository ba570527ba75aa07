//! Outbound bank transfers.
//!
//! Withdrawals and wallet-to-bank transfers pay out of the platform's pool account
//! through a core banking API. The rest of the crate only sees the [`BankTransfer`]
//! trait, so the HTTP binding can be swapped or stubbed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;

const BANKING_TIMEOUT: Duration = Duration::from_secs(20);

/// Response status the banking API uses for an accepted transfer.
const TRANSFER_OK: &str = "00";

/// Payouts always leave the pool account for another bank.
const INTER_BANK: &str = "inter";

/// One payout.
#[derive(Debug, Clone)]
pub struct TransferInstruction {
    /// Amount in minor units
    pub amount: i64,
    pub account_number: String,
    pub bank_code: String,
    pub reference: String,
    pub remark: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BankingError {
    #[error("banking API is not configured")]
    NotConfigured,

    #[error("transfer rejected with status {status}: {message}")]
    Rejected { status: String, message: String },

    #[error("banking API request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait::async_trait]
pub trait BankTransfer: Send + Sync {
    /// Move `instruction.amount` to the beneficiary. `Ok` means the bank accepted it.
    async fn transfer(&self, instruction: &TransferInstruction) -> Result<(), BankingError>;
}

/// Build the transfer client described by the configuration.
///
/// Without `BANKING_API_URL` every transfer fails with [`BankingError::NotConfigured`].
pub fn from_config(config: &Config) -> Result<std::sync::Arc<dyn BankTransfer>, BankingError> {
    match &config.banking_api_url {
        Some(url) => Ok(std::sync::Arc::new(CoreBankingClient::new(
            url.clone(),
            config.banking_api_token.clone().unwrap_or_default(),
        )?)),
        None => {
            tracing::warn!("BANKING_API_URL not set; bank transfers are disabled");
            Ok(std::sync::Arc::new(Unconfigured))
        }
    }
}

/// HTTP binding for the core banking `/transfer` endpoint.
pub struct CoreBankingClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl CoreBankingClient {
    pub fn new(base_url: String, token: String) -> Result<Self, BankingError> {
        let client = reqwest::Client::builder().timeout(BANKING_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferBody<'a> {
    reference: &'a str,
    remark: &'a str,
    /// Major units with two decimals, e.g. "1140.00"
    amount: String,
    transfer_type: &'static str,
    to_account: &'a str,
    to_bank: &'a str,
}

impl<'a> From<&'a TransferInstruction> for TransferBody<'a> {
    fn from(instruction: &'a TransferInstruction) -> Self {
        Self {
            reference: &instruction.reference,
            remark: &instruction.remark,
            amount: major_units(instruction.amount),
            transfer_type: INTER_BANK,
            to_account: &instruction.account_number,
            to_bank: &instruction.bank_code,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransferReply {
    #[serde(rename = "Status", alias = "status", default)]
    status: String,
    #[serde(rename = "Message", alias = "message", default)]
    message: String,
}

#[async_trait::async_trait]
impl BankTransfer for CoreBankingClient {
    async fn transfer(&self, instruction: &TransferInstruction) -> Result<(), BankingError> {
        let reply: TransferReply = self
            .client
            .post(format!("{}/transfer", self.base_url))
            .bearer_auth(&self.token)
            .json(&TransferBody::from(instruction))
            .send()
            .await?
            .json()
            .await?;

        if reply.status == TRANSFER_OK {
            tracing::info!(reference = %instruction.reference, amount = instruction.amount, "bank transfer accepted");
            Ok(())
        } else {
            Err(BankingError::Rejected {
                status: reply.status,
                message: reply.message,
            })
        }
    }
}

/// Stand-in used when no banking API is configured.
pub struct Unconfigured;

#[async_trait::async_trait]
impl BankTransfer for Unconfigured {
    async fn transfer(&self, _instruction: &TransferInstruction) -> Result<(), BankingError> {
        Err(BankingError::NotConfigured)
    }
}

fn major_units(minor: i64) -> String {
    format!("{}.{:02}", minor / 100, (minor % 100).abs())
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records instructions and answers with a fixed outcome.
    pub struct RecordingBank {
        pub accept: bool,
        pub seen: Mutex<Vec<TransferInstruction>>,
    }

    impl RecordingBank {
        pub fn accepting() -> Self {
            Self {
                accept: true,
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn rejecting() -> Self {
            Self {
                accept: false,
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn instructions(&self) -> Vec<TransferInstruction> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl BankTransfer for RecordingBank {
        async fn transfer(&self, instruction: &TransferInstruction) -> Result<(), BankingError> {
            self.seen.lock().unwrap().push(instruction.clone());
            if self.accept {
                Ok(())
            } else {
                Err(BankingError::Rejected {
                    status: "99".to_string(),
                    message: "declined".to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(amount: i64) -> TransferInstruction {
        TransferInstruction {
            amount,
            account_number: "0123456789".to_string(),
            bank_code: "000013".to_string(),
            reference: "tudo-abc".to_string(),
            remark: "Laptop Goal Withdrawal".to_string(),
        }
    }

    #[test]
    fn amounts_are_sent_in_major_units() {
        assert_eq!(major_units(114_000), "1140.00");
        assert_eq!(major_units(5), "0.05");
    }

    #[test]
    fn transfer_body_uses_camel_case_fields() {
        let instruction = instruction(250_050);
        let body = serde_json::to_value(TransferBody::from(&instruction)).unwrap();
        assert_eq!(body["amount"], "2500.50");
        assert_eq!(body["transferType"], "inter");
        assert_eq!(body["toAccount"], "0123456789");
        assert_eq!(body["toBank"], "000013");
    }

    #[test]
    fn reply_accepts_lowercase_keys() {
        let reply: TransferReply =
            serde_json::from_str(r#"{"status": "00", "message": "ok"}"#).unwrap();
        assert_eq!(reply.status, TRANSFER_OK);
    }

    #[tokio::test]
    async fn unconfigured_bank_refuses_every_transfer() {
        let result = Unconfigured.transfer(&instruction(10_000)).await;
        assert!(matches!(result, Err(BankingError::NotConfigured)));
    }

    #[tokio::test]
    async fn missing_url_yields_unconfigured_client() {
        let bank = from_config(&Config::for_tests()).unwrap();
        assert!(bank.transfer(&instruction(10_000)).await.is_err());
    }
}
