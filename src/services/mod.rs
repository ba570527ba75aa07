//! Business logic services.
//!
//! Services hold the ledger rules, separated from HTTP handlers. They own database
//! transactions, validation, and calls to outside systems (banking API, notification relay).

pub mod banking;
pub mod intent_service;
pub mod notification_service;
pub mod payment_webhook_service;
pub mod reconciliation;
pub mod scheduler;
pub mod tudo_service;
pub mod user_service;
pub mod wallet_service;
pub mod withdrawal_service;
