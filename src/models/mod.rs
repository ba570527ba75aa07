//! Data models representing database entities.
//!
//! This module contains the row structs that map to database tables, the typed
//! enums stored in their status columns, and the request/response bodies of the API.

/// Group goals and their members
pub mod group_tudo;
/// Notification jobs and in-app notifications
pub mod notification;
pub mod pagination;
/// Gateways, checkout intents and normalised payment events
pub mod payment;
/// Savings plans
pub mod savings;
/// Funding goals, contributions and withdrawals
pub mod tudo;
/// Users, sessions, bank accounts and rewards
pub mod user;
/// Wallets and wallet ledger entries
pub mod wallet;
