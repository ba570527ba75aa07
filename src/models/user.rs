//! User accounts and session tokens.
//!
//! Personal and business accounts share the `users` table; `account_type`
//! tells them apart. Session tokens are stored as SHA-256 hashes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of account that owns tudos, wallets and bank accounts.
///
/// Push notifications and referral rewards only apply to personal accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Personal,
    Business,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Personal => "personal",
            AccountType::Business => "business",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(AccountType::Personal),
            "business" => Ok(AccountType::Business),
            other => Err(format!("unknown account type: {other}")),
        }
    }
}

/// Represents a user record from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub account_type: String,
    pub first_name: String,
    pub business_name: Option<String>,
    pub email: String,
    pub bvn: Option<String>,

    /// User who referred this one. Credited with points on the invitee's first successful payment.
    pub invited_by: Option<Uuid>,
}

impl User {
    /// Account type, treating unknown values as personal.
    pub fn kind(&self) -> AccountType {
        self.account_type.parse().unwrap_or(AccountType::Personal)
    }

    /// Name used when addressing the owner in notifications.
    pub fn display_name(&self) -> &str {
        match (self.kind(), self.business_name.as_deref()) {
            (AccountType::Business, Some(name)) => name,
            _ => &self.first_name,
        }
    }
}

/// User behind an active session token, as read by the auth middleware.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub account_type: String,
}

/// Bank account a user withdraws to.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct BankAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bank_code: String,
    pub account_name: String,
    pub account_number: String,
    pub bank_name: String,
}

/// Reward granted to an inviter when an invitee pays for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardType {
    GoalContribution,
    GoalTopup,
    SavingsTopup,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::GoalContribution => "GOAL_CONTRIBUTION",
            RewardType::GoalTopup => "GOAL_TOPUP",
            RewardType::SavingsTopup => "SAVINGS_TOPUP",
        }
    }

    /// Points credited to the inviter. Every referral reward is currently worth the same.
    pub fn points(&self) -> i32 {
        5
    }

    /// What the invitee did, for the inviter's push message.
    pub fn action(&self) -> &'static str {
        match self {
            RewardType::GoalContribution => "received their first tudo contribution",
            RewardType::GoalTopup => "topped up a tudo for the first time",
            RewardType::SavingsTopup => "started saving",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(account_type: &str, business_name: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            account_type: account_type.to_string(),
            first_name: "Ada".to_string(),
            business_name: business_name.map(str::to_string),
            email: "ada@example.com".to_string(),
            bvn: None,
            invited_by: None,
        }
    }

    #[test]
    fn business_accounts_are_addressed_by_business_name() {
        assert_eq!(user("business", Some("Ada Foods")).display_name(), "Ada Foods");
        assert_eq!(user("personal", Some("ignored")).display_name(), "Ada");
    }

    #[test]
    fn unknown_account_type_falls_back_to_personal() {
        assert_eq!(user("alien", None).kind(), AccountType::Personal);
    }
}
