//! Savings plan models.

use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SavingsPlanType {
    /// Funds stay locked until maturity; never auto-completes on target
    Locked,
    Targeted,
    Periodic,
}

impl SavingsPlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SavingsPlanType::Locked => "LOCKED",
            SavingsPlanType::Targeted => "TARGETED",
            SavingsPlanType::Periodic => "PERIODIC",
        }
    }
}

impl FromStr for SavingsPlanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOCKED" => Ok(SavingsPlanType::Locked),
            "TARGETED" => Ok(SavingsPlanType::Targeted),
            "PERIODIC" => Ok(SavingsPlanType::Periodic),
            other => Err(format!("unknown savings plan type: {other}")),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SavingsPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_type: String,
    pub target_amount: i64,
    pub saved_amount: i64,
}

impl SavingsPlan {
    /// Whether a top-up that brought `saved_amount` to its current value completes the plan.
    ///
    /// Locked plans run to maturity regardless of the target.
    pub fn reached_target(&self) -> bool {
        let locked = matches!(self.plan_type.parse(), Ok(SavingsPlanType::Locked));
        !locked && self.target_amount > 0 && self.saved_amount >= self.target_amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(plan_type: &str, target: i64, saved: i64) -> SavingsPlan {
        SavingsPlan {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_type: plan_type.to_string(),
            target_amount: target,
            saved_amount: saved,
        }
    }

    #[test]
    fn locked_plans_never_complete_on_target() {
        assert!(!plan("LOCKED", 10_000, 50_000).reached_target());
    }

    #[test]
    fn targeted_plan_completes_at_target() {
        assert!(plan("TARGETED", 10_000, 10_000).reached_target());
        assert!(!plan("TARGETED", 10_000, 9_999).reached_target());
    }

    #[test]
    fn plan_without_target_never_completes() {
        assert!(!plan("PERIODIC", 0, 10_000).reached_target());
    }
}
