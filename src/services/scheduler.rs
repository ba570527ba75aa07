//! Periodic housekeeping.
//!
//! The expiry sweeper closes running tudos whose deadline has passed, so their owners
//! can withdraw, and clears checkout intents that were never paid.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::notification::{NotificationJob, format_amount},
    services::{intent_service, notification_service::Notifier},
};

/// Tudo closed by the sweeper, joined with its owner.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExpiredTudo {
    pub id: Uuid,
    pub goal_name: String,
    pub currency: String,
    pub amount: i64,
    pub amount_generated: i64,
    pub owner_email: String,
    pub owner_name: String,
}

/// Run [`sweep_once`] every `interval` for the life of the process.
pub fn spawn_expiry_sweeper(pool: DbPool, notifier: Notifier, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        tracing::info!("expiry sweeper started, running every {:?}", interval);

        loop {
            ticker.tick().await;

            if let Err(e) = sweep_once(&pool, &notifier).await {
                tracing::error!("expiry sweep failed: {e}");
            }
        }
    })
}

/// Close every overdue tudo and queue one e-mail per owner. Returns how many were closed.
pub async fn sweep_once(pool: &DbPool, notifier: &Notifier) -> Result<usize, AppError> {
    let expired = sqlx::query_as::<_, ExpiredTudo>(
        r#"
        UPDATE tudos t
        SET status = 'COMPLETED', updated_at = NOW()
        FROM users u
        WHERE u.id = t.user_id
          AND t.status = 'RUNNING'
          AND t.state = 'active'
          AND t.completion_date <= NOW()
        RETURNING
            t.id,
            t.goal_name,
            t.currency,
            t.amount,
            t.amount_generated,
            u.email AS owner_email,
            COALESCE(u.business_name, u.first_name) AS owner_name
        "#,
    )
    .fetch_all(pool)
    .await?;

    for tudo in &expired {
        tracing::info!(tudo_id = %tudo.id, "tudo expired");
        notifier.enqueue(expiry_email(tudo));
    }

    let purged = intent_service::purge_expired(pool).await?;
    if purged > 0 || !expired.is_empty() {
        tracing::info!(expired = expired.len(), purged, "expiry sweep finished");
    }

    Ok(expired.len())
}

pub fn expiry_email(tudo: &ExpiredTudo) -> NotificationJob {
    NotificationJob::email(
        &tudo.owner_email,
        format!("Your tudo '{}' has expired", tudo.goal_name),
        format!(
            "Hello {}, your tudo '{}' reached its deadline with {} raised of {}. You can now withdraw it.",
            tudo.owner_name,
            tudo.goal_name,
            format_amount(&tudo.currency, tudo.amount_generated),
            format_amount(&tudo.currency, tudo.amount)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_email_reports_progress() {
        let tudo = ExpiredTudo {
            id: Uuid::new_v4(),
            goal_name: "Rent".to_string(),
            currency: "NGN".to_string(),
            amount: 50_000_000,
            amount_generated: 12_500_000,
            owner_email: "ada@example.com".to_string(),
            owner_name: "Ada".to_string(),
        };

        match expiry_email(&tudo) {
            NotificationJob::Email { to, subject, body } => {
                assert_eq!(to, "ada@example.com");
                assert!(subject.contains("Rent"));
                assert!(body.contains("NGN125,000.00 raised of NGN500,000.00"));
            }
            other => panic!("expected an e-mail, got {other:?}"),
        }
    }
}
