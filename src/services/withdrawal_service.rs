//! Tudo withdrawals - paying a completed tudo out to the owner's bank account.
//!
//! # Locking
//!
//! The tudo is claimed with a conditional `UPDATE ... WHERE status = 'COMPLETED'` that
//! moves it to PROCESSING_WITHDRAWAL. Only one request can win that update; webhooks
//! crediting the tudo meanwhile get a 409 and are redelivered later.
//!
//! The bank call happens outside any database transaction. Its result decides the
//! final status through [`next_status_after_withdrawal`]; on failure the same function
//! gives the compensating status.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        notification::{NewNotification, NotificationJob, format_amount},
        tudo::{Tudo, TudoStatus, WithdrawRequest, WithdrawalSummary},
        user::BankAccount,
    },
    services::{
        banking::{BankTransfer, TransferInstruction},
        notification_service::{Notifier, insert_notification},
        user_service,
    },
};

/// Smallest gross amount that can be withdrawn (NGN100).
pub const MIN_WITHDRAWAL: i64 = 10_000;

/// Result of the bank transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Success,
    Failed,
}

/// Status a tudo leaves PROCESSING_WITHDRAWAL with.
///
/// A tudo whose deadline has not passed and whose target is not met goes back to
/// RUNNING whatever the outcome. Otherwise a successful payout makes it PAID and a
/// failed one returns it to COMPLETED so the owner can retry.
pub fn next_status_after_withdrawal(
    today: DateTime<Utc>,
    completion_date: DateTime<Utc>,
    generated: i64,
    target: i64,
    outcome: TransferOutcome,
) -> TudoStatus {
    if today.date_naive() < completion_date.date_naive() && generated < target {
        return TudoStatus::Running;
    }
    match outcome {
        TransferOutcome::Success => TudoStatus::Paid,
        TransferOutcome::Failed => TudoStatus::Completed,
    }
}

/// Platform fee kept from a withdrawal, rounded down to the minor unit.
pub fn compute_service_charge(withdrawable: i64, service_charge_bps: i64) -> i64 {
    withdrawable * service_charge_bps / 10_000
}

/// `tudo-` + 14 hex characters + unix seconds.
pub fn withdrawal_reference() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("tudo-{}{}", &id[..14], Utc::now().timestamp())
}

/// Withdraw everything withdrawable from a tudo to one of the owner's bank accounts.
///
/// # Errors
///
/// - `Validation` (400): unknown bank account or tudo, tudo already paid or being withdrawn
/// - `InvalidRequest` (400): the tudo could not be locked, or less than NGN100 is withdrawable
/// - `ServiceUnavailable` (503): the bank refused or failed the transfer
pub async fn withdraw_tudo(
    pool: &DbPool,
    bank: &dyn BankTransfer,
    notifier: &Notifier,
    service_charge_bps: i64,
    user_id: Uuid,
    request: WithdrawRequest,
) -> Result<WithdrawalSummary, AppError> {
    let mut conn = pool.acquire().await?;

    let bank_account = user_service::find_bank_account(&mut *conn, user_id, request.bank_account_id)
        .await?
        .ok_or_else(|| AppError::field("bank_account_id", "Bank account not found for user"))?;

    let tudo = sqlx::query_as::<_, Tudo>(
        "SELECT * FROM tudos WHERE id = $1 AND user_id = $2 AND state = 'active'",
    )
    .bind(request.tudo_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::field("tudo_id", "Tudo not found for user"))?;

    match tudo.status() {
        TudoStatus::Paid => return Err(AppError::field("tudo_id", "Tudo already paid")),
        TudoStatus::ProcessingWithdrawal => {
            return Err(AppError::field("tudo_id", "Withdrawal in progress"));
        }
        TudoStatus::Running | TudoStatus::Completed => {}
    }

    let tudo = sqlx::query_as::<_, Tudo>(
        r#"
        UPDATE tudos
        SET status = 'PROCESSING_WITHDRAWAL', updated_at = NOW()
        WHERE id = $1 AND user_id = $2 AND status = 'COMPLETED'
        RETURNING *
        "#,
    )
    .bind(tudo.id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::InvalidRequest("Withdrawal in progress".to_string()))?;

    drop(conn);

    let withdrawable = tudo.withdrawable();
    if withdrawable < MIN_WITHDRAWAL {
        release_lock(pool, &tudo, TransferOutcome::Failed).await?;
        return Err(AppError::InvalidRequest(
            "Cannot withdraw amount less than NGN100".to_string(),
        ));
    }

    let service_charge = compute_service_charge(withdrawable, service_charge_bps);
    let net = withdrawable - service_charge;
    let reference = withdrawal_reference();

    let instruction = TransferInstruction {
        amount: net,
        account_number: bank_account.account_number.clone(),
        bank_code: bank_account.bank_code.clone(),
        reference: reference.clone(),
        remark: format!("{} Goal Withdrawal", tudo.goal_name),
    };

    if let Err(e) = bank.transfer(&instruction).await {
        tracing::error!(tudo_id = %tudo.id, %reference, "withdrawal transfer failed: {e}");
        release_lock(pool, &tudo, TransferOutcome::Failed).await?;
        return Err(AppError::ServiceUnavailable(
            "Unable to complete transaction".to_string(),
        ));
    }

    let status = next_status_after_withdrawal(
        Utc::now(),
        tudo.completion_date,
        tudo.amount_generated,
        tudo.amount,
        TransferOutcome::Success,
    );

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE tudos
        SET amount_withdrawn = amount_withdrawn + $1,
            status = $2,
            updated_at = NOW()
        WHERE id = $3
        "#,
    )
    .bind(withdrawable)
    .bind(status.as_str())
    .bind(tudo.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO tudo_withdrawals (
            tudo_id,
            user_id,
            bank_account_id,
            amount,
            service_charge,
            currency,
            reference
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(tudo.id)
    .bind(user_id)
    .bind(bank_account.id)
    .bind(net)
    .bind(service_charge)
    .bind(&tudo.currency)
    .bind(&reference)
    .execute(&mut *tx)
    .await?;

    let owner = user_service::find_user(&mut *tx, user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let (in_app, email) = withdrawal_notices(
        owner.id,
        owner.display_name(),
        &owner.email,
        &tudo,
        &bank_account,
        net,
        service_charge,
    );
    insert_notification(&mut *tx, &in_app).await?;

    tx.commit().await?;

    tracing::info!(
        tudo_id = %tudo.id,
        %reference,
        gross = withdrawable,
        net,
        service_charge,
        status = %status,
        "tudo withdrawn"
    );
    notifier.enqueue(email);

    Ok(WithdrawalSummary {
        reference,
        target_amount: tudo.amount,
        amount_generated: tudo.amount_generated,
        amount_withdrawable: withdrawable,
        net_amt_withdrawn: net,
        service_charge,
    })
}

/// Compensating write: move a locked tudo out of PROCESSING_WITHDRAWAL.
async fn release_lock(pool: &DbPool, tudo: &Tudo, outcome: TransferOutcome) -> Result<(), AppError> {
    let status = next_status_after_withdrawal(
        Utc::now(),
        tudo.completion_date,
        tudo.amount_generated,
        tudo.amount,
        outcome,
    );

    sqlx::query(
        r#"
        UPDATE tudos
        SET status = $1, updated_at = NOW()
        WHERE id = $2 AND status = 'PROCESSING_WITHDRAWAL'
        "#,
    )
    .bind(status.as_str())
    .bind(tudo.id)
    .execute(pool)
    .await?;

    tracing::info!(tudo_id = %tudo.id, status = %status, "withdrawal lock released");
    Ok(())
}

fn withdrawal_notices(
    owner_id: Uuid,
    owner_name: &str,
    owner_email: &str,
    tudo: &Tudo,
    bank_account: &BankAccount,
    net: i64,
    service_charge: i64,
) -> (NewNotification, NotificationJob) {
    let net_text = format_amount(&tudo.currency, net);
    let text = format!(
        "Hello {owner_name}, {net_text} from '{}' has been sent to your {} account {}",
        tudo.goal_name, bank_account.bank_name, bank_account.account_number
    );
    let email = NotificationJob::email(
        owner_email,
        format!("Withdrawal from {}", tudo.goal_name),
        format!(
            "{text}. Amount raised: {}. Service charge: {}.",
            format_amount(&tudo.currency, tudo.amount_generated),
            format_amount(&tudo.currency, service_charge)
        ),
    );
    let in_app = NewNotification {
        user_id: owner_id,
        summary: "Tudo withdrawal notification".to_string(),
        notification_text: text,
        actor_name: Some(owner_name.to_string()),
    };
    (in_app, email)
}
