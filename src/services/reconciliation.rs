//! Reconciliation - applies verified gateway charges to the ledger.
//!
//! Every charge is handled inside one PostgreSQL transaction:
//!
//! 1. Lock the row the money is for (tudo, group, savings plan or wallet)
//! 2. Stop with [`Outcome::Duplicate`] if the reference is already recorded
//! 3. Apply the balance change and record the transaction
//! 4. Write in-app notifications and referral rewards
//! 5. Commit, then hand e-mail and push jobs to the [`Notifier`]
//!
//! Checking the reference after taking the row lock means two concurrent deliveries of
//! the same charge serialize, and the second one sees the first one's insert. Unique
//! constraints on every `reference` column back this up.

use serde_json::json;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        group_tudo::{GroupMember, GroupTudo},
        notification::{NewNotification, NotificationJob, format_amount},
        payment::{CardAuthorization, PaymentEvent, PaymentIntent, TransactionType},
        savings::{SavingsPlan, SavingsPlanType},
        tudo::{ContributionType, TransactionStatus, Tudo, TudoStatus},
        user::{AccountType, RewardType, User},
        wallet::{Wallet, WalletEntryType, WalletTrigger},
    },
    services::{
        notification_service::{Notifier, insert_notification},
        user_service,
    },
};

/// Result of applying one charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied(TransactionType),
    /// The reference was already reconciled; nothing changed.
    Duplicate,
}

/// Jobs to hand to the notifier once the transaction commits.
type Outbox = Vec<NotificationJob>;

/// Apply a verified charge to the ledger.
///
/// # Errors
///
/// - `NotFound`: the tudo, plan, group or wallet the charge names does not exist
/// - `Conflict`: the tudo is locked by an in-flight withdrawal; the gateway should retry
/// - `Database`: anything else; the transaction is rolled back
pub async fn reconcile(
    pool: &DbPool,
    notifier: &Notifier,
    event: &PaymentEvent,
) -> Result<Outcome, AppError> {
    let mut tx = pool.begin().await?;
    let mut outbox = Outbox::new();

    let result = match &event.intent {
        PaymentIntent::TudoContribution {
            tudo_code,
            contributor_name,
            contributor_email,
        } => {
            let credit = TudoCredit {
                key: TudoKey::ShareCode(tudo_code),
                contributor_name,
                contributor_email,
                contribution_type: ContributionType::UserContribution,
            };
            process_tudo_contribution(&mut *tx, event, credit, &mut outbox).await
        }
        PaymentIntent::TudoTopup { tudo_id } => {
            process_tudo_topup(&mut *tx, event, *tudo_id, &mut outbox).await
        }
        PaymentIntent::GroupTudoContribution {
            group_tudo_id,
            contributor_id,
        } => process_group_contribution(&mut *tx, event, *group_tudo_id, *contributor_id, &mut outbox).await,
        PaymentIntent::LockedSavings { is_scheduled } => {
            activate_savings(&mut *tx, event, SavingsPlanType::Locked, *is_scheduled, &mut outbox).await
        }
        PaymentIntent::TargetedSavings { is_scheduled } => {
            activate_savings(&mut *tx, event, SavingsPlanType::Targeted, *is_scheduled, &mut outbox).await
        }
        PaymentIntent::PeriodicSavings { is_scheduled } => {
            activate_savings(&mut *tx, event, SavingsPlanType::Periodic, *is_scheduled, &mut outbox).await
        }
        PaymentIntent::SavingsTopup { savings_id } => {
            topup_savings(&mut *tx, event, *savings_id, &mut outbox).await
        }
        PaymentIntent::AddedCard => credit_wallet_from_card(&mut *tx, event).await,
        PaymentIntent::FundWallet { wallet_id } => fund_wallet(&mut *tx, event, *wallet_id).await,
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        // A concurrent delivery won the race on the unique reference
        Err(AppError::Database(sqlx::Error::Database(ref db))) if db.is_unique_violation() => {
            Outcome::Duplicate
        }
        Err(e) => return Err(e),
    };

    match outcome {
        Outcome::Applied(transaction_type) => {
            tx.commit().await?;
            tracing::info!(
                gateway = %event.gateway,
                reference = %event.reference,
                %transaction_type,
                amount = event.amount,
                "payment reconciled"
            );
            notifier.enqueue_all(outbox);
        }
        Outcome::Duplicate => {
            tx.rollback().await?;
            tracing::info!(
                gateway = %event.gateway,
                reference = %event.reference,
                "payment already reconciled"
            );
        }
    }

    Ok(outcome)
}

/// How the charge identifies its tudo.
#[derive(Debug, Clone, Copy)]
pub enum TudoKey<'a> {
    ShareCode(&'a str),
    Id(Uuid),
}

/// Who paid into a tudo and how it is recorded.
#[derive(Debug, Clone, Copy)]
pub struct TudoCredit<'a> {
    pub key: TudoKey<'a>,
    pub contributor_name: &'a str,
    pub contributor_email: &'a str,
    pub contribution_type: ContributionType,
}

/// Credit a tudo with a contribution (third party) or a top-up (owner).
pub async fn process_tudo_contribution(
    conn: &mut sqlx::PgConnection,
    event: &PaymentEvent,
    credit: TudoCredit<'_>,
    outbox: &mut Outbox,
) -> Result<Outcome, AppError> {
    let tudo = lock_tudo(conn, credit.key)
        .await?
        .ok_or(AppError::NotFound("Tudo"))?;

    if reference_exists(conn, "tudo_contributions", &event.reference).await? {
        return Ok(Outcome::Duplicate);
    }

    if tudo.status() == TudoStatus::ProcessingWithdrawal {
        return Err(AppError::Conflict(format!(
            "Tudo {} is being withdrawn; retry later",
            tudo.id
        )));
    }

    let status = status_after_credit(tudo.status(), tudo.amount_generated + event.amount, tudo.amount);

    let tudo = sqlx::query_as::<_, Tudo>(
        r#"
        UPDATE tudos
        SET amount_generated = amount_generated + $1,
            status = $2,
            updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(event.amount)
    .bind(status.as_str())
    .bind(tudo.id)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO tudo_contributions (
            tudo_id,
            contributor_name,
            contributor_email,
            amount,
            currency,
            reference,
            contribution_type,
            status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(tudo.id)
    .bind(credit.contributor_name)
    .bind(credit.contributor_email)
    .bind(event.amount)
    .bind(&tudo.currency)
    .bind(&event.reference)
    .bind(credit.contribution_type.as_str())
    .bind(TransactionStatus::Success.as_str())
    .execute(&mut *conn)
    .await?;

    let owner = user_service::find_user(conn, tudo.user_id)
        .await?
        .ok_or(AppError::NotFound("Tudo owner"))?;

    let goal_reached = tudo.amount_generated >= tudo.amount;
    let notices = tudo_credit_notices(&owner, &tudo, &credit, event.amount, goal_reached);
    insert_notification(conn, &notices.in_app).await?;
    outbox.extend(notices.jobs);

    if owner.kind() == AccountType::Personal && successful_contributions(conn, owner.id).await? == 1 {
        let reward = match credit.contribution_type {
            ContributionType::UserContribution => RewardType::GoalContribution,
            ContributionType::TopUp => RewardType::GoalTopup,
        };
        reward_inviter(conn, &owner, reward, outbox).await?;
    }

    Ok(Outcome::Applied(match credit.contribution_type {
        ContributionType::UserContribution => TransactionType::TudoContribution,
        ContributionType::TopUp => TransactionType::TudoTopup,
    }))
}

/// Owner top-up: a contribution by "Self TopUp" keyed by tudo id.
pub async fn process_tudo_topup(
    conn: &mut sqlx::PgConnection,
    event: &PaymentEvent,
    tudo_id: Uuid,
    outbox: &mut Outbox,
) -> Result<Outcome, AppError> {
    let email = event.customer_email.as_deref().unwrap_or_default();
    let credit = TudoCredit {
        key: TudoKey::Id(tudo_id),
        contributor_name: SELF_TOPUP,
        contributor_email: email,
        contribution_type: ContributionType::TopUp,
    };
    process_tudo_contribution(conn, event, credit, outbox).await
}

const SELF_TOPUP: &str = "Self TopUp";

pub async fn process_group_contribution(
    conn: &mut sqlx::PgConnection,
    event: &PaymentEvent,
    group_tudo_id: Uuid,
    contributor_id: Uuid,
    outbox: &mut Outbox,
) -> Result<Outcome, AppError> {
    let group = sqlx::query_as::<_, GroupTudo>(
        "SELECT * FROM group_tudos WHERE id = $1 AND state = 'active' FOR UPDATE",
    )
    .bind(group_tudo_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Group tudo"))?;

    if reference_exists(conn, "group_tudo_contributions", &event.reference).await? {
        return Ok(Outcome::Duplicate);
    }

    sqlx::query(
        r#"
        INSERT INTO group_tudo_contributions (
            group_tudo_id,
            contributor_id,
            amount_contributed,
            currency,
            reference
        )
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(group.id)
    .bind(contributor_id)
    .bind(event.amount)
    .bind(&event.currency)
    .bind(&event.reference)
    .execute(&mut *conn)
    .await?;

    let member_rows = sqlx::query(
        r#"
        UPDATE group_tudo_members
        SET amount_generated = amount_generated + $1,
            updated_at = NOW()
        WHERE group_tudo_id = $2 AND member_id = $3
        "#,
    )
    .bind(event.amount)
    .bind(group.id)
    .bind(contributor_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if member_rows == 0 {
        return Err(AppError::NotFound("Group tudo member"));
    }

    let group = sqlx::query_as::<_, GroupTudo>(
        r#"
        UPDATE group_tudos
        SET amount_generated = amount_generated + $1,
            status = CASE WHEN amount_generated + $1 >= target_amount THEN 'COMPLETED' ELSE status END,
            updated_at = NOW()
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(event.amount)
    .bind(group.id)
    .fetch_one(&mut *conn)
    .await?;

    let members = sqlx::query_as::<_, GroupMember>(
        r#"
        SELECT m.member_id, u.first_name, u.account_type
        FROM group_tudo_members m
        JOIN users u ON u.id = m.member_id
        WHERE m.group_tudo_id = $1
        "#,
    )
    .bind(group.id)
    .fetch_all(&mut *conn)
    .await?;

    outbox.extend(group_contribution_pushes(&group, &members, contributor_id, event.amount));

    Ok(Outcome::Applied(TransactionType::GroupTudoContribution))
}

/// First charge of a savings plan: the plan starts running.
///
/// Scheduled plans were created with their opening deposit in `scheduled_start_amount`;
/// it becomes the saved amount once the charge lands.
pub async fn activate_savings(
    conn: &mut sqlx::PgConnection,
    event: &PaymentEvent,
    plan_kind: SavingsPlanType,
    is_scheduled: bool,
    outbox: &mut Outbox,
) -> Result<Outcome, AppError> {
    let plan = sqlx::query_as::<_, SavingsPlan>(
        "SELECT * FROM savings_plans WHERE transaction_ref = $1 AND state = 'active' FOR UPDATE",
    )
    .bind(&event.reference)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Savings plan"))?;

    if reference_exists(conn, "savings_transactions", &event.reference).await? {
        return Ok(Outcome::Duplicate);
    }

    if plan.plan_type != plan_kind.as_str() {
        tracing::warn!(
            plan_id = %plan.id,
            plan_type = %plan.plan_type,
            charged_as = plan_kind.as_str(),
            "savings charge type does not match plan"
        );
    }

    sqlx::query(
        r#"
        UPDATE savings_plans
        SET transaction_status = 'SUCCESS',
            saving_status = 'RUNNING',
            saved_amount = CASE WHEN $2 THEN scheduled_start_amount ELSE saved_amount END,
            scheduled_start_amount = CASE WHEN $2 THEN 0 ELSE scheduled_start_amount END,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(plan.id)
    .bind(is_scheduled)
    .execute(&mut *conn)
    .await?;

    record_savings_transaction(conn, &plan, event, outbox).await?;

    Ok(Outcome::Applied(event.transaction_type()))
}

/// Add a charge to a running plan. Non-locked plans complete at their target.
pub async fn topup_savings(
    conn: &mut sqlx::PgConnection,
    event: &PaymentEvent,
    savings_id: Uuid,
    outbox: &mut Outbox,
) -> Result<Outcome, AppError> {
    let mut plan = sqlx::query_as::<_, SavingsPlan>(
        "SELECT * FROM savings_plans WHERE id = $1 AND state = 'active' FOR UPDATE",
    )
    .bind(savings_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Savings plan"))?;

    if reference_exists(conn, "savings_transactions", &event.reference).await? {
        return Ok(Outcome::Duplicate);
    }

    plan.saved_amount += event.amount;
    let completes = plan.reached_target();

    sqlx::query(
        r#"
        UPDATE savings_plans
        SET saved_amount = saved_amount + $1,
            saving_status = CASE WHEN $2 THEN 'COMPLETED' ELSE saving_status END,
            updated_at = NOW()
        WHERE id = $3
        "#,
    )
    .bind(event.amount)
    .bind(completes)
    .bind(plan.id)
    .execute(&mut *conn)
    .await?;

    record_savings_transaction(conn, &plan, event, outbox).await?;

    Ok(Outcome::Applied(TransactionType::SavingsTopup))
}

async fn record_savings_transaction(
    conn: &mut sqlx::PgConnection,
    plan: &SavingsPlan,
    event: &PaymentEvent,
    outbox: &mut Outbox,
) -> Result<(), AppError> {
    let first_savings: bool = sqlx::query_scalar(
        "SELECT NOT EXISTS(SELECT 1 FROM savings_transactions WHERE user_id = $1)",
    )
    .bind(plan.user_id)
    .fetch_one(&mut *conn)
    .await?;

    if first_savings {
        if let Some(saver) = user_service::find_user(conn, plan.user_id).await? {
            reward_inviter(conn, &saver, RewardType::SavingsTopup, outbox).await?;
        }
    }

    sqlx::query(
        r#"
        INSERT INTO savings_transactions (
            user_id,
            savings_id,
            amount,
            status,
            reference,
            transaction_type
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(plan.user_id)
    .bind(plan.id)
    .bind(event.amount)
    .bind(TransactionStatus::Success.as_str())
    .bind(&event.reference)
    .bind(event.transaction_type().as_str())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Card-verification charge: credit the wallet net of gateway fees and keep the card.
///
/// A missing wallet is logged and acknowledged so the gateway stops redelivering.
pub async fn credit_wallet_from_card(
    conn: &mut sqlx::PgConnection,
    event: &PaymentEvent,
) -> Result<Outcome, AppError> {
    let Some(email) = event.customer_email.as_deref() else {
        tracing::warn!(reference = %event.reference, "card charge without customer e-mail");
        return Ok(Outcome::Applied(TransactionType::AddedCard));
    };

    let wallet = sqlx::query_as::<_, Wallet>(
        r#"
        SELECT w.id, w.user_id, w.balance, w.created_at, w.updated_at
        FROM wallets w
        JOIN users u ON u.id = w.user_id
        WHERE LOWER(u.email) = LOWER($1) AND w.state = 'active'
        FOR UPDATE OF w
        "#,
    )
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(wallet) = wallet else {
        tracing::warn!(reference = %event.reference, "card charge for a user without a wallet");
        return Ok(Outcome::Applied(TransactionType::AddedCard));
    };

    if wallet_credit_exists(conn, &event.reference).await? {
        return Ok(Outcome::Duplicate);
    }

    let amount = net_of_fees(event.amount, event.fees);
    if amount > 0 {
        credit_wallet(conn, &wallet, amount, &event.reference, WalletTrigger::AddedCard).await?;
    }

    if let Some(card) = event.authorization.as_ref().filter(|card| card.reusable) {
        save_card(conn, wallet.user_id, card).await?;
    }

    Ok(Outcome::Applied(TransactionType::AddedCard))
}

/// Checkout-funded wallet top-up. The full charge is credited.
pub async fn fund_wallet(
    conn: &mut sqlx::PgConnection,
    event: &PaymentEvent,
    wallet_id: Uuid,
) -> Result<Outcome, AppError> {
    let wallet = sqlx::query_as::<_, Wallet>(
        r#"
        SELECT id, user_id, balance, created_at, updated_at
        FROM wallets
        WHERE id = $1 AND state = 'active'
        FOR UPDATE
        "#,
    )
    .bind(wallet_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Wallet"))?;

    if wallet_credit_exists(conn, &event.reference).await? {
        return Ok(Outcome::Duplicate);
    }

    credit_wallet(conn, &wallet, event.amount, &event.reference, WalletTrigger::TopUp).await?;

    Ok(Outcome::Applied(TransactionType::FundWallet))
}

async fn credit_wallet(
    conn: &mut sqlx::PgConnection,
    wallet: &Wallet,
    amount: i64,
    reference: &str,
    trigger: WalletTrigger,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE wallets SET balance = balance + $1, updated_at = NOW() WHERE id = $2")
        .bind(amount)
        .bind(wallet.id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO wallet_transactions (
            wallet_id,
            amount,
            reference,
            transaction_type,
            transaction_trigger
        )
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(wallet.id)
    .bind(amount)
    .bind(reference)
    .bind(WalletEntryType::Credit.as_str())
    .bind(trigger.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn save_card(
    conn: &mut sqlx::PgConnection,
    user_id: Uuid,
    card: &CardAuthorization,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO debit_cards (
            user_id,
            authorization_code,
            card_type,
            first_six,
            last_four,
            exp_month,
            exp_year,
            card_bank
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (authorization_code) DO UPDATE
        SET exp_month = EXCLUDED.exp_month,
            exp_year = EXCLUDED.exp_year,
            state = 'active',
            updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(&card.authorization_code)
    .bind(card.card_type.trim())
    .bind(&card.first_six)
    .bind(&card.last_four)
    .bind(&card.exp_month)
    .bind(&card.exp_year)
    .bind(&card.card_bank)
    .execute(conn)
    .await?;

    Ok(())
}

async fn lock_tudo(conn: &mut sqlx::PgConnection, key: TudoKey<'_>) -> Result<Option<Tudo>, sqlx::Error> {
    match key {
        TudoKey::ShareCode(code) => {
            sqlx::query_as::<_, Tudo>(
                "SELECT * FROM tudos WHERE share_code = $1 AND state = 'active' FOR UPDATE",
            )
            .bind(code)
            .fetch_optional(conn)
            .await
        }
        TudoKey::Id(id) => {
            sqlx::query_as::<_, Tudo>("SELECT * FROM tudos WHERE id = $1 AND state = 'active' FOR UPDATE")
                .bind(id)
                .fetch_optional(conn)
                .await
        }
    }
}

/// `table` is always one of the ledger tables named in this module.
async fn reference_exists(
    conn: &mut sqlx::PgConnection,
    table: &'static str,
    reference: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(&format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE reference = $1)"))
        .bind(reference)
        .fetch_one(conn)
        .await
}

async fn wallet_credit_exists(conn: &mut sqlx::PgConnection, reference: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM wallet_transactions WHERE reference = $1 AND transaction_type = 'CREDIT')",
    )
    .bind(reference)
    .fetch_one(conn)
    .await
}

/// Successful contributions and top-ups across every tudo the user owns.
async fn successful_contributions(conn: &mut sqlx::PgConnection, owner_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM tudo_contributions c
        JOIN tudos t ON t.id = c.tudo_id
        WHERE t.user_id = $1 AND c.status = 'SUCCESS'
        "#,
    )
    .bind(owner_id)
    .fetch_one(conn)
    .await
}

/// Credit whoever invited `invitee` for the invitee's first successful payment.
async fn reward_inviter(
    conn: &mut sqlx::PgConnection,
    invitee: &User,
    reward: RewardType,
    outbox: &mut Outbox,
) -> Result<(), sqlx::Error> {
    if invitee.kind() != AccountType::Personal {
        return Ok(());
    }
    let Some(inviter_id) = invitee.invited_by else {
        return Ok(());
    };

    let credited = sqlx::query("UPDATE users SET points = points + $1, updated_at = NOW() WHERE id = $2")
        .bind(reward.points())
        .bind(inviter_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if credited == 0 {
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO rewards (inviter_id, invitee_id, reward_type, points) VALUES ($1, $2, $3, $4)",
    )
    .bind(inviter_id)
    .bind(invitee.id)
    .bind(reward.as_str())
    .bind(reward.points())
    .execute(&mut *conn)
    .await?;

    outbox.push(referral_push(inviter_id, invitee, reward));
    Ok(())
}

/// Status after money lands on a tudo. Reaching the target makes it withdrawable again,
/// including a tudo that was already paid out.
pub fn status_after_credit(current: TudoStatus, generated: i64, target: i64) -> TudoStatus {
    match current {
        TudoStatus::ProcessingWithdrawal => current,
        _ if generated >= target => TudoStatus::Completed,
        other => other,
    }
}

/// Card charges are credited net of gateway fees, never below zero.
pub fn net_of_fees(amount: i64, fees: i64) -> i64 {
    (amount - fees.max(0)).max(0)
}

/// In-app notification and queued jobs for a tudo credit.
#[derive(Debug)]
pub struct TudoCreditNotices {
    pub in_app: NewNotification,
    pub jobs: Vec<NotificationJob>,
}

pub fn tudo_credit_notices(
    owner: &User,
    tudo: &Tudo,
    credit: &TudoCredit<'_>,
    amount: i64,
    goal_reached: bool,
) -> TudoCreditNotices {
    let name = owner.display_name();
    let amount_text = format_amount(&tudo.currency, amount);
    let push_data = json!({ "goal_id": tudo.id, "goal_type": "personal" });
    let personal = owner.kind() == AccountType::Personal;
    let mut jobs = Vec::new();

    let in_app = if goal_reached {
        let text = format!(
            "Congratulations {name}, your goal '{}' has been achieved!",
            tudo.goal_name
        );
        jobs.push(NotificationJob::email(
            &owner.email,
            "Your Tudo goal has been reached",
            text.clone(),
        ));
        if personal {
            jobs.push(NotificationJob::push(owner.id, "Goal Smashed", text.clone(), push_data));
        }
        NewNotification {
            user_id: owner.id,
            summary: "Tudo goal reached notification".to_string(),
            notification_text: text,
            actor_name: Some(name.to_string()),
        }
    } else {
        let (summary, title, text) = match credit.contribution_type {
            ContributionType::UserContribution => (
                "Tudo contribution notification",
                "Goal Contribution Received",
                format!(
                    "Hello {name}, {amount_text} was contributed by {} to your tudo '{}'",
                    credit.contributor_name, tudo.goal_name
                ),
            ),
            ContributionType::TopUp => (
                "Tudo top-up notification",
                "Goal Top-Up was Successful",
                format!("Hello {name}, you topped up '{}' with {amount_text}", tudo.goal_name),
            ),
        };
        if credit.contribution_type == ContributionType::UserContribution {
            jobs.push(NotificationJob::email(
                &owner.email,
                format!("New contribution to {}", tudo.goal_name),
                format!(
                    "{text}. Your tudo now has {} of its {} target.",
                    format_amount(&tudo.currency, tudo.amount_generated),
                    format_amount(&tudo.currency, tudo.amount)
                ),
            ));
        }
        if personal {
            jobs.push(NotificationJob::push(owner.id, title, text.clone(), push_data));
        }
        NewNotification {
            user_id: owner.id,
            summary: summary.to_string(),
            notification_text: text,
            actor_name: Some(credit.contributor_name.to_string()),
        }
    };

    TudoCreditNotices { in_app, jobs }
}

/// Push every personal member except the contributor.
pub fn group_contribution_pushes(
    group: &GroupTudo,
    members: &[GroupMember],
    contributor_id: Uuid,
    amount: i64,
) -> Vec<NotificationJob> {
    let contributor = members
        .iter()
        .find(|m| m.member_id == contributor_id)
        .map(|m| m.first_name.as_str())
        .unwrap_or("A member");
    let body = format!(
        "{contributor} has contributed {} to {} group goal",
        format_amount(&group.currency, amount),
        group.name
    );

    members
        .iter()
        .filter(|m| m.member_id != contributor_id)
        .filter(|m| m.account_type == AccountType::Personal.as_str())
        .map(|m| {
            NotificationJob::push(
                m.member_id,
                "Group Goal Contribution Received",
                body.clone(),
                json!({ "goal_id": group.id, "goal_type": "group" }),
            )
        })
        .collect()
}

fn referral_push(inviter_id: Uuid, invitee: &User, reward: RewardType) -> NotificationJob {
    NotificationJob::push(
        inviter_id,
        format!("{} Reward Point(s) Received", reward.points()),
        format!(
            "You earned {} points because {} {}",
            reward.points(),
            invitee.first_name,
            reward.action()
        ),
        json!({ "reward_type": reward.as_str() }),
    )
}
