//! Row fixtures for `#[sqlx::test]` tests. Each test gets a fresh, migrated database.

use uuid::Uuid;

use crate::{
    db::DbPool,
    models::{
        payment::{Gateway, PaymentEvent, PaymentIntent},
        tudo::Tudo,
    },
};

pub async fn create_user(pool: &DbPool, email: &str, bvn: Option<&str>) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO users (first_name, last_name, email, bvn) VALUES ('Ada', 'Obi', $1, $2) RETURNING id",
    )
    .bind(email)
    .bind(bvn)
    .fetch_one(pool)
    .await
    .expect("insert user")
}

pub async fn create_bank_account(pool: &DbPool, user_id: Uuid) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO bank_accounts (user_id, bank_code, account_name, account_number, bank_name)
        VALUES ($1, '000013', 'Ada Obi', '0123456789', 'GTBank')
        RETURNING id
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("insert bank account")
}

/// A tudo whose deadline is `days_left` days away (negative for one already passed).
pub async fn create_tudo(
    pool: &DbPool,
    user_id: Uuid,
    target: i64,
    generated: i64,
    withdrawn: i64,
    status: &str,
    days_left: i64,
) -> Tudo {
    let share_code = Uuid::new_v4().simple().to_string()[..10].to_string();
    sqlx::query_as::<_, Tudo>(
        r#"
        INSERT INTO tudos (
            user_id,
            goal_name,
            amount,
            amount_generated,
            amount_withdrawn,
            status,
            share_code,
            duration_days,
            completion_date
        )
        VALUES ($1, 'Laptop', $2, $3, $4, $5, $6, 30, NOW() + make_interval(days => $7))
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(target)
    .bind(generated)
    .bind(withdrawn)
    .bind(status)
    .bind(share_code)
    .bind(days_left as i32)
    .fetch_one(pool)
    .await
    .expect("insert tudo")
}

pub async fn find_tudo(pool: &DbPool, id: Uuid) -> Tudo {
    sqlx::query_as::<_, Tudo>("SELECT * FROM tudos WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("select tudo")
}

pub async fn create_wallet(pool: &DbPool, user_id: Uuid, balance: i64) -> Uuid {
    sqlx::query_scalar("INSERT INTO wallets (user_id, balance) VALUES ($1, $2) RETURNING id")
        .bind(user_id)
        .bind(balance)
        .fetch_one(pool)
        .await
        .expect("insert wallet")
}

pub async fn count_rows(pool: &DbPool, sql: &str, id: Uuid) -> i64 {
    sqlx::query_scalar(sql)
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("count rows")
}

/// Verified Paystack charge paying into the tudo with `share_code`.
pub fn contribution_event(share_code: &str, reference: &str, amount: i64) -> PaymentEvent {
    PaymentEvent {
        gateway: Gateway::Paystack,
        reference: reference.to_string(),
        amount,
        fees: 0,
        currency: "NGN".to_string(),
        customer_email: Some("chidi@example.com".to_string()),
        intent: PaymentIntent::TudoContribution {
            tudo_code: share_code.to_string(),
            contributor_name: "Chidi".to_string(),
            contributor_email: "chidi@example.com".to_string(),
        },
        authorization: None,
    }
}
