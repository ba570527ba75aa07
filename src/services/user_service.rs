//! Lookups on users and their bank accounts shared by the ledger services.

use uuid::Uuid;

use crate::models::user::{BankAccount, User};

pub async fn find_user(conn: &mut sqlx::PgConnection, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND state = 'active'")
        .bind(user_id)
        .fetch_optional(conn)
        .await
}

/// Case-insensitive e-mail lookup.
pub async fn find_user_by_email(
    conn: &mut sqlx::PgConnection,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE LOWER(email) = LOWER($1) AND state = 'active'",
    )
    .bind(email.trim())
    .fetch_optional(conn)
    .await
}

/// Bank account owned by `user_id`.
pub async fn find_bank_account(
    conn: &mut sqlx::PgConnection,
    user_id: Uuid,
    bank_account_id: Uuid,
) -> Result<Option<BankAccount>, sqlx::Error> {
    sqlx::query_as::<_, BankAccount>(
        r#"
        SELECT id, user_id, bank_code, account_name, account_number, bank_name
        FROM bank_accounts
        WHERE id = $1 AND user_id = $2 AND state = 'active'
        "#,
    )
    .bind(bank_account_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}
