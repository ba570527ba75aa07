//! Tudo service - creating tudos and starting the checkouts that fund them.
//!
//! Money only enters a tudo through reconciliation. This module records the payment
//! intents those webhooks are matched against, and reads back the resulting history.

use chrono::{Duration, Utc};
use rand::{Rng, distr::Alphanumeric};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, FieldErrors},
    models::{
        pagination::{Page, PageParams},
        payment::{Gateway, InitiatedPayment, PaymentIntent},
        tudo::{
            ContributeRequest, ContributionScope, ContributionType, CreateTudoRequest, Currency,
            TopUpRequest, TransactionFilter, TransactionsQuery, Tudo, TudoContribution, TudoStatus,
            TudoTransactionEntry, TudoWithdrawal,
        },
    },
    services::intent_service,
};

pub const SHARE_CODE_LEN: usize = 10;
pub const MAX_GOAL_NAME_LEN: usize = 100;
pub const ALLOWED_DURATIONS: [i32; 3] = [30, 60, 90];

/// NGN contributions and top-ups: NGN100 to NGN9,999,999.
pub const MIN_NGN_AMOUNT: i64 = 10_000;
pub const MAX_NGN_AMOUNT: i64 = 999_999_900;

/// Contributions in any other currency: 1 to 1000 major units.
pub const MIN_FOREIGN_AMOUNT: i64 = 100;
pub const MAX_FOREIGN_AMOUNT: i64 = 100_000;

const SHARE_CODE_ATTEMPTS: usize = 3;

pub fn validate_new_tudo(request: &CreateTudoRequest) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();

    let name_len = request.goal_name.trim().chars().count();
    if name_len == 0 || name_len > MAX_GOAL_NAME_LEN {
        errors.entry("goal_name".to_string()).or_default().push(format!(
            "Ensure this field has between 1 and {MAX_GOAL_NAME_LEN} characters"
        ));
    }
    if request.amount <= 0 {
        errors
            .entry("amount".to_string())
            .or_default()
            .push("Amount must be greater than zero".to_string());
    }
    if !ALLOWED_DURATIONS.contains(&request.duration_days) {
        errors
            .entry("duration_days".to_string())
            .or_default()
            .push("Duration must be 30, 60 or 90 days".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

pub fn validate_contribution_amount(currency: Currency, amount: i64) -> Result<(), AppError> {
    match currency {
        Currency::Ngn if !(MIN_NGN_AMOUNT..=MAX_NGN_AMOUNT).contains(&amount) => Err(
            AppError::field("amount", "Contribution should be within NGN100 and NGN9.9m"),
        ),
        Currency::Ngn => Ok(()),
        other if !(MIN_FOREIGN_AMOUNT..=MAX_FOREIGN_AMOUNT).contains(&amount) => {
            let cur = other.as_str();
            Err(AppError::field(
                "amount",
                format!("Only amounts from {cur}100 to {cur}1000 are allowed"),
            ))
        }
        _ => Ok(()),
    }
}

/// Tudos that stopped accepting money.
pub fn ensure_accepts_payments(field: &str, status: TudoStatus) -> Result<(), AppError> {
    match status {
        TudoStatus::Running => Ok(()),
        TudoStatus::Paid => Err(AppError::field(field, "Tudo already paid")),
        TudoStatus::Completed | TudoStatus::ProcessingWithdrawal => {
            Err(AppError::field(field, "Tudo already completed"))
        }
    }
}

pub fn gateway_for(scope: ContributionScope) -> Gateway {
    match scope {
        ContributionScope::Local => Gateway::Paystack,
        ContributionScope::International => Gateway::Flutterwave,
    }
}

pub fn generate_share_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_CODE_LEN)
        .map(char::from)
        .collect()
}

fn anonymous_email() -> String {
    format!("{}@mytudo.com", Uuid::new_v4().simple())
}

pub async fn create_tudo(
    pool: &DbPool,
    user_id: Uuid,
    request: CreateTudoRequest,
) -> Result<Tudo, AppError> {
    validate_new_tudo(&request)?;

    let completion_date = Utc::now() + Duration::days(i64::from(request.duration_days));
    let goal_description = request
        .goal_description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = sqlx::query_as::<_, Tudo>(
            r#"
            INSERT INTO tudos (
                user_id,
                goal_name,
                goal_description,
                amount,
                currency,
                share_code,
                duration_days,
                completion_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(request.goal_name.trim())
        .bind(goal_description)
        .bind(request.amount)
        .bind(request.currency.as_str())
        .bind(generate_share_code())
        .bind(request.duration_days)
        .bind(completion_date)
        .fetch_one(pool)
        .await;

        match result {
            Ok(tudo) => {
                tracing::info!(tudo_id = %tudo.id, %user_id, share_code = %tudo.share_code, "tudo created");
                return Ok(tudo);
            }
            Err(sqlx::Error::Database(db))
                if db.is_unique_violation() && attempt < SHARE_CODE_ATTEMPTS =>
            {
                tracing::warn!(attempt, "share code collision, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

pub async fn get_tudo(pool: &DbPool, user_id: Uuid, tudo_id: Uuid) -> Result<Tudo, AppError> {
    sqlx::query_as::<_, Tudo>(
        "SELECT * FROM tudos WHERE id = $1 AND user_id = $2 AND state = 'active'",
    )
    .bind(tudo_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Tudo"))
}

/// Start a contribution checkout for the tudo behind a share code. No login required.
pub async fn initiate_contribution(
    pool: &DbPool,
    intent_ttl_secs: i64,
    request: ContributeRequest,
) -> Result<InitiatedPayment, AppError> {
    let tudo = sqlx::query_as::<_, Tudo>(
        "SELECT * FROM tudos WHERE share_code = $1 AND state = 'active'",
    )
    .bind(request.tudo_code.trim())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::field_not_found("tudo_code", "Tudo not found"))?;

    ensure_accepts_payments("tudo_code", tudo.status())?;
    validate_contribution_amount(tudo.currency(), request.amount)?;

    let contributor_name = request
        .contributor_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "Anonymous Contributor".to_string());
    let contributor_email = request
        .contributor_email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(anonymous_email);

    intent_service::record_intent(
        pool,
        gateway_for(request.scope),
        request.amount,
        &tudo.currency,
        PaymentIntent::TudoContribution {
            tudo_code: tudo.share_code,
            contributor_name,
            contributor_email,
        },
        intent_ttl_secs,
    )
    .await
}

/// Start a Paystack checkout for the owner topping up their own tudo.
pub async fn initiate_topup(
    pool: &DbPool,
    intent_ttl_secs: i64,
    user_id: Uuid,
    request: TopUpRequest,
) -> Result<InitiatedPayment, AppError> {
    if !(MIN_NGN_AMOUNT..=MAX_NGN_AMOUNT).contains(&request.topup_amount) {
        return Err(AppError::field(
            "topup_amount",
            "Top up should be within NGN100 and NGN9.9m",
        ));
    }

    let tudo = sqlx::query_as::<_, Tudo>(
        "SELECT * FROM tudos WHERE id = $1 AND user_id = $2 AND state = 'active'",
    )
    .bind(request.tudo_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::field_not_found("tudo_id", "Tudo not found"))?;

    ensure_accepts_payments("tudo_id", tudo.status())?;

    intent_service::record_intent(
        pool,
        Gateway::Paystack,
        request.topup_amount,
        &tudo.currency,
        PaymentIntent::TudoTopup { tudo_id: tudo.id },
        intent_ttl_secs,
    )
    .await
}

/// Contributions, top-ups and withdrawals of one tudo, merged by date.
pub async fn tudo_transactions(
    pool: &DbPool,
    user_id: Uuid,
    tudo_id: Uuid,
    query: TransactionsQuery,
) -> Result<Page<TudoTransactionEntry>, AppError> {
    let tudo = get_tudo(pool, user_id, tudo_id).await?;
    let filter = TransactionFilter::parse(query.kind.as_deref());
    let params = PageParams::new(query.page, query.page_size);

    let contributions = if filter.includes_contributions() {
        sqlx::query_as::<_, TudoContribution>(
            r#"
            SELECT * FROM tudo_contributions
            WHERE tudo_id = $1 AND status = 'SUCCESS' AND state = 'active'
            "#,
        )
        .bind(tudo.id)
        .fetch_all(pool)
        .await?
    } else {
        Vec::new()
    };

    let withdrawals = if filter.includes_withdrawals() {
        sqlx::query_as::<_, TudoWithdrawal>(
            "SELECT * FROM tudo_withdrawals WHERE tudo_id = $1 AND state = 'active'",
        )
        .bind(tudo.id)
        .fetch_all(pool)
        .await?
    } else {
        Vec::new()
    };

    let descending = query.sort.as_deref() == Some("-date");
    let history = merge_history(contributions, withdrawals, filter, descending);

    Ok(Page::from_vec(history, params))
}

/// Apply the type filter and order by date. Ties keep their input order.
pub fn merge_history(
    contributions: Vec<TudoContribution>,
    withdrawals: Vec<TudoWithdrawal>,
    filter: TransactionFilter,
    descending: bool,
) -> Vec<TudoTransactionEntry> {
    let wanted_type = match filter {
        TransactionFilter::Contributions => Some(ContributionType::UserContribution),
        TransactionFilter::TopUps => Some(ContributionType::TopUp),
        _ => None,
    };

    let mut entries: Vec<TudoTransactionEntry> = contributions
        .into_iter()
        .filter(|_| filter.includes_contributions())
        .filter(|c| wanted_type.is_none_or(|t| c.contribution_type == t.as_str()))
        .map(TudoTransactionEntry::from)
        .chain(
            withdrawals
                .into_iter()
                .filter(|_| filter.includes_withdrawals())
                .map(TudoTransactionEntry::from),
        )
        .collect();

    if descending {
        entries.sort_by_key(|e| std::cmp::Reverse(e.created_at()));
    } else {
        entries.sort_by_key(TudoTransactionEntry::created_at);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, 12, 0, 0).unwrap()
    }

    fn contribution(kind: ContributionType, d: u32) -> TudoContribution {
        TudoContribution {
            id: Uuid::new_v4(),
            tudo_id: Uuid::nil(),
            contributor_name: "Chidi".to_string(),
            contributor_email: "chidi@example.com".to_string(),
            amount: 50_000,
            currency: "NGN".to_string(),
            reference: format!("ref-{d}"),
            contribution_type: kind.as_str().to_string(),
            status: "SUCCESS".to_string(),
            created_at: day(d),
        }
    }

    fn withdrawal(d: u32) -> TudoWithdrawal {
        TudoWithdrawal {
            id: Uuid::new_v4(),
            tudo_id: Uuid::nil(),
            user_id: Uuid::nil(),
            bank_account_id: Uuid::nil(),
            amount: 95_000,
            service_charge: 5_000,
            currency: "NGN".to_string(),
            reference: format!("tudo-{d}"),
            created_at: day(d),
        }
    }

    fn history(filter: TransactionFilter, descending: bool) -> Vec<TudoTransactionEntry> {
        merge_history(
            vec![
                contribution(ContributionType::UserContribution, 3),
                contribution(ContributionType::TopUp, 1),
            ],
            vec![withdrawal(2)],
            filter,
            descending,
        )
    }

    fn request(name: &str, amount: i64, duration_days: i32) -> CreateTudoRequest {
        CreateTudoRequest {
            goal_name: name.to_string(),
            goal_description: None,
            amount,
            currency: Currency::Ngn,
            duration_days,
        }
    }

    #[test]
    fn history_is_ascending_by_default() {
        let dates: Vec<_> = history(TransactionFilter::All, false)
            .iter()
            .map(TudoTransactionEntry::created_at)
            .collect();
        assert_eq!(dates, vec![day(1), day(2), day(3)]);
    }

    #[test]
    fn minus_date_sorts_newest_first() {
        let first = &history(TransactionFilter::All, true)[0];
        assert_eq!(first.created_at(), day(3));
    }

    #[test]
    fn topups_filter_keeps_only_topups() {
        let entries = history(TransactionFilter::TopUps, false);
        assert_eq!(entries.len(), 1);
        assert!(matches!(
            &entries[0],
            TudoTransactionEntry::Contribution { contribution_type, .. } if contribution_type == "TOPUP"
        ));
    }

    #[test]
    fn withdrawals_filter_drops_contributions() {
        let entries = history(TransactionFilter::Withdrawals, false);
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0], TudoTransactionEntry::Withdrawal { .. }));
    }

    #[test]
    fn unknown_filter_is_empty() {
        assert!(history(TransactionFilter::Unknown, false).is_empty());
    }

    #[test]
    fn ngn_contribution_bounds() {
        assert!(validate_contribution_amount(Currency::Ngn, MIN_NGN_AMOUNT).is_ok());
        assert!(validate_contribution_amount(Currency::Ngn, MAX_NGN_AMOUNT).is_ok());

        let err = validate_contribution_amount(Currency::Ngn, 9_999).unwrap_err();
        match err {
            AppError::Validation(fields) => assert_eq!(
                fields["amount"][0],
                "Contribution should be within NGN100 and NGN9.9m"
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn foreign_contribution_message_names_the_currency() {
        assert!(validate_contribution_amount(Currency::Usd, 100_000).is_ok());

        let err = validate_contribution_amount(Currency::Usd, 100_001).unwrap_err();
        match err {
            AppError::Validation(fields) => assert_eq!(
                fields["amount"][0],
                "Only amounts from USD100 to USD1000 are allowed"
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn closed_tudos_reject_payments() {
        assert!(ensure_accepts_payments("tudo_code", TudoStatus::Running).is_ok());
        assert!(ensure_accepts_payments("tudo_code", TudoStatus::Completed).is_err());
        assert!(ensure_accepts_payments("tudo_code", TudoStatus::Paid).is_err());
    }

    #[test]
    fn local_scope_uses_paystack() {
        assert_eq!(gateway_for(ContributionScope::Local), Gateway::Paystack);
        assert_eq!(gateway_for(ContributionScope::International), Gateway::Flutterwave);
    }

    #[test]
    fn share_codes_are_ten_alphanumerics() {
        let code = generate_share_code();
        assert_eq!(code.len(), SHARE_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn new_tudo_validation() {
        assert!(validate_new_tudo(&request("Laptop", 45_000_000, 60)).is_ok());

        match validate_new_tudo(&request("  ", 0, 45)).unwrap_err() {
            AppError::Validation(fields) => {
                assert!(fields.contains_key("goal_name"));
                assert!(fields.contains_key("amount"));
                assert!(fields.contains_key("duration_days"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
