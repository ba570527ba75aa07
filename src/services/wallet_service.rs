//! Wallet service - balances, wallet-to-wallet and wallet-to-bank transfers.
//!
//! Every debit locks the wallet row with `SELECT ... FOR UPDATE` before reading the
//! balance. Transfers between two wallets lock both rows in id order so two opposite
//! transfers cannot deadlock.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, FieldErrors},
    models::{
        notification::format_amount,
        pagination::{Page, PageParams},
        payment::{Gateway, InitiatedPayment, PaymentIntent},
        wallet::{
            BankTransferRequest, FundWalletRequest, TransferReceipt, Wallet, WalletEntryType,
            WalletTransaction, WalletTransferRequest, WalletTrigger,
        },
    },
    services::{
        banking::{BankTransfer, TransferInstruction},
        intent_service, user_service,
    },
};

pub const MIN_WALLET_AMOUNT: i64 = 10_000;
pub const MAX_WALLET_AMOUNT: i64 = 500_000_000;

const BANK_CODE_LEN: usize = 6;
const MAX_ACCOUNT_NO_LEN: usize = 10;

/// Amount bounds shared by funding and both kinds of transfer.
pub fn validate_wallet_amount(field: &str, amount: i64) -> Result<(), AppError> {
    if !(MIN_WALLET_AMOUNT..=MAX_WALLET_AMOUNT).contains(&amount) {
        return Err(AppError::field(field, "Ensure amount is between N100 and N5m"));
    }
    Ok(())
}

/// Balance check run after the wallet row is locked.
pub fn ensure_funds(balance: i64, amount: i64) -> Result<(), AppError> {
    if amount > balance {
        return Err(AppError::InsufficientBalance(format!(
            "Your wallet does not have up to {} in it",
            format_amount("N", amount)
        )));
    }
    Ok(())
}

/// Field checks for a wallet-to-bank request.
pub fn validate_bank_transfer(request: &BankTransferRequest) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();

    if request.bank_code.chars().count() != BANK_CODE_LEN {
        errors
            .entry("bank_code".to_string())
            .or_default()
            .push(format!("Ensure this field has exactly {BANK_CODE_LEN} characters"));
    }
    let account_no = request.bank_account_no.trim();
    if account_no.is_empty() || account_no.chars().count() > MAX_ACCOUNT_NO_LEN {
        errors
            .entry("bank_account_no".to_string())
            .or_default()
            .push(format!(
                "Ensure this field has between 1 and {MAX_ACCOUNT_NO_LEN} characters"
            ));
    }
    if !(MIN_WALLET_AMOUNT..=MAX_WALLET_AMOUNT).contains(&request.transfer_amount) {
        errors
            .entry("transfer_amount".to_string())
            .or_default()
            .push("Ensure amount is between N100 and N5m".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// The user's wallet, created empty on first use.
pub async fn ensure_wallet(conn: &mut sqlx::PgConnection, user_id: Uuid) -> Result<Wallet, sqlx::Error> {
    sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query_as::<_, Wallet>(
        "SELECT id, user_id, balance, created_at, updated_at FROM wallets WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn wallet_balance(pool: &DbPool, user_id: Uuid) -> Result<Wallet, AppError> {
    let mut conn = pool.acquire().await?;
    Ok(ensure_wallet(&mut *conn, user_id).await?)
}

/// Move money from the caller's wallet to another user's wallet.
///
/// # Errors
///
/// - `Validation`: amount out of bounds, transfer to self, beneficiary has no wallet
/// - `InsufficientBalance`: the caller's balance is below the amount
pub async fn transfer_to_wallet(
    pool: &DbPool,
    user_id: Uuid,
    request: WalletTransferRequest,
) -> Result<TransferReceipt, AppError> {
    validate_wallet_amount("transfer_amount", request.transfer_amount)?;
    let amount = request.transfer_amount;
    let beneficiary_email = request.beneficiary_email.trim().to_lowercase();

    let mut tx = pool.begin().await?;

    let sender = user_service::find_user(&mut *tx, user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    if sender.email.to_lowercase() == beneficiary_email {
        return Err(AppError::field(
            "beneficiary_email",
            "Cannot make wallet transfers to yourself",
        ));
    }

    let no_wallet =
        || AppError::field("beneficiary_email", "Wallet account was not found for this user");

    let beneficiary = user_service::find_user_by_email(&mut *tx, &beneficiary_email)
        .await?
        .ok_or_else(no_wallet)?;
    let beneficiary_wallet_id: Uuid = sqlx::query_scalar(
        "SELECT id FROM wallets WHERE user_id = $1 AND state = 'active'",
    )
    .bind(beneficiary.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(no_wallet)?;

    let my_wallet_id = ensure_wallet(&mut *tx, user_id).await?.id;

    // Lock both rows, lowest id first
    let locked = sqlx::query_as::<_, Wallet>(
        r#"
        SELECT id, user_id, balance, created_at, updated_at
        FROM wallets
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(vec![my_wallet_id, beneficiary_wallet_id])
    .fetch_all(&mut *tx)
    .await?;

    let my_wallet = locked
        .iter()
        .find(|w| w.id == my_wallet_id)
        .ok_or(AppError::NotFound("Wallet"))?;
    ensure_funds(my_wallet.balance, amount)?;

    let reference = intent_service::new_reference();

    let my_balance: i64 = sqlx::query_scalar(
        "UPDATE wallets SET balance = balance - $1, updated_at = NOW() WHERE id = $2 RETURNING balance",
    )
    .bind(amount)
    .bind(my_wallet_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE wallets SET balance = balance + $1, updated_at = NOW() WHERE id = $2")
        .bind(amount)
        .bind(beneficiary_wallet_id)
        .execute(&mut *tx)
        .await?;

    for (wallet_id, entry) in [
        (my_wallet_id, WalletEntryType::Debit),
        (beneficiary_wallet_id, WalletEntryType::Credit),
    ] {
        record_entry(&mut *tx, wallet_id, amount, &reference, entry, WalletTrigger::WalletTransfer)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(%reference, from = %my_wallet_id, to = %beneficiary_wallet_id, amount, "wallet transfer");

    Ok(TransferReceipt {
        reference,
        amount_transfered: amount,
        my_wallet_balance: my_balance,
    })
}

/// Pay out of the caller's wallet to a bank account.
///
/// The wallet stays locked while the bank is called; it is only debited once the bank
/// accepts the transfer. A refused transfer rolls everything back.
pub async fn transfer_to_bank(
    pool: &DbPool,
    bank: &dyn BankTransfer,
    user_id: Uuid,
    request: BankTransferRequest,
) -> Result<TransferReceipt, AppError> {
    let mut tx = pool.begin().await?;

    let user = user_service::find_user(&mut *tx, user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    if user.bvn.as_deref().is_none_or(|bvn| bvn.trim().is_empty()) {
        return Err(AppError::InvalidRequest(
            "Kindly add your BVN number to your profile".to_string(),
        ));
    }

    validate_bank_transfer(&request)?;
    let amount = request.transfer_amount;

    let wallet_id = ensure_wallet(&mut *tx, user_id).await?.id;
    let balance: i64 = sqlx::query_scalar("SELECT balance FROM wallets WHERE id = $1 FOR UPDATE")
        .bind(wallet_id)
        .fetch_one(&mut *tx)
        .await?;
    ensure_funds(balance, amount)?;

    let reference = format!("tudo-{}", intent_service::new_reference());
    let instruction = TransferInstruction {
        amount,
        account_number: request.bank_account_no.trim().to_string(),
        bank_code: request.bank_code.clone(),
        reference: reference.clone(),
        remark: format!("Wallet Transfer from {}", user.first_name),
    };

    if let Err(e) = bank.transfer(&instruction).await {
        tracing::error!(%reference, %wallet_id, "wallet to bank transfer failed: {e}");
        tx.rollback().await?;
        return Err(AppError::ServiceUnavailable(
            "Unable to complete transaction".to_string(),
        ));
    }

    let my_balance: i64 = sqlx::query_scalar(
        "UPDATE wallets SET balance = balance - $1, updated_at = NOW() WHERE id = $2 RETURNING balance",
    )
    .bind(amount)
    .bind(wallet_id)
    .fetch_one(&mut *tx)
    .await?;

    record_entry(
        &mut *tx,
        wallet_id,
        amount,
        &reference,
        WalletEntryType::Debit,
        WalletTrigger::BankWithdrawal,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(%reference, %wallet_id, amount, "wallet to bank transfer");

    Ok(TransferReceipt {
        reference,
        amount_transfered: amount,
        my_wallet_balance: my_balance,
    })
}

/// Newest first.
pub async fn list_wallet_transactions(
    pool: &DbPool,
    user_id: Uuid,
    params: PageParams,
) -> Result<Page<WalletTransaction>, AppError> {
    let mut conn = pool.acquire().await?;
    let wallet = ensure_wallet(&mut *conn, user_id).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallet_transactions WHERE wallet_id = $1")
        .bind(wallet.id)
        .fetch_one(&mut *conn)
        .await?;

    let items = sqlx::query_as::<_, WalletTransaction>(
        r#"
        SELECT id, wallet_id, amount, reference, transaction_type, transaction_trigger, created_at
        FROM wallet_transactions
        WHERE wallet_id = $1
        ORDER BY created_at DESC, id
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(wallet.id)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(&mut *conn)
    .await?;

    Ok(Page {
        items,
        page: params.page(),
        page_size: params.page_size(),
        total,
    })
}

/// Record a FUND_WALLET intent; the wallet is credited when Paystack confirms the charge.
pub async fn initiate_wallet_funding(
    pool: &DbPool,
    intent_ttl_secs: i64,
    user_id: Uuid,
    request: FundWalletRequest,
) -> Result<InitiatedPayment, AppError> {
    validate_wallet_amount("amount", request.amount)?;

    let wallet = wallet_balance(pool, user_id).await?;

    intent_service::record_intent(
        pool,
        Gateway::Paystack,
        request.amount,
        "NGN",
        PaymentIntent::FundWallet {
            wallet_id: wallet.id,
        },
        intent_ttl_secs,
    )
    .await
}

async fn record_entry(
    conn: &mut sqlx::PgConnection,
    wallet_id: Uuid,
    amount: i64,
    reference: &str,
    entry: WalletEntryType,
    trigger: WalletTrigger,
) -> Result<(), sqlx::Error> {
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
    .bind(wallet_id)
    .bind(amount)
    .bind(reference)
    .bind(entry.as_str())
    .bind(trigger.as_str())
    .execute(conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::banking::testing::RecordingBank,
        test_helpers::{count_rows, create_user, create_wallet},
    };

    fn bank_request(bank_code: &str, account_no: &str, amount: i64) -> BankTransferRequest {
        BankTransferRequest {
            bank_code: bank_code.to_string(),
            bank_account_no: account_no.to_string(),
            transfer_amount: amount,
        }
    }

    #[test]
    fn amount_bounds_are_inclusive() {
        assert!(validate_wallet_amount("amount", MIN_WALLET_AMOUNT).is_ok());
        assert!(validate_wallet_amount("amount", MAX_WALLET_AMOUNT).is_ok());
        assert!(validate_wallet_amount("amount", MIN_WALLET_AMOUNT - 1).is_err());
        assert!(validate_wallet_amount("amount", MAX_WALLET_AMOUNT + 1).is_err());
    }

    #[test]
    fn insufficient_funds_names_the_amount() {
        let err = ensure_funds(10_000, 250_000).unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance(_)));
        assert_eq!(err.to_string(), "Your wallet does not have up to N2,500.00 in it");
    }

    #[test]
    fn exact_balance_is_enough() {
        assert!(ensure_funds(250_000, 250_000).is_ok());
    }

    #[test]
    fn bank_code_must_be_six_characters() {
        let err = validate_bank_transfer(&bank_request("0001", "0123456789", 50_000)).unwrap_err();
        match err {
            AppError::Validation(fields) => {
                assert!(fields.contains_key("bank_code"));
                assert!(!fields.contains_key("bank_account_no"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn collects_every_bad_field() {
        let err = validate_bank_transfer(&bank_request("1", "01234567890", 5)).unwrap_err();
        match err {
            AppError::Validation(fields) => assert_eq!(fields.len(), 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn accepts_a_well_formed_bank_transfer() {
        assert!(validate_bank_transfer(&bank_request("000013", "0123456789", 50_000)).is_ok());
    }

    const ENTRIES_BY_WALLET: &str = "SELECT COUNT(*) FROM wallet_transactions WHERE wallet_id = $1";

    async fn balance_of(pool: &DbPool, wallet_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT balance FROM wallets WHERE id = $1")
            .bind(wallet_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn refused_bank_transfer_leaves_the_wallet_untouched(pool: sqlx::PgPool) {
        let user_id = create_user(&pool, "ada@example.com", Some("22212345678")).await;
        let wallet_id = create_wallet(&pool, user_id, 1_000_000).await;
        let bank = RecordingBank::rejecting();

        let result = transfer_to_bank(&pool, &bank, user_id, bank_request("000013", "0123456789", 250_000)).await;

        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
        assert_eq!(balance_of(&pool, wallet_id).await, 1_000_000);
        assert_eq!(count_rows(&pool, ENTRIES_BY_WALLET, wallet_id).await, 0);
        assert_eq!(bank.instructions().len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn accepted_bank_transfer_debits_once(pool: sqlx::PgPool) {
        let user_id = create_user(&pool, "ada@example.com", Some("22212345678")).await;
        let wallet_id = create_wallet(&pool, user_id, 1_000_000).await;
        let bank = RecordingBank::accepting();

        let receipt = transfer_to_bank(&pool, &bank, user_id, bank_request("000013", "0123456789", 250_000))
            .await
            .unwrap();

        assert_eq!(receipt.my_wallet_balance, 750_000);
        assert_eq!(balance_of(&pool, wallet_id).await, 750_000);

        let (entry_type, trigger): (String, String) = sqlx::query_as(
            "SELECT transaction_type, transaction_trigger FROM wallet_transactions WHERE wallet_id = $1",
        )
        .bind(wallet_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(entry_type, WalletEntryType::Debit.as_str());
        assert_eq!(trigger, WalletTrigger::BankWithdrawal.as_str());
        assert_eq!(bank.instructions()[0].reference, receipt.reference);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn short_wallet_never_reaches_the_bank(pool: sqlx::PgPool) {
        let user_id = create_user(&pool, "ada@example.com", Some("22212345678")).await;
        let wallet_id = create_wallet(&pool, user_id, 20_000).await;
        let bank = RecordingBank::accepting();

        let result = transfer_to_bank(&pool, &bank, user_id, bank_request("000013", "0123456789", 250_000)).await;

        assert!(matches!(result, Err(AppError::InsufficientBalance(_))));
        assert!(bank.instructions().is_empty());
        assert_eq!(balance_of(&pool, wallet_id).await, 20_000);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn wallet_transfer_moves_money_between_wallets(pool: sqlx::PgPool) {
        let sender = create_user(&pool, "ada@example.com", None).await;
        let beneficiary = create_user(&pool, "chidi@example.com", None).await;
        let sender_wallet = create_wallet(&pool, sender, 500_000).await;
        let beneficiary_wallet = create_wallet(&pool, beneficiary, 0).await;

        let request = WalletTransferRequest {
            beneficiary_email: "chidi@example.com".to_string(),
            transfer_amount: 200_000,
        };
        let receipt = transfer_to_wallet(&pool, sender, request).await.unwrap();

        assert_eq!(receipt.my_wallet_balance, 300_000);
        assert_eq!(balance_of(&pool, beneficiary_wallet).await, 200_000);
        assert_eq!(count_rows(&pool, ENTRIES_BY_WALLET, sender_wallet).await, 1);
        assert_eq!(count_rows(&pool, ENTRIES_BY_WALLET, beneficiary_wallet).await, 1);
    }
}
