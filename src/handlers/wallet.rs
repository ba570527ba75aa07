//! Wallet HTTP handlers.
//!
//! - GET /api/v1/wallet/balance
//! - GET /api/v1/wallet/transactions
//! - POST /api/v1/wallet/fund
//! - POST /api/v1/wallet/transfer
//! - POST /api/v1/wallet/bank-transfer

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        pagination::{Page, PageParams},
        payment::InitiatedPayment,
        wallet::{
            BankTransferRequest, FundWalletRequest, TransferReceipt, WalletBalanceResponse,
            WalletTransaction, WalletTransferRequest,
        },
    },
    services::wallet_service,
    state::AppState,
};
use axum::{
    Extension, Json,
    extract::{Query, State},
};

pub async fn get_balance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<WalletBalanceResponse>, AppError> {
    let wallet = wallet_service::wallet_balance(&state.pool, auth.user_id).await?;
    Ok(Json(wallet.into()))
}

/// Newest first, seven per page unless `page_size` says otherwise.
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<WalletTransaction>>, AppError> {
    let page = wallet_service::list_wallet_transactions(&state.pool, auth.user_id, params).await?;
    Ok(Json(page))
}

pub async fn fund_wallet(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<FundWalletRequest>,
) -> Result<Json<InitiatedPayment>, AppError> {
    let payment = wallet_service::initiate_wallet_funding(
        &state.pool,
        state.config.payment_intent_ttl_secs,
        auth.user_id,
        request,
    )
    .await?;
    Ok(Json(payment))
}

/// Wallet-to-wallet transfer.
///
/// # Request Body
///
/// ```json
/// { "beneficiary_email": "tola@example.com", "transfer_amount": 250000 }
/// ```
///
/// # Response
///
/// - **200 OK**: [`TransferReceipt`]
/// - **400**: amount out of bounds, self transfer, unknown beneficiary
/// - **422**: insufficient balance
pub async fn transfer_to_wallet(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<WalletTransferRequest>,
) -> Result<Json<TransferReceipt>, AppError> {
    let receipt = wallet_service::transfer_to_wallet(&state.pool, auth.user_id, request).await?;
    Ok(Json(receipt))
}

pub async fn transfer_to_bank(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<BankTransferRequest>,
) -> Result<Json<TransferReceipt>, AppError> {
    let receipt =
        wallet_service::transfer_to_bank(&state.pool, state.bank.as_ref(), auth.user_id, request)
            .await?;
    Ok(Json(receipt))
}
