//! Tudo HTTP handlers.
//!
//! - POST /api/v1/tudos - Create a tudo
//! - GET /api/v1/tudos/{id} - Get one of the caller's tudos
//! - GET /api/v1/tudos/{id}/transactions - Contribution and withdrawal history
//! - POST /api/v1/tudos/topup - Start a top-up checkout
//! - POST /api/v1/tudos/withdraw - Withdraw a completed tudo to a bank account
//! - POST /api/v1/tudos/contribute - Start a contribution checkout (public)

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        pagination::Page,
        payment::InitiatedPayment,
        tudo::{
            ContributeRequest, CreateTudoRequest, TopUpRequest, TransactionsQuery, TudoResponse,
            TudoTransactionEntry, WithdrawRequest, WithdrawalSummary,
        },
    },
    services::{tudo_service, withdrawal_service},
    state::AppState,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Create a tudo.
///
/// # Request Body
///
/// ```json
/// { "goal_name": "New laptop", "amount": 45000000, "currency": "NGN", "duration_days": 60 }
/// ```
///
/// # Response
///
/// - **201 Created**: the new tudo, including its `share_code`
/// - **400**: field errors for `goal_name`, `amount` or `duration_days`
pub async fn create_tudo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateTudoRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tudo = tudo_service::create_tudo(&state.pool, auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(TudoResponse::from(tudo))))
}

pub async fn get_tudo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(tudo_id): Path<Uuid>,
) -> Result<Json<TudoResponse>, AppError> {
    let tudo = tudo_service::get_tudo(&state.pool, auth.user_id, tudo_id).await?;
    Ok(Json(tudo.into()))
}

/// `?type=contributions|topups|withdrawals|all&sort=-date&page=1&page_size=7`
pub async fn list_tudo_transactions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(tudo_id): Path<Uuid>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Page<TudoTransactionEntry>>, AppError> {
    let page = tudo_service::tudo_transactions(&state.pool, auth.user_id, tudo_id, query).await?;
    Ok(Json(page))
}

/// Returns the reference and metadata the client passes to Paystack checkout.
pub async fn topup_tudo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<TopUpRequest>,
) -> Result<Json<InitiatedPayment>, AppError> {
    let payment = tudo_service::initiate_topup(
        &state.pool,
        state.config.payment_intent_ttl_secs,
        auth.user_id,
        request,
    )
    .await?;
    Ok(Json(payment))
}

/// Withdraw a completed tudo.
///
/// # Response
///
/// - **200 OK**: [`WithdrawalSummary`] with gross, net and service charge
/// - **400**: unknown tudo or bank account, tudo paid or locked, less than NGN100 available
/// - **503**: the bank transfer failed; the tudo is released for another attempt
pub async fn withdraw_tudo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<WithdrawRequest>,
) -> Result<Json<WithdrawalSummary>, AppError> {
    let summary = withdrawal_service::withdraw_tudo(
        &state.pool,
        state.bank.as_ref(),
        &state.notifier,
        state.config.service_charge_bps,
        auth.user_id,
        request,
    )
    .await?;
    Ok(Json(summary))
}

/// Start a contribution checkout. No authentication.
///
/// `scope: "local"` pays through Paystack, `"international"` (default) through Flutterwave.
pub async fn contribute(
    State(state): State<AppState>,
    Json(request): Json<ContributeRequest>,
) -> Result<Json<InitiatedPayment>, AppError> {
    let payment =
        tudo_service::initiate_contribution(&state.pool, state.config.payment_intent_ttl_secs, request)
            .await?;
    Ok(Json(payment))
}
