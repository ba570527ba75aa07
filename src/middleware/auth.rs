//! Session token authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the session token from the Authorization header
//! 2. Hash it and look it up among active tokens of active users
//! 3. Inject an [`AuthContext`] into the request
//! 4. Reject unauthenticated requests with HTTP 401

use crate::{
    db::DbPool,
    error::AppError,
    models::user::{AccountType, SessionRecord},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Who made the request.
///
/// Inserted into the request's extensions; handlers take it with `Extension<AuthContext>`
/// and pass `user_id` down so every query is scoped to the caller.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub account_type: AccountType,
}

impl From<SessionRecord> for AuthContext {
    fn from(record: SessionRecord) -> Self {
        Self {
            user_id: record.user_id,
            account_type: record.account_type.parse().unwrap_or(AccountType::Personal),
        }
    }
}

/// SHA-256 hex of a raw session token, as stored in `auth_tokens.token_hash`.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Session authentication middleware function.
///
/// # Headers
///
/// ```text
/// Authorization: Bearer 9f2c4e...
/// ```
///
/// # Returns
///
/// - `Ok(Response)` from the next handler when the token is known and active
/// - `Err(AppError::Unauthorized)` otherwise (401)
pub async fn auth_middleware(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AppError::Unauthorized)?;

    let token_hash = hash_token(token);

    let session = sqlx::query_as::<_, SessionRecord>(
        r#"
        SELECT u.id AS user_id, u.account_type
        FROM auth_tokens t
        JOIN users u ON u.id = t.user_id
        WHERE t.token_hash = $1
          AND t.is_active = true
          AND u.is_active = true
          AND u.state = 'active'
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    let context = AuthContext::from(session);
    tracing::debug!(
        user_id = %context.user_id,
        account_type = %context.account_type,
        "session authenticated"
    );
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}
