//! Bearer token guard for identity-scoped routes.

use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use sqlx::PgPool;

use super::error_response;
use crate::auth::engine::{self, AuthState};
use crate::auth::identity::Identity;

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the `Authorization` header into a live identity, or the error
/// response the handler should return as-is.
pub(crate) async fn require_identity(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
) -> Result<Identity, (StatusCode, String)> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err((
            StatusCode::UNAUTHORIZED,
            "You are not logged in".to_string(),
        ));
    };
    engine::authorize(pool, state, &token)
        .await
        .map_err(|err| error_response(&err))
}
