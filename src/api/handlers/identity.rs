//! Identity bootstrap and credential-set endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;

use super::error_response;
use super::principal::require_identity;
use super::types::{
    CheckIdentityRequest, CheckIdentityResponse, IdentityResponse, LoginResponse, PinRequest,
    SetPasswordRequest,
};
use crate::auth::engine::{self, AuthState};

/// First-contact check. Creates the identity on a never-seen email and
/// dispatches an email code while the address is unverified.
#[utoipa::path(
    post,
    path = "/v1/auth/check-identity",
    request_body = CheckIdentityRequest,
    responses(
        (status = 200, description = "Verification flags", body = CheckIdentityResponse),
        (status = 400, description = "Malformed email", body = String)
    ),
    tag = "auth"
)]
pub async fn check_identity(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<CheckIdentityRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match engine::check_identity(&pool, &state, &request.email).await {
        Ok(flags) => (
            StatusCode::OK,
            Json(CheckIdentityResponse {
                email_verified: flags.email_verified,
                phone_verified: flags.phone_verified,
            }),
        )
            .into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

/// First-time password set; gated on a verified email under the strict
/// policy. Changing an existing password goes through the OTP reset.
#[utoipa::path(
    post,
    path = "/v1/auth/set-password",
    request_body = SetPasswordRequest,
    responses(
        (status = 200, description = "Password set, tokens issued", body = LoginResponse),
        (status = 400, description = "Missing email or password", body = String),
        (status = 404, description = "Unknown identity", body = String),
        (status = 409, description = "Password already set", body = String),
        (status = 412, description = "Email not verified", body = String)
    ),
    tag = "auth"
)]
pub async fn set_password(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<SetPasswordRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match engine::set_password(&pool, &state, &request.email, &request.password).await {
        Ok(outcome) => (StatusCode::OK, Json(LoginResponse::from(outcome))).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

/// First-time PIN set for the bearer identity.
#[utoipa::path(
    post,
    path = "/v1/auth/set-pin",
    request_body = PinRequest,
    responses(
        (status = 200, description = "PIN set", body = IdentityResponse),
        (status = 400, description = "Malformed PIN", body = String),
        (status = 401, description = "Bad token", body = String),
        (status = 409, description = "PIN already set", body = String)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn set_pin(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<PinRequest>>,
) -> impl IntoResponse {
    let identity = match require_identity(&headers, &pool, &state).await {
        Ok(identity) => identity,
        Err(response) => return response.into_response(),
    };
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match engine::set_pin(&pool, &state, &identity, &request.pin).await {
        Ok(profile) => {
            (StatusCode::OK, Json(IdentityResponse { identity: profile })).into_response()
        }
        Err(err) => error_response(&err).into_response(),
    }
}
