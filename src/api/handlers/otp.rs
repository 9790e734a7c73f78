//! One-time code endpoints.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;
use std::sync::Arc;

use super::error_response;
use super::types::{AckResponse, SendOtpRequest, VerifyOtpRequest};
use crate::auth::engine::{self, AuthState};

/// Generate and dispatch a code. A repeat request for the same purpose
/// replaces the previous code.
#[utoipa::path(
    post,
    path = "/v1/auth/send-otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "Code dispatched", body = AckResponse),
        (status = 400, description = "Missing payload", body = String),
        (status = 404, description = "Unknown identity", body = String),
        (status = 409, description = "Phone number already verified", body = String),
        (status = 500, description = "Dispatch failed", body = String)
    ),
    tag = "otp"
)]
pub async fn send_otp(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<SendOtpRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match engine::request_otp(&pool, &state, &request.email, request.purpose).await {
        Ok(()) => (StatusCode::OK, Json(AckResponse::new("Code sent"))).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

/// Verify and consume a code. Consumption is exactly-once; a second
/// submission of the same code fails with 404.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code verified and consumed", body = AckResponse),
        (status = 400, description = "Missing or malformed fields", body = String),
        (status = 401, description = "Wrong or expired code", body = String),
        (status = 404, description = "Unknown identity or no active code", body = String)
    ),
    tag = "otp"
)]
pub async fn verify_otp(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match engine::verify_otp(
        &pool,
        &state,
        &request.email,
        request.purpose,
        &request.code,
        request.data.as_deref(),
    )
    .await
    {
        Ok(()) => (StatusCode::OK, Json(AckResponse::new("Code verified"))).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}
