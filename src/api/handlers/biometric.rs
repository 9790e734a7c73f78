//! Biometric key registration and challenge verification endpoints.

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
use super::types::{AckResponse, BiometricKeyRequest, BiometricVerifyRequest, IdentityResponse};
use crate::auth::engine::{self, AuthState};

/// Upload the device public key; replaces any previously registered key.
#[utoipa::path(
    post,
    path = "/v1/biometric/key",
    request_body = BiometricKeyRequest,
    responses(
        (status = 200, description = "Key registered", body = IdentityResponse),
        (status = 400, description = "Unusable key material", body = String),
        (status = 401, description = "Bad token", body = String)
    ),
    security(("bearer" = [])),
    tag = "biometric"
)]
pub async fn register_key(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<BiometricKeyRequest>>,
) -> impl IntoResponse {
    let identity = match require_identity(&headers, &pool, &state).await {
        Ok(identity) => identity,
        Err(response) => return response.into_response(),
    };
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match engine::register_biometric_key(&pool, &identity, &request.public_key).await {
        Ok(profile) => {
            (StatusCode::OK, Json(IdentityResponse { identity: profile })).into_response()
        }
        Err(err) => error_response(&err).into_response(),
    }
}

/// Verify a signature over the identity's challenge payload.
#[utoipa::path(
    post,
    path = "/v1/biometric/verify",
    request_body = BiometricVerifyRequest,
    responses(
        (status = 200, description = "Signature verified", body = AckResponse),
        (status = 400, description = "Malformed signature", body = String),
        (status = 401, description = "Verification failed or bad token", body = String),
        (status = 412, description = "No key registered", body = String)
    ),
    security(("bearer" = [])),
    tag = "biometric"
)]
pub async fn verify_challenge(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<BiometricVerifyRequest>>,
) -> impl IntoResponse {
    let identity = match require_identity(&headers, &pool, &state).await {
        Ok(identity) => identity,
        Err(response) => return response.into_response(),
    };
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match engine::verify_biometric_challenge(&identity, &request.signature) {
        Ok(()) => (StatusCode::OK, Json(AckResponse::new("Signature verified"))).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}
