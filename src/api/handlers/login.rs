//! Login, PIN check, token refresh, and logout endpoints.

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
    AckResponse, IdentityResponse, LoginRequest, LoginResponse, PinRequest, RefreshRequest,
    RefreshResponse,
};
use crate::auth::engine::{self, AuthState};

/// Password login. Wrong attempts report how many remain; the third wrong
/// attempt answers with the unlock time instead.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Missing email or password", body = String),
        (status = 401, description = "Wrong credentials or active lockout", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match engine::login(&pool, &state, &request.email, &request.password).await {
        Ok(outcome) => (StatusCode::OK, Json(LoginResponse::from(outcome))).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

/// PIN check for the bearer identity.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-pin",
    request_body = PinRequest,
    responses(
        (status = 200, description = "PIN verified", body = IdentityResponse),
        (status = 400, description = "Malformed PIN", body = String),
        (status = 401, description = "Wrong PIN, lockout, or bad token", body = String),
        (status = 412, description = "No PIN set", body = String)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn verify_pin(
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

    match engine::login_pin(&pool, &state, &identity, &request.pin).await {
        Ok(profile) => {
            (StatusCode::OK, Json(IdentityResponse { identity: profile })).into_response()
        }
        Err(err) => error_response(&err).into_response(),
    }
}

/// Mint a new access token from a refresh token.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 400, description = "Missing payload", body = String),
        (status = 401, description = "Invalid or expired refresh token", body = String)
    ),
    tag = "auth"
)]
pub async fn refresh(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match engine::refresh(&pool, &state, &request.refresh_token).await {
        Ok(token) => (StatusCode::OK, Json(RefreshResponse { token })).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

/// Logout: revokes the biometric key. Tokens are stateless and simply
/// age out.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = AckResponse),
        (status = 401, description = "Bad token", body = String)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let identity = match require_identity(&headers, &pool, &state).await {
        Ok(identity) => identity,
        Err(response) => return response.into_response(),
    };

    match engine::logout(&pool, identity.id).await {
        Ok(()) => (StatusCode::OK, Json(AckResponse::new("Logged out"))).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::{login, refresh, verify_pin};
    use crate::api::handlers::test_support::{auth_state, lazy_pool};
    use axum::Json;
    use axum::extract::Extension;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn login_missing_payload() {
        let response = login(Extension(lazy_pool()), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_empty_fields() {
        let response = login(
            Extension(lazy_pool()),
            Extension(auth_state()),
            Some(Json(super::LoginRequest {
                email: " ".to_string(),
                password: String::new(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_pin_requires_bearer_token() {
        let response = verify_pin(
            HeaderMap::new(),
            Extension(lazy_pool()),
            Extension(auth_state()),
            Some(Json(super::PinRequest {
                pin: "1234".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_rejects_garbage_token() {
        let response = refresh(
            Extension(lazy_pool()),
            Extension(auth_state()),
            Some(Json(super::RefreshRequest {
                refresh_token: "garbage".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
