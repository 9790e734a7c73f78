//! Federated (Google) login endpoint.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;
use std::sync::Arc;

use super::error_response;
use super::types::{FederatedLoginRequest, LoginResponse};
use crate::auth::engine::{self, AuthState};

/// Login with a provider-issued ID token. The provider attests email
/// ownership, so the identity lands verified.
#[utoipa::path(
    post,
    path = "/v1/auth/google",
    request_body = FederatedLoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Missing token or incomplete claims", body = String),
        (status = 401, description = "Provider rejected the token", body = String)
    ),
    tag = "auth"
)]
pub async fn google_login(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<FederatedLoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match engine::federated_login(&pool, &state, &request.token).await {
        Ok(outcome) => (StatusCode::OK, Json(LoginResponse::from(outcome))).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::google_login;
    use crate::api::handlers::test_support::{auth_state, lazy_pool};
    use axum::Json;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn google_login_missing_payload() {
        let response = google_login(Extension(lazy_pool()), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn google_login_rejected_assertion() {
        // The test provider rejects every assertion.
        let response = google_login(
            Extension(lazy_pool()),
            Extension(auth_state()),
            Some(Json(super::FederatedLoginRequest {
                token: "some-token".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
