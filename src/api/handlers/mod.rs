//! API handlers and shared helpers.

pub mod biometric;
pub mod federated;
pub mod health;
pub mod identity;
pub mod login;
pub mod otp;
pub mod principal;
pub mod root;
pub mod types;

use axum::http::StatusCode;
use tracing::error;

use crate::auth::AuthError;

/// Map an engine error to a response. Internal failures are logged with
/// their full context and surface as an opaque 500.
pub(crate) fn error_response(err: &AuthError) -> (StatusCode, String) {
    if let AuthError::Internal(inner) = err {
        error!("internal error: {inner:#}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error".to_string(),
        );
    }
    (err.status(), err.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::auth::config::AuthConfig;
    use crate::auth::engine::AuthState;
    use crate::auth::federated::test_support::FakeProvider;
    use crate::auth::token::TokenIssuer;
    use crate::notify::LogCodeSender;
    use secrecy::SecretString;
    use sqlx::PgPool;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    /// Pool that never connects; handler tests only exercise paths that
    /// fail before any query runs.
    pub(crate) fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .expect("lazy pool")
    }

    pub(crate) fn auth_state() -> Arc<AuthState> {
        let tokens = TokenIssuer::new(SecretString::from("handler-test-secret"), 60, 3600, 0);
        Arc::new(AuthState::new(
            AuthConfig::new(),
            tokens,
            Arc::new(LogCodeSender),
            Arc::new(FakeProvider::default()),
        ))
    }
}
