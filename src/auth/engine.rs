//! Orchestration of the verification use cases.
//!
//! Each operation follows the same shape: load the identity, check the
//! lockout state, verify the secret through the right module, then either
//! reset the counters and issue a result or record the failure. Responses
//! never carry digests or counters.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::biometric;
use super::config::AuthConfig;
use super::error::AuthError;
use super::federated::IdentityProvider;
use super::hasher::SecretHasher;
use super::identity::{
    self, Identity, IdentityProfile, lookup_by_email, lookup_by_id, normalize_email, valid_email,
};
use super::lockout::{self, LockoutPolicy, SecretKind};
use super::otp::{self, OtpPurpose, PIN_LENGTH};
use super::token::{self, AccessGrant, TokenIssuer, TokenKind};
use crate::notify::CodeSender;

/// Shared engine state handed to every handler.
pub struct AuthState {
    config: AuthConfig,
    hasher: SecretHasher,
    tokens: TokenIssuer,
    policy: LockoutPolicy,
    sender: Arc<dyn CodeSender>,
    provider: Arc<dyn IdentityProvider>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        tokens: TokenIssuer,
        sender: Arc<dyn CodeSender>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let policy = LockoutPolicy::new(
            config.lockout_max_attempts(),
            config.lockout_penalty_seconds(),
        );
        Self {
            config,
            hasher: SecretHasher::new(),
            tokens,
            policy,
            sender,
            provider,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn hasher(&self) -> &SecretHasher {
        &self.hasher
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    #[must_use]
    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    fn sender(&self) -> &dyn CodeSender {
        self.sender.as_ref()
    }

    fn provider(&self) -> &dyn IdentityProvider {
        self.provider.as_ref()
    }
}

/// Successful authentication: a token pair plus the sanitized identity.
#[derive(Debug)]
pub struct LoginOutcome {
    pub grant: AccessGrant,
    pub identity: IdentityProfile,
}

/// Verification flags reported by `check_identity`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerificationFlags {
    pub email_verified: bool,
    pub phone_verified: bool,
}

fn map_token_error(err: token::Error) -> AuthError {
    match err {
        token::Error::Expired => AuthError::unauthorized("Token expired"),
        _ => AuthError::unauthorized("Invalid token"),
    }
}

fn signing_failure(err: token::Error) -> AuthError {
    AuthError::Internal(anyhow::Error::new(err).context("failed to issue tokens"))
}

/// Password login by email.
///
/// Unknown email and wrong password return the same message so responses do
/// not reveal whether the account exists.
///
/// # Errors
///
/// `InvalidArgument`, `Unauthorized` (wrong secret or lockout), `Internal`.
pub async fn login(
    pool: &PgPool,
    state: &AuthState,
    email: &str,
    password: &str,
) -> Result<LoginOutcome, AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::invalid_argument(
            "Email and password are required",
        ));
    }

    let email = normalize_email(email);
    let Some(identity) = lookup_by_email(pool, &email).await? else {
        return Err(AuthError::unauthorized(
            SecretKind::Password.wrong_secret_message(),
        ));
    };

    lockout::ensure_not_locked(state.policy(), &identity, SecretKind::Password, Utc::now())?;

    let Some(digest) = identity.password_hash.as_deref() else {
        // No password on record yet; indistinguishable from a wrong one.
        return Err(AuthError::unauthorized(
            SecretKind::Password.wrong_secret_message(),
        ));
    };

    if !state.hasher().verify(password, digest) {
        let outcome =
            lockout::record_failure(pool, state.policy(), identity.id, SecretKind::Password)
                .await?;
        return Err(AuthError::unauthorized(lockout::failure_message(
            SecretKind::Password,
            outcome,
        )));
    }

    lockout::reset(pool, identity.id, SecretKind::Password).await?;
    let grant = state.tokens().grant(identity.id).map_err(signing_failure)?;
    Ok(LoginOutcome {
        grant,
        identity: IdentityProfile::from(&identity),
    })
}

/// PIN check for an already-authenticated identity.
///
/// # Errors
///
/// `InvalidArgument`, `PreconditionFailed` (no PIN set), `Unauthorized`.
pub async fn login_pin(
    pool: &PgPool,
    state: &AuthState,
    identity: &Identity,
    pin: &str,
) -> Result<IdentityProfile, AuthError> {
    if pin.chars().count() != PIN_LENGTH {
        return Err(AuthError::invalid_argument("PIN must be 4 digits"));
    }

    lockout::ensure_not_locked(state.policy(), identity, SecretKind::Pin, Utc::now())?;

    let Some(digest) = identity.pin_hash.as_deref() else {
        return Err(AuthError::precondition_failed("No PIN is set"));
    };

    if !state.hasher().verify(pin, digest) {
        let outcome =
            lockout::record_failure(pool, state.policy(), identity.id, SecretKind::Pin).await?;
        return Err(AuthError::unauthorized(lockout::failure_message(
            SecretKind::Pin,
            outcome,
        )));
    }

    lockout::reset(pool, identity.id, SecretKind::Pin).await?;
    Ok(IdentityProfile::from(identity))
}

/// First-contact check: load or create the identity, and while the email is
/// unverified (or no password exists yet) dispatch an email code.
///
/// # Errors
///
/// `InvalidArgument` for a malformed email, `Internal` on store/dispatch
/// failure.
pub async fn check_identity(
    pool: &PgPool,
    state: &AuthState,
    email: &str,
) -> Result<VerificationFlags, AuthError> {
    let email = normalize_email(email);
    if !valid_email(&email) {
        return Err(AuthError::invalid_argument("A valid email is required"));
    }

    let identity = identity::find_or_create(pool, &email).await?;

    if !identity.email_verified || identity.password_hash.is_none() {
        otp::request_code(
            pool,
            state.hasher(),
            state.sender(),
            &identity,
            OtpPurpose::Email,
        )
        .await?;
    }

    Ok(VerificationFlags {
        email_verified: identity.email_verified,
        phone_verified: identity.phone_verified,
    })
}

/// First-time password set. Changing an existing password goes through the
/// OTP-gated reset instead.
///
/// # Errors
///
/// `NotFound`, `PreconditionFailed` (unverified email under the strict
/// policy), `Conflict` (password already set), `InvalidArgument`.
pub async fn set_password(
    pool: &PgPool,
    state: &AuthState,
    email: &str,
    password: &str,
) -> Result<LoginOutcome, AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::invalid_argument(
            "Email and password are required",
        ));
    }

    let email = normalize_email(email);
    let Some(mut identity) = lookup_by_email(pool, &email).await? else {
        return Err(AuthError::NotFound);
    };

    if state.config().require_verified_email() && !identity.email_verified {
        return Err(AuthError::precondition_failed("Email not verified"));
    }
    if identity.password_hash.is_some() {
        return Err(AuthError::conflict("Password already set, use reset"));
    }

    let digest = state.hasher().hash(password)?;
    identity::set_password_hash(pool, identity.id, &digest).await?;
    identity.password_hash = Some(digest);

    let grant = state.tokens().grant(identity.id).map_err(signing_failure)?;
    Ok(LoginOutcome {
        grant,
        identity: IdentityProfile::from(&identity),
    })
}

/// First-time PIN set for an authenticated identity.
///
/// # Errors
///
/// `InvalidArgument`, `Conflict` (PIN already set).
pub async fn set_pin(
    pool: &PgPool,
    state: &AuthState,
    identity: &Identity,
    pin: &str,
) -> Result<IdentityProfile, AuthError> {
    if pin.chars().count() != PIN_LENGTH {
        return Err(AuthError::invalid_argument("PIN must be 4 digits"));
    }
    if identity.pin_hash.is_some() {
        return Err(AuthError::conflict("PIN already set, use reset"));
    }

    let digest = state.hasher().hash(pin)?;
    identity::set_pin_hash(pool, identity.id, &digest).await?;

    let mut updated = identity.clone();
    updated.pin_hash = Some(digest);
    Ok(IdentityProfile::from(&updated))
}

/// Generate and dispatch a one-time code.
///
/// # Errors
///
/// `NotFound`, `Conflict` (verified phone), `Internal`.
pub async fn request_otp(
    pool: &PgPool,
    state: &AuthState,
    email: &str,
    purpose: OtpPurpose,
) -> Result<(), AuthError> {
    let email = normalize_email(email);
    let Some(identity) = lookup_by_email(pool, &email).await? else {
        return Err(AuthError::NotFound);
    };

    otp::request_code(pool, state.hasher(), state.sender(), &identity, purpose).await
}

/// Verify and consume a one-time code, applying its side effect.
///
/// # Errors
///
/// See [`otp::verify_code`]; unknown email is `NotFound`.
pub async fn verify_otp(
    pool: &PgPool,
    state: &AuthState,
    email: &str,
    purpose: OtpPurpose,
    code: &str,
    auxiliary: Option<&str>,
) -> Result<(), AuthError> {
    let email = normalize_email(email);
    let Some(identity) = lookup_by_email(pool, &email).await? else {
        return Err(AuthError::NotFound);
    };

    otp::verify_code(
        pool,
        state.hasher(),
        &identity,
        purpose,
        code,
        auxiliary,
        state.config(),
    )
    .await
}

/// Login with a third-party assertion: verify it with the provider, then
/// find-or-create the identity by email with the email marked verified.
///
/// # Errors
///
/// `InvalidArgument` (missing assertion or claims), `Unauthorized`
/// (provider rejected), `Internal`.
pub async fn federated_login(
    pool: &PgPool,
    state: &AuthState,
    assertion: &str,
) -> Result<LoginOutcome, AuthError> {
    let assertion = assertion.trim();
    if assertion.is_empty() {
        return Err(AuthError::invalid_argument("Token is required"));
    }

    let claims = match state.provider().verify(assertion).await {
        Ok(claims) => claims,
        Err(err) => {
            debug!("federated assertion rejected: {err}");
            return Err(AuthError::unauthorized(
                "Federated token verification failed",
            ));
        }
    };

    let (Some(email), Some(name)) = (claims.email, claims.name) else {
        return Err(AuthError::invalid_argument(
            "Assertion is missing email or name",
        ));
    };

    let email = normalize_email(&email);
    let identity = identity::upsert_federated(pool, &email, &name).await?;
    let grant = state.tokens().grant(identity.id).map_err(signing_failure)?;
    Ok(LoginOutcome {
        grant,
        identity: IdentityProfile::from(&identity),
    })
}

/// Mint a new access token from a refresh token.
///
/// # Errors
///
/// `Unauthorized` on any token failure or when the identity is gone.
pub async fn refresh(
    pool: &PgPool,
    state: &AuthState,
    refresh_token: &str,
) -> Result<String, AuthError> {
    let claims = state
        .tokens()
        .verify(refresh_token, TokenKind::Refresh)
        .map_err(map_token_error)?;

    let Some(identity) = lookup_by_id(pool, claims.sub).await? else {
        return Err(AuthError::unauthorized(
            "The identity belonging to this token no longer exists",
        ));
    };

    state
        .tokens()
        .issue_access(identity.id)
        .map_err(signing_failure)
}

/// Resolve a bearer access token into a live identity.
///
/// Tokens are not revocation-aware; re-resolving the identity here is the
/// only revocation check available.
///
/// # Errors
///
/// `Unauthorized` on any token failure or when the identity is gone.
pub async fn authorize(
    pool: &PgPool,
    state: &AuthState,
    bearer: &str,
) -> Result<Identity, AuthError> {
    let claims = state
        .tokens()
        .verify(bearer, TokenKind::Access)
        .map_err(map_token_error)?;

    let Some(identity) = lookup_by_id(pool, claims.sub).await? else {
        return Err(AuthError::unauthorized(
            "The identity belonging to this token no longer exists",
        ));
    };
    Ok(identity)
}

/// Register (or replace) the biometric public key.
///
/// # Errors
///
/// `InvalidArgument` for unusable key material, `Internal` on store failure.
pub async fn register_biometric_key(
    pool: &PgPool,
    identity: &Identity,
    public_key: &str,
) -> Result<IdentityProfile, AuthError> {
    let trimmed = public_key.trim();
    biometric::validate_public_key(trimmed)?;
    identity::set_biometric_key(pool, identity.id, Some(trimmed)).await?;

    let mut updated = identity.clone();
    updated.biometric_key = Some(trimmed.to_string());
    Ok(IdentityProfile::from(&updated))
}

/// Verify a biometric challenge signature. No state change on success.
///
/// # Errors
///
/// See [`biometric::verify_challenge`].
pub fn verify_biometric_challenge(
    identity: &Identity,
    signature: &str,
) -> Result<(), AuthError> {
    biometric::verify_challenge(identity, signature)
}

/// Logout: revoke the biometric key. Tokens stay valid until they expire.
///
/// # Errors
///
/// `Internal` on store failure.
pub async fn logout(pool: &PgPool, identity_id: Uuid) -> Result<(), AuthError> {
    identity::set_biometric_key(pool, identity_id, None).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{AuthState, check_identity, federated_login, login, login_pin, set_password};
    use crate::auth::config::AuthConfig;
    use crate::auth::error::AuthError;
    use crate::auth::federated::test_support::FakeProvider;
    use crate::auth::federated::{FederatedClaims, IdentityProvider};
    use crate::auth::token::TokenIssuer;
    use crate::notify::LogCodeSender;
    use secrecy::SecretString;
    use sqlx::PgPool;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .expect("lazy pool")
    }

    fn state_with_provider(provider: Arc<dyn IdentityProvider>) -> AuthState {
        let tokens = TokenIssuer::new(SecretString::from("engine-test-secret"), 60, 3600, 0);
        AuthState::new(
            AuthConfig::new(),
            tokens,
            Arc::new(LogCodeSender),
            provider,
        )
    }

    fn state() -> AuthState {
        state_with_provider(Arc::new(FakeProvider::default()))
    }

    #[tokio::test]
    async fn login_requires_email_and_password() {
        let pool = lazy_pool();
        let result = login(&pool, &state(), " ", "secret").await;
        assert!(matches!(result, Err(AuthError::InvalidArgument(_))));

        let result = login(&pool, &state(), "a@example.com", "").await;
        assert!(matches!(result, Err(AuthError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn pin_login_enforces_four_digits() {
        let pool = lazy_pool();
        let identity = crate::auth::identity::test_identity("a@example.com");

        let result = login_pin(&pool, &state(), &identity, "123").await;
        assert!(matches!(result, Err(AuthError::InvalidArgument(_))));

        let result = login_pin(&pool, &state(), &identity, "12345").await;
        assert!(matches!(result, Err(AuthError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn pin_login_without_a_pin_is_a_precondition_failure() {
        let pool = lazy_pool();
        let identity = crate::auth::identity::test_identity("a@example.com");

        let result = login_pin(&pool, &state(), &identity, "1234").await;
        assert!(matches!(result, Err(AuthError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn set_pin_refuses_an_existing_pin() {
        let pool = lazy_pool();
        let mut identity = crate::auth::identity::test_identity("a@example.com");
        identity.pin_hash = Some("$argon2id$...".to_string());

        let result = super::set_pin(&pool, &state(), &identity, "1234").await;
        assert!(matches!(result, Err(AuthError::Conflict(_))));
    }

    #[tokio::test]
    async fn check_identity_rejects_malformed_email() {
        let pool = lazy_pool();
        let result = check_identity(&pool, &state(), "not-an-email").await;
        assert!(matches!(result, Err(AuthError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn set_password_requires_both_fields() {
        let pool = lazy_pool();
        let result = set_password(&pool, &state(), "", "secret").await;
        assert!(matches!(result, Err(AuthError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn federated_login_requires_an_assertion() {
        let pool = lazy_pool();
        let result = federated_login(&pool, &state(), "  ").await;
        assert!(matches!(result, Err(AuthError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn rejected_assertion_is_unauthorized() {
        let pool = lazy_pool();
        // FakeProvider::default() rejects every assertion.
        let result = federated_login(&pool, &state(), "bad-token").await;
        assert!(matches!(result, Err(AuthError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn assertion_without_email_or_name_is_invalid() {
        let pool = lazy_pool();
        let provider = Arc::new(FakeProvider {
            claims: Some(FederatedClaims {
                email: Some("alice@example.com".to_string()),
                name: None,
                aud: None,
            }),
        });
        let result = federated_login(&pool, &state_with_provider(provider), "token").await;
        assert!(matches!(result, Err(AuthError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn garbage_bearer_token_is_unauthorized() {
        let pool = lazy_pool();
        let result = super::authorize(&pool, &state(), "garbage.token.here").await;
        assert!(matches!(result, Err(AuthError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn expired_access_token_is_unauthorized() {
        let pool = lazy_pool();
        let state = state();

        // Issue with a dedicated short-lived issuer sharing the secret, then
        // verify after expiry against the same state.
        let issuer = TokenIssuer::new(SecretString::from("engine-test-secret"), -10, 3600, 0);
        let token = issuer
            .issue_access(uuid::Uuid::from_u128(1))
            .expect("token issues");
        let result = super::authorize(&pool, &state, &token).await;
        assert!(matches!(result, Err(AuthError::Unauthorized(message)) if message == "Token expired"));
    }

    #[tokio::test]
    async fn refresh_token_cannot_authorize_requests() {
        let pool = lazy_pool();
        let state = state();
        let token = state
            .tokens()
            .issue_refresh(uuid::Uuid::from_u128(1))
            .expect("token issues");
        let result = super::authorize(&pool, &state, &token).await;
        assert!(matches!(result, Err(AuthError::Unauthorized(message)) if message == "Invalid token"));
    }
}
