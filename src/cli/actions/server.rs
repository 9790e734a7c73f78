use crate::{
    api,
    auth::{AuthConfig, engine::AuthState, federated::GoogleTokenVerifier, token::TokenIssuer},
    notify::LogCodeSender,
};
use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: SecretString,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub token_leeway_seconds: i64,
    pub lockout_max_attempts: i32,
    pub lockout_penalty_seconds: i64,
    pub otp_ttl_seconds: i64,
    pub otp_sweep_interval_seconds: u64,
    pub google_audience: Option<String>,
    pub require_verified_email: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if engine state cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let config = AuthConfig::new()
        .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
        .with_refresh_token_ttl_seconds(args.refresh_token_ttl_seconds)
        .with_token_leeway_seconds(args.token_leeway_seconds)
        .with_lockout_max_attempts(args.lockout_max_attempts)
        .with_lockout_penalty_seconds(args.lockout_penalty_seconds)
        .with_otp_ttl_seconds(args.otp_ttl_seconds)
        .with_otp_sweep_interval_seconds(args.otp_sweep_interval_seconds)
        .with_require_verified_email(args.require_verified_email)
        .with_google_audience(args.google_audience);

    let tokens = TokenIssuer::new(
        args.token_secret,
        config.access_token_ttl_seconds(),
        config.refresh_token_ttl_seconds(),
        config.token_leeway_seconds(),
    );
    let provider = GoogleTokenVerifier::new(config.google_audience().map(ToString::to_string))?;

    let state = Arc::new(AuthState::new(
        config,
        tokens,
        Arc::new(LogCodeSender),
        Arc::new(provider),
    ));

    api::new(args.port, args.dsn, state).await
}
