//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::cli::actions::{Action, server::Args};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let token_secret = matches
        .get_one::<String>("token-secret")
        .cloned()
        .context("missing required argument: --token-secret")?;

    Ok(Action::Server(Args {
        port,
        dsn,
        token_secret: SecretString::from(token_secret),
        access_token_ttl_seconds: matches
            .get_one::<i64>("access-token-ttl-seconds")
            .copied()
            .unwrap_or(1800),
        refresh_token_ttl_seconds: matches
            .get_one::<i64>("refresh-token-ttl-seconds")
            .copied()
            .unwrap_or(2_592_000),
        token_leeway_seconds: matches
            .get_one::<i64>("token-leeway-seconds")
            .copied()
            .unwrap_or(30),
        lockout_max_attempts: matches
            .get_one::<i32>("lockout-max-attempts")
            .copied()
            .unwrap_or(3),
        lockout_penalty_seconds: matches
            .get_one::<i64>("lockout-penalty-seconds")
            .copied()
            .unwrap_or(180),
        otp_ttl_seconds: matches
            .get_one::<i64>("otp-ttl-seconds")
            .copied()
            .unwrap_or(300),
        otp_sweep_interval_seconds: matches
            .get_one::<u64>("otp-sweep-interval-seconds")
            .copied()
            .unwrap_or(60),
        google_audience: matches.get_one::<String>("google-audience").cloned(),
        require_verified_email: matches
            .get_one::<bool>("require-verified-email")
            .copied()
            .unwrap_or(true),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;

    #[test]
    fn token_secret_required() {
        temp_env::with_vars(
            [
                ("CREDO_TOKEN_SECRET", None::<&str>),
                ("CREDO_DSN", Some("postgres://user@localhost:5432/credo")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["credo"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(
                        err.to_string()
                            .contains("missing required argument: --token-secret")
                    );
                }
            },
        );
    }

    #[test]
    fn server_args_carry_engine_knobs() {
        temp_env::with_vars(
            [
                ("CREDO_DSN", Some("postgres://user@localhost:5432/credo")),
                ("CREDO_TOKEN_SECRET", Some("secret")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec![
                    "credo",
                    "--lockout-penalty-seconds",
                    "1800",
                    "--otp-ttl-seconds",
                    "120",
                    "--require-verified-email",
                    "false",
                ]);
                let action = handler(&matches).expect("handler succeeds");
                let Action::Server(args) = action;
                assert_eq!(args.port, 8080);
                assert_eq!(args.lockout_penalty_seconds, 1800);
                assert_eq!(args.otp_ttl_seconds, 120);
                assert!(!args.require_verified_email);
                assert_eq!(args.lockout_max_attempts, 3);
            },
        );
    }
}
